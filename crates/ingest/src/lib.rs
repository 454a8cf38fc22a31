//! Directory-to-catalog ingestion pipeline for trading-card images.
//!
//! Each collection directory goes through the same stages (see
//! [`process::Stage`]): a folder marker is created in object storage, file
//! names are [normalized](normalize), valid card files are
//! [uploaded](upload) concurrently, then the collection and one card per
//! uploaded file are recorded in the [catalog](cardingest_catalog). The
//! [`batch`] driver discovers collection directories below a set of input
//! roots and writes a plain-text [report] as it goes.

pub mod batch;
mod context;
pub mod error;
pub mod normalize;
pub mod process;
pub mod report;
pub mod upload;
pub mod validate;

pub use crate::batch::{BatchEvent, Summary, batch, run};
pub use crate::context::{Context, Group, Urls};
pub use crate::process::{DirectoryOutcome, process_directory};
