use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

/// Failures that prevent a batch from running at all.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not set up logging")]
    Logging,
    #[display("could not initialise the storage backend")]
    Storage,
    #[display("could not open the catalog")]
    Catalog,
    #[display("batch aborted")]
    Batch,
}
