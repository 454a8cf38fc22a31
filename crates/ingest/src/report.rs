//! Plain-text batch report, one block per processed directory.

use crate::error::{ErrorKind, Result};
use crate::process::DirectoryOutcome;
use exn::ResultExt;
use std::fmt::Write as _;
use std::path::Path;
use tokio::io::AsyncWriteExt;

const INDENT: &str = "  ";
const SEPARATOR: &str = "----------------------------------------";

fn card_id(id: Option<u64>) -> String {
    id.map_or_else(|| "None".to_string(), |id| id.to_string())
}

/// Render the report block for one directory.
pub fn render(outcome: &DirectoryOutcome) -> String {
    let mut block = String::new();
    // Writing into a String cannot fail.
    _ = writeln!(block, "Group Type: {}", outcome.category);
    _ = writeln!(block, "Collection Name: {}", outcome.collection);
    _ = writeln!(block, "Number of Cards: {}", outcome.cards.len());
    _ = writeln!(block, "Uploaded Files:");
    for file in &outcome.uploaded {
        _ = writeln!(block, "{INDENT}{file}");
    }
    _ = writeln!(block, "First Card ID: {}", card_id(outcome.first_card_id()));
    _ = writeln!(block, "Last Card ID: {}", card_id(outcome.last_card_id()));
    if !outcome.duplicates.is_empty() {
        let names: Vec<&str> = outcome.duplicates.iter().map(String::as_str).collect();
        _ = writeln!(block, "Duplicate Names: {}", names.join(", "));
    }
    if outcome.failure.is_some() || !outcome.errors.is_empty() {
        _ = writeln!(block, "Errors:");
        if let Some(failure) = &outcome.failure {
            let (code, message) = (failure.code, &failure.message);
            _ = writeln!(block, "{INDENT}[code {code}] {message} (stopped after: {})", outcome.stage);
        }
        for error in &outcome.errors {
            _ = writeln!(block, "{INDENT}{error}");
        }
    }
    _ = writeln!(block, "{SEPARATOR}");
    block
}

/// Append a rendered block to the report file, creating it if needed.
pub async fn append(path: &Path, block: &str) -> Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .or_raise(|| ErrorKind::Report(path.to_path_buf()))?;
    file.write_all(block.as_bytes()).await.or_raise(|| ErrorKind::Report(path.to_path_buf()))?;
    file.flush().await.or_raise(|| ErrorKind::Report(path.to_path_buf()))
}
