use thiserror::Error;

/// Failures reading or writing a [`crate::archive`] binary (§7: "file
/// missing / corrupt... not a core concern"). Callers treat this the same as
/// any other ingest failure — it never reaches the per-window pipeline.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive I/O error")]
    Io(#[from] std::io::Error),
}
