use std::io;
use std::path::Path;
use tracing::error;

/// Check whether `path` is present, surfacing any error other than "not found".
pub async fn probe(path: &Path) -> io::Result<bool> {
    match tokio::fs::metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Like [`probe`], but any other access error is logged and reported as absent.
///
/// A permissions or I/O fault therefore reaches the user as "no data".
pub async fn exists(path: &Path) -> bool {
    match probe(path).await {
        Ok(present) => present,
        Err(e) => {
            error!("Failed to check report file {}: {}", path.display(), e);
            false
        }
    }
}
