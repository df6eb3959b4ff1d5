//! Artifact checks run after a fetch.

use std::path::Path;

use tokio::io::AsyncReadExt;
use tracing::error;

/// Current GGUF container.
pub const GGUF_MAGIC: [u8; 4] = *b"GGUF";
/// Legacy GGML container, still accepted by Shimmy.
pub const GGML_MAGIC: [u8; 4] = *b"GGML";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// True when the file starts with a recognised model magic.
///
/// Unreadable or shorter-than-4-byte files are not model artifacts.
pub async fn is_model_artifact(path: &Path) -> bool {
    let mut magic = [0u8; 4];
    let read = async {
        let mut file = tokio::fs::File::open(path).await?;
        file.read_exact(&mut magic).await?;
        Ok::<_, std::io::Error>(())
    };
    if let Err(e) = read.await {
        error!("Failed to verify model file {}: {e}", path.display());
        return false;
    }
    magic == GGUF_MAGIC || magic == GGML_MAGIC
}

/// Size in MiB, rounded to two decimals.
pub fn size_mb(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0
}
