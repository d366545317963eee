//! Model artifact: the fitted pipeline serialized with bincode and
//! compressed with zstd.
use std::fs;
use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};

use crate::pipeline::FittedPipeline;

const ZSTD_LEVEL: i32 = 3;

pub fn encode_model(model: &FittedPipeline) -> Result<Vec<u8>> {
    let payload = bincode::serialize(model).context("Failed to serialize model")?;
    let compressed = zstd::encode_all(Cursor::new(payload), ZSTD_LEVEL).context("zstd compression failed")?;
    Ok(compressed)
}

pub fn decode_model(bytes: &[u8]) -> Result<FittedPipeline> {
    let payload = zstd::decode_all(Cursor::new(bytes)).context("zstd decompression failed")?;
    let model = bincode::deserialize(&payload).context("Failed to deserialize model")?;
    Ok(model)
}

/// Write the model to `path`, creating parent directories and replacing any
/// existing file.
pub fn save_model<P: AsRef<Path>>(model: &FittedPipeline, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create model directory: {}", parent.display()))?;
        }
    }
    let bytes = encode_model(model)?;
    fs::write(path, &bytes).with_context(|| format!("Failed to write model to {}", path.display()))?;
    log::info!("Saved model ({} bytes) to {}", bytes.len(), path.display());
    Ok(())
}

pub fn load_model<P: AsRef<Path>>(path: P) -> Result<FittedPipeline> {
    let path = path.as_ref();
    let bytes = fs::read(path).with_context(|| format!("Failed to read model file: {}", path.display()))?;
    decode_model(&bytes).with_context(|| format!("Invalid model file: {}", path.display()))
}
