//! Saving and loading fitted pipelines.
//!
//! A pipeline is stored as a JSON envelope:
//!
//! ```json
//! { "format_version": 1, "created_at": "...", "pipeline": { ... } }
//! ```
//!
//! Floats are written in shortest round-trip form and parsed exactly, so a
//! reloaded pipeline makes bit-identical predictions. Loading only restores
//! state; nothing is refit.

use crate::error::{PipelineError, Result};
use crate::pipeline::FullPipeline;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Version written into every envelope.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    format_version: u32,
    created_at: DateTime<Utc>,
    pipeline: &'a FullPipeline,
}

/// A deserialized envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct SavedPipeline {
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    pub pipeline: FullPipeline,
}

impl SavedPipeline {
    /// Parse an envelope, rejecting unknown format versions.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let saved: SavedPipeline = serde_json::from_slice(bytes)?;
        if saved.format_version != FORMAT_VERSION {
            return Err(PipelineError::InvalidData(format!(
                "unsupported model format version {} (expected {})",
                saved.format_version, FORMAT_VERSION
            )));
        }
        if !saved.pipeline.is_fitted() {
            return Err(PipelineError::InvalidData(
                "stored pipeline is not fitted".to_string(),
            ));
        }
        Ok(saved)
    }

    /// Read and parse an envelope from disk.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::ModelNotFound {
                path: path.display().to_string(),
            });
        }
        Self::from_bytes(&fs::read(path)?)
    }
}

impl FullPipeline {
    /// Serialize the fitted pipeline to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if !self.is_fitted() {
            return Err(PipelineError::NotFitted("FullPipeline"));
        }
        let envelope = EnvelopeRef {
            format_version: FORMAT_VERSION,
            created_at: Utc::now(),
            pipeline: self,
        };
        Ok(serde_json::to_vec_pretty(&envelope)?)
    }

    /// Restore a pipeline serialized with [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(SavedPipeline::from_bytes(bytes)?.pipeline)
    }

    /// Write the fitted pipeline to `path`. The parent directory must exist.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        fs::write(path, &bytes)?;
        info!("Saved pipeline to {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    /// Load a pipeline written by [`save`](Self::save).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let saved = SavedPipeline::read(path.as_ref())?;
        info!(
            "Loaded pipeline from {} (saved {})",
            path.as_ref().display(),
            saved.created_at
        );
        Ok(saved.pipeline)
    }
}
