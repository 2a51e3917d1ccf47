//! Per-symbol checkpoint persistence.
//!
//! One JSON blob per symbol capturing feature buffers, model state, and
//! the pending label. Saves are atomic (write to a temp file in the
//! same directory, then rename), so a concurrent reader never sees a
//! half-written checkpoint. A checkpoint that fails to parse is a hard
//! error: silently starting from an empty model would throw away
//! learned drift-adaptation state without anyone noticing.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::engine::{StrategyEngine, SymbolState};

/// Errors from checkpoint save/restore.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("no state for symbol {0}")]
    UnknownSymbol(String),
    #[error("checkpoint {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("checkpoint serialization failed: {0}")]
    Encode(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CheckpointError>;

fn checkpoint_path(dir: &Path, symbol: &str) -> PathBuf {
    // Symbols like "BTC/USD" must not escape the checkpoint directory.
    let safe: String = symbol
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    dir.join(format!("{safe}.ckpt.json"))
}

impl StrategyEngine {
    /// Atomically write the symbol's state under `dir`, returning the
    /// checkpoint path.
    pub fn save_checkpoint(&self, symbol: &str, dir: &Path) -> Result<PathBuf> {
        let state = self
            .symbol_state(symbol)
            .ok_or_else(|| CheckpointError::UnknownSymbol(symbol.to_string()))?;
        fs::create_dir_all(dir)?;

        let json = serde_json::to_vec(state).map_err(CheckpointError::Encode)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.flush()?;

        let path = checkpoint_path(dir, symbol);
        tmp.persist(&path).map_err(|e| CheckpointError::Io(e.error))?;
        tracing::info!(symbol, path = %path.display(), "checkpoint saved");
        Ok(path)
    }

    /// Restore a symbol's state from a checkpoint under `dir`.
    ///
    /// Replaces any in-memory state for the symbol. Corruption is fatal
    /// to the call and leaves existing state untouched.
    pub fn restore_checkpoint(&mut self, symbol: &str, dir: &Path) -> Result<()> {
        let path = checkpoint_path(dir, symbol);
        let json = fs::read_to_string(&path)?;
        let state: SymbolState =
            serde_json::from_str(&json).map_err(|source| CheckpointError::Corrupt {
                path: path.clone(),
                source,
            })?;
        self.insert_symbol_state(symbol, state);
        tracing::info!(symbol, path = %path.display(), "checkpoint restored");
        Ok(())
    }
}
