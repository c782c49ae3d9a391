use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

/// Persistent progress of a resumable run
pub trait CheckpointStore<S>: Send + Sync {
    /// Saved state, or the default state when nothing was saved
    fn load(&self) -> Result<S>;

    fn save(&self, state: &S) -> Result<()>;

    /// Forget saved progress once a run completes
    fn clear(&self) -> Result<()>;
}

/// Checkpoint kept as pretty JSON in a single file
pub struct JsonFileCheckpoint<S> {
    path: PathBuf,
    _state: PhantomData<fn() -> S>,
}

impl<S> JsonFileCheckpoint<S> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _state: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<S> CheckpointStore<S> for JsonFileCheckpoint<S>
where
    S: Serialize + DeserializeOwned + Default,
{
    fn load(&self) -> Result<S> {
        if !self.path.exists() {
            return Ok(S::default());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read checkpoint {}", self.path.display()))?;
        let state = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse checkpoint {}", self.path.display()))?;

        debug!("Loaded checkpoint from {}", self.path.display());
        Ok(state)
    }

    fn save(&self, state: &S) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).context("Failed to create checkpoint directory")?;
            }
        }

        let json = serde_json::to_string_pretty(state).context("Failed to serialize checkpoint")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write checkpoint {}", self.path.display()))?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to remove checkpoint"),
        }
    }
}

/// In-process checkpoint for the daemon and tests
pub struct MemoryCheckpoint<S> {
    state: Mutex<Option<S>>,
}

impl<S> MemoryCheckpoint<S> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(None),
        }
    }
}

impl<S> Default for MemoryCheckpoint<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> CheckpointStore<S> for MemoryCheckpoint<S>
where
    S: Clone + Default + Send,
{
    fn load(&self) -> Result<S> {
        let state = self.state.lock().map_err(|_| anyhow!("checkpoint lock poisoned"))?;
        Ok(state.clone().unwrap_or_default())
    }

    fn save(&self, state: &S) -> Result<()> {
        let mut saved = self.state.lock().map_err(|_| anyhow!("checkpoint lock poisoned"))?;
        *saved = Some(state.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut saved = self.state.lock().map_err(|_| anyhow!("checkpoint lock poisoned"))?;
        *saved = None;
        Ok(())
    }
}
