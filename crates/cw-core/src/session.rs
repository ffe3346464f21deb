//! Explicit session state handed to the sequencer and analysis pipeline.

use std::path::PathBuf;

use crate::config::SessionConfig;
use crate::drift::DriftOrder;

/// Everything a weighing session needs to know beyond the scheme itself.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    /// Client the calibration is performed for.
    pub client: String,
    /// Folder holding the session's documents.
    pub folder: PathBuf,
    /// Drift order forced for analysis; `None` selects automatically.
    pub drift: Option<DriftOrder>,
    /// Loaded session configuration.
    pub config: SessionConfig,
}

impl SessionContext {
    /// Creates a context with the given configuration and automatic drift selection.
    pub fn new(client: impl Into<String>, folder: impl Into<PathBuf>, config: SessionConfig) -> Self {
        Self {
            client: client.into(),
            folder: folder.into(),
            drift: None,
            config,
        }
    }

    /// Forces a drift order for every analysis in the session.
    pub fn with_drift(mut self, drift: DriftOrder) -> Self {
        self.drift = Some(drift);
        self
    }

    /// Path of the weighing document named `file_stem` inside the session folder.
    pub fn document_path(&self, file_stem: &str) -> PathBuf {
        self.folder.join(format!("{}_{}.json", self.client, file_stem))
    }
}
