//! Session configuration
//!
//! Loaded from TOML by the host. Every field has a default, so an empty
//! document is a valid configuration.
//!
//! ```toml
//! [history]
//! max_steps = 100
//! merge_window_ms = 250
//! discipline = "operations"
//!
//! [index]
//! scoped_rebuild = true
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{ArborError, Result};

/// How history steps capture and restore document state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discipline {
    /// Invertible operations replayed in reverse; preserves node identity
    #[default]
    Operations,
    /// Whole-document snapshots before and after each step
    Snapshots,
}

impl Discipline {
    pub fn as_str(&self) -> &'static str {
        match self {
            Discipline::Operations => "operations",
            Discipline::Snapshots => "snapshots",
        }
    }
}

/// Edit history settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    /// Maximum number of undo steps kept; the oldest step is dropped beyond it
    pub max_steps: usize,
    /// Debounce window for coalescing field edits; 0 disables merging
    pub merge_window_ms: u64,
    /// Recording discipline used for every step of this history
    pub discipline: Discipline,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_steps: 100,
            merge_window_ms: 250,
            discipline: Discipline::Operations,
        }
    }
}

/// Tree index settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexConfig {
    /// Re-traverse only affected subtrees when the invalidation allows it
    pub scoped_rebuild: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            scoped_rebuild: true,
        }
    }
}

/// Top-level configuration of one editing session
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub history: HistoryConfig,
    pub index: IndexConfig,
}

impl SessionConfig {
    /// Parse and validate a TOML configuration document
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the text is not valid TOML, contains unknown
    /// keys, or fails validation.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: SessionConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when `history.max_steps` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.history.max_steps == 0 {
            return Err(ArborError::InvalidConfig {
                reason: "history.max_steps must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
