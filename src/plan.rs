//! TOML clone plans.
//!
//! ```toml
//! strategy = "auto"
//! batch_size = 500
//! copy_views = true
//! copy_triggers = true
//! copy_routines = false
//!
//! [[tables]]
//! name = "customers"
//!
//! [[tables]]
//! name = "audit_log"
//! copy_data = false
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::clone::CloneRequest;
use crate::data::{CopyStrategy, DEFAULT_BATCH_SIZE};
use crate::error::Result;
use crate::object::TableCloneOption;

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

/// A clone request as written in a plan file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClonePlan {
    #[serde(default)]
    pub strategy: CopyStrategy,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub copy_views: bool,
    #[serde(default)]
    pub copy_triggers: bool,
    #[serde(default)]
    pub copy_routines: bool,
    #[serde(default)]
    pub tables: Vec<TableCloneOption>,
}

impl Default for ClonePlan {
    fn default() -> Self {
        Self {
            strategy: CopyStrategy::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            copy_views: false,
            copy_triggers: false,
            copy_routines: false,
            tables: Vec::new(),
        }
    }
}

impl ClonePlan {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let plan = Self::parse(&content)?;
        debug!("Loaded clone plan from {}", path.display());
        Ok(plan)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// A request with this plan's settings. The progress callback and
    /// cancellation token are left at their defaults.
    pub fn into_request(self) -> CloneRequest {
        CloneRequest {
            tables: self.tables,
            copy_views: self.copy_views,
            copy_triggers: self.copy_triggers,
            copy_routines: self.copy_routines,
            strategy: self.strategy,
            batch_size: self.batch_size,
            ..Default::default()
        }
    }
}
