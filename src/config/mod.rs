use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::dsl::DEFAULT_MAX_DEPTH;
use crate::records::TagSource;

/// Settings read from the optional YAML file. Command-line flags override
/// every field.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SieveConfig {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub tags: TagSource,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl SieveConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

impl Default for SieveConfig {
    fn default() -> Self {
        Self {
            query: None,
            tags: TagSource::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            batch_size: default_batch_size(),
        }
    }
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_batch_size() -> usize {
    1024
}
