//! `[log]` section configuration.
//!
//! ```toml
//! [log]
//! verbose = false   # Print build progress (same as --verbose)
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSectionConfig {
    pub verbose: bool,
}
