//! `[build]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [build]
//! depth = 2             # Expansions allowed along any path (omit for full builds)
//! shallow = false       # Same as depth = 1
//! max_passes = 200      # Passes before giving up on state convergence
//! max_rewrites = 100    # Replacements allowed at a single position
//! ```

use serde::{Deserialize, Serialize};

use crate::build::{BuildOptions, DEFAULT_MAX_PASSES, DEFAULT_MAX_REWRITES};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSectionConfig {
    pub depth: Option<usize>,
    pub shallow: bool,
    pub max_passes: usize,
    pub max_rewrites: usize,
}

impl Default for BuildSectionConfig {
    fn default() -> Self {
        Self {
            depth: None,
            shallow: false,
            max_passes: DEFAULT_MAX_PASSES,
            max_rewrites: DEFAULT_MAX_REWRITES,
        }
    }
}

impl BuildSectionConfig {
    pub fn options(&self) -> BuildOptions {
        BuildOptions {
            depth: self.depth,
            shallow: self.shallow,
            max_passes: self.max_passes,
            max_rewrites: self.max_rewrites,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.max_passes == 0 {
            return Err("build.max_passes must be at least 1".into());
        }
        if self.max_rewrites == 0 {
            return Err("build.max_rewrites must be at least 1".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_build_section() {
        let config = test_parse_config("[build]\ndepth = 2\nmax_passes = 10");
        let options = config.build.options();
        assert_eq!(options.depth, Some(2));
        assert_eq!(options.max_passes, 10);
        assert_eq!(options.max_rewrites, crate::build::DEFAULT_MAX_REWRITES);
        assert!(!options.shallow);
    }

    #[test]
    fn test_build_section_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.build.options(), crate::build::BuildOptions::default());
    }

    #[test]
    fn test_zero_limits_rejected() {
        let config = test_parse_config("[build]\nmax_passes = 0");
        assert!(config.build.validate().is_err());
    }
}
