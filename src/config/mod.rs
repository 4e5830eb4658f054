//! Engine configuration from `stackdom.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # [build], [serialize], [log]
//! ├── error          # ConfigError
//! └── mod.rs         # EngineConfig (this file)
//! ```
//!
//! # Sections
//!
//! | Section       | Purpose                                          |
//! |---------------|--------------------------------------------------|
//! | `[build]`     | Depth budget, pass and rewrite limits            |
//! | `[serialize]` | Reanimateable markup, indentation                |
//! | `[log]`       | Verbose output                                   |
//!
//! A missing config file is not an error; every field has a default and
//! command-line flags override whatever the file sets.

mod error;
pub mod section;

pub use error::ConfigError;
pub use section::{BuildSectionConfig, LogSectionConfig, SerializeSectionConfig};

use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    build::BuildOptions,
    cli::BuildArgs,
    debug, log,
    serialize::SerializeOptions,
};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "stackdom.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path the config was loaded from (empty when defaults are used).
    #[serde(skip)]
    pub config_path: PathBuf,

    pub build: BuildSectionConfig,
    pub serialize: SerializeSectionConfig,
    pub log: LogSectionConfig,
}

impl EngineConfig {
    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
        let path = PathBuf::from(expanded);

        if !path.exists() {
            debug!("config"; "{} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let mut config = Self::from_path(&path)?;
        config.config_path = path;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        eprintln!();
        log!("warning"; "unknown fields in {}:", display_path);
        log!("warning"; "ignoring:");
        for field in fields {
            eprintln!("- {}", field);
        }
        eprintln!();
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.build.validate().map_err(ConfigError::Validation)
    }

    // ========================================================================
    // command-line overrides
    // ========================================================================

    /// Apply `build`/`diff` flags on top of the file values.
    pub fn apply_build_args(&mut self, args: &BuildArgs) {
        let depth = args.depth.map(Some);
        Self::update_option(&mut self.build.depth, depth.as_ref());
        if args.shallow {
            self.build.shallow = true;
        }
        if args.reanimateable {
            self.serialize.reanimateable = true;
        }
        Self::update_option(&mut self.serialize.indent, args.indent.as_ref());
    }

    /// Set the global verbose flag from `--verbose` or `[log] verbose`.
    pub fn apply_verbose(&mut self, verbose: bool) {
        self.log.verbose |= verbose;
        crate::logger::set_verbose(self.log.verbose);
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    pub fn build_options(&self) -> BuildOptions {
        self.build.options()
    }

    pub fn serialize_options(&self) -> SerializeOptions {
        self.serialize.options()
    }
}

// ============================================================================
// test helpers
// ============================================================================

/// Parse config and panic on unknown fields (catches typos in tests).
#[cfg(test)]
pub fn test_parse_config(extra: &str) -> EngineConfig {
    let (parsed, ignored) = EngineConfig::parse_with_ignored(extra).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn build_args() -> BuildArgs {
        BuildArgs {
            state: None,
            depth: None,
            shallow: false,
            reanimateable: false,
            indent: None,
        }
    }

    #[test]
    fn test_from_str_invalid_toml() {
        let result = EngineConfig::from_str("[build\ndepth = 1");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_from_str_validates() {
        let result = EngineConfig::from_str("[build]\nmax_rewrites = 0");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.config_path, PathBuf::new());
        assert_eq!(config.build.max_passes, crate::build::DEFAULT_MAX_PASSES);
        assert_eq!(config.serialize.indent, 2);
        assert!(!config.log.verbose);
    }

    #[test]
    fn test_unknown_fields_detected() {
        let content = "[build]\ndepth = 1\n[unknown_section]\nfield = \"value\"";
        let (config, ignored) = EngineConfig::parse_with_ignored(content).unwrap();

        assert_eq!(config.build.depth, Some(1));
        assert!(ignored.iter().any(|f| f.contains("unknown_section")));
    }

    #[test]
    fn test_no_unknown_fields() {
        let content = "[build]\nshallow = true\n[log]\nverbose = true";
        let (config, ignored) = EngineConfig::parse_with_ignored(content).unwrap();
        assert!(ignored.is_empty());
        assert!(config.build.shallow);
        assert!(config.log.verbose);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[serialize]\nreanimateable = true\nindent = 4").unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.config_path, file.path());
        assert!(config.serialize_options().reanimateable);
        assert_eq!(config.serialize_options().indent, 4);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[build]\nmax_passes = 0").unwrap();
        assert!(matches!(
            EngineConfig::load(file.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_build_args_override_file() {
        let mut config = test_parse_config("[build]\ndepth = 3\n[serialize]\nindent = 4");
        let args = BuildArgs {
            depth: Some(1),
            reanimateable: true,
            ..build_args()
        };
        config.apply_build_args(&args);

        assert_eq!(config.build_options().depth, Some(1));
        assert!(config.serialize.reanimateable);
        assert_eq!(config.serialize.indent, 4);
    }

    #[test]
    fn test_absent_flags_keep_file_values() {
        let mut config = test_parse_config("[build]\ndepth = 3\nshallow = true");
        config.apply_build_args(&build_args());
        assert_eq!(config.build.depth, Some(3));
        assert!(config.build.shallow);
    }
}
