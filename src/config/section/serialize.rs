//! `[serialize]` section configuration.
//!
//! ```toml
//! [serialize]
//! reanimateable = false   # Add component URNs and lifecycle blocks
//! indent = 2              # Spaces per level (0 = single line)
//! ```

use serde::{Deserialize, Serialize};

use crate::serialize::SerializeOptions;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializeSectionConfig {
    pub reanimateable: bool,
    pub indent: usize,
}

impl Default for SerializeSectionConfig {
    fn default() -> Self {
        let defaults = SerializeOptions::default();
        Self {
            reanimateable: defaults.reanimateable,
            indent: defaults.indent,
        }
    }
}

impl SerializeSectionConfig {
    pub fn options(&self) -> SerializeOptions {
        SerializeOptions {
            reanimateable: self.reanimateable,
            indent: self.indent,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_serialize_section() {
        let config = test_parse_config("[serialize]\nreanimateable = true\nindent = 0");
        let options = config.serialize.options();
        assert!(options.reanimateable);
        assert_eq!(options.indent, 0);
    }
}
