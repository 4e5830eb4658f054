//! Configuration section definitions.
//!
//! Each module corresponds to a section in `stackdom.toml`:
//!
//! | Module      | TOML Section    | Purpose                              |
//! |-------------|-----------------|--------------------------------------|
//! | `build`     | `[build]`       | Expansion depth and engine limits    |
//! | `serialize` | `[serialize]`   | Markup output                        |
//! | `log`       | `[log]`         | Terminal output                      |

mod build;
mod log;
mod serialize;

pub use build::BuildSectionConfig;
pub use log::LogSectionConfig;
pub use serialize::SerializeSectionConfig;
