//! TOML-based configuration.
//!
//! Settings are organized into logical sections that map to TOML
//! tables. Missing keys fall back to their defaults, so a partial
//! config file is always valid. Locating and reading the settings
//! file is the caller's job; [`Settings::from_toml_str`] parses the
//! text it hands in.

mod settings;

pub use settings::{LoggingSettings, ScannerSettings, Settings};
