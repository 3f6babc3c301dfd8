//! Settings struct with TOML-based sections.

use serde::{Deserialize, Serialize};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Scanner and extraction settings.
    #[serde(default)]
    pub scanner: ScannerSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    /// Parse settings from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// Scanner and extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerSettings {
    /// Extraction backend: "structured", "textual" or "native-library".
    #[serde(default = "default_extractor")]
    pub extractor: String,

    /// Probe command template for the external backends. `%s` expands
    /// to one `-i <path>` pair per input file. Empty means the
    /// backend's built-in default.
    #[serde(default)]
    pub probe_command: String,
}

fn default_extractor() -> String {
    "native-library".to_string()
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            extractor: default_extractor(),
            probe_command: String::new(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default log level filter when RUST_LOG is not set.
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings.scanner.extractor, "native-library");
        assert_eq!(settings.scanner.probe_command, "");
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let settings = Settings::from_toml_str("[scanner]\nextractor = \"textual\"\n").unwrap();
        assert_eq!(settings.scanner.extractor, "textual");
        assert_eq!(settings.scanner.probe_command, "");
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(Settings::from_toml_str("not [valid toml").is_err());
    }

    #[test]
    fn round_trips_through_toml() {
        let mut settings = Settings::default();
        settings.scanner.probe_command = "ffprobe -show_streams %s".to_string();
        let text = toml::to_string(&settings).unwrap();
        let back: Settings = toml::from_str(&text).unwrap();
        assert_eq!(back.scanner.probe_command, settings.scanner.probe_command);
    }
}
