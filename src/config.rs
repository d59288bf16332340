use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Parser configuration - can be loaded from JSON.
///
/// Everything here extends the built-in behaviour: the default patterns and
/// crash tags are always registered, configured ones are added after them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub logcat: LogcatConfig,

    #[serde(default)]
    pub preamble: PreambleConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogcatConfig {
    /// Year assumed for logcat timestamps, which carry none. Defaults to the
    /// current year, or to the dumpstate year inside a bugreport.
    #[serde(default)]
    pub year: Option<i32>,

    /// Extra single-line event patterns.
    #[serde(default)]
    pub patterns: Vec<LogcatPatternConfig>,

    /// Extra tags whose lines are parsed as Java crashes.
    #[serde(default)]
    pub java_crash_tags: Vec<TagConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogcatPatternConfig {
    /// Regex that must match the whole message. `None` matches any message.
    #[serde(default)]
    pub message: Option<String>,
    /// Single-letter log level (`V`, `D`, `I`, `W`, `E`, `F`). `None` matches any level.
    #[serde(default)]
    pub level: Option<char>,
    pub tag: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagConfig {
    pub level: char,
    pub tag: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreambleConfig {
    /// Lines of any process kept before a logcat event.
    pub last_preamble: usize,
    /// Lines of the event's own process kept before a logcat event.
    pub process_preamble: usize,
    /// Lines kept before a kernel log event.
    pub kernel_preamble: usize,
}

impl Default for PreambleConfig {
    fn default() -> Self {
        Self {
            last_preamble: 15,
            process_preamble: 15,
            kernel_preamble: 15,
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            description: Some("Default configuration".to_string()),
            logcat: LogcatConfig::default(),
            preamble: PreambleConfig::default(),
        }
    }
}

impl ParserConfig {
    /// Load configuration from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Save configuration to JSON file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Load configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Convert configuration to JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ParserConfig::default();
        assert_eq!(config.preamble.last_preamble, 15);
        assert!(config.logcat.patterns.is_empty());
        assert_eq!(config.logcat.year, None);
    }

    #[test]
    fn test_partial_json() {
        let config = ParserConfig::from_json(
            r#"{
                "logcat": {
                    "year": 2012,
                    "patterns": [
                        { "message": ".*find me.*", "level": "I", "tag": "MyTag", "category": "FOUND" }
                    ],
                    "java_crash_tags": [
                        { "level": "E", "tag": "TestRunner", "category": "JAVA_CRASH" }
                    ]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.logcat.year, Some(2012));
        assert_eq!(config.logcat.patterns[0].level, Some('I'));
        assert_eq!(config.logcat.java_crash_tags[0].tag, "TestRunner");
        assert_eq!(config.preamble.kernel_preamble, 15);
        assert_eq!(config.description, None);
    }

    #[test]
    fn test_file_round_trip() {
        let file = NamedTempFile::new().unwrap();
        let mut config = ParserConfig::default();
        config.preamble.kernel_preamble = 5;
        config.to_file(file.path()).unwrap();

        let loaded = ParserConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded.preamble.kernel_preamble, 5);
    }

    #[test]
    fn test_partial_preamble() {
        let config = ParserConfig::from_json(r#"{ "preamble": { "last_preamble": 5 } }"#).unwrap();
        assert_eq!(config.preamble.last_preamble, 5);
        assert_eq!(config.preamble.process_preamble, 15);
        assert_eq!(config.preamble.kernel_preamble, 15);
    }

    #[test]
    fn test_invalid_json() {
        assert!(ParserConfig::from_json("{ not json").is_err());
    }
}
