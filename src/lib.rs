use std::error::Error as StdError;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info};

pub mod config;
pub mod error;
pub mod file_loader;
pub mod item;
pub mod parsers;
pub mod progress;
pub mod zip_utils;

pub use error::{Error, Result};

use config::ParserConfig;
use item::{BugreportItem, Item, ItemKind, KernelLogItem, LogcatItem, Mergeable};
use parsers::{BugreportParser, KernelLogParser, LogcatParser, Parser, ParserType};

/// The top-level item produced for one input file.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedItem {
    Bugreport(BugreportItem),
    Logcat(LogcatItem),
    KernelLog(KernelLogItem),
}

impl ParsedItem {
    pub fn kind(&self) -> ItemKind {
        match self {
            ParsedItem::Bugreport(item) => item.kind(),
            ParsedItem::Logcat(item) => item.kind(),
            ParsedItem::KernelLog(item) => item.kind(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ParsedItem::Bugreport(item) => item.to_json(),
            ParsedItem::Logcat(item) => item.to_json(),
            ParsedItem::KernelLog(item) => item.to_json(),
        }
    }

    /// Merges two captures of the same log. Bugreports do not merge.
    pub fn merge(&self, other: &ParsedItem) -> Result<ParsedItem> {
        match (self, other) {
            (ParsedItem::Logcat(a), ParsedItem::Logcat(b)) => Ok(ParsedItem::Logcat(a.merge(b)?)),
            (ParsedItem::KernelLog(a), ParsedItem::KernelLog(b)) => {
                Ok(ParsedItem::KernelLog(a.merge(b)?))
            }
            (a, b) if a.kind() != b.kind() => Err(Error::ConflictingItem(format!(
                "cannot merge {} with {}",
                a.kind(),
                b.kind()
            ))),
            (a, _) => Err(Error::ConflictingItem(format!("{} cannot be merged", a.kind()))),
        }
    }
}

/// One parser per input kind, built from the same configuration.
pub struct Parsers {
    bugreport: BugreportParser,
    logcat: LogcatParser,
    kernel_log: KernelLogParser,
}

impl Parsers {
    pub fn from_config(config: &ParserConfig) -> Result<Self> {
        Ok(Parsers {
            bugreport: BugreportParser::from_config(config)?,
            logcat: LogcatParser::from_config(config)?,
            kernel_log: KernelLogParser::from_config(config)?,
        })
    }

    /// Parses raw file content. Invalid UTF-8 is replaced rather than rejected.
    pub fn parse(&self, kind: ParserType, content: &[u8]) -> Option<ParsedItem> {
        let text = String::from_utf8_lossy(content);
        match kind {
            ParserType::Bugreport => self.bugreport.parse_str(&text).map(ParsedItem::Bugreport),
            ParserType::Logcat => self.logcat.parse_str(&text).map(ParsedItem::Logcat),
            ParserType::KernelLog => self.kernel_log.parse_str(&text).map(ParsedItem::KernelLog),
        }
    }
}

/// Result of one file from [`parse_files_concurrently`].
pub type FileResult = (
    String,
    std::result::Result<Option<ParsedItem>, Box<dyn StdError + Send + Sync>>,
    Duration,
);

/// Loads and parses several files on the rayon thread pool.
///
/// Results come back in the order of `file_paths`, each with the time spent
/// loading and parsing that file.
pub fn parse_files_concurrently(
    file_paths: &[String],
    kind: ParserType,
    parsers: &Parsers,
) -> Vec<FileResult> {
    file_paths
        .par_iter()
        .map(|path| {
            let start = Instant::now();
            let result = file_loader::load_bugreport_file(path).map(|(content, is_zip)| {
                debug!("Parsing {}", file_loader::get_file_description(path, is_zip));
                parsers.parse(kind, &content)
            });
            (path.clone(), result, start.elapsed())
        })
        .collect()
}

/// Folds items left to right with [`ParsedItem::merge`]. `None` when `items`
/// is empty.
pub fn merge_items(items: Vec<ParsedItem>) -> Result<Option<ParsedItem>> {
    let mut items = items.into_iter();
    let Some(mut merged) = items.next() else {
        return Ok(None);
    };
    for item in items {
        merged = merged.merge(&item)?;
    }
    info!("Merged into one {}", merged.kind());
    Ok(Some(merged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_file(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn path_of(file: &NamedTempFile) -> String {
        file.path().to_string_lossy().into_owned()
    }

    #[test]
    fn test_parse_files_concurrently() {
        let first = temp_file("[    1.000000] a\n[  500.100000] Restarting system with command 'bootloader'.\n");
        let second = temp_file("<0>[  600.000000] Kernel panic - not syncing: Fatal exception\n");
        let paths = vec![path_of(&first), "/nonexistent/kmsg.txt".to_string(), path_of(&second)];

        let parsers = Parsers::from_config(&ParserConfig::default()).unwrap();
        let results = parse_files_concurrently(&paths, ParserType::KernelLog, &parsers);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, paths[0]);
        assert!(results[1].1.is_err(), "a missing file should fail on its own");

        let items: Vec<ParsedItem> = results
            .into_iter()
            .filter_map(|(_, result, _)| result.ok().flatten())
            .collect();
        assert_eq!(items.len(), 2);

        let merged = merge_items(items).unwrap().unwrap();
        match merged {
            ParsedItem::KernelLog(log) => {
                assert_eq!(log.start_time, Some(1.0));
                assert_eq!(log.stop_time, Some(600.0));
                assert_eq!(log.events().len(), 2);
            }
            other => panic!("unexpected item {:?}", other),
        }
    }

    #[test]
    fn test_parse_bytes_per_kind() {
        let parsers = Parsers::from_config(&ParserConfig::default()).unwrap();

        let bugreport = parsers
            .parse(ParserType::Bugreport, b"== dumpstate: 2012-04-25 20:45:10\n")
            .unwrap();
        assert_eq!(bugreport.kind(), ItemKind::Bugreport);
        assert_eq!(bugreport.to_json()["time"], "2012-04-25T20:45:10");

        assert!(parsers.parse(ParserType::Logcat, b"").is_none());
        assert!(parsers.parse(ParserType::KernelLog, b"\xff\xfe not a kernel line").is_none());
    }

    #[test]
    fn test_bugreports_do_not_merge() {
        let a = ParsedItem::Bugreport(BugreportItem::default());
        let b = ParsedItem::KernelLog(KernelLogItem::default());
        assert!(matches!(a.merge(&a), Err(Error::ConflictingItem(_))));
        assert!(matches!(a.merge(&b), Err(Error::ConflictingItem(_))));
    }

    #[test]
    fn test_merge_items_empty_and_single() {
        assert_eq!(merge_items(Vec::new()).unwrap(), None);

        let log = ParsedItem::Logcat(LogcatItem::default());
        assert_eq!(merge_items(vec![log.clone()]).unwrap(), Some(log));
    }
}
