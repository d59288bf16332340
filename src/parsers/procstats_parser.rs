use regex::Regex;

use super::Parser;
use crate::error::Result;
use crate::item::ProcStatsItem;

/// Parses `dumpsys procstats` into a uid to process name map, from headers
/// such as `  * com.android.systemui / u0a12 / v19:`.
/// When a uid runs several processes the first one listed is kept.
pub struct ProcStatsParser {
    process: Regex,
}

impl Default for ProcStatsParser {
    fn default() -> Self {
        Self::new().expect("Failed to create the ProcStats Parser")
    }
}

impl ProcStatsParser {
    pub fn new() -> Result<Self> {
        Ok(ProcStatsParser {
            process: Regex::new(r"^\s*\* (\S+) / (\S+) / v\d+:$")?,
        })
    }
}

impl Parser for ProcStatsParser {
    type Item = ProcStatsItem;

    fn parse<S: AsRef<str>>(&self, lines: &[S]) -> Option<ProcStatsItem> {
        let mut item = ProcStatsItem::default();
        for line in lines {
            if let Some(caps) = self.process.captures(line.as_ref().trim_end()) {
                item.processes
                    .entry(caps[2].to_string())
                    .or_insert_with(|| caps[1].to_string());
            }
        }
        (!item.processes.is_empty()).then_some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_procstats() {
        let lines = [
            "COMMITTED STATS FROM 2014-05-14-04-32-55:",
            "  * com.android.systemui / u0a12 / v19:",
            "           TOTAL: 100% (52MB-55MB-58MB/46MB-49MB-52MB over 7)",
            "  * com.google.process.gapps / u0a9 / v5023930:",
            "  * com.google.android.gms.persistent / u0a9 / v5023930:",
            "  * system / 1000 / v19:",
        ];
        let item = ProcStatsParser::default().parse(&lines).unwrap();
        assert_eq!(item.processes.len(), 3);
        assert_eq!(item.processes["u0a12"], "com.android.systemui");
        assert_eq!(item.processes["u0a9"], "com.google.process.gapps");
        assert_eq!(item.processes["1000"], "system");
    }

    #[test]
    fn test_no_processes() {
        assert!(ProcStatsParser::default().parse(&["Process Stats:"]).is_none());
    }
}
