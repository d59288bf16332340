use regex::Regex;

use super::Parser;
use crate::error::Result;
use crate::item::MemInfoItem;

/// A specialized parser for 'MEMORY INFO' sections (`/proc/meminfo`).
///
/// Only `Name:   1234 kB` lines are kept; values are in kB.
pub struct MemInfoParser {
    entry: Regex,
}

impl Default for MemInfoParser {
    fn default() -> Self {
        Self::new().expect("Failed to create the MemInfo Parser")
    }
}

impl MemInfoParser {
    pub fn new() -> Result<Self> {
        Ok(MemInfoParser {
            entry: Regex::new(r"^([^:\s][^:]*):\s*(\d+) kB$")?,
        })
    }
}

impl Parser for MemInfoParser {
    type Item = MemInfoItem;

    fn parse<S: AsRef<str>>(&self, lines: &[S]) -> Option<MemInfoItem> {
        let mut item = MemInfoItem::default();
        for line in lines {
            if let Some(caps) = self.entry.captures(line.as_ref().trim()) {
                if let Ok(value) = caps[2].parse() {
                    item.entries.insert(caps[1].to_string(), value);
                }
            }
        }
        (!item.entries.is_empty()).then_some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_meminfo() {
        let lines = [
            "MemTotal:         353332 kB",
            "MemFree:           65420 kB",
            "Buffers:           20800 kB",
            "Active(file):      27524 kB",
            "VmallocChunk:   34359738367",
        ];
        let item = MemInfoParser::default().parse(&lines).unwrap();
        assert_eq!(item.entries.len(), 4);
        assert_eq!(item.get("MemTotal"), Some(353332));
        assert_eq!(item.get("Active(file)"), Some(27524));
        assert_eq!(item.get("VmallocChunk"), None);
    }

    #[test]
    fn test_empty_section() {
        assert!(MemInfoParser::default().parse(&["", "garbage"]).is_none());
    }
}
