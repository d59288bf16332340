use regex::Regex;

use super::Parser;
use crate::error::Result;
use crate::item::NativeCrashItem;

/// Parses a native crash dump (the `*** *** ***` tombstone printed by debuggerd).
#[derive(Debug, Clone)]
pub struct NativeCrashParser {
    start: Regex,
    fingerprint: Regex,
    process: Regex,
}

impl Default for NativeCrashParser {
    fn default() -> Self {
        Self::new().expect("Failed to create the Native Crash Parser")
    }
}

impl NativeCrashParser {
    pub fn new() -> Result<Self> {
        Ok(NativeCrashParser {
            start: Regex::new(r"^\*\*\* \*\*\* \*\*\*")?,
            fingerprint: Regex::new(r"^Build fingerprint: '(.*)'$")?,
            process: Regex::new(r"^pid: (\d+), tid: (\d+)(?:, name: .+?)?\s+>>> (.*) <<<$")?,
        })
    }

    pub fn is_start(&self, line: &str) -> bool {
        self.start.is_match(line.trim())
    }
}

impl Parser for NativeCrashParser {
    type Item = NativeCrashItem;

    fn parse<S: AsRef<str>>(&self, lines: &[S]) -> Option<NativeCrashItem> {
        if lines.is_empty() {
            return None;
        }

        let mut item = NativeCrashItem::default();
        for line in lines {
            let line = line.as_ref().trim();
            if item.fingerprint.is_none() {
                if let Some(caps) = self.fingerprint.captures(line) {
                    item.fingerprint = Some(caps[1].to_string());
                    continue;
                }
            }
            if item.base.pid.is_none() {
                if let Some(caps) = self.process.captures(line) {
                    item.base.pid = caps[1].parse().ok();
                    item.base.tid = caps[2].parse().ok();
                    item.base.app = Some(caps[3].to_string());
                }
            }
        }

        let stack = lines.iter().map(|line| line.as_ref()).collect::<Vec<_>>().join("\n");
        item.base.stack = Some(stack.trim().to_string());
        Some(item)
    }
}
