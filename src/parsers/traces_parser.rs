use regex::Regex;

use super::Parser;
use crate::error::Result;
use crate::item::TracesItem;

/// A parser for 'VM TRACES AT LAST ANR' sections.
///
/// Keeps the pid and command line of the first process dump and the stack of
/// its `"main"` thread, from the thread header up to the next blank line.
pub struct TracesParser {
    pid: Regex,
    cmd_line: Regex,
    main_thread: Regex,
}

impl Default for TracesParser {
    fn default() -> Self {
        Self::new().expect("Failed to create the Traces Parser")
    }
}

impl TracesParser {
    pub fn new() -> Result<Self> {
        Ok(TracesParser {
            pid: Regex::new(r"^----- pid (\d+) at ")?,
            cmd_line: Regex::new(r"^Cmd line: (.+)$")?,
            main_thread: Regex::new(r#"^"main" "#)?,
        })
    }
}

impl Parser for TracesParser {
    type Item = TracesItem;

    fn parse<S: AsRef<str>>(&self, lines: &[S]) -> Option<TracesItem> {
        let mut item = TracesItem::default();
        let mut stack: Vec<&str> = Vec::new();
        let mut in_main = false;

        for line in lines {
            let line = line.as_ref();
            if in_main {
                if line.trim().is_empty() {
                    break;
                }
                stack.push(line);
                continue;
            }

            if item.pid.is_none() {
                if let Some(caps) = self.pid.captures(line) {
                    item.pid = caps[1].parse().ok();
                    continue;
                }
            }
            if item.app.is_none() {
                if let Some(caps) = self.cmd_line.captures(line) {
                    item.app = Some(caps[1].trim().to_string());
                    continue;
                }
            }
            if self.main_thread.is_match(line) {
                in_main = true;
                stack.push(line);
            }
        }

        if item.pid.is_none() && stack.is_empty() {
            return None;
        }
        if !stack.is_empty() {
            item.stack = Some(stack.join("\n").trim().to_string());
        }
        Some(item)
    }
}
