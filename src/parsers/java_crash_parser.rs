use regex::Regex;

use super::Parser;
use crate::error::Result;
use crate::item::JavaCrashItem;

/// Process name reported for crashes in the system process.
pub const SYSTEM_SERVER: &str = "system_server";

/// Parses an uncaught Java exception as printed by `AndroidRuntime` or an
/// instrumentation runner.
///
/// The first dotted exception line (`java.lang.Exception: message`) and the
/// `at`/`Caused by:`/`... N more` lines that follow it make up the stack.
/// Blocks without an exception line yield `None`.
#[derive(Debug, Clone)]
pub struct JavaCrashParser {
    system_process: Regex,
    fatal: Regex,
    process: Regex,
    pid: Regex,
    marker: Regex,
    exception: Regex,
    continuation: Regex,
}

impl Default for JavaCrashParser {
    fn default() -> Self {
        Self::new().expect("Failed to create the Java Crash Parser")
    }
}

impl JavaCrashParser {
    pub fn new() -> Result<Self> {
        Ok(JavaCrashParser {
            system_process: Regex::new(r"^\*\*\* FATAL EXCEPTION IN SYSTEM PROCESS: ")?,
            fatal: Regex::new(r"^FATAL EXCEPTION: ")?,
            process: Regex::new(r"^Process: (\S+), PID: (\d+)")?,
            pid: Regex::new(r"^PID: (\d+)$")?,
            marker: Regex::new(r"^----- (?:begin|end) exception -----$")?,
            exception: Regex::new(r"^((?:[\w$]+\.)+[\w$]+)(?:: (.*))?$")?,
            continuation: Regex::new(r"^(?:at |Caused by: |Suppressed: |\.\.\. \d+ more)")?,
        })
    }

    /// Whether `line` opens a new crash report.
    pub fn is_start(&self, line: &str) -> bool {
        let line = line.trim();
        self.system_process.is_match(line)
            || self.fatal.is_match(line)
            || line == "----- begin exception -----"
    }
}

impl Parser for JavaCrashParser {
    type Item = JavaCrashItem;

    fn parse<S: AsRef<str>>(&self, lines: &[S]) -> Option<JavaCrashItem> {
        let mut item = JavaCrashItem::default();
        let mut stack: Vec<&str> = Vec::new();

        for raw in lines {
            let raw = raw.as_ref();
            let line = raw.trim();

            if !stack.is_empty() {
                if self.continuation.is_match(line) {
                    stack.push(raw);
                    continue;
                }
                break;
            }

            if self.system_process.is_match(line) {
                item.base.app = Some(SYSTEM_SERVER.to_string());
            } else if let Some(caps) = self.process.captures(line) {
                item.base.app = Some(caps[1].to_string());
                item.base.pid = caps[2].parse().ok();
            } else if let Some(caps) = self.pid.captures(line) {
                item.base.pid = caps[1].parse().ok();
            } else if self.fatal.is_match(line) || self.marker.is_match(line) {
                continue;
            } else if let Some(caps) = self.exception.captures(line) {
                item.exception = Some(caps[1].to_string());
                item.message = caps.get(2).map(|m| m.as_str().to_string());
                stack.push(raw);
            }
        }

        item.exception.as_ref()?;
        item.base.stack = Some(stack.join("\n").trim().to_string());
        Some(item)
    }
}
