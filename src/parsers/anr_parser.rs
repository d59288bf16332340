use regex::Regex;

use super::Parser;
use crate::error::Result;
use crate::item::{AnrItem, CpuUsageCategory, LoadCategory};

/// Parses the ActivityManager report of an "application not responding" event.
///
/// ```text
/// ANR (application not responding) in com.example
/// PID: 1234
/// Reason: Input dispatching timed out
/// Load: 0.71 / 0.83 / 0.51
/// 33% TOTAL: 21% user + 11% kernel + 0.3% iowait
/// ```
///
/// Lines before the first start line are ignored. The stack is every line from
/// the start line on, joined and trimmed.
#[derive(Debug, Clone)]
pub struct AnrParser {
    start: Regex,
    pid: Regex,
    reason: Regex,
    load: Regex,
    total: Regex,
    usage: Regex,
}

impl Default for AnrParser {
    fn default() -> Self {
        Self::new().expect("Failed to create the ANR Parser")
    }
}

impl AnrParser {
    pub fn new() -> Result<Self> {
        Ok(AnrParser {
            start: Regex::new(r"^ANR (?:\(application not responding\) )?in (?:process: )?(\S+)")?,
            pid: Regex::new(r"^PID: (\d+)$")?,
            reason: Regex::new(r"^Reason: (.*)$")?,
            load: Regex::new(r"^Load: (\d+(?:\.\d+)?) / (\d+(?:\.\d+)?) / (\d+(?:\.\d+)?)$")?,
            total: Regex::new(r"^(\d+(?:\.\d+)?)% TOTAL: (.*)$")?,
            usage: Regex::new(r"(\d+(?:\.\d+)?)% (\w+)")?,
        })
    }

    /// Whether `line` opens a new ANR report.
    pub fn is_start(&self, line: &str) -> bool {
        self.start.is_match(line.trim())
    }
}

impl Parser for AnrParser {
    type Item = AnrItem;

    fn parse<S: AsRef<str>>(&self, lines: &[S]) -> Option<AnrItem> {
        let start = lines.iter().position(|line| self.is_start(line.as_ref()))?;
        let block = &lines[start..];

        let mut item = AnrItem::default();
        let mut cpu_seen = false;
        for line in block {
            let line = line.as_ref().trim();

            if item.base.app.is_none() {
                if let Some(caps) = self.start.captures(line) {
                    item.base.app = Some(caps[1].to_string());
                    continue;
                }
            }
            if let Some(caps) = self.pid.captures(line) {
                item.base.pid = caps[1].parse().ok();
            } else if let Some(caps) = self.reason.captures(line) {
                item.reason = Some(caps[1].to_string());
            } else if let Some(caps) = self.load.captures(line) {
                let loads = [LoadCategory::Load1, LoadCategory::Load5, LoadCategory::Load15];
                for (index, category) in loads.into_iter().enumerate() {
                    if let Ok(value) = caps[index + 1].parse::<f64>() {
                        item.load.insert(category, value);
                    }
                }
            } else if !cpu_seen {
                if let Some(caps) = self.total.captures(line) {
                    cpu_seen = true;
                    if let Ok(total) = caps[1].parse::<f64>() {
                        item.cpu_usage.insert(CpuUsageCategory::Total, total);
                    }
                    for usage in self.usage.captures_iter(&caps[2]) {
                        let category = CpuUsageCategory::from_label(&usage[2]);
                        if let (Some(category), Ok(value)) = (category, usage[1].parse::<f64>()) {
                            item.cpu_usage.insert(category, value);
                        }
                    }
                }
            }
        }

        let stack = block
            .iter()
            .map(|line| line.as_ref())
            .collect::<Vec<_>>()
            .join("\n");
        item.base.stack = Some(stack.trim().to_string());
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANR_BLOCK: &str = "ANR (application not responding) in com.example
PID: 1234
Reason: Input dispatching timed out
Load: 0.71 / 0.83 / 0.51
33% TOTAL: 21% user + 11% kernel + 0.3% iowait";

    #[test]
    fn test_parse_anr() {
        let anr = AnrParser::new().unwrap().parse_str(ANR_BLOCK).unwrap();

        assert_eq!(anr.base.app.as_deref(), Some("com.example"));
        assert_eq!(anr.base.pid, Some(1234));
        assert_eq!(anr.reason.as_deref(), Some("Input dispatching timed out"));
        assert_eq!(anr.load(LoadCategory::Load1), Some(0.71));
        assert_eq!(anr.load(LoadCategory::Load5), Some(0.83));
        assert_eq!(anr.load(LoadCategory::Load15), Some(0.51));
        assert_eq!(anr.cpu_usage(CpuUsageCategory::Total), Some(33.0));
        assert_eq!(anr.cpu_usage(CpuUsageCategory::User), Some(21.0));
        assert_eq!(anr.cpu_usage(CpuUsageCategory::Kernel), Some(11.0));
        assert_eq!(anr.cpu_usage(CpuUsageCategory::Iowait), Some(0.3));
        assert_eq!(anr.base.stack.as_deref(), Some(ANR_BLOCK));
    }

    #[test]
    fn test_short_phrasing() {
        let lines = ["ANR in com.android.package (com.android.package/.Activity)", "Reason: keyDispatchingTimedOut"];
        let anr = AnrParser::default().parse(&lines).unwrap();
        assert_eq!(anr.base.app.as_deref(), Some("com.android.package"));
        assert_eq!(anr.reason.as_deref(), Some("keyDispatchingTimedOut"));
        assert_eq!(anr.base.pid, None);
    }

    #[test]
    fn test_process_phrasing() {
        let lines = ["ANR (application not responding) in process: com.android.package"];
        let anr = AnrParser::default().parse(&lines).unwrap();
        assert_eq!(anr.base.app.as_deref(), Some("com.android.package"));
    }

    #[test]
    fn test_only_first_total_line_counts() {
        let lines = [
            "ANR in com.example",
            "CPU usage from 4000ms to 0ms ago:",
            "  98% 2065/system_server: 50% user + 48% kernel",
            "33% TOTAL: 21% user + 11% kernel + 0.3% iowait + 0.1% softirq",
            "CPU usage from 100ms to 600ms later:",
            "90% TOTAL: 45% user + 45% kernel",
        ];
        let anr = AnrParser::default().parse(&lines).unwrap();
        assert_eq!(anr.cpu_usage(CpuUsageCategory::Total), Some(33.0));
        assert_eq!(anr.cpu_usage(CpuUsageCategory::User), Some(21.0));
        assert_eq!(anr.cpu_usage(CpuUsageCategory::Softirq), Some(0.1));
        assert_eq!(anr.cpu_usage(CpuUsageCategory::Irq), None);
    }

    #[test]
    fn test_lines_before_start_are_ignored() {
        let lines = ["Reason: stale", "ANR in com.example", "PID: 7"];
        let anr = AnrParser::default().parse(&lines).unwrap();
        assert_eq!(anr.reason, None);
        assert_eq!(anr.base.stack.as_deref(), Some("ANR in com.example\nPID: 7"));
    }

    #[test]
    fn test_no_start_line() {
        let parser = AnrParser::default();
        assert!(parser.parse(&["PID: 1234", "Reason: x"]).is_none());
        assert!(parser.parse::<&str>(&[]).is_none());
    }
}
