use regex::Regex;

use super::{parse_duration_ms, Parser};
use crate::error::Result;
use crate::item::{WakelockInfo, WakelockItem, WakelockType};

/// Number of wakelocks kept per list. batterystats prints each list sorted by
/// held time, so these are the top holders.
pub const TOP_WAKELOCK_COUNT: usize = 5;

/// Parses one batterystats wakelock list:
///
/// ```text
///   Kernel Wake lock PowerManagerService.WakeLocks: 1h 3m 37s 623ms (3 times) realtime
///   Wake lock u0a7 NlpWakeLock: 8m 13s 203ms (1485 times) realtime
/// ```
///
/// The list ends at the first blank line after an entry.
pub struct WakelockParser {
    kernel: Regex,
    partial: Regex,
}

impl Default for WakelockParser {
    fn default() -> Self {
        Self::new().expect("Failed to create the Wakelock Parser")
    }
}

impl WakelockParser {
    pub fn new() -> Result<Self> {
        Ok(WakelockParser {
            kernel: Regex::new(r"^\s*Kernel Wake lock (.+?)\s*: (.+?) \((\d+) times\) realtime")?,
            partial: Regex::new(r"^\s*Wake lock (\S+) (.+?): (.+?) \((\d+) times\) realtime")?,
        })
    }

    fn parse_line(&self, line: &str) -> Option<WakelockInfo> {
        if let Some(caps) = self.kernel.captures(line) {
            return Some(WakelockInfo {
                name: caps[1].to_string(),
                uid: None,
                wakelock_type: WakelockType::Kernel,
                held_time_ms: parse_duration_ms(&caps[2])?,
                count: caps[3].parse().ok()?,
            });
        }
        let caps = self.partial.captures(line)?;
        Some(WakelockInfo {
            name: caps[2].to_string(),
            uid: Some(caps[1].to_string()),
            wakelock_type: WakelockType::Partial,
            held_time_ms: parse_duration_ms(&caps[3])?,
            count: caps[4].parse().ok()?,
        })
    }
}

impl Parser for WakelockParser {
    type Item = WakelockItem;

    fn parse<S: AsRef<str>>(&self, lines: &[S]) -> Option<WakelockItem> {
        let mut item = WakelockItem::default();
        for line in lines {
            let line = line.as_ref();
            if line.trim().is_empty() {
                if item.wakelocks.is_empty() {
                    continue;
                }
                break;
            }
            if let Some(wakelock) = self.parse_line(line) {
                item.wakelocks.push(wakelock);
                if item.wakelocks.len() == TOP_WAKELOCK_COUNT {
                    break;
                }
            }
        }
        (!item.wakelocks.is_empty()).then_some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_wakelocks_top_five() {
        let lines = [
            "  Kernel Wake lock PowerManagerService.WakeLocks: 1h 3m 37s 623ms (3 times) realtime",
            "  Kernel Wake lock event0-2656 : 3m 49s 268ms (2256 times) realtime",
            "  Kernel Wake lock KeyEvents: 2m 12s 1ms (25 times) realtime",
            "  Kernel Wake lock qcom_rx_wakelock: 1m 30s 10ms (320 times) realtime",
            "  Kernel Wake lock alarm: 1m 2s 3ms (44 times) realtime",
            "  Kernel Wake lock wlan_rx_wake: 40s 100ms (10 times) realtime",
            "  Kernel Wake lock radio-interface: 20s 9ms (3 times) realtime",
            "  Kernel Wake lock mmc0_detect: 1s 5ms (1 times) realtime",
        ];
        let item = WakelockParser::default().parse(&lines).unwrap();
        assert_eq!(item.wakelocks.len(), TOP_WAKELOCK_COUNT);

        let first = &item.wakelocks[0];
        assert_eq!(first.name, "PowerManagerService.WakeLocks");
        assert_eq!(first.wakelock_type, WakelockType::Kernel);
        assert_eq!(first.held_time_ms, 3_817_623);
        assert_eq!(first.count, 3);
        assert_eq!(item.wakelocks[1].name, "event0-2656");
        assert_eq!(item.wakelocks[4].name, "alarm");
    }

    #[test]
    fn test_partial_wakelocks_stop_at_blank_line() {
        let lines = [
            "",
            "  Wake lock u0a7 NlpWakeLock: 8m 13s 203ms (1485 times) realtime",
            "  Wake lock 1001 RILJ: 1m 43s 16ms (1458 times) realtime",
            "",
            "  Wake lock 1000 *alarm*: 1s (1 times) realtime",
        ];
        let item = WakelockParser::default().parse(&lines).unwrap();
        assert_eq!(item.wakelocks.len(), 2);
        assert_eq!(item.wakelocks[0].uid.as_deref(), Some("u0a7"));
        assert_eq!(item.wakelocks[0].name, "NlpWakeLock");
        assert_eq!(item.wakelocks[0].wakelock_type, WakelockType::Partial);
        assert_eq!(item.wakelocks[1].held_time_ms, 103_016);
    }

    #[test]
    fn test_no_wakelocks() {
        assert!(WakelockParser::default().parse(&["", "  nothing"]).is_none());
    }
}
