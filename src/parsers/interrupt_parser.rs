use regex::Regex;

use super::wakelock_parser::TOP_WAKELOCK_COUNT;
use super::{parse_duration_ms, Parser};
use crate::error::Result;
use crate::item::{InterruptCategory, InterruptInfo, InterruptItem};

/// Substrings (lowercase) that classify a wakeup reason; the first hit wins.
const CATEGORY_KEYWORDS: &[(&str, InterruptCategory)] = &[
    ("wlan", InterruptCategory::WifiInterrupt),
    ("wifi", InterruptCategory::WifiInterrupt),
    ("wcnss", InterruptCategory::WifiInterrupt),
    ("modem", InterruptCategory::ModemInterrupt),
    ("rmnet", InterruptCategory::ModemInterrupt),
    ("qmi", InterruptCategory::ModemInterrupt),
    ("alarm", InterruptCategory::AlarmInterrupt),
    ("rtc", InterruptCategory::AlarmInterrupt),
    ("adsp", InterruptCategory::AdspInterrupt),
];

/// Parses the batterystats wakeup reason list:
///
/// ```text
///   Wakeup reason 200:qcom,smd-rpm:222:fc4: 11m 49s 332ms (0 times) realtime
/// ```
///
/// Keeps the first [`TOP_WAKELOCK_COUNT`] entries, like the wakelock lists.
pub struct InterruptParser {
    reason: Regex,
}

impl Default for InterruptParser {
    fn default() -> Self {
        Self::new().expect("Failed to create the Interrupt Parser")
    }
}

impl InterruptParser {
    pub fn new() -> Result<Self> {
        Ok(InterruptParser {
            reason: Regex::new(r"^\s*Wakeup reason (.+?): (.+?) \((\d+) times\) realtime")?,
        })
    }

    pub fn classify(name: &str) -> InterruptCategory {
        let name = name.to_lowercase();
        CATEGORY_KEYWORDS
            .iter()
            .find(|(keyword, _)| name.contains(keyword))
            .map(|(_, category)| *category)
            .unwrap_or(InterruptCategory::UnknownInterrupt)
    }
}

impl Parser for InterruptParser {
    type Item = InterruptItem;

    fn parse<S: AsRef<str>>(&self, lines: &[S]) -> Option<InterruptItem> {
        let mut item = InterruptItem::default();
        for line in lines {
            let line = line.as_ref();
            if line.trim().is_empty() {
                if item.interrupts.is_empty() {
                    continue;
                }
                break;
            }
            let Some(caps) = self.reason.captures(line) else {
                continue;
            };
            let (Some(held_time_ms), Ok(count)) = (parse_duration_ms(&caps[2]), caps[3].parse::<u32>())
            else {
                continue;
            };
            item.interrupts.push(InterruptInfo {
                name: caps[1].to_string(),
                category: Self::classify(&caps[1]),
                held_time_ms,
                count,
            });
            if item.interrupts.len() == TOP_WAKELOCK_COUNT {
                break;
            }
        }
        (!item.interrupts.is_empty()).then_some(item)
    }
}
