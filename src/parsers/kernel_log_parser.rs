use regex::Regex;

use super::preamble::Preamble;
use super::Parser;
use crate::config::ParserConfig;
use crate::error::Result;
use crate::item::{
    KernelLogEvent, KernelLogItem, LowMemoryKillerItem, MiscKernelLogItem,
    PageAllocationFailureItem, SELinuxItem,
};

pub use crate::item::kernel_log::{KERNEL_RESET, NORMAL_REBOOT, UNKNOWN_RESET};

pub const SELINUX_DENIAL: &str = "SELINUX_DENIAL";
pub const LOW_MEMORY_KILLER: &str = "LOW_MEMORY_KILLER";
pub const PAGE_ALLOCATION_FAILURE: &str = "PAGE_ALLOCATION_FAILURE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KernelCategory {
    KernelReset,
    NormalReboot,
    SELinuxDenial,
    LowMemoryKiller,
    PageAllocationFailure,
}

impl KernelCategory {
    fn name(self) -> &'static str {
        match self {
            KernelCategory::KernelReset => KERNEL_RESET,
            KernelCategory::NormalReboot => NORMAL_REBOOT,
            KernelCategory::SELinuxDenial => SELINUX_DENIAL,
            KernelCategory::LowMemoryKiller => LOW_MEMORY_KILLER,
            KernelCategory::PageAllocationFailure => PAGE_ALLOCATION_FAILURE,
        }
    }
}

/// Parses `dmesg` style kernel logs and last kmsg dumps into a [`KernelLogItem`].
///
/// Lines look like `<6>[  123.456789] message`; the level prefix is optional.
/// Each classified line becomes an event carrying the lines just before it as
/// its preamble. A log that names no boot reason gets a `KERNEL_RESET` event
/// at time 0 with stack [`UNKNOWN_RESET`].
#[derive(Debug, Clone)]
pub struct KernelLogParser {
    preamble_size: usize,
    line: Regex,
    categories: Vec<(Regex, KernelCategory)>,
    scontext: Regex,
    lmk: Regex,
    order: Regex,
}

impl Default for KernelLogParser {
    fn default() -> Self {
        Self::new().expect("Failed to create the Kernel Log Parser")
    }
}

impl KernelLogParser {
    pub fn new() -> Result<Self> {
        let categories = [
            (r"Kernel panic", KernelCategory::KernelReset),
            (r"Internal error:", KernelCategory::KernelReset),
            (r"Watchdog bark!", KernelCategory::KernelReset),
            (r"Unable to handle kernel", KernelCategory::KernelReset),
            (r"Restarting system", KernelCategory::NormalReboot),
            (r"Power down", KernelCategory::NormalReboot),
            (r"avc: +denied", KernelCategory::SELinuxDenial),
            (r"lowmemorykiller: Killing '", KernelCategory::LowMemoryKiller),
            (r"page allocation failure: order:\d+", KernelCategory::PageAllocationFailure),
        ]
        .into_iter()
        .map(|(pattern, category)| Regex::new(pattern).map(|regex| (regex, category)))
        .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(KernelLogParser {
            preamble_size: 15,
            line: Regex::new(r"^(?:<\d+>)?\[\s*(\d+\.\d+)\]\s?(.*)$")?,
            categories,
            scontext: Regex::new(r"scontext=(\S+)")?,
            lmk: Regex::new(r"lowmemorykiller: Killing '(.+?)' \((\d+)\), adj (-?\d+)")?,
            order: Regex::new(r"page allocation failure: order:(\d+)")?,
        })
    }

    pub fn from_config(config: &ParserConfig) -> Result<Self> {
        let mut parser = Self::new()?;
        parser.preamble_size = config.preamble.kernel_preamble;
        Ok(parser)
    }

    fn classify(&self, message: &str) -> Option<KernelCategory> {
        self.categories
            .iter()
            .find(|(pattern, _)| pattern.is_match(message))
            .map(|(_, category)| *category)
    }

    fn event(&self, category: KernelCategory, time: f64, message: &str, preamble: String) -> KernelLogEvent {
        let base = MiscKernelLogItem {
            event_time: Some(time),
            preamble: Some(preamble),
            category: Some(category.name().to_string()),
            stack: Some(message.to_string()),
        };
        match category {
            KernelCategory::SELinuxDenial => KernelLogEvent::SELinux(SELinuxItem {
                scontext: self.scontext.captures(message).map(|caps| caps[1].to_string()),
                base,
            }),
            KernelCategory::LowMemoryKiller => {
                let caps = self.lmk.captures(message);
                KernelLogEvent::LowMemoryKiller(LowMemoryKillerItem {
                    process_name: caps.as_ref().map(|caps| caps[1].to_string()),
                    pid: caps.as_ref().and_then(|caps| caps[2].parse().ok()),
                    adjustment: caps.as_ref().and_then(|caps| caps[3].parse().ok()),
                    base,
                })
            }
            KernelCategory::PageAllocationFailure => {
                KernelLogEvent::PageAllocationFailure(PageAllocationFailureItem {
                    order: self
                        .order
                        .captures(message)
                        .and_then(|caps| caps[1].parse().ok()),
                    base,
                })
            }
            KernelCategory::KernelReset | KernelCategory::NormalReboot => KernelLogEvent::Misc(base),
        }
    }
}

impl Parser for KernelLogParser {
    type Item = KernelLogItem;

    fn parse<S: AsRef<str>>(&self, lines: &[S]) -> Option<KernelLogItem> {
        let mut item: Option<KernelLogItem> = None;
        let mut preamble = Preamble::new(self.preamble_size, 0);

        for raw in lines {
            let raw = raw.as_ref();
            let Some(caps) = self.line.captures(raw) else {
                continue;
            };
            let Ok(time) = caps[1].parse::<f64>() else {
                continue;
            };
            let message = &caps[2];

            let item = item.get_or_insert_with(KernelLogItem::default);
            item.observe_time(time);
            if let Some(category) = self.classify(message) {
                item.events.push(self.event(category, time, message, preamble.recent()));
            }
            preamble.push(None, raw);
        }

        let mut item = item?;
        item.ensure_boot_reason();
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_reset() {
        let lines = [
            "[    0.000000] Booting Linux on physical CPU 0",
            "[    1.234567] init: starting service 'ueventd'",
        ];
        let log = KernelLogParser::default().parse(&lines).unwrap();
        assert_eq!(log.start_time, Some(0.0));
        assert_eq!(log.stop_time, Some(1.234567));

        let resets = log.misc_events(KERNEL_RESET);
        assert_eq!(resets.len(), 1);
        assert_eq!(resets[0].stack.as_deref(), Some(UNKNOWN_RESET));
        assert_eq!(resets[0].event_time, Some(0.0));
        assert_eq!(resets[0].preamble.as_deref(), Some(""));
    }

    #[test]
    fn test_kernel_reset() {
        let lines = [
            "<6>[   10.000000] some line",
            "<0>[   12.500000] Kernel panic - not syncing: Fatal exception",
        ];
        let log = KernelLogParser::default().parse(&lines).unwrap();
        let resets = log.misc_events(KERNEL_RESET);
        assert_eq!(resets.len(), 1);
        assert_eq!(resets[0].event_time, Some(12.5));
        assert_eq!(resets[0].stack.as_deref(), Some("Kernel panic - not syncing: Fatal exception"));
        assert_eq!(resets[0].preamble.as_deref(), Some(lines[0]));
    }

    #[test]
    fn test_normal_reboot_has_no_unknown_reset() {
        let lines = ["[  500.100000] Restarting system with command 'bootloader'."];
        let log = KernelLogParser::default().parse(&lines).unwrap();
        assert_eq!(log.misc_events(NORMAL_REBOOT).len(), 1);
        assert!(log.misc_events(KERNEL_RESET).is_empty());
    }

    #[test]
    fn test_selinux_denial() {
        let lines = [
            "[  200.000000] type=1400 audit(1384544483.730:10): avc:  denied  { getattr } for pid=797 comm=\"Binder_5\" scontext=u:r:system:s0 tcontext=u:object_r:unlabeled:s0 tclass=file",
        ];
        let log = KernelLogParser::default().parse(&lines).unwrap();
        match &log.events()[0] {
            KernelLogEvent::SELinux(item) => {
                assert_eq!(item.scontext.as_deref(), Some("u:r:system:s0"));
                assert_eq!(item.base.category.as_deref(), Some(SELINUX_DENIAL));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_low_memory_killer() {
        let lines = [
            "<4>[ 2540.380000] lowmemorykiller: Killing 'com.android.email' (2582), adj 15,",
        ];
        let log = KernelLogParser::default().parse(&lines).unwrap();
        match &log.events()[0] {
            KernelLogEvent::LowMemoryKiller(item) => {
                assert_eq!(item.pid, Some(2582));
                assert_eq!(item.process_name.as_deref(), Some("com.android.email"));
                assert_eq!(item.adjustment, Some(15));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_page_allocation_failure() {
        let lines = ["[ 3000.000000] kworker/0:1: page allocation failure: order:3, mode:0xd0"];
        let log = KernelLogParser::default().parse(&lines).unwrap();
        match &log.events()[0] {
            KernelLogEvent::PageAllocationFailure(item) => assert_eq!(item.order, Some(3)),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(log.events().len(), 2);
    }

    #[test]
    fn test_preamble_is_bounded() {
        let mut config = ParserConfig::default();
        config.preamble.kernel_preamble = 2;
        let parser = KernelLogParser::from_config(&config).unwrap();
        let lines = [
            "[    1.000000] a",
            "[    2.000000] b",
            "[    3.000000] c",
            "[    4.000000] Internal error: Oops: 17 [#1] PREEMPT SMP",
        ];
        let log = parser.parse(&lines).unwrap();
        let reset = log.misc_events(KERNEL_RESET)[0];
        assert_eq!(reset.preamble.as_deref(), Some(&lines[1..3].join("\n")[..]));
        assert_eq!(log.start_time, Some(1.0));
    }

    #[test]
    fn test_unknown_reset_keeps_line_range() {
        let lines = ["[    4.000000] a", "[    9.500000] b"];
        let log = KernelLogParser::default().parse(&lines).unwrap();
        assert_eq!(log.start_time, Some(4.0));
        assert_eq!(log.stop_time, Some(9.5));
        assert_eq!(log.misc_events(KERNEL_RESET)[0].event_time, Some(0.0));
    }

    #[test]
    fn test_merge_rotated_captures() {
        use crate::item::Mergeable;

        let parser = KernelLogParser::default();
        let first = parser
            .parse(&[
                "[    1.000000] a",
                "<4>[    2.000000] lowmemorykiller: Killing 'com.android.email' (2582), adj 15,",
                "[    5.000000] b",
            ])
            .unwrap();
        let second = parser.parse(&["[    3.000000] c", "[   20.000000] d"]).unwrap();

        let merged = first.merge(&second).unwrap();
        assert_eq!(merged.start_time, Some(1.0));
        assert_eq!(merged.stop_time, Some(20.0));
        assert_eq!(merged.events().len(), 2);
        assert_eq!(merged.misc_events(KERNEL_RESET).len(), 1);
        assert_eq!(merged.misc_events(LOW_MEMORY_KILLER).len(), 1);
    }

    #[test]
    fn test_no_kernel_lines() {
        let parser = KernelLogParser::default();
        assert!(parser.parse(&["", "not a kernel line"]).is_none());
        assert!(parser.parse::<&str>(&[]).is_none());
    }
}
