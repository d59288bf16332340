use super::section_splitter::SectionSplitter;
use super::{BatteryStatsParser, Parser, ProcStatsParser};
use crate::error::Result;
use crate::item::DumpsysItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DumpsysSection {
    BatteryStats,
    ProcStats,
    Noop,
}

/// Parses the 'DUMPSYS' section of a bugreport, one `DUMP OF SERVICE <name>:`
/// block at a time. Services other than batterystats and procstats are skipped.
pub struct DumpsysParser {
    splitter: SectionSplitter<DumpsysSection>,
    batterystats_parser: BatteryStatsParser,
    procstats_parser: ProcStatsParser,
}

impl Default for DumpsysParser {
    fn default() -> Self {
        Self::new().expect("Failed to create the Dumpsys Parser")
    }
}

impl DumpsysParser {
    pub fn new() -> Result<Self> {
        let mut splitter = SectionSplitter::new(None);
        splitter.register(DumpsysSection::BatteryStats, r"^DUMP OF SERVICE batterystats:$")?;
        splitter.register(DumpsysSection::ProcStats, r"^DUMP OF SERVICE procstats:$")?;
        splitter.register(DumpsysSection::Noop, r"^DUMP OF SERVICE .*:$")?;
        Ok(DumpsysParser {
            splitter,
            batterystats_parser: BatteryStatsParser::new()?,
            procstats_parser: ProcStatsParser::new()?,
        })
    }
}

impl Parser for DumpsysParser {
    type Item = DumpsysItem;

    fn parse<S: AsRef<str>>(&self, lines: &[S]) -> Option<DumpsysItem> {
        let mut item = DumpsysItem::default();
        for (section, block) in self.splitter.sections(lines) {
            match section {
                DumpsysSection::BatteryStats => {
                    item.battery_stats = self.batterystats_parser.parse(&block);
                }
                DumpsysSection::ProcStats => {
                    item.proc_stats = self.procstats_parser.parse(&block);
                }
                DumpsysSection::Noop => {}
            }
        }
        (item != DumpsysItem::default()).then_some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dumpsys() {
        let lines = [
            "Currently running services:",
            "  batterystats",
            "-------------------------------------------------------------------------------",
            "DUMP OF SERVICE batterystats:",
            "  All partial wake locks:",
            "  Wake lock u0a7 NlpWakeLock: 8m 13s 203ms (1485 times) realtime",
            "",
            "-------------------------------------------------------------------------------",
            "DUMP OF SERVICE cpuinfo:",
            "  * not.procstats / u0a1 / v1:",
            "-------------------------------------------------------------------------------",
            "DUMP OF SERVICE procstats:",
            "  * com.android.systemui / u0a12 / v19:",
        ];
        let item = DumpsysParser::default().parse(&lines).unwrap();

        let battery_stats = item.battery_stats.unwrap();
        assert_eq!(battery_stats.partial_wakelocks.unwrap().wakelocks.len(), 1);
        assert!(battery_stats.kernel_wakelocks.is_none());

        let proc_stats = item.proc_stats.unwrap();
        assert_eq!(proc_stats.processes.len(), 1);
        assert_eq!(proc_stats.processes["u0a12"], "com.android.systemui");
    }

    #[test]
    fn test_no_known_services() {
        let parser = DumpsysParser::default();
        assert!(parser.parse(&["DUMP OF SERVICE window:", "WINDOW MANAGER"]).is_none());
        assert!(parser.parse(&["DUMP OF SERVICE batterystats:", "  Time on battery: 1h"]).is_none());
    }

    #[test]
    fn test_empty_input() {
        assert!(DumpsysParser::default().parse::<&str>(&[]).is_none());
        assert!(DumpsysParser::default().parse(&["", "  "]).is_none());
    }
}
