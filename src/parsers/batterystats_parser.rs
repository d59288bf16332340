use super::section_splitter::SectionSplitter;
use super::{InterruptParser, Parser, WakelockParser};
use crate::error::Result;
use crate::item::BatteryStatsItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatteryStatsSection {
    KernelWakelocks,
    PartialWakelocks,
    WakeupReasons,
    /// Any other `All ...:` list ends the one before it.
    Other,
}

/// Parses `DUMP OF SERVICE batterystats` output.
///
/// Splits out the kernel wakelock, partial wakelock and wakeup reason lists
/// and hands each to its own parser. Everything else is ignored.
pub struct BatteryStatsParser {
    splitter: SectionSplitter<BatteryStatsSection>,
    wakelock_parser: WakelockParser,
    interrupt_parser: InterruptParser,
}

impl Default for BatteryStatsParser {
    fn default() -> Self {
        Self::new().expect("Failed to create the BatteryStats Parser")
    }
}

impl BatteryStatsParser {
    pub fn new() -> Result<Self> {
        let mut splitter = SectionSplitter::new(None);
        splitter.register(BatteryStatsSection::KernelWakelocks, r"^\s*All kernel wake locks:$")?;
        splitter.register(BatteryStatsSection::PartialWakelocks, r"^\s*All partial wake locks:$")?;
        splitter.register(BatteryStatsSection::WakeupReasons, r"^\s*All wakeup reasons:$")?;
        splitter.register(BatteryStatsSection::Other, r"^\s*All [\w ]+:$")?;
        Ok(BatteryStatsParser {
            splitter,
            wakelock_parser: WakelockParser::new()?,
            interrupt_parser: InterruptParser::new()?,
        })
    }
}

impl Parser for BatteryStatsParser {
    type Item = BatteryStatsItem;

    fn parse<S: AsRef<str>>(&self, lines: &[S]) -> Option<BatteryStatsItem> {
        let mut item = BatteryStatsItem::default();
        for (section, block) in self.splitter.sections(lines) {
            match section {
                BatteryStatsSection::KernelWakelocks => {
                    item.kernel_wakelocks = self.wakelock_parser.parse(&block);
                }
                BatteryStatsSection::PartialWakelocks => {
                    item.partial_wakelocks = self.wakelock_parser.parse(&block);
                }
                BatteryStatsSection::WakeupReasons => {
                    item.interrupts = self.interrupt_parser.parse(&block);
                }
                BatteryStatsSection::Other => {}
            }
        }
        (item != BatteryStatsItem::default()).then_some(item)
    }
}
