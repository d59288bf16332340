use std::io::BufRead;

use crate::error::Result;

pub mod pattern_matcher;
pub mod section_splitter;
mod preamble;

pub mod activity_service_parser;
pub mod anr_parser;
pub mod batterystats_parser;
pub mod bugreport_parser;
pub mod dumpsys_parser;
pub mod interrupt_parser;
pub mod java_crash_parser;
pub mod kernel_log_parser;
pub mod logcat_parser;
pub mod meminfo_parser;
pub mod native_crash_parser;
pub mod procrank_parser;
pub mod procstats_parser;
pub mod system_props_parser;
pub mod top_parser;
pub mod traces_parser;
pub mod wakelock_parser;


pub use activity_service_parser::ActivityServiceParser;
pub use anr_parser::AnrParser;
pub use batterystats_parser::BatteryStatsParser;
pub use bugreport_parser::BugreportParser;
pub use dumpsys_parser::DumpsysParser;
pub use interrupt_parser::InterruptParser;
pub use java_crash_parser::JavaCrashParser;
pub use kernel_log_parser::KernelLogParser;
pub use logcat_parser::LogcatParser;
pub use meminfo_parser::MemInfoParser;
pub use native_crash_parser::NativeCrashParser;
pub use pattern_matcher::PatternMatcher;
pub use procrank_parser::ProcrankParser;
pub use procstats_parser::ProcStatsParser;
pub use section_splitter::SectionSplitter;
pub use system_props_parser::SystemPropsParser;
pub use top_parser::TopParser;
pub use traces_parser::TracesParser;
pub use wakelock_parser::WakelockParser;

/// The core trait for all parsers.
/// A parser turns one block of lines into one item, or `None` when the block
/// holds nothing it recognises. Parsers keep no state between calls.
pub trait Parser {
    type Item;

    /// Parses a block of lines with line terminators already stripped.
    fn parse<S: AsRef<str>>(&self, lines: &[S]) -> Option<Self::Item>;

    /// Parses every line of `reader`. Gives the same result as [`Parser::parse`]
    /// over the same lines.
    fn parse_reader<R: BufRead>(&self, reader: R) -> Result<Option<Self::Item>> {
        let lines = reader.lines().collect::<std::io::Result<Vec<String>>>()?;
        Ok(self.parse(&lines))
    }

    fn parse_str(&self, text: &str) -> Option<Self::Item> {
        let lines: Vec<&str> = text.lines().collect();
        self.parse(&lines)
    }
}

/// Input flavour selectable from the command line.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParserType {
    Bugreport,
    Logcat,
    KernelLog,
}

/// Parses `1d 2h 3m 37s 623ms` style durations into milliseconds.
pub(crate) fn parse_duration_ms(text: &str) -> Option<u64> {
    let mut total = 0u64;
    let mut seen = false;
    for part in text.split_whitespace() {
        let split = part.find(|c: char| !c.is_ascii_digit())?;
        let (number, unit) = part.split_at(split);
        let value: u64 = number.parse().ok()?;
        let unit_ms: u64 = match unit {
            "d" => 86_400_000,
            "h" => 3_600_000,
            "m" => 60_000,
            "s" => 1_000,
            "ms" => 1,
            _ => return None,
        };
        total = total.checked_add(value.checked_mul(unit_ms)?)?;
        seen = true;
    }
    seen.then_some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_ms() {
        assert_eq!(parse_duration_ms("1h 3m 37s 623ms"), Some(3_817_623));
        assert_eq!(parse_duration_ms("2d 0ms"), Some(172_800_000));
        assert_eq!(parse_duration_ms("45s"), Some(45_000));
        assert_eq!(parse_duration_ms(""), None);
        assert_eq!(parse_duration_ms("3 times"), None);
    }

    #[test]
    fn test_parse_duration_ms_overflow() {
        assert_eq!(parse_duration_ms("18446744073709551615d"), None);
        assert_eq!(parse_duration_ms("18446744073709551615ms 1ms"), None);
        assert_eq!(parse_duration_ms("18446744073709551615ms"), Some(u64::MAX));
    }
}
