use regex::Regex;

use super::Parser;
use crate::error::Result;
use crate::item::{ProcrankInfo, ProcrankItem};

/// A specialized parser for 'PROCRANK' sections.
///
/// ```text
///   PID      Vss      Rss      Pss      Uss  cmdline
///   178   87136K   81684K   52829K   50012K  system_server
/// ```
/// Newer procrank builds add swap columns between `Uss` and `cmdline`; they
/// are skipped. The header and the totals footer are ignored.
pub struct ProcrankParser {
    process: Regex,
}

impl Default for ProcrankParser {
    fn default() -> Self {
        Self::new().expect("Failed to create the Procrank Parser")
    }
}

impl ProcrankParser {
    pub fn new() -> Result<Self> {
        Ok(ProcrankParser {
            process: Regex::new(
                r"^\s*(\d+)\s+(\d+)K\s+(\d+)K\s+(\d+)K\s+(\d+)K\s+(?:\d+K\s+)*(\S+)",
            )?,
        })
    }
}

impl Parser for ProcrankParser {
    type Item = ProcrankItem;

    fn parse<S: AsRef<str>>(&self, lines: &[S]) -> Option<ProcrankItem> {
        let mut item = ProcrankItem::default();
        for line in lines {
            let Some(caps) = self.process.captures(line.as_ref()) else {
                continue;
            };
            let field = |index: usize| caps[index].parse::<u64>().ok();
            let (Ok(pid), Some(vss), Some(rss), Some(pss), Some(uss)) =
                (caps[1].parse::<u32>(), field(2), field(3), field(4), field(5))
            else {
                continue;
            };
            item.processes.insert(
                pid,
                ProcrankInfo {
                    process_name: caps[6].to_string(),
                    vss,
                    rss,
                    pss,
                    uss,
                },
            );
        }
        (!item.processes.is_empty()).then_some(item)
    }
}
