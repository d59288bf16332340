use regex::Regex;

use super::Parser;
use crate::error::Result;
use crate::item::TopItem;

/// A specialized parser for 'CPU INFO' sections; reads the tick totals line
/// printed by `top`:
///
/// ```text
/// User 1234 + Nice 0 + Sys 567 + Idle 8901 + IOW 23 + IRQ 0 + SIRQ 4 = 10729
/// ```
pub struct TopParser {
    ticks: Regex,
}

impl Default for TopParser {
    fn default() -> Self {
        Self::new().expect("Failed to create the Top Parser")
    }
}

impl TopParser {
    pub fn new() -> Result<Self> {
        Ok(TopParser {
            ticks: Regex::new(
                r"^User (\d+) \+ Nice (\d+) \+ Sys (\d+) \+ Idle (\d+) \+ IOW (\d+) \+ IRQ (\d+) \+ SIRQ (\d+) = (\d+)$",
            )?,
        })
    }
}

impl Parser for TopParser {
    type Item = TopItem;

    fn parse<S: AsRef<str>>(&self, lines: &[S]) -> Option<TopItem> {
        let caps = lines
            .iter()
            .find_map(|line| self.ticks.captures(line.as_ref().trim()))?;
        let field = |index: usize| caps[index].parse().ok();
        Some(TopItem {
            user: field(1),
            nice: field(2),
            system: field(3),
            idle: field(4),
            iowait: field(5),
            irq: field(6),
            softirq: field(7),
            total: field(8),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_top() {
        let lines = [
            "User 3%, System 1%, IOW 0%, IRQ 0%",
            "User 22 + Nice 0 + Sys 9 + Idle 664 + IOW 0 + IRQ 0 + SIRQ 1 = 696",
            "",
            "  PID PR CPU% S  #THR     VSS     RSS PCY UID      Name",
        ];
        let top = TopParser::default().parse(&lines).unwrap();
        assert_eq!(top.user, Some(22));
        assert_eq!(top.system, Some(9));
        assert_eq!(top.idle, Some(664));
        assert_eq!(top.softirq, Some(1));
        assert_eq!(top.total, Some(696));
    }

    #[test]
    fn test_no_totals() {
        assert!(TopParser::default().parse(&["User 3%, System 1%"]).is_none());
    }
}
