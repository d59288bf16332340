use regex::Regex;

use super::Parser;
use crate::error::Result;
use crate::item::{ActivityServiceItem, ServiceRecord};

/// A parser for 'APP SERVICES' sections (`dumpsys activity service all`).
///
/// Each `SERVICE <component> <hash> pid=<n>` header becomes one record.
pub struct ActivityServiceParser {
    service: Regex,
}

impl Default for ActivityServiceParser {
    fn default() -> Self {
        Self::new().expect("Failed to create the Activity Service Parser")
    }
}

impl ActivityServiceParser {
    pub fn new() -> Result<Self> {
        Ok(ActivityServiceParser {
            service: Regex::new(r"^\s*SERVICE (\S+) \w+ (?:pid=(\d+)|\(not running\))")?,
        })
    }
}

impl Parser for ActivityServiceParser {
    type Item = ActivityServiceItem;

    fn parse<S: AsRef<str>>(&self, lines: &[S]) -> Option<ActivityServiceItem> {
        let services: Vec<ServiceRecord> = lines
            .iter()
            .filter_map(|line| self.service.captures(line.as_ref()))
            .map(|caps| ServiceRecord {
                component: caps[1].to_string(),
                pid: caps.get(2).and_then(|pid| pid.as_str().parse().ok()),
            })
            .collect();
        (!services.is_empty()).then_some(ActivityServiceItem { services })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_services() {
        let lines = [
            "SERVICE com.android.phone/.TelephonyDebugService 41b5f3f8 pid=1337",
            "  Client:",
            "    nothing to dump",
            "SERVICE com.google.android.gms/.Foo 4102a5c0 (not running)",
        ];
        let item = ActivityServiceParser::default().parse(&lines).unwrap();
        assert_eq!(item.services.len(), 2);
        assert_eq!(item.services[0].component, "com.android.phone/.TelephonyDebugService");
        assert_eq!(item.services[0].pid, Some(1337));
        assert_eq!(item.services[1].pid, None);
    }

    #[test]
    fn test_no_services() {
        assert!(ActivityServiceParser::default().parse(&["No services"]).is_none());
    }
}
