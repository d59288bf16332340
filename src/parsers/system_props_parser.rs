use regex::Regex;

use super::Parser;
use crate::error::Result;
use crate::item::SystemPropsItem;

/// A specialized parser for 'SYSTEM PROPERTIES' sections (`[key]: [value]` lines).
pub struct SystemPropsParser {
    property: Regex,
}

impl Default for SystemPropsParser {
    fn default() -> Self {
        Self::new().expect("Failed to create the System Props Parser")
    }
}

impl SystemPropsParser {
    pub fn new() -> Result<Self> {
        Ok(SystemPropsParser {
            property: Regex::new(r"^\[(.+)\]: \[(.*)\]$")?,
        })
    }
}

impl Parser for SystemPropsParser {
    type Item = SystemPropsItem;

    fn parse<S: AsRef<str>>(&self, lines: &[S]) -> Option<SystemPropsItem> {
        let mut item = SystemPropsItem::default();
        for line in lines {
            if let Some(caps) = self.property.captures(line.as_ref().trim()) {
                item.properties.insert(caps[1].to_string(), caps[2].to_string());
            }
        }
        (!item.properties.is_empty()).then_some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_props() {
        let lines = [
            "[dalvik.vm.dexopt-flags]: [m=y]",
            "[ro.build.fingerprint]: [google/soju/crespo:4.0.4/IMM76D/299849:userdebug/test-keys]",
            "[ro.debuggable]: []",
            "not a property",
        ];
        let item = SystemPropsParser::default().parse(&lines).unwrap();
        assert_eq!(item.properties.len(), 3);
        assert_eq!(item.get("dalvik.vm.dexopt-flags"), Some("m=y"));
        assert_eq!(item.get("ro.debuggable"), Some(""));
        assert_eq!(item.get("missing"), None);
    }
}
