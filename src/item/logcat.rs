use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{merge_field, merge_map, merge_timelines, Item, ItemKind, Mergeable, Timeline};
use crate::error::{Error, Result};

/// A single logcat event. ANRs, Java crashes and native crashes extend it
/// with their own attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiscLogcatItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_time: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_preamble: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_preamble: Option<String>,
}

impl MiscLogcatItem {
    fn merge_as(&self, other: &Self, kind: ItemKind) -> Result<Self> {
        Ok(Self {
            event_time: merge_field(kind, "event_time", &self.event_time, &other.event_time)?,
            pid: merge_field(kind, "pid", &self.pid, &other.pid)?,
            tid: merge_field(kind, "tid", &self.tid, &other.tid)?,
            app: merge_field(kind, "app", &self.app, &other.app)?,
            tag: merge_field(kind, "tag", &self.tag, &other.tag)?,
            category: merge_field(kind, "category", &self.category, &other.category)?,
            stack: merge_field(kind, "stack", &self.stack, &other.stack)?,
            last_preamble: merge_field(kind, "last_preamble", &self.last_preamble, &other.last_preamble)?,
            process_preamble: merge_field(
                kind,
                "process_preamble",
                &self.process_preamble,
                &other.process_preamble,
            )?,
        })
    }
}

impl Item for MiscLogcatItem {
    fn kind(&self) -> ItemKind {
        ItemKind::MiscLogcat
    }
}

impl Mergeable for MiscLogcatItem {
    fn merge_fields(&self, other: &Self) -> Result<Self> {
        self.merge_as(other, ItemKind::MiscLogcat)
    }
}

/// Load averages reported by an ANR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LoadCategory {
    #[serde(rename = "LOAD_1")]
    Load1,
    #[serde(rename = "LOAD_5")]
    Load5,
    #[serde(rename = "LOAD_15")]
    Load15,
}

/// Components of the `NN% TOTAL: ...` CPU line reported by an ANR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CpuUsageCategory {
    Total,
    User,
    Kernel,
    Iowait,
    Irq,
    Softirq,
}

impl CpuUsageCategory {
    /// Maps the lowercase label used in the CPU line (`21% user`) to a category.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "user" => Some(Self::User),
            "kernel" => Some(Self::Kernel),
            "iowait" => Some(Self::Iowait),
            "irq" => Some(Self::Irq),
            "softirq" => Some(Self::Softirq),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnrItem {
    #[serde(flatten)]
    pub base: MiscLogcatItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub load: BTreeMap<LoadCategory, f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub cpu_usage: BTreeMap<CpuUsageCategory, f64>,
    /// Main-thread stack taken from the traces dump.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl AnrItem {
    pub fn load(&self, category: LoadCategory) -> Option<f64> {
        self.load.get(&category).copied()
    }

    pub fn cpu_usage(&self, category: CpuUsageCategory) -> Option<f64> {
        self.cpu_usage.get(&category).copied()
    }
}

impl Item for AnrItem {
    fn kind(&self) -> ItemKind {
        ItemKind::Anr
    }
}

impl Mergeable for AnrItem {
    fn merge_fields(&self, other: &Self) -> Result<Self> {
        let kind = ItemKind::Anr;
        Ok(Self {
            base: self.base.merge_as(&other.base, kind)?,
            reason: merge_field(kind, "reason", &self.reason, &other.reason)?,
            load: merge_map(kind, "load", &self.load, &other.load)?,
            cpu_usage: merge_map(kind, "cpu_usage", &self.cpu_usage, &other.cpu_usage)?,
            trace: merge_field(kind, "trace", &self.trace, &other.trace)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JavaCrashItem {
    #[serde(flatten)]
    pub base: MiscLogcatItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Item for JavaCrashItem {
    fn kind(&self) -> ItemKind {
        ItemKind::JavaCrash
    }
}

impl Mergeable for JavaCrashItem {
    fn merge_fields(&self, other: &Self) -> Result<Self> {
        let kind = ItemKind::JavaCrash;
        Ok(Self {
            base: self.base.merge_as(&other.base, kind)?,
            exception: merge_field(kind, "exception", &self.exception, &other.exception)?,
            message: merge_field(kind, "message", &self.message, &other.message)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeCrashItem {
    #[serde(flatten)]
    pub base: MiscLogcatItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl Item for NativeCrashItem {
    fn kind(&self) -> ItemKind {
        ItemKind::NativeCrash
    }
}

impl Mergeable for NativeCrashItem {
    fn merge_fields(&self, other: &Self) -> Result<Self> {
        let kind = ItemKind::NativeCrash;
        Ok(Self {
            base: self.base.merge_as(&other.base, kind)?,
            fingerprint: merge_field(kind, "fingerprint", &self.fingerprint, &other.fingerprint)?,
        })
    }
}

/// Any event stored in a [`LogcatItem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogcatEvent {
    Misc(MiscLogcatItem),
    Anr(AnrItem),
    JavaCrash(JavaCrashItem),
    NativeCrash(NativeCrashItem),
}

impl LogcatEvent {
    pub fn base(&self) -> &MiscLogcatItem {
        match self {
            LogcatEvent::Misc(item) => item,
            LogcatEvent::Anr(item) => &item.base,
            LogcatEvent::JavaCrash(item) => &item.base,
            LogcatEvent::NativeCrash(item) => &item.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut MiscLogcatItem {
        match self {
            LogcatEvent::Misc(item) => item,
            LogcatEvent::Anr(item) => &mut item.base,
            LogcatEvent::JavaCrash(item) => &mut item.base,
            LogcatEvent::NativeCrash(item) => &mut item.base,
        }
    }

    pub fn event_time(&self) -> Option<NaiveDateTime> {
        self.base().event_time
    }

    pub fn category(&self) -> Option<&str> {
        self.base().category.as_deref()
    }
}

impl Item for LogcatEvent {
    fn kind(&self) -> ItemKind {
        match self {
            LogcatEvent::Misc(item) => item.kind(),
            LogcatEvent::Anr(item) => item.kind(),
            LogcatEvent::JavaCrash(item) => item.kind(),
            LogcatEvent::NativeCrash(item) => item.kind(),
        }
    }
}

impl Mergeable for LogcatEvent {
    fn merge_fields(&self, other: &Self) -> Result<Self> {
        match (self, other) {
            (LogcatEvent::Misc(a), LogcatEvent::Misc(b)) => a.merge(b).map(LogcatEvent::Misc),
            (LogcatEvent::Anr(a), LogcatEvent::Anr(b)) => a.merge(b).map(LogcatEvent::Anr),
            (LogcatEvent::JavaCrash(a), LogcatEvent::JavaCrash(b)) => {
                a.merge(b).map(LogcatEvent::JavaCrash)
            }
            (LogcatEvent::NativeCrash(a), LogcatEvent::NativeCrash(b)) => {
                a.merge(b).map(LogcatEvent::NativeCrash)
            }
            _ => Err(Error::ConflictingItem(format!(
                "cannot merge {} with {}",
                self.kind(),
                other.kind()
            ))),
        }
    }
}

/// A parsed logcat capture.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogcatItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_time: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<LogcatEvent>,
}

impl LogcatItem {
    pub fn events(&self) -> &[LogcatEvent] {
        &self.events
    }

    pub fn anrs(&self) -> Vec<&AnrItem> {
        self.events
            .iter()
            .filter_map(|event| match event {
                LogcatEvent::Anr(item) => Some(item),
                _ => None,
            })
            .collect()
    }

    pub fn java_crashes(&self) -> Vec<&JavaCrashItem> {
        self.events
            .iter()
            .filter_map(|event| match event {
                LogcatEvent::JavaCrash(item) => Some(item),
                _ => None,
            })
            .collect()
    }

    pub fn native_crashes(&self) -> Vec<&NativeCrashItem> {
        self.events
            .iter()
            .filter_map(|event| match event {
                LogcatEvent::NativeCrash(item) => Some(item),
                _ => None,
            })
            .collect()
    }

    /// Base attributes of every event in `category`, whatever its type.
    pub fn misc_events(&self, category: &str) -> Vec<&MiscLogcatItem> {
        self.events
            .iter()
            .filter(|event| event.category() == Some(category))
            .map(LogcatEvent::base)
            .collect()
    }

    /// Widens the capture range so that it includes `time`.
    pub(crate) fn observe_time(&mut self, time: NaiveDateTime) {
        if self.start_time.map_or(true, |start| time < start) {
            self.start_time = Some(time);
        }
        if self.stop_time.map_or(true, |stop| time > stop) {
            self.stop_time = Some(time);
        }
    }
}

impl Item for LogcatItem {
    fn kind(&self) -> ItemKind {
        ItemKind::Logcat
    }
}

impl Mergeable for LogcatItem {
    /// Stitches two captures together; see [`merge_timelines`].
    fn merge_fields(&self, other: &Self) -> Result<Self> {
        let (start_time, stop_time, events) = merge_timelines(
            ItemKind::Logcat,
            Timeline {
                start: self.start_time,
                stop: self.stop_time,
                events: &self.events,
            },
            Timeline {
                start: other.start_time,
                stop: other.stop_time,
                events: &other.events,
            },
            LogcatEvent::event_time,
        )?;
        Ok(Self {
            start_time,
            stop_time,
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn time(hour: u32, min: u32, sec: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2012, 4, 25)
            .unwrap()
            .and_hms_opt(hour, min, sec)
            .unwrap()
    }

    fn anr(reason: &str) -> AnrItem {
        let mut item = AnrItem::default();
        item.base.app = Some("com.example".to_string());
        item.base.pid = Some(1234);
        item.reason = Some(reason.to_string());
        item
    }

    fn misc(at: NaiveDateTime, stack: &str) -> LogcatEvent {
        LogcatEvent::Misc(MiscLogcatItem {
            event_time: Some(at),
            category: Some("HIGH_CPU_USAGE".to_string()),
            stack: Some(stack.to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn test_anr_merge_conflict() {
        let a = anr("Input dispatching timed out");
        let b = anr("Broadcast of Intent");
        assert!(matches!(a.merge(&b), Err(Error::ConflictingItem(_))));
        assert!(!a.is_consistent(&b));
    }

    #[test]
    fn test_anr_reflexive_merge() {
        let a = anr("Input dispatching timed out");
        assert_eq!(a.merge(&a).unwrap(), a);
        assert!(a.is_consistent(&a));
    }

    #[test]
    fn test_anr_merge_fills_missing() {
        let a = anr("Input dispatching timed out");
        let mut b = AnrItem::default();
        b.base.tid = Some(7);
        b.load.insert(LoadCategory::Load1, 0.71);

        let merged = a.merge(&b).unwrap();
        assert_eq!(merged.base.pid, Some(1234));
        assert_eq!(merged.base.tid, Some(7));
        assert_eq!(merged.load(LoadCategory::Load1), Some(0.71));
        assert_eq!(merged.reason.as_deref(), Some("Input dispatching timed out"));
    }

    #[test]
    fn test_event_merge_of_different_kinds() {
        let a = LogcatEvent::Anr(anr("x"));
        let b = LogcatEvent::JavaCrash(JavaCrashItem::default());
        assert!(matches!(a.merge(&b), Err(Error::ConflictingItem(_))));
    }

    #[test]
    fn test_event_json_is_tagged() {
        let event = LogcatEvent::Anr(anr("x"));
        let json = event.to_json();
        assert_eq!(json["type"], json!("anr"));
        assert_eq!(json["app"], json!("com.example"));
        assert_eq!(json["reason"], json!("x"));
        assert!(json.get("tid").is_none());
    }

    #[test]
    fn test_event_set_attribute_keeps_variant() {
        let mut event = LogcatEvent::Anr(anr("x"));
        event.set_attribute("trace", json!("\"main\" prio=5")).unwrap();
        match event {
            LogcatEvent::Anr(item) => assert_eq!(item.trace.as_deref(), Some("\"main\" prio=5")),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_logcat_merge_overlapping() {
        let first = LogcatItem {
            start_time: Some(time(1, 0, 0)),
            stop_time: Some(time(3, 0, 0)),
            events: vec![misc(time(1, 30, 0), "a"), misc(time(2, 30, 0), "b")],
        };
        let second = LogcatItem {
            start_time: Some(time(2, 0, 0)),
            stop_time: Some(time(4, 0, 0)),
            events: vec![misc(time(2, 30, 0), "b"), misc(time(3, 30, 0), "c")],
        };

        let merged = first.merge(&second).unwrap();
        assert_eq!(merged.start_time, Some(time(1, 0, 0)));
        assert_eq!(merged.stop_time, Some(time(4, 0, 0)));
        let stacks: Vec<_> = merged
            .events
            .iter()
            .map(|e| e.base().stack.clone().unwrap())
            .collect();
        assert_eq!(stacks, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_logcat_merge_missing_overlap_event() {
        let first = LogcatItem {
            start_time: Some(time(1, 0, 0)),
            stop_time: Some(time(3, 0, 0)),
            events: vec![misc(time(2, 30, 0), "b")],
        };
        let second = LogcatItem {
            start_time: Some(time(2, 0, 0)),
            stop_time: Some(time(4, 0, 0)),
            events: vec![misc(time(3, 30, 0), "c")],
        };
        assert!(matches!(first.merge(&second), Err(Error::ConflictingItem(_))));
        assert!(matches!(second.merge(&first), Err(Error::ConflictingItem(_))));
    }

    #[test]
    fn test_misc_events_by_category() {
        let mut crash = JavaCrashItem::default();
        crash.base.category = Some("JAVA_CRASH".to_string());
        let log = LogcatItem {
            start_time: None,
            stop_time: None,
            events: vec![
                misc(time(1, 0, 0), "a"),
                LogcatEvent::JavaCrash(crash),
                misc(time(2, 0, 0), "b"),
            ],
        };
        assert_eq!(log.misc_events("HIGH_CPU_USAGE").len(), 2);
        assert_eq!(log.misc_events("JAVA_CRASH").len(), 1);
        assert_eq!(log.java_crashes().len(), 1);
        assert!(log.anrs().is_empty());
    }
}
