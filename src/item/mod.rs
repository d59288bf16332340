//! Typed parse results.
//!
//! Every parser produces one of the item structs defined in this module tree.
//! Items share two capabilities:
//!
//! * [`Item`] gives dynamic, name-based access to an item's attributes through
//!   its JSON projection. The allowed names are fixed per [`ItemKind`].
//! * [`Mergeable`] combines two items of the same kind, preferring non-null
//!   values and failing with [`Error::ConflictingItem`] when both sides carry
//!   different values for the same attribute. Only kinds whose
//!   [`ItemKind::is_mergeable`] is true implement it.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

pub mod bugreport;
pub mod dumpsys;
pub mod kernel_log;
pub mod logcat;

pub use bugreport::{
    ActivityServiceItem, BugreportItem, MemInfoItem, ProcrankInfo, ProcrankItem, ServiceRecord,
    SystemPropsItem, TopItem, TracesItem,
};
pub use dumpsys::{
    BatteryStatsItem, DumpsysItem, InterruptCategory, InterruptInfo, InterruptItem,
    ProcStatsItem, WakelockInfo, WakelockItem, WakelockType,
};
pub use kernel_log::{
    KernelLogEvent, KernelLogItem, LowMemoryKillerItem, MiscKernelLogItem,
    PageAllocationFailureItem, SELinuxItem,
};
pub use logcat::{
    AnrItem, CpuUsageCategory, JavaCrashItem, LoadCategory, LogcatEvent, LogcatItem,
    MiscLogcatItem, NativeCrashItem,
};

/// The closed set of item kinds produced by the parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemKind {
    Bugreport,
    MemInfo,
    Procrank,
    Top,
    SystemProps,
    Traces,
    ActivityService,
    Dumpsys,
    BatteryStats,
    Wakelock,
    Interrupt,
    ProcStats,
    Logcat,
    MiscLogcat,
    Anr,
    JavaCrash,
    NativeCrash,
    KernelLog,
    MiscKernelLog,
    SELinux,
    LowMemoryKiller,
    PageAllocationFailure,
}

const LOGCAT_EVENT_ATTRIBUTES: &[&str] = &[
    "event_time",
    "pid",
    "tid",
    "app",
    "tag",
    "category",
    "stack",
    "last_preamble",
    "process_preamble",
];

const KERNEL_EVENT_ATTRIBUTES: &[&str] = &["event_time", "preamble", "category", "stack"];

impl ItemKind {
    pub fn name(&self) -> &'static str {
        match self {
            ItemKind::Bugreport => "BugreportItem",
            ItemKind::MemInfo => "MemInfoItem",
            ItemKind::Procrank => "ProcrankItem",
            ItemKind::Top => "TopItem",
            ItemKind::SystemProps => "SystemPropsItem",
            ItemKind::Traces => "TracesItem",
            ItemKind::ActivityService => "ActivityServiceItem",
            ItemKind::Dumpsys => "DumpsysItem",
            ItemKind::BatteryStats => "BatteryStatsItem",
            ItemKind::Wakelock => "WakelockItem",
            ItemKind::Interrupt => "InterruptItem",
            ItemKind::ProcStats => "ProcStatsItem",
            ItemKind::Logcat => "LogcatItem",
            ItemKind::MiscLogcat => "MiscLogcatItem",
            ItemKind::Anr => "AnrItem",
            ItemKind::JavaCrash => "JavaCrashItem",
            ItemKind::NativeCrash => "NativeCrashItem",
            ItemKind::KernelLog => "KernelLogItem",
            ItemKind::MiscKernelLog => "MiscKernelLogItem",
            ItemKind::SELinux => "SELinuxItem",
            ItemKind::LowMemoryKiller => "LowMemoryKillerItem",
            ItemKind::PageAllocationFailure => "PageAllocationFailureItem",
        }
    }

    /// The attribute names an item of this kind may carry. These are exactly
    /// the keys its JSON projection can contain.
    pub fn attributes(&self) -> &'static [&'static str] {
        match self {
            ItemKind::Bugreport => &[
                "time",
                "command_line",
                "mem_info",
                "procrank",
                "top",
                "system_props",
                "system_log",
                "kernel_log",
                "last_kmsg",
                "dumpsys",
                "activity_service",
            ],
            ItemKind::MemInfo => &["entries"],
            ItemKind::Procrank => &["processes"],
            ItemKind::Top => &["user", "nice", "system", "idle", "iowait", "irq", "softirq", "total"],
            ItemKind::SystemProps => &["properties"],
            ItemKind::Traces => &["pid", "app", "stack"],
            ItemKind::ActivityService => &["services"],
            ItemKind::Dumpsys => &["battery_stats", "proc_stats"],
            ItemKind::BatteryStats => &["kernel_wakelocks", "partial_wakelocks", "interrupts"],
            ItemKind::Wakelock => &["wakelocks"],
            ItemKind::Interrupt => &["interrupts"],
            ItemKind::ProcStats => &["processes"],
            ItemKind::Logcat | ItemKind::KernelLog => &["start_time", "stop_time", "events"],
            ItemKind::MiscLogcat => LOGCAT_EVENT_ATTRIBUTES,
            ItemKind::Anr => &[
                "event_time",
                "pid",
                "tid",
                "app",
                "tag",
                "category",
                "stack",
                "last_preamble",
                "process_preamble",
                "reason",
                "load",
                "cpu_usage",
                "trace",
            ],
            ItemKind::JavaCrash => &[
                "event_time",
                "pid",
                "tid",
                "app",
                "tag",
                "category",
                "stack",
                "last_preamble",
                "process_preamble",
                "exception",
                "message",
            ],
            ItemKind::NativeCrash => &[
                "event_time",
                "pid",
                "tid",
                "app",
                "tag",
                "category",
                "stack",
                "last_preamble",
                "process_preamble",
                "fingerprint",
            ],
            ItemKind::MiscKernelLog => KERNEL_EVENT_ATTRIBUTES,
            ItemKind::SELinux => &["event_time", "preamble", "category", "stack", "scontext"],
            ItemKind::LowMemoryKiller => &[
                "event_time",
                "preamble",
                "category",
                "stack",
                "pid",
                "process_name",
                "adjustment",
            ],
            ItemKind::PageAllocationFailure => &["event_time", "preamble", "category", "stack", "order"],
        }
    }

    /// Whether two items of this kind can be combined with [`Mergeable::merge`].
    ///
    /// Section snapshots (memory info, procrank, properties, dumpsys, the
    /// bugreport itself) describe a single moment and are never merged.
    pub fn is_mergeable(&self) -> bool {
        matches!(
            self,
            ItemKind::Logcat
                | ItemKind::MiscLogcat
                | ItemKind::Anr
                | ItemKind::JavaCrash
                | ItemKind::NativeCrash
                | ItemKind::KernelLog
                | ItemKind::MiscKernelLog
                | ItemKind::SELinux
                | ItemKind::LowMemoryKiller
                | ItemKind::PageAllocationFailure
        )
    }

    fn check_attribute(&self, name: &str) -> Result<()> {
        if self.attributes().contains(&name) {
            Ok(())
        } else {
            Err(Error::InvalidAttribute {
                kind: *self,
                name: name.to_string(),
            })
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed parse result with a fixed attribute set.
pub trait Item: Serialize + DeserializeOwned {
    fn kind(&self) -> ItemKind;

    /// JSON projection of the item. Unset attributes are omitted.
    fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Reads one attribute by name. `Ok(None)` means the attribute is allowed
    /// but unset.
    fn attribute(&self, name: &str) -> Result<Option<Value>> {
        self.kind().check_attribute(name)?;
        Ok(match self.to_json() {
            Value::Object(mut fields) => fields.remove(name),
            _ => None,
        })
    }

    /// Writes one attribute by name. A `null` value clears it.
    fn set_attribute(&mut self, name: &str, value: Value) -> Result<()> {
        let kind = self.kind();
        kind.check_attribute(name)?;

        let mut fields = match self.to_json() {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        if value.is_null() {
            fields.remove(name);
        } else {
            fields.insert(name.to_string(), value);
        }

        *self = serde_json::from_value(Value::Object(fields)).map_err(|source| Error::InvalidValue {
            kind,
            name: name.to_string(),
            source,
        })?;
        Ok(())
    }
}

/// Items that can be combined with another item of the same kind.
pub trait Mergeable: Item + Clone + PartialEq {
    /// Field-wise merge. Called only after the kinds are known to agree and
    /// the two items differ.
    fn merge_fields(&self, other: &Self) -> Result<Self>;

    fn merge(&self, other: &Self) -> Result<Self> {
        let (kind, other_kind) = (self.kind(), other.kind());
        if kind != other_kind {
            return Err(Error::ConflictingItem(format!(
                "cannot merge {} with {}",
                kind, other_kind
            )));
        }
        if !kind.is_mergeable() {
            return Err(Error::ConflictingItem(format!("{} cannot be merged", kind)));
        }
        if self == other {
            return Ok(self.clone());
        }
        self.merge_fields(other)
    }

    /// Same kind and no attribute carries two different non-null values.
    fn is_consistent(&self, other: &Self) -> bool {
        self.merge(other).is_ok()
    }
}

/// Merges one optional attribute: the non-null side wins, two different
/// non-null values conflict.
pub(crate) fn merge_field<T>(kind: ItemKind, name: &str, a: &Option<T>, b: &Option<T>) -> Result<Option<T>>
where
    T: PartialEq + Clone + fmt::Debug,
{
    match (a, b) {
        (Some(x), Some(y)) if x != y => Err(Error::ConflictingItem(format!(
            "{} attribute '{}' differs: {:?} != {:?}",
            kind, name, x, y
        ))),
        (Some(x), _) => Ok(Some(x.clone())),
        (None, y) => Ok(y.clone()),
    }
}

/// Key-wise [`merge_field`] over a map attribute.
pub(crate) fn merge_map<K, V>(
    kind: ItemKind,
    name: &str,
    a: &BTreeMap<K, V>,
    b: &BTreeMap<K, V>,
) -> Result<BTreeMap<K, V>>
where
    K: Ord + Clone + fmt::Debug,
    V: PartialEq + Clone + fmt::Debug,
{
    let mut merged = a.clone();
    for (key, value) in b {
        match merged.get(key) {
            Some(existing) if existing != value => {
                return Err(Error::ConflictingItem(format!(
                    "{} attribute '{}' differs at {:?}: {:?} != {:?}",
                    kind, name, key, existing, value
                )));
            }
            Some(_) => {}
            None => {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(merged)
}

/// One side of a log merge: its capture range and its events.
pub(crate) struct Timeline<'a, T, E> {
    pub start: Option<T>,
    pub stop: Option<T>,
    pub events: &'a [E],
}

/// Result of [`merge_timelines`]: union range and merged events.
pub(crate) type MergedTimeline<T, E> = (Option<T>, Option<T>, Vec<E>);

/// Merges two captures of the same log.
///
/// The result spans the union of both ranges. Inside the overlap of the two
/// ranges (bounds inclusive) each log must contain every event of the other;
/// this is checked in both directions. Events outside the overlap are taken
/// from whichever log has them. The merged events are stably sorted by time,
/// events without a time first.
pub(crate) fn merge_timelines<T, E, F>(
    kind: ItemKind,
    a: Timeline<'_, T, E>,
    b: Timeline<'_, T, E>,
    time_of: F,
) -> Result<MergedTimeline<T, E>>
where
    T: PartialOrd + Copy,
    E: PartialEq + Clone,
    F: Fn(&E) -> Option<T>,
{
    let start = pick(a.start, b.start, |x, y| x <= y);
    let stop = pick(a.stop, b.stop, |x, y| x >= y);

    let overlap = match (a.start, a.stop, b.start, b.stop) {
        (Some(a_start), Some(a_stop), Some(b_start), Some(b_stop)) => {
            let low = if a_start >= b_start { a_start } else { b_start };
            let high = if a_stop <= b_stop { a_stop } else { b_stop };
            (low <= high).then_some((low, high))
        }
        _ => None,
    };
    let in_overlap = |event: &E| match (overlap, time_of(event)) {
        (Some((low, high)), Some(time)) => low <= time && time <= high,
        _ => false,
    };

    let mut merged = Vec::with_capacity(a.events.len() + b.events.len());
    for event in a.events {
        if in_overlap(event) && !b.events.contains(event) {
            return Err(Error::ConflictingItem(format!(
                "{} event inside the overlapping range is missing from the second log",
                kind
            )));
        }
        merged.push(event.clone());
    }
    for event in b.events {
        if in_overlap(event) {
            if !a.events.contains(event) {
                return Err(Error::ConflictingItem(format!(
                    "{} event inside the overlapping range is missing from the first log",
                    kind
                )));
            }
        } else {
            merged.push(event.clone());
        }
    }

    merged.sort_by(|x, y| {
        time_of(x)
            .partial_cmp(&time_of(y))
            .unwrap_or(Ordering::Equal)
    });
    Ok((start, stop, merged))
}

fn pick<T: Copy>(a: Option<T>, b: Option<T>, prefer_a: impl Fn(&T, &T) -> bool) -> Option<T> {
    match (a, b) {
        (Some(x), Some(y)) => Some(if prefer_a(&x, &y) { x } else { y }),
        (x, None) => x,
        (None, y) => y,
    }
}
