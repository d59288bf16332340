use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{merge_field, merge_timelines, Item, ItemKind, Mergeable, Timeline};
use crate::error::{Error, Result};

pub const KERNEL_RESET: &str = "KERNEL_RESET";
pub const NORMAL_REBOOT: &str = "NORMAL_REBOOT";

/// Stack of the event added when a log shows no reason for the last boot.
pub const UNKNOWN_RESET: &str = "Unknown reason";

/// A single kernel log event. `event_time` is seconds since boot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiscKernelLogItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preamble: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl MiscKernelLogItem {
    fn merge_as(&self, other: &Self, kind: ItemKind) -> Result<Self> {
        Ok(Self {
            event_time: merge_field(kind, "event_time", &self.event_time, &other.event_time)?,
            preamble: merge_field(kind, "preamble", &self.preamble, &other.preamble)?,
            category: merge_field(kind, "category", &self.category, &other.category)?,
            stack: merge_field(kind, "stack", &self.stack, &other.stack)?,
        })
    }
}

impl Item for MiscKernelLogItem {
    fn kind(&self) -> ItemKind {
        ItemKind::MiscKernelLog
    }
}

impl Mergeable for MiscKernelLogItem {
    fn merge_fields(&self, other: &Self) -> Result<Self> {
        self.merge_as(other, ItemKind::MiscKernelLog)
    }
}

/// An SELinux `avc: denied` record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SELinuxItem {
    #[serde(flatten)]
    pub base: MiscKernelLogItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scontext: Option<String>,
}

impl Item for SELinuxItem {
    fn kind(&self) -> ItemKind {
        ItemKind::SELinux
    }
}

impl Mergeable for SELinuxItem {
    fn merge_fields(&self, other: &Self) -> Result<Self> {
        let kind = ItemKind::SELinux;
        Ok(Self {
            base: self.base.merge_as(&other.base, kind)?,
            scontext: merge_field(kind, "scontext", &self.scontext, &other.scontext)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowMemoryKillerItem {
    #[serde(flatten)]
    pub base: MiscKernelLogItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<i32>,
}

impl Item for LowMemoryKillerItem {
    fn kind(&self) -> ItemKind {
        ItemKind::LowMemoryKiller
    }
}

impl Mergeable for LowMemoryKillerItem {
    fn merge_fields(&self, other: &Self) -> Result<Self> {
        let kind = ItemKind::LowMemoryKiller;
        Ok(Self {
            base: self.base.merge_as(&other.base, kind)?,
            pid: merge_field(kind, "pid", &self.pid, &other.pid)?,
            process_name: merge_field(kind, "process_name", &self.process_name, &other.process_name)?,
            adjustment: merge_field(kind, "adjustment", &self.adjustment, &other.adjustment)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageAllocationFailureItem {
    #[serde(flatten)]
    pub base: MiscKernelLogItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

impl Item for PageAllocationFailureItem {
    fn kind(&self) -> ItemKind {
        ItemKind::PageAllocationFailure
    }
}

impl Mergeable for PageAllocationFailureItem {
    fn merge_fields(&self, other: &Self) -> Result<Self> {
        let kind = ItemKind::PageAllocationFailure;
        Ok(Self {
            base: self.base.merge_as(&other.base, kind)?,
            order: merge_field(kind, "order", &self.order, &other.order)?,
        })
    }
}

/// Any event stored in a [`KernelLogItem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KernelLogEvent {
    Misc(MiscKernelLogItem),
    #[serde(rename = "selinux")]
    SELinux(SELinuxItem),
    LowMemoryKiller(LowMemoryKillerItem),
    PageAllocationFailure(PageAllocationFailureItem),
}

impl KernelLogEvent {
    pub fn base(&self) -> &MiscKernelLogItem {
        match self {
            KernelLogEvent::Misc(item) => item,
            KernelLogEvent::SELinux(item) => &item.base,
            KernelLogEvent::LowMemoryKiller(item) => &item.base,
            KernelLogEvent::PageAllocationFailure(item) => &item.base,
        }
    }

    pub fn event_time(&self) -> Option<f64> {
        self.base().event_time
    }

    pub fn category(&self) -> Option<&str> {
        self.base().category.as_deref()
    }

    /// The `KERNEL_RESET` placeholder for a log with no boot reason.
    pub fn unknown_reset() -> Self {
        KernelLogEvent::Misc(MiscKernelLogItem {
            event_time: Some(0.0),
            preamble: Some(String::new()),
            category: Some(KERNEL_RESET.to_string()),
            stack: Some(UNKNOWN_RESET.to_string()),
        })
    }

    fn is_boot_reason(&self) -> bool {
        matches!(self.category(), Some(KERNEL_RESET) | Some(NORMAL_REBOOT))
    }
}

impl Item for KernelLogEvent {
    fn kind(&self) -> ItemKind {
        match self {
            KernelLogEvent::Misc(item) => item.kind(),
            KernelLogEvent::SELinux(item) => item.kind(),
            KernelLogEvent::LowMemoryKiller(item) => item.kind(),
            KernelLogEvent::PageAllocationFailure(item) => item.kind(),
        }
    }
}

impl Mergeable for KernelLogEvent {
    fn merge_fields(&self, other: &Self) -> Result<Self> {
        match (self, other) {
            (KernelLogEvent::Misc(a), KernelLogEvent::Misc(b)) => a.merge(b).map(KernelLogEvent::Misc),
            (KernelLogEvent::SELinux(a), KernelLogEvent::SELinux(b)) => {
                a.merge(b).map(KernelLogEvent::SELinux)
            }
            (KernelLogEvent::LowMemoryKiller(a), KernelLogEvent::LowMemoryKiller(b)) => {
                a.merge(b).map(KernelLogEvent::LowMemoryKiller)
            }
            (KernelLogEvent::PageAllocationFailure(a), KernelLogEvent::PageAllocationFailure(b)) => {
                a.merge(b).map(KernelLogEvent::PageAllocationFailure)
            }
            _ => Err(Error::ConflictingItem(format!(
                "cannot merge {} with {}",
                self.kind(),
                other.kind()
            ))),
        }
    }
}

/// A parsed kernel log (`dmesg` or last kmsg). Times are seconds since boot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelLogItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_time: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<KernelLogEvent>,
}

impl KernelLogItem {
    pub fn events(&self) -> &[KernelLogEvent] {
        &self.events
    }

    /// Base attributes of every event in `category`, whatever its type.
    pub fn misc_events(&self, category: &str) -> Vec<&MiscKernelLogItem> {
        self.events
            .iter()
            .filter(|event| event.category() == Some(category))
            .map(KernelLogEvent::base)
            .collect()
    }

    /// Appends [`KernelLogEvent::unknown_reset`] unless some event already
    /// explains the last boot. `start_time` and `stop_time` keep the range of
    /// the log lines.
    pub(crate) fn ensure_boot_reason(&mut self) {
        if self.events.iter().any(KernelLogEvent::is_boot_reason) {
            return;
        }
        debug!("No boot reason in kernel log, adding unknown reset");
        self.events.push(KernelLogEvent::unknown_reset());
    }

    pub(crate) fn observe_time(&mut self, time: f64) {
        if self.start_time.map_or(true, |start| time < start) {
            self.start_time = Some(time);
        }
        if self.stop_time.map_or(true, |stop| time > stop) {
            self.stop_time = Some(time);
        }
    }
}

impl Item for KernelLogItem {
    fn kind(&self) -> ItemKind {
        ItemKind::KernelLog
    }
}

impl Mergeable for KernelLogItem {
    /// Placeholder resets are left out of the comparison and re-derived for
    /// the merged log.
    fn merge_fields(&self, other: &Self) -> Result<Self> {
        let placeholder = KernelLogEvent::unknown_reset();
        let observed = |events: &[KernelLogEvent]| -> Vec<KernelLogEvent> {
            events.iter().filter(|event| **event != placeholder).cloned().collect()
        };
        let (self_events, other_events) = (observed(&self.events), observed(&other.events));

        let (start_time, stop_time, events) = merge_timelines(
            ItemKind::KernelLog,
            Timeline {
                start: self.start_time,
                stop: self.stop_time,
                events: &self_events,
            },
            Timeline {
                start: other.start_time,
                stop: other.stop_time,
                events: &other_events,
            },
            KernelLogEvent::event_time,
        )?;
        let mut merged = Self {
            start_time,
            stop_time,
            events,
        };
        if self.events.len() != self_events.len() || other.events.len() != other_events.len() {
            merged.ensure_boot_reason();
            merged.events.sort_by(|a, b| {
                a.event_time()
                    .partial_cmp(&b.event_time())
                    .unwrap_or(Ordering::Equal)
            });
        }
        Ok(merged)
    }
}
