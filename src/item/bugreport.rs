use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{DumpsysItem, Item, ItemKind, KernelLogItem, LogcatItem};

/// `/proc/meminfo`, keyed by field name, values in kB.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemInfoItem {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub entries: BTreeMap<String, u64>,
}

impl MemInfoItem {
    pub fn get(&self, name: &str) -> Option<u64> {
        self.entries.get(name).copied()
    }
}

impl Item for MemInfoItem {
    fn kind(&self) -> ItemKind {
        ItemKind::MemInfo
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcrankInfo {
    pub process_name: String,
    pub vss: u64,
    pub rss: u64,
    pub pss: u64,
    pub uss: u64,
}

/// One row per process, keyed by pid. Sizes in kB.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcrankItem {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub processes: BTreeMap<u32, ProcrankInfo>,
}

impl ProcrankItem {
    pub fn process_name(&self, pid: u32) -> Option<&str> {
        self.processes.get(&pid).map(|info| info.process_name.as_str())
    }
}

impl Item for ProcrankItem {
    fn kind(&self) -> ItemKind {
        ItemKind::Procrank
    }
}

/// CPU tick totals from the `top` tick summary line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nice: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iowait: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub irq: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub softirq: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl Item for TopItem {
    fn kind(&self) -> ItemKind {
        ItemKind::Top
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemPropsItem {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl SystemPropsItem {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

impl Item for SystemPropsItem {
    fn kind(&self) -> ItemKind {
        ItemKind::SystemProps
    }
}

/// The process dumped in `VM TRACES AT LAST ANR`, with its main-thread stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracesItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl Item for TracesItem {
    fn kind(&self) -> ItemKind {
        ItemKind::Traces
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub component: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

/// Running services listed under `APP SERVICES`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityServiceItem {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceRecord>,
}

impl Item for ActivityServiceItem {
    fn kind(&self) -> ItemKind {
        ItemKind::ActivityService
    }
}

/// Root of a parsed bugreport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BugreportItem {
    /// Capture time from the `== dumpstate:` header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveDateTime>,
    /// Kernel command line; switches without a value map to `""`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub command_line: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mem_info: Option<MemInfoItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub procrank: Option<ProcrankItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<TopItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_props: Option<SystemPropsItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_log: Option<LogcatItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernel_log: Option<KernelLogItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_kmsg: Option<KernelLogItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dumpsys: Option<DumpsysItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_service: Option<ActivityServiceItem>,
}

impl Item for BugreportItem {
    fn kind(&self) -> ItemKind {
        ItemKind::Bugreport
    }
}
