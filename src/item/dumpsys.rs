use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Item, ItemKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WakelockType {
    Kernel,
    Partial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WakelockInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    pub wakelock_type: WakelockType,
    pub held_time_ms: u64,
    pub count: u32,
}

/// The top entries of one wakelock list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WakelockItem {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub wakelocks: Vec<WakelockInfo>,
}

impl Item for WakelockItem {
    fn kind(&self) -> ItemKind {
        ItemKind::Wakelock
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterruptCategory {
    WifiInterrupt,
    ModemInterrupt,
    AlarmInterrupt,
    AdspInterrupt,
    UnknownInterrupt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterruptInfo {
    pub name: String,
    pub category: InterruptCategory,
    pub held_time_ms: u64,
    pub count: u32,
}

/// The top wakeup reasons.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterruptItem {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub interrupts: Vec<InterruptInfo>,
}

impl InterruptItem {
    pub fn by_category(&self, category: InterruptCategory) -> Vec<&InterruptInfo> {
        self.interrupts
            .iter()
            .filter(|interrupt| interrupt.category == category)
            .collect()
    }
}

impl Item for InterruptItem {
    fn kind(&self) -> ItemKind {
        ItemKind::Interrupt
    }
}

/// `DUMP OF SERVICE batterystats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryStatsItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernel_wakelocks: Option<WakelockItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_wakelocks: Option<WakelockItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interrupts: Option<InterruptItem>,
}

impl Item for BatteryStatsItem {
    fn kind(&self) -> ItemKind {
        ItemKind::BatteryStats
    }
}

/// `DUMP OF SERVICE procstats`: uid to process name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcStatsItem {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub processes: BTreeMap<String, String>,
}

impl Item for ProcStatsItem {
    fn kind(&self) -> ItemKind {
        ItemKind::ProcStats
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpsysItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_stats: Option<BatteryStatsItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proc_stats: Option<ProcStatsItem>,
}

impl Item for DumpsysItem {
    fn kind(&self) -> ItemKind {
        ItemKind::Dumpsys
    }
}
