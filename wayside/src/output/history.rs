use crate::input::topology::{Authority, BlockId, Speed};
use crate::railway::authority::{BlockCommand, Source};

use std::collections::BTreeMap;
use std::fmt;

/// Every block's command for one cycle.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Snapshot {
    pub blocks: BTreeMap<BlockId, BlockCommand>,
}

impl Snapshot {
    pub fn get(&self, block :BlockId) -> Option<&BlockCommand> {
        self.blocks.get(&block)
    }

    pub fn authorities(&self) -> Vec<Authority> {
        self.blocks.values().map(|c| c.authority).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub block: BlockId,
    pub before: Option<BlockCommand>,
    pub after: BlockCommand,
}

/// Blocks whose authority, speed or deciding layer differ between two
/// snapshots, in block order.
pub fn diff(old :&Snapshot, new :&Snapshot) -> Vec<Change> {
    new.blocks.iter()
        .filter(|&(b, cmd)| old.blocks.get(b) != Some(cmd))
        .map(|(&block, &after)| Change { block, before: old.blocks.get(&block).cloned(), after })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    OccupancyChanged { occupied: Vec<BlockId>, vacated: Vec<BlockId> },
    FaultChanged(BlockId, bool),
    SwitchMoved(BlockId, String),
    DispatchCreated(BlockId),
    /// `None` when the dispatcher withdrew it.
    DispatchCleared { block: BlockId, trigger: Option<BlockId> },
    DispatchSuppressed { block: BlockId, trigger: BlockId },
    MaintenancePinned { block: BlockId, authority: Authority, speed: Speed },
    MaintenanceCleared { block: BlockId, manual: bool },
    Rejected { block: Option<BlockId>, reason: String },
    FailSafe { block: BlockId, reason: String },
    AuthorityChanged { block: BlockId, authority: Authority, speed: Speed, source: Source },
}

fn blocks(b :&[BlockId]) -> String {
    b.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(",")
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f :&mut fmt::Formatter) -> fmt::Result {
        use self::LogEvent::*;
        match self {
            OccupancyChanged { occupied, vacated } =>
                write!(f, "occupancy changed: occupied [{}] vacated [{}]", blocks(occupied), blocks(vacated)),
            FaultChanged(b, true) => write!(f, "block {}: fault reported", b),
            FaultChanged(b, false) => write!(f, "block {}: fault cleared", b),
            SwitchMoved(b, pos) => write!(f, "switch {}: moved to {}", b, pos),
            DispatchCreated(b) => write!(f, "block {}: dispatch override created", b),
            DispatchCleared { block, trigger: Some(t) } =>
                write!(f, "block {}: dispatch override cleared, train reached block {}", block, t),
            DispatchCleared { block, trigger: None } =>
                write!(f, "block {}: dispatch override withdrawn", block),
            DispatchSuppressed { block, trigger } =>
                write!(f, "block {}: dispatch override ignored while block {} stays occupied", block, trigger),
            MaintenancePinned { block, authority, speed } =>
                write!(f, "block {}: maintenance override set to authority {} speed {}", block, authority, speed),
            MaintenanceCleared { block, manual: true } =>
                write!(f, "block {}: maintenance override cleared by operator", block),
            MaintenanceCleared { block, manual: false } =>
                write!(f, "block {}: maintenance override cleared, train has left", block),
            Rejected { block: Some(b), reason } =>
                write!(f, "block {}: command rejected ({}), block left unchanged", b, reason),
            Rejected { block: None, reason } => write!(f, "command rejected ({})", reason),
            FailSafe { block, reason } =>
                write!(f, "block {}: {}; substituted authority 0 speed 0", block, reason),
            AuthorityChanged { block, authority, speed, source } =>
                write!(f, "block {}: authority {} speed {} ({})", block, authority, speed, source),
        }
    }
}

/// Result of one control cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub changes: Vec<Change>,
    pub events: Vec<LogEvent>,
}

#[derive(Debug, Default)]
pub struct History {
    pub line: String,
    /// Simulated time of each cycle along with its report.
    pub cycles: Vec<(f64, CycleReport)>,
}

impl History {
    /// Last published command per block.
    pub fn published(&self) -> Snapshot {
        let mut s = Snapshot::default();
        for (_, report) in &self.cycles {
            for c in &report.changes {
                s.blocks.insert(c.block, c.after);
            }
        }
        s
    }
}
