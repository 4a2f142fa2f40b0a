use super::topology::{Authority, BlockId, Speed};

/// Field report for one block in a full snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockReport {
    pub block: BlockId,
    pub occupied: bool,
    pub faulted: bool,
}

/// Everything the outside world can tell a line controller. Updates are
/// staged and only applied at the start of the next cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Occupancy { line: String, block: BlockId, occupied: bool },
    Fault { line: String, block: BlockId, faulted: bool },
    /// Full batch covering every block of the line.
    Snapshot { line: String, blocks: Vec<BlockReport> },
    /// Centralized dispatch. Only the line's maximum authority creates an
    /// override, any other value clears it.
    Dispatch { line: String, block: BlockId, authority: Authority },
    MaintenancePin { line: String, block: BlockId, authority: Authority, speed: Speed },
    MaintenanceClear { line: String, block: BlockId },
    SwitchSet { line: String, block: BlockId, position: String },
    /// Run a cycle without new data.
    Trigger,
}

impl Update {
    pub fn line(&self) -> Option<&str> {
        use self::Update::*;
        match self {
            Occupancy { line, .. } | Fault { line, .. } | Snapshot { line, .. }
            | Dispatch { line, .. } | MaintenancePin { line, .. }
            | MaintenanceClear { line, .. } | SwitchSet { line, .. } => Some(line.as_str()),
            Trigger => None,
        }
    }

    /// Occupancy pushes and explicit triggers make the worker run a cycle
    /// right away instead of waiting for the interval.
    pub fn triggers_cycle(&self) -> bool {
        match self {
            Update::Occupancy { .. } | Update::Fault { .. } | Update::Snapshot { .. }
            | Update::Trigger => true,
            _ => false,
        }
    }
}
