use crate::input::topology::*;
use crate::input::feed::{BlockReport, Update};
use crate::output::history::{self, CycleReport, LogEvent, Snapshot};
use super::authority::{self, BlockCommand, Source};
use super::dispatch::{DispatchOutcome, DispatchOverrides, GradientCaps};
use super::distance::{self, Routing};
use super::maintenance::MaintenanceOverrides;
use super::state::{CommandError, LineState};
use log::{debug, error, info, warn};

use std::collections::BTreeSet;

#[derive(Debug, Fail, Clone, PartialEq)]
pub enum CycleError {
    #[fail(display = "occupancy snapshot for line {} is missing blocks {:?}", _0, _1)]
    IncompleteFeed(String, Vec<BlockId>),
    #[fail(display = "occupancy snapshot for line {} names unknown blocks {:?}", _0, _1)]
    UnknownBlocks(String, Vec<BlockId>),
    #[fail(display = "occupancy snapshot for line {} reports blocks {:?} more than once", _0, _1)]
    DuplicateBlocks(String, Vec<BlockId>),
    #[fail(display = "occupancy snapshot for line {} sent to controller for line {}", _0, _1)]
    WrongLine(String, String),
}

/// Sole owner of one line's mutable state. Updates are staged at any time
/// and only take effect when the next cycle ingests them.
#[derive(Debug)]
pub struct LineController {
    topology: Topology,
    state: LineState,
    dispatch: DispatchOverrides,
    maintenance: MaintenanceOverrides,
    staged: Vec<Update>,
    previous: Snapshot,
    cycle: u64,
}

impl LineController {
    pub fn new(topology :Topology) -> LineController {
        let state = LineState::new(&topology);
        LineController {
            topology,
            state,
            dispatch: DispatchOverrides::new(),
            maintenance: MaintenanceOverrides::new(),
            staged: Vec::new(),
            previous: Snapshot::default(),
            cycle: 0,
        }
    }

    pub fn line(&self) -> &str {
        &self.topology.config.name
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn state(&self) -> &LineState {
        &self.state
    }

    pub fn maintenance(&self) -> &MaintenanceOverrides {
        &self.maintenance
    }

    /// Commands published by the last completed cycle.
    pub fn snapshot(&self) -> &Snapshot {
        &self.previous
    }

    pub fn block(&self, block :BlockId) -> Option<&BlockCommand> {
        self.previous.get(block)
    }

    pub fn stage(&mut self, update :Update) {
        self.staged.push(update);
    }

    pub fn has_staged(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Runs one full cycle. Only an unusable feed for the whole line is an
    /// error. In that case the whole staged batch is discarded unapplied and
    /// the line state, overrides and cycle count stay as they were.
    pub fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        let staged = std::mem::replace(&mut self.staged, Vec::new());
        for u in &staged {
            if let Update::Snapshot { line, blocks } = u {
                if let Err(e) = self.check_snapshot(line, blocks) {
                    error!("Line {}: {}; discarding {} staged updates", self.line(), e, staged.len());
                    return Err(e);
                }
            }
        }
        self.cycle += 1;
        let mut events = Vec::new();

        // 1. ingest
        let before :BTreeSet<BlockId> = self.state.occupied_blocks().collect();
        for u in staged {
            if let Err(e) = self.apply(u, &mut events) {
                warn!("Line {}: {}", self.topology.config.name, e);
                events.push(LogEvent::Rejected { block: e.block(), reason: e.to_string() });
            }
        }
        let after :BTreeSet<BlockId> = self.state.occupied_blocks().collect();
        if before != after {
            events.insert(0, LogEvent::OccupancyChanged {
                occupied: after.difference(&before).cloned().collect(),
                vacated: before.difference(&after).cloned().collect(),
            });
        }

        // 2. maintenance lifecycle
        {
            let state = &self.state;
            for block in self.maintenance.expire(|b| state.is_occupied(b)) {
                events.push(LogEvent::MaintenanceCleared { block, manual: false });
            }
        }

        // 3. dispatch auto-clear, then every block in precedence order
        let routing = Routing::new(&self.topology, self.state.positions());
        {
            let state = &self.state;
            let config = &self.topology.config;
            for (block, trigger) in self.dispatch.auto_clear(config, &routing, |b| state.is_occupied(b)) {
                events.push(LogEvent::DispatchCleared { block, trigger: Some(trigger) });
            }
        }
        let caps = self.dispatch.caps(&self.topology.config, &routing);
        let mut snapshot = Snapshot::default();
        for block in self.topology.blocks() {
            let cmd = match self.resolve(block, &routing, &caps) {
                Ok(cmd) => cmd,
                Err(e) => {
                    let ev = LogEvent::FailSafe { block, reason: e.to_string() };
                    warn!("Line {}: {}", self.topology.config.name, ev);
                    events.push(ev);
                    BlockCommand::fail_safe()
                }
            };
            snapshot.blocks.insert(block, cmd);
        }

        // 4. diff
        let changes = history::diff(&self.previous, &snapshot);

        // 5. log what changed
        for c in &changes {
            events.push(LogEvent::AuthorityChanged {
                block: c.block,
                authority: c.after.authority,
                speed: c.after.speed,
                source: c.after.source,
            });
        }
        for ev in &events {
            info!("Line {} cycle {}: {}", self.topology.config.name, self.cycle, ev);
        }
        debug!("Line {} cycle {}: {} blocks changed", self.topology.config.name, self.cycle, changes.len());

        // 6. keep for the next diff
        self.previous = snapshot;
        Ok(CycleReport { cycle: self.cycle, changes, events })
    }

    /// Maintenance first, otherwise distance rule capped by dispatch.
    fn resolve(&self, block :BlockId, routing :&Routing, caps :&GradientCaps)
        -> Result<BlockCommand, RoutingError> {
        if let Some((authority, speed)) = self.maintenance.resolve(block) {
            return Ok(BlockCommand { authority, speed, source: Source::Maintenance });
        }
        let config = &self.topology.config;
        let state = &self.state;
        let faulted = state.get(block).map(|s| s.faulted).unwrap_or(false);
        let distance = distance::distance_to_hazard(routing, block, |b| state.is_hazard(b))?;
        let base = authority::default_authority(config, distance, faulted);
        let capped = caps.apply(block, base);
        let source = if capped < base { Source::Dispatch } else { Source::Default };
        Ok(BlockCommand {
            authority: capped,
            speed: authority::commanded_speed(config, capped, faulted),
            source,
        })
    }

    /// A snapshot is applied whole or not at all: exactly one report for
    /// every block of this line.
    fn check_snapshot(&self, line :&str, blocks :&[BlockReport]) -> Result<(), CycleError> {
        if line != self.line() {
            return Err(CycleError::WrongLine(line.to_string(), self.line().to_string()));
        }
        let mut reported = BTreeSet::new();
        let mut duplicate = BTreeSet::new();
        for r in blocks {
            if !reported.insert(r.block) {
                duplicate.insert(r.block);
            }
        }
        let unknown :Vec<BlockId> = reported.iter().cloned().filter(|b| !self.topology.contains(*b)).collect();
        if !unknown.is_empty() {
            return Err(CycleError::UnknownBlocks(line.to_string(), unknown));
        }
        if !duplicate.is_empty() {
            return Err(CycleError::DuplicateBlocks(line.to_string(), duplicate.into_iter().collect()));
        }
        let missing :Vec<BlockId> = self.topology.blocks().filter(|b| !reported.contains(b)).collect();
        if !missing.is_empty() {
            return Err(CycleError::IncompleteFeed(line.to_string(), missing));
        }
        Ok(())
    }

    fn apply(&mut self, update :Update, events :&mut Vec<LogEvent>) -> Result<(), CommandError> {
        if let Some(line) = update.line() {
            if line != self.line() {
                return Err(CommandError::WrongLine(line.to_string(), self.line().to_string()));
            }
        }
        let config = &self.topology.config;
        match update {
            Update::Occupancy { block, occupied, .. } => {
                self.state.set_occupied(block, occupied)?;
            }
            Update::Fault { block, faulted, .. } => {
                if self.state.set_faulted(block, faulted)? {
                    events.push(LogEvent::FaultChanged(block, faulted));
                }
            }
            Update::Snapshot { blocks, .. } => {
                for r in blocks {
                    self.state.set_occupied(r.block, r.occupied)?;
                    if self.state.set_faulted(r.block, r.faulted)? {
                        events.push(LogEvent::FaultChanged(r.block, r.faulted));
                    }
                }
            }
            Update::Dispatch { block, authority, .. } => {
                if !self.topology.contains(block) {
                    return Err(CommandError::UnknownBlock(block));
                }
                let state = &self.state;
                match self.dispatch.request(config, block, authority, |b| state.is_occupied(b)) {
                    DispatchOutcome::Created => events.push(LogEvent::DispatchCreated(block)),
                    DispatchOutcome::Cleared => events.push(LogEvent::DispatchCleared { block, trigger: None }),
                    DispatchOutcome::Suppressed { trigger } =>
                        events.push(LogEvent::DispatchSuppressed { block, trigger }),
                    DispatchOutcome::Unchanged => {}
                }
            }
            Update::MaintenancePin { block, authority, speed, .. } => {
                if !self.topology.contains(block) {
                    return Err(CommandError::UnknownBlock(block));
                }
                if authority > config.max_authority {
                    return Err(CommandError::AuthorityOutOfRange(block, authority, config.max_authority));
                }
                if !(speed >= 0.0 && speed.is_finite()) {
                    return Err(CommandError::InvalidSpeed(block, speed));
                }
                self.maintenance.pin(block, authority, speed, self.state.is_occupied(block));
                events.push(LogEvent::MaintenancePinned { block, authority, speed });
            }
            Update::MaintenanceClear { block, .. } => {
                if !self.topology.contains(block) {
                    return Err(CommandError::UnknownBlock(block));
                }
                if self.maintenance.clear(block).is_some() {
                    events.push(LogEvent::MaintenanceCleared { block, manual: true });
                }
            }
            Update::SwitchSet { block, position, .. } => {
                if self.state.set_position(&self.topology, block, &position)? {
                    events.push(LogEvent::SwitchMoved(block, position));
                }
            }
            Update::Trigger => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::topology_parser::parse_topology;

    fn green() -> LineController {
        let mut s = String::from("line Green\n");
        for b in 1..10 {
            s.push_str(&format!("block {} -> {}\n", b, b + 1));
        }
        LineController::new(parse_topology(&s).unwrap())
    }

    fn occupy(block :BlockId, occupied :bool) -> Update {
        Update::Occupancy { line: "Green".to_string(), block, occupied }
    }

    #[test]
    fn first_cycle_publishes_everything() {
        let mut c = green();
        let r = c.run_cycle().unwrap();
        assert_eq!(r.cycle, 1);
        assert_eq!(r.changes.len(), 10);
        assert!(c.run_cycle().unwrap().changes.is_empty());
    }

    #[test]
    fn occupancy_change_is_logged_once() {
        let mut c = green();
        c.run_cycle().unwrap();
        c.stage(occupy(5, true));
        let r = c.run_cycle().unwrap();
        assert_eq!(r.events[0], LogEvent::OccupancyChanged { occupied: vec![5], vacated: vec![] });
        let changed :Vec<BlockId> = r.changes.iter().map(|c| c.block).collect();
        assert_eq!(changed, vec![2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn rejected_commands_leave_state_alone() {
        let mut c = green();
        c.stage(occupy(42, true));
        c.stage(Update::Occupancy { line: "Red".to_string(), block: 5, occupied: true });
        c.stage(Update::SwitchSet { line: "Green".to_string(), block: 5, position: "reverse".to_string() });
        c.stage(Update::MaintenancePin { line: "Green".to_string(), block: 5, authority: 9, speed: 1.0 });
        let r = c.run_cycle().unwrap();
        let rejected = r.events.iter().filter(|e| match e { LogEvent::Rejected { .. } => true, _ => false }).count();
        assert_eq!(rejected, 4);
        assert_eq!(c.state().occupied_blocks().count(), 0);
        assert_eq!(c.maintenance().len(), 0);
        assert!(c.snapshot().authorities().iter().all(|&a| a == 3));
    }

    #[test]
    fn incomplete_snapshot_is_fatal() {
        let mut c = green();
        c.stage(occupy(2, true));
        c.stage(Update::Snapshot {
            line: "Green".to_string(),
            blocks: (1..=9).map(|b| BlockReport { block: b, occupied: false, faulted: false }).collect(),
        });
        assert_eq!(c.run_cycle().unwrap_err(), CycleError::IncompleteFeed("Green".to_string(), vec![10]));
        assert_eq!(c.state().occupied_blocks().count(), 0);
        assert!(c.snapshot().blocks.is_empty());
    }

    fn full(occupied :BlockId) -> Vec<BlockReport> {
        (1..=10).map(|b| BlockReport { block: b, occupied: b == occupied, faulted: false }).collect()
    }

    fn snapshot(blocks :Vec<BlockReport>) -> Update {
        Update::Snapshot { line: "Green".to_string(), blocks }
    }

    #[test]
    fn snapshot_with_unknown_block_is_not_half_applied() {
        let mut c = green();
        c.stage(snapshot(full(3)));
        c.run_cycle().unwrap();
        let before = c.snapshot().clone();

        let mut blocks = full(8);
        blocks.insert(4, BlockReport { block: 99, occupied: false, faulted: false });
        c.stage(snapshot(blocks));
        assert_eq!(c.run_cycle().unwrap_err(), CycleError::UnknownBlocks("Green".to_string(), vec![99]));
        assert_eq!(c.state().occupied_blocks().collect::<Vec<_>>(), vec![3]);
        assert_eq!(c.snapshot(), &before);
    }

    #[test]
    fn snapshot_with_duplicate_block_is_fatal() {
        let mut c = green();
        let mut blocks = full(8);
        blocks.push(BlockReport { block: 8, occupied: false, faulted: false });
        c.stage(snapshot(blocks));
        assert_eq!(c.run_cycle().unwrap_err(), CycleError::DuplicateBlocks("Green".to_string(), vec![8]));
        assert_eq!(c.state().occupied_blocks().count(), 0);
    }

    #[test]
    fn snapshot_for_another_line_is_fatal() {
        let mut c = green();
        c.stage(Update::Snapshot { line: "Red".to_string(), blocks: full(8) });
        assert_eq!(c.run_cycle().unwrap_err(),
                   CycleError::WrongLine("Red".to_string(), "Green".to_string()));
        assert_eq!(c.state().occupied_blocks().count(), 0);
    }

    #[test]
    fn failed_cycle_discards_the_batch() {
        let mut c = green();
        c.stage(Update::MaintenancePin { line: "Green".to_string(), block: 4, authority: 1, speed: 5.0 });
        c.stage(Update::Dispatch { line: "Green".to_string(), block: 6, authority: 3 });
        c.stage(snapshot(full(8)[1..].to_vec()));
        assert!(c.run_cycle().is_err());
        assert!(!c.has_staged());
        assert_eq!(c.maintenance().len(), 0);

        let r = c.run_cycle().unwrap();
        assert_eq!(r.cycle, 1);
        assert!(c.snapshot().authorities().iter().all(|&a| a == 3));
    }

    #[test]
    fn full_snapshot_replaces_state() {
        let mut c = green();
        c.stage(occupy(2, true));
        c.stage(Update::Snapshot {
            line: "Green".to_string(),
            blocks: (1..=10).map(|b| BlockReport { block: b, occupied: b == 8, faulted: b == 1 }).collect(),
        });
        c.run_cycle().unwrap();
        assert_eq!(c.state().occupied_blocks().collect::<Vec<_>>(), vec![8]);
        assert_eq!(c.snapshot().authorities(), vec![0, 0, 1, 2, 2, 1, 0, 0, 0, 1]);
    }
}
