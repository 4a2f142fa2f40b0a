use crate::input::topology::*;

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct MaintenancePin {
    pub authority: Authority,
    pub speed: Speed,
    was_occupied: bool,
    /// Set until the first cycle after creation has seen the pin.
    fresh: bool,
}

/// Operator-pinned commands. A pin wins over every other layer and lasts
/// until a train has left its block.
#[derive(Debug, Default, Clone)]
pub struct MaintenanceOverrides {
    pins: BTreeMap<BlockId, MaintenancePin>,
}

impl MaintenanceOverrides {
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates or replaces the pin on `block`; either way its tracker is
    /// seeded with the live occupancy.
    pub fn pin(&mut self, block :BlockId, authority :Authority, speed :Speed, occupied :bool) -> bool {
        self.pins.insert(block, MaintenancePin {
            authority,
            speed,
            was_occupied: occupied,
            fresh: true,
        }).is_some()
    }

    pub fn clear(&mut self, block :BlockId) -> Option<MaintenancePin> {
        self.pins.remove(&block)
    }

    /// Drops every pin whose block went from occupied to unoccupied since
    /// the previous cycle. Pins created since then only take their first
    /// reading.
    pub fn expire<F :Fn(BlockId) -> bool>(&mut self, is_occupied :F) -> Vec<BlockId> {
        let mut expired = Vec::new();
        for (&block, pin) in self.pins.iter_mut() {
            let now = is_occupied(block);
            if pin.fresh {
                // An exit in the creation batch still counts next cycle.
                pin.fresh = false;
                pin.was_occupied = pin.was_occupied || now;
                continue;
            }
            if pin.was_occupied && !now {
                expired.push(block);
            }
            pin.was_occupied = now;
        }
        for block in &expired {
            self.pins.remove(block);
        }
        expired
    }

    pub fn resolve(&self, block :BlockId) -> Option<(Authority, Speed)> {
        self.pins.get(&block).map(|p| (p.authority, p.speed))
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }
}
