//! Hop distances over the currently active routing of a line.
//!
//! A `Routing` is built fresh every cycle from the topology and the switch
//! positions of that cycle, so a thrown switch is never seen through stale
//! adjacency. Searches run in both directions of travel; the distance of a
//! block is the smaller of the two.

use crate::input::topology::*;
use smallvec::SmallVec;

use std::collections::{BTreeMap, HashSet, VecDeque};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

pub const BOTH: [Direction; 2] = [Direction::Forward, Direction::Backward];

#[derive(Debug, Default)]
pub struct Routing {
    forward: BTreeMap<BlockId, Successors>,
    backward: BTreeMap<BlockId, Successors>,
    unrouted: BTreeMap<BlockId, RoutingError>,
}

impl Routing {
    pub fn new(topology :&Topology, positions :&SwitchPositions) -> Routing {
        let mut routing = Routing::default();
        for block in topology.blocks() {
            match topology.successors(block, positions) {
                Ok(next) => {
                    for &n in next.iter() {
                        routing.backward.entry(n).or_insert_with(SmallVec::new).push(block);
                    }
                    routing.forward.insert(block, next);
                }
                Err(e) => {
                    // Searches stop at an unrouted switch from either side.
                    if let Some(opts) = topology.options(block) {
                        for o in opts {
                            routing.backward.entry(o.next).or_insert_with(SmallVec::new).push(block);
                        }
                    }
                    routing.unrouted.insert(block, e);
                }
            }
        }
        routing
    }

    pub fn neighbours(&self, block :BlockId, dir :Direction) -> &[BlockId] {
        let map = match dir {
            Direction::Forward => &self.forward,
            Direction::Backward => &self.backward,
        };
        map.get(&block).map(|s| s.as_slice()).unwrap_or(&[])
    }

    pub fn unrouted(&self, block :BlockId) -> Option<&RoutingError> {
        self.unrouted.get(&block)
    }
}

/// Breadth-first walk in one direction, visiting each block at most once.
/// `visit` sees every block with its hop count and returns true to stop the
/// walk there; blocks beyond `limit` hops are not expanded.
fn walk<F>(routing :&Routing, start :BlockId, dir :Direction, limit :Option<usize>, mut visit :F)
    where F: FnMut(BlockId, usize) -> bool {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    visited.insert(start);
    queue.push_back((start, 0));
    while let Some((block, dist)) = queue.pop_front() {
        if visit(block, dist) {
            return;
        }
        if limit.map(|l| dist >= l).unwrap_or(false) {
            continue;
        }
        // Declaration order decides ties between equally short branches.
        for &next in routing.neighbours(block, dir) {
            if visited.insert(next) {
                queue.push_back((next, dist + 1));
            }
        }
    }
}

fn search<F :Fn(BlockId) -> bool>(routing :&Routing, start :BlockId, dir :Direction, is_hazard :&F) -> Option<usize> {
    let mut found = None;
    walk(routing, start, dir, None, |block, dist| {
        if is_hazard(block) || routing.unrouted(block).is_some() {
            found = Some(dist);
            true
        } else {
            false
        }
    });
    found
}

/// Hops from `start` to the nearest hazard in either direction, `None` if no
/// hazard is reachable. An unrouted switch counts as a hazard; an unrouted
/// start block has no defined distance at all.
pub fn distance_to_hazard<F :Fn(BlockId) -> bool>(routing :&Routing, start :BlockId, is_hazard :F)
    -> Result<Option<usize>, RoutingError> {
    if let Some(e) = routing.unrouted(start) {
        return Err(e.clone());
    }
    let best = BOTH.iter()
        .filter_map(|&dir| search(routing, start, dir, &is_hazard))
        .min();
    Ok(best)
}

/// Minimal hop count from `origin` to every block within `radius` hops,
/// taking the shorter of the two directions.
pub fn hops_within(routing :&Routing, origin :BlockId, radius :usize) -> BTreeMap<BlockId, usize> {
    let mut hops = BTreeMap::new();
    for &dir in BOTH.iter() {
        walk(routing, origin, dir, Some(radius), |block, dist| {
            let e = hops.entry(block).or_insert(dist);
            if dist < *e {
                *e = dist;
            }
            false
        });
    }
    hops
}

/// Blocks exactly `radius` hops ahead of and behind `origin`.
pub fn stop_points(routing :&Routing, origin :BlockId, radius :usize) -> SmallVec<[BlockId; 2]> {
    let mut stops = SmallVec::new();
    for &dir in BOTH.iter() {
        walk(routing, origin, dir, Some(radius), |block, dist| {
            if dist == radius && !stops.contains(&block) {
                stops.push(block);
            }
            false
        });
    }
    stops
}
