use crate::input::topology::*;
use super::distance::{self, Routing};

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Created,
    Cleared,
    Unchanged,
    /// A train still occupies the stop point that cleared this override.
    Suppressed { trigger: BlockId },
}

/// Dispatcher-flagged blocks. Each active override caps authority on a
/// gradient around its block until a train reaches the override zone.
#[derive(Debug, Default, Clone)]
pub struct DispatchOverrides {
    active: BTreeMap<BlockId, Authority>,
    /// Override block -> occupied block that cleared it.
    spent: BTreeMap<BlockId, BlockId>,
}

impl DispatchOverrides {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn is_active(&self, block :BlockId) -> bool {
        self.active.contains_key(&block)
    }

    pub fn request<F :Fn(BlockId) -> bool>(&mut self, config :&LineConfig, block :BlockId,
                                           authority :Authority, is_occupied :F) -> DispatchOutcome {
        if authority != config.max_authority {
            return match self.active.remove(&block) {
                Some(_) => DispatchOutcome::Cleared,
                None => DispatchOutcome::Unchanged,
            };
        }
        if let Some(&trigger) = self.spent.get(&block) {
            if is_occupied(trigger) {
                return DispatchOutcome::Suppressed { trigger };
            }
            self.spent.remove(&block);
        }
        match self.active.insert(block, authority) {
            Some(_) => DispatchOutcome::Unchanged,
            None => DispatchOutcome::Created,
        }
    }

    /// Removes every override whose block or stop points are occupied.
    /// Returns `(override block, occupied block)` for each removal.
    pub fn auto_clear<F :Fn(BlockId) -> bool>(&mut self, config :&LineConfig, routing :&Routing,
                                              is_occupied :F) -> Vec<(BlockId, BlockId)> {
        self.spent.retain(|_, trigger| is_occupied(*trigger));

        let radius = config.gradient_radius();
        let mut cleared = Vec::new();
        for &block in self.active.keys() {
            let trigger = Some(block).into_iter()
                .chain(distance::stop_points(routing, block, radius))
                .find(|b| is_occupied(*b));
            if let Some(trigger) = trigger {
                cleared.push((block, trigger));
            }
        }
        for &(block, trigger) in &cleared {
            self.active.remove(&block);
            self.spent.insert(block, trigger);
        }
        cleared
    }

    /// Lowest cap per block over all active overrides.
    pub fn caps(&self, config :&LineConfig, routing :&Routing) -> GradientCaps {
        let mut caps = BTreeMap::new();
        for &block in self.active.keys() {
            for (b, delta) in distance::hops_within(routing, block, config.gradient_radius()) {
                if let Some(cap) = config.gradient_cap(delta) {
                    let e = caps.entry(b).or_insert(cap);
                    if cap < *e {
                        *e = cap;
                    }
                }
            }
        }
        GradientCaps { caps }
    }
}

#[derive(Debug, Default)]
pub struct GradientCaps {
    caps: BTreeMap<BlockId, Authority>,
}

impl GradientCaps {
    /// Overrides only ever restrict.
    pub fn apply(&self, block :BlockId, base :Authority) -> Authority {
        match self.caps.get(&block) {
            Some(&cap) if cap < base => cap,
            _ => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::topology_parser::parse_topology;

    fn line() -> Topology {
        let mut s = String::from("line Green\n");
        for b in 1..10 {
            s.push_str(&format!("block {} -> {}\n", b, b + 1));
        }
        parse_topology(&s).unwrap()
    }

    #[test]
    fn gradient_is_symmetric() {
        let t = line();
        let r = Routing::new(&t, t.initial_positions());
        let mut d = DispatchOverrides::new();
        assert_eq!(d.request(&t.config, 5, 3, |_| false), DispatchOutcome::Created);
        let caps = d.caps(&t.config, &r);
        let got :Vec<Authority> = (1..=10).map(|b| caps.apply(b, 3)).collect();
        assert_eq!(got, vec![3, 0, 1, 2, 3, 2, 1, 0, 3, 3]);
        assert_eq!(caps.apply(4, 1), 1);
    }

    #[test]
    fn lower_requests_clear() {
        let t = line();
        let mut d = DispatchOverrides::new();
        assert_eq!(d.request(&t.config, 5, 1, |_| false), DispatchOutcome::Unchanged);
        d.request(&t.config, 5, 3, |_| false);
        assert_eq!(d.request(&t.config, 5, 3, |_| false), DispatchOutcome::Unchanged);
        assert_eq!(d.request(&t.config, 5, 0, |_| false), DispatchOutcome::Cleared);
        assert!(!d.is_active(5));
    }

    #[test]
    fn cleared_at_stop_point_and_not_resurrected() {
        let t = line();
        let r = Routing::new(&t, t.initial_positions());
        let mut d = DispatchOverrides::new();
        d.request(&t.config, 2, 3, |_| false);
        assert!(d.auto_clear(&t.config, &r, |b| b == 4).is_empty());
        assert_eq!(d.auto_clear(&t.config, &r, |b| b == 5), vec![(2, 5)]);
        assert!(!d.is_active(2));
        assert_eq!(d.request(&t.config, 2, 3, |b| b == 5),
                   DispatchOutcome::Suppressed { trigger: 5 });
        assert_eq!(d.request(&t.config, 2, 3, |_| false), DispatchOutcome::Created);
    }
}
