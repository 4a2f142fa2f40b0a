use smallvec::SmallVec;

use std::collections::{BTreeMap, HashMap};

pub type BlockId = usize;
pub type Authority = u8;
pub type Speed = f64;

/// Current position string for every switch block on the line.
pub type SwitchPositions = HashMap<BlockId, String>;

pub type Successors = SmallVec<[BlockId; 2]>;

/// Per-line constants. Lines differ in nominal speed and may differ in
/// thresholds, so nothing here is shared between lines.
#[derive(Debug, Clone)]
pub struct LineConfig {
    pub name: String,
    pub nominal_speed: Speed,
    pub max_authority: Authority,
    /// Authority granted at a given hop distance from the nearest hazard.
    /// Distances past the end of the table get `max_authority`.
    pub authority_by_distance: Vec<Authority>,
    /// Dispatch override caps indexed by hop delta from the override block.
    /// The last index is the override radius.
    pub gradient: Vec<Authority>,
}

impl LineConfig {
    pub fn new(name :&str) -> LineConfig {
        LineConfig {
            name: name.to_string(),
            nominal_speed: 31.0,
            max_authority: 3,
            authority_by_distance: vec![0, 0, 1, 2],
            gradient: vec![3, 2, 1, 0],
        }
    }

    /// `None` distance means no hazard is reachable.
    pub fn authority_for(&self, distance :Option<usize>) -> Authority {
        distance
            .and_then(|d| self.authority_by_distance.get(d).cloned())
            .unwrap_or(self.max_authority)
    }

    pub fn gradient_radius(&self) -> usize {
        self.gradient.len().saturating_sub(1)
    }

    pub fn gradient_cap(&self, delta :usize) -> Option<Authority> {
        self.gradient.get(delta).cloned()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchOption {
    pub position: String,
    pub next: BlockId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Edges {
    End,
    Single(BlockId),
    Switchable(SmallVec<[SwitchOption; 2]>),
}

#[derive(Debug, Fail, Clone, PartialEq)]
pub enum RoutingError {
    #[fail(display = "block {} is not part of line", _0)]
    UnknownBlock(BlockId),
    #[fail(display = "switch {} has no position set", _0)]
    NoPosition(BlockId),
    #[fail(display = "switch {} position \"{}\" is not a declared option", _0, _1)]
    UnknownPosition(BlockId, String),
}

/// Static routing table of one line. Read-only once loaded; switch
/// positions live with the line state and are passed in on every query.
#[derive(Debug, Clone)]
pub struct Topology {
    pub config: LineConfig,
    blocks: BTreeMap<BlockId, Edges>,
    initial_positions: SwitchPositions,
}

impl Topology {
    pub fn new(config :LineConfig) -> Topology {
        Topology {
            config,
            blocks: BTreeMap::new(),
            initial_positions: HashMap::new(),
        }
    }

    /// Declares the outgoing edges of `block`. Successors that were never
    /// declared themselves become line ends. Returns false if the block
    /// already had edges declared.
    pub fn add_block(&mut self, block :BlockId, edges :Edges) -> bool {
        let targets :Vec<BlockId> = match &edges {
            Edges::End => vec![],
            Edges::Single(n) => vec![*n],
            Edges::Switchable(opts) => opts.iter().map(|o| o.next).collect(),
        };
        if let Edges::Switchable(opts) = &edges {
            if let Some(first) = opts.first() {
                self.initial_positions.entry(block).or_insert_with(|| first.position.clone());
            }
        }
        let fresh = match self.blocks.get(&block) {
            None | Some(Edges::End) => true,
            Some(_) => false,
        };
        if fresh {
            self.blocks.insert(block, edges);
        }
        for t in targets {
            self.blocks.entry(t).or_insert(Edges::End);
        }
        fresh
    }

    pub fn set_initial_position(&mut self, block :BlockId, position :&str) {
        self.initial_positions.insert(block, position.to_string());
    }

    pub fn initial_positions(&self) -> &SwitchPositions {
        &self.initial_positions
    }

    pub fn contains(&self, block :BlockId) -> bool {
        self.blocks.contains_key(&block)
    }

    pub fn blocks<'a>(&'a self) -> impl Iterator<Item = BlockId> + 'a {
        self.blocks.keys().cloned()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn edges(&self, block :BlockId) -> Option<&Edges> {
        self.blocks.get(&block)
    }

    pub fn options(&self, block :BlockId) -> Option<&[SwitchOption]> {
        match self.blocks.get(&block) {
            Some(Edges::Switchable(opts)) => Some(opts.as_slice()),
            _ => None,
        }
    }

    /// Blocks reachable in one hop from `block` under the given switch
    /// positions. A switch contributes only its active branch; a switch
    /// without a recognized position has no route at all.
    pub fn successors(&self, block :BlockId, positions :&SwitchPositions)
        -> Result<Successors, RoutingError> {
        match self.blocks.get(&block) {
            None => Err(RoutingError::UnknownBlock(block)),
            Some(Edges::End) => Ok(SmallVec::new()),
            Some(Edges::Single(n)) => Ok(SmallVec::from_slice(&[*n])),
            Some(Edges::Switchable(opts)) => {
                let pos = positions.get(&block).ok_or(RoutingError::NoPosition(block))?;
                opts.iter()
                    .find(|o| &o.position == pos)
                    .map(|o| SmallVec::from_slice(&[o.next]))
                    .ok_or_else(|| RoutingError::UnknownPosition(block, pos.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branched() -> Topology {
        let mut t = Topology::new(LineConfig::new("Green"));
        t.add_block(1, Edges::Single(2));
        t.add_block(2, Edges::Switchable(SmallVec::from_vec(vec![
            SwitchOption { position: "normal".to_string(), next: 3 },
            SwitchOption { position: "reverse".to_string(), next: 10 },
        ])));
        t
    }

    #[test]
    fn switch_follows_active_position() {
        let t = branched();
        let mut pos = t.initial_positions().clone();
        assert_eq!(t.successors(2, &pos).unwrap().as_slice(), &[3]);
        pos.insert(2, "reverse".to_string());
        assert_eq!(t.successors(2, &pos).unwrap().as_slice(), &[10]);
        assert!(t.successors(3, &pos).unwrap().is_empty());
    }

    #[test]
    fn unknown_position_has_no_route() {
        let t = branched();
        let mut pos = HashMap::new();
        assert_eq!(t.successors(2, &pos), Err(RoutingError::NoPosition(2)));
        pos.insert(2, "sideways".to_string());
        assert_eq!(t.successors(2, &pos),
                   Err(RoutingError::UnknownPosition(2, "sideways".to_string())));
    }

    #[test]
    fn implicit_line_ends() {
        let mut t = branched();
        assert!(t.contains(10));
        assert!(t.add_block(3, Edges::Single(4)));
        assert!(!t.add_block(1, Edges::Single(3)));
        assert_eq!(t.len(), 5);
    }

    #[test]
    fn distance_table() {
        let c = LineConfig::new("Green");
        let got :Vec<Authority> = (0..6).map(|d| c.authority_for(Some(d))).collect();
        assert_eq!(got, vec![0, 0, 1, 2, 3, 3]);
        assert_eq!(c.authority_for(None), 3);
        assert_eq!(c.gradient_radius(), 3);
        assert_eq!(c.gradient_cap(4), None);
    }
}
