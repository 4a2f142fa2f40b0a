use crate::input::topology::*;

use std::collections::BTreeMap;

#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct BlockState {
    pub occupied: bool,
    pub faulted: bool,
}

impl BlockState {
    pub fn is_hazard(&self) -> bool {
        self.occupied || self.faulted
    }
}

#[derive(Debug, Fail, Clone, PartialEq)]
pub enum CommandError {
    #[fail(display = "update addressed to line {}, controller runs {}", _0, _1)]
    WrongLine(String, String),
    #[fail(display = "block {} is not part of the line", _0)]
    UnknownBlock(BlockId),
    #[fail(display = "block {} is not a switch", _0)]
    NotASwitch(BlockId),
    #[fail(display = "switch {} has no position \"{}\"", _0, _1)]
    UnknownPosition(BlockId, String),
    #[fail(display = "block {}: authority {} above line maximum {}", _0, _1, _2)]
    AuthorityOutOfRange(BlockId, Authority, Authority),
    #[fail(display = "block {}: invalid speed {}", _0, _1)]
    InvalidSpeed(BlockId, Speed),
}

impl CommandError {
    pub fn block(&self) -> Option<BlockId> {
        match *self {
            CommandError::WrongLine(..) => None,
            CommandError::UnknownBlock(b)
            | CommandError::NotASwitch(b)
            | CommandError::UnknownPosition(b, _)
            | CommandError::AuthorityOutOfRange(b, _, _)
            | CommandError::InvalidSpeed(b, _) => Some(b),
        }
    }
}

/// Live field state of one line: occupancy, faults and switch positions.
#[derive(Debug, Clone)]
pub struct LineState {
    blocks: BTreeMap<BlockId, BlockState>,
    positions: SwitchPositions,
}

impl LineState {
    pub fn new(topology :&Topology) -> LineState {
        LineState {
            blocks: topology.blocks().map(|b| (b, BlockState::default())).collect(),
            positions: topology.initial_positions().clone(),
        }
    }

    pub fn get(&self, block :BlockId) -> Option<&BlockState> {
        self.blocks.get(&block)
    }

    pub fn is_occupied(&self, block :BlockId) -> bool {
        self.blocks.get(&block).map(|s| s.occupied).unwrap_or(false)
    }

    pub fn is_hazard(&self, block :BlockId) -> bool {
        self.blocks.get(&block).map(|s| s.is_hazard()).unwrap_or(false)
    }

    pub fn positions(&self) -> &SwitchPositions {
        &self.positions
    }

    pub fn occupied_blocks<'a>(&'a self) -> impl Iterator<Item = BlockId> + 'a {
        self.blocks.iter().filter(|(_, s)| s.occupied).map(|(b, _)| *b)
    }

    fn block_mut(&mut self, block :BlockId) -> Result<&mut BlockState, CommandError> {
        self.blocks.get_mut(&block).ok_or(CommandError::UnknownBlock(block))
    }

    /// Returns whether the value changed.
    pub fn set_occupied(&mut self, block :BlockId, occupied :bool) -> Result<bool, CommandError> {
        let s = self.block_mut(block)?;
        let changed = s.occupied != occupied;
        s.occupied = occupied;
        Ok(changed)
    }

    pub fn set_faulted(&mut self, block :BlockId, faulted :bool) -> Result<bool, CommandError> {
        let s = self.block_mut(block)?;
        let changed = s.faulted != faulted;
        s.faulted = faulted;
        Ok(changed)
    }

    /// Only positions declared in the routing table are accepted.
    pub fn set_position(&mut self, topology :&Topology, block :BlockId, position :&str)
        -> Result<bool, CommandError> {
        let opts = match topology.options(block) {
            Some(opts) => opts,
            None if topology.contains(block) => return Err(CommandError::NotASwitch(block)),
            None => return Err(CommandError::UnknownBlock(block)),
        };
        if !opts.iter().any(|o| o.position == position) {
            return Err(CommandError::UnknownPosition(block, position.to_string()));
        }
        let changed = self.positions.get(&block).map(|p| p != position).unwrap_or(true);
        self.positions.insert(block, position.to_string());
        Ok(changed)
    }
}
