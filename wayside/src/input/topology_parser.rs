use super::topology::*;
use regex::Regex;
use smallvec::SmallVec;
use log::warn;

use std::collections::HashSet;

#[derive(Debug, Fail)]
pub enum ParseError {
    #[fail(display = "error in regular expression: {}", _0)]
    RegexError(String),
    #[fail(display = "line {}: error converting number", _0)]
    NumberError(usize),
    #[fail(display = "line {}: unrecognized routing entry: {}", _0, _1)]
    Unrecognized(usize, String),
    #[fail(display = "line {}: block {} declared twice", _0, _1)]
    DuplicateBlock(usize, BlockId),
    #[fail(display = "line {}: switch {} has no options", _0, _1)]
    NoOptions(usize, BlockId),
    #[fail(display = "authority {} above line maximum {}", _0, _1)]
    AboveMaximum(Authority, Authority),
    #[fail(display = "routing table has no line name")]
    MissingLine,
    #[fail(display = "routing table declares no blocks")]
    NoBlocks,
}

fn re(s :&str) -> Result<Regex, ParseError> {
    Regex::new(s).map_err(|e| ParseError::RegexError(format!("{:?}", e)))
}

fn number<T :std::str::FromStr>(s :&str, line :usize) -> Result<T, ParseError> {
    s.parse::<T>().map_err(|_e| ParseError::NumberError(line))
}

fn levels(s :&str, line :usize) -> Result<Vec<Authority>, ParseError> {
    s.split_whitespace().map(|x| number(x, line)).collect()
}

/// Parses a line routing table.
///
/// * line Green
/// * speed 31
/// * max 3
/// * authority 0 0 1 2
/// * gradient 3 2 1 0
/// * block 1 -> 2
/// * block 5 -> normal:6 reverse:20 position reverse
/// * block 10 -> end
///
pub fn parse_topology(input :&str) -> Result<Topology, ParseError> {
    let comment_re = re(r"^\s*(#.*)?$")?;
    let line_re = re(r"^\s*line\s+(\w+)\s*$")?;
    let speed_re = re(r"^\s*speed\s+([\d\.]+)\s*$")?;
    let max_re = re(r"^\s*max\s+(\d+)\s*$")?;
    let authority_re = re(r"^\s*authority((?:\s+\d+)+)\s*$")?;
    let gradient_re = re(r"^\s*gradient((?:\s+\d+)+)\s*$")?;
    let block_re = re(r"(?x) ^ \s* block \s+ (?P<block>\d+) \s* -> \s*
            (?P<edges> end | \d+ | (?: \w+:\d+ \s* )+ ) \s*
            (?: position \s+ (?P<pos>\w+) )? \s* $")?;
    let option_re = re(r"(\w+):(\d+)")?;

    let mut config = None;
    let mut declared = HashSet::new();
    let mut entries = Vec::new();
    let mut positions = Vec::new();

    for (idx, text) in input.lines().enumerate() {
        let lineno = idx + 1;
        if comment_re.is_match(text) {
            continue;
        }
        if let Some(groups) = line_re.captures(text) {
            config = Some(LineConfig::new(&groups[1]));
            continue;
        }
        let cfg = config.as_mut().ok_or(ParseError::MissingLine)?;
        if let Some(groups) = speed_re.captures(text) {
            cfg.nominal_speed = number(&groups[1], lineno)?;
            continue;
        }
        if let Some(groups) = max_re.captures(text) {
            cfg.max_authority = number(&groups[1], lineno)?;
            continue;
        }
        if let Some(groups) = authority_re.captures(text) {
            cfg.authority_by_distance = levels(&groups[1], lineno)?;
            continue;
        }
        if let Some(groups) = gradient_re.captures(text) {
            cfg.gradient = levels(&groups[1], lineno)?;
            continue;
        }
        if let Some(groups) = block_re.captures(text) {
            let block :BlockId = number(&groups["block"], lineno)?;
            if !declared.insert(block) {
                return Err(ParseError::DuplicateBlock(lineno, block));
            }
            let edges_str = groups["edges"].trim();
            let edges = if edges_str == "end" {
                Edges::End
            } else if let Ok(n) = edges_str.parse::<BlockId>() {
                Edges::Single(n)
            } else {
                let mut opts = SmallVec::new();
                for o in option_re.captures_iter(edges_str) {
                    opts.push(SwitchOption {
                        position: o[1].to_string(),
                        next: number(&o[2], lineno)?,
                    });
                }
                if opts.is_empty() {
                    return Err(ParseError::NoOptions(lineno, block));
                }
                Edges::Switchable(opts)
            };
            if let Some(pos) = groups.name("pos") {
                positions.push((lineno, block, pos.as_str().to_string()));
            }
            entries.push((block, edges));
            continue;
        }
        return Err(ParseError::Unrecognized(lineno, text.to_string()));
    }

    let config = config.ok_or(ParseError::MissingLine)?;
    for &a in config.authority_by_distance.iter().chain(config.gradient.iter()) {
        if a > config.max_authority {
            return Err(ParseError::AboveMaximum(a, config.max_authority));
        }
    }
    if entries.is_empty() {
        return Err(ParseError::NoBlocks);
    }

    let mut topology = Topology::new(config);
    for (block, edges) in entries {
        topology.add_block(block, edges);
    }
    for (lineno, block, pos) in positions {
        let declared = topology.options(block)
            .map(|opts| opts.iter().any(|o| o.position == pos))
            .unwrap_or(false);
        if !declared {
            // Kept anyway: the block has no route until a valid switch command arrives.
            warn!("Routing table line {}: block {} position \"{}\" is not a declared option",
                  lineno, block, pos);
        }
        topology.set_initial_position(block, &pos);
    }
    Ok(topology)
}
