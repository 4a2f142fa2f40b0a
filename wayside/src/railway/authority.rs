use crate::input::topology::*;

use std::fmt;

/// Which layer decided a block's command this cycle, highest precedence
/// first.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Source {
    Maintenance,
    Dispatch,
    Default,
    FailSafe,
}

impl fmt::Display for Source {
    fn fmt(&self, f :&mut fmt::Formatter) -> fmt::Result {
        let s = match *self {
            Source::Maintenance => "maintenance",
            Source::Dispatch => "dispatch",
            Source::Default => "default",
            Source::FailSafe => "fail-safe",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BlockCommand {
    pub authority: Authority,
    pub speed: Speed,
    pub source: Source,
}

impl BlockCommand {
    pub fn fail_safe() -> BlockCommand {
        BlockCommand { authority: 0, speed: 0.0, source: Source::FailSafe }
    }
}

/// Authority from hop distance. A faulted block never gets any.
pub fn default_authority(config :&LineConfig, distance :Option<usize>, faulted :bool) -> Authority {
    if faulted {
        return 0;
    }
    config.authority_for(distance)
}

pub fn commanded_speed(config :&LineConfig, authority :Authority, faulted :bool) -> Speed {
    if authority > 0 && !faulted {
        config.nominal_speed
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_rule() {
        let c = LineConfig::new("Green");
        assert_eq!(default_authority(&c, Some(0), false), 0);
        assert_eq!(default_authority(&c, Some(1), false), 0);
        assert_eq!(default_authority(&c, Some(2), false), 1);
        assert_eq!(default_authority(&c, Some(3), false), 2);
        assert_eq!(default_authority(&c, Some(4), false), 3);
        assert_eq!(default_authority(&c, None, false), 3);
        assert_eq!(default_authority(&c, None, true), 0);
    }

    #[test]
    fn speed_follows_authority() {
        let mut c = LineConfig::new("Red");
        c.nominal_speed = 25.0;
        assert_eq!(commanded_speed(&c, 2, false), 25.0);
        assert_eq!(commanded_speed(&c, 0, false), 0.0);
        assert_eq!(commanded_speed(&c, 3, true), 0.0);
    }
}
