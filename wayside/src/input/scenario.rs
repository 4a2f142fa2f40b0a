use super::feed::Update;
use regex::Regex;

#[derive(Debug)]
pub struct Scenario {
    pub actions: Vec<ScenarioAction>,
}

#[derive(Debug, PartialEq)]
pub enum ScenarioAction {
    Wait(f64),
    Cycle,
    Update(Update),
}

#[derive(Debug, Fail)]
pub enum ParseError {
    #[fail(display = "error in regular expression: {}", _0)]
    RegexError(String),
    #[fail(display = "error converting number")]
    NumberError,
    #[fail(display = "unrecognized scenario step: {}", _0)]
    Unrecognized(String),
}

fn num<T :std::str::FromStr>(s :&str) -> Result<T, ParseError> {
    s.parse::<T>().map_err(|_e| ParseError::NumberError)
}

/// Parses scenario scripts for `line`
///
/// * wait 2.0
/// * cycle
/// * occupy 5 / vacate 5 / fault 5 / repair 5
/// * dispatch 2 3
/// * pin 7 1 10.0 / unpin 7
/// * switch 5 reverse
///
pub fn parse_scenario(input :&str, line :&str) -> Result<Scenario, ParseError> {
    let mk = |s :&str| Regex::new(s).map_err(|e| ParseError::RegexError(format!("{:?}", e)));
    let skip_re = mk(r"^\s*(#.*)?$")?;
    let wait_re = mk(r"^\s*wait\s+([\d\.]+)\s*$")?;
    let cycle_re = mk(r"^\s*cycle\s*$")?;
    let field_re = mk(r"^\s*(occupy|vacate|fault|repair)\s+(\d+)\s*$")?;
    let dispatch_re = mk(r"^\s*dispatch\s+(\d+)\s+(\d+)\s*$")?;
    let pin_re = mk(r"^\s*pin\s+(\d+)\s+(\d+)\s+([\d\.]+)\s*$")?;
    let unpin_re = mk(r"^\s*unpin\s+(\d+)\s*$")?;
    let switch_re = mk(r"^\s*switch\s+(\d+)\s+(\w+)\s*$")?;

    let line = line.to_string();
    let mut actions = Vec::new();
    for text in input.lines() {
        if skip_re.is_match(text) {
            continue;
        }
        if let Some(groups) = wait_re.captures(text) {
            actions.push(ScenarioAction::Wait(num(&groups[1])?));
            continue;
        }
        if cycle_re.is_match(text) {
            actions.push(ScenarioAction::Cycle);
            continue;
        }
        if let Some(groups) = field_re.captures(text) {
            let block = num(&groups[2])?;
            let update = match &groups[1] {
                "occupy" => Update::Occupancy { line: line.clone(), block, occupied: true },
                "vacate" => Update::Occupancy { line: line.clone(), block, occupied: false },
                "fault" => Update::Fault { line: line.clone(), block, faulted: true },
                _ => Update::Fault { line: line.clone(), block, faulted: false },
            };
            actions.push(ScenarioAction::Update(update));
            continue;
        }
        if let Some(groups) = dispatch_re.captures(text) {
            actions.push(ScenarioAction::Update(Update::Dispatch {
                line: line.clone(),
                block: num(&groups[1])?,
                authority: num(&groups[2])?,
            }));
            continue;
        }
        if let Some(groups) = pin_re.captures(text) {
            actions.push(ScenarioAction::Update(Update::MaintenancePin {
                line: line.clone(),
                block: num(&groups[1])?,
                authority: num(&groups[2])?,
                speed: num(&groups[3])?,
            }));
            continue;
        }
        if let Some(groups) = unpin_re.captures(text) {
            actions.push(ScenarioAction::Update(Update::MaintenanceClear {
                line: line.clone(),
                block: num(&groups[1])?,
            }));
            continue;
        }
        if let Some(groups) = switch_re.captures(text) {
            actions.push(ScenarioAction::Update(Update::SwitchSet {
                line: line.clone(),
                block: num(&groups[1])?,
                position: groups[2].to_string(),
            }));
            continue;
        }
        return Err(ParseError::Unrecognized(text.to_string()));
    }

    Ok(Scenario { actions })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_steps() {
        let s = parse_scenario("
            cycle
            occupy 5
            wait 2.0
            dispatch 2 3
            pin 7 1 10
            unpin 7
            switch 5 reverse
            repair 4
        ", "Green").unwrap();
        assert_eq!(s.actions.len(), 8);
        assert_eq!(s.actions[0], ScenarioAction::Cycle);
        assert_eq!(s.actions[1], ScenarioAction::Update(Update::Occupancy {
            line: "Green".to_string(), block: 5, occupied: true }));
        assert_eq!(s.actions[2], ScenarioAction::Wait(2.0));
        assert_eq!(s.actions[4], ScenarioAction::Update(Update::MaintenancePin {
            line: "Green".to_string(), block: 7, authority: 1, speed: 10.0 }));
        assert_eq!(s.actions[7], ScenarioAction::Update(Update::Fault {
            line: "Green".to_string(), block: 4, faulted: false }));
    }

    #[test]
    fn rejects_unknown_step() {
        assert!(parse_scenario("derail 4", "Green").is_err());
        assert!(parse_scenario("dispatch 2 300", "Green").is_err());
    }
}
