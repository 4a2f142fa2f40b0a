#[macro_use] extern crate failure_derive;

pub mod input;
pub mod output;
pub mod railway;


use input::topology::Topology;
use input::scenario::{Scenario, ScenarioAction};
use output::history::History;
use railway::controller::LineController;

/// Replays a scenario in simulated time against a fresh controller for
/// `topology`. A cycle runs at every multiple of `interval` and right after
/// any batch of field pushes, as the live worker does.
pub fn replay(topology :Topology, scenario :&Scenario, interval :f64) -> AppResult<History> {
    if !(interval > 0.0) {
        failure::bail!("cycle interval must be positive, got {}", interval);
    }
    let mut controller = LineController::new(topology);
    let mut history = History { line: controller.line().to_string(), cycles: Vec::new() };

    let mut cycle = |controller :&mut LineController, time :f64| -> AppResult<()> {
        let report = controller.run_cycle()?;
        history.cycles.push((time, report));
        Ok(())
    };

    let mut time = 0.0;
    let mut next_cycle = interval;
    let mut pushed = false;
    for action in &scenario.actions {
        match action {
            ScenarioAction::Update(u) => {
                pushed |= u.triggers_cycle();
                controller.stage(u.clone());
            }
            ScenarioAction::Cycle => {
                cycle(&mut controller, time)?;
                next_cycle = time + interval;
                pushed = false;
            }
            ScenarioAction::Wait(dt) => {
                if pushed {
                    cycle(&mut controller, time)?;
                    next_cycle = time + interval;
                    pushed = false;
                }
                let target = time + dt;
                while next_cycle <= target {
                    time = next_cycle;
                    cycle(&mut controller, time)?;
                    next_cycle += interval;
                }
                time = target;
            }
        }
    }
    if pushed || controller.has_staged() {
        cycle(&mut controller, time)?;
    }

    Ok(history)
}


use std::path::Path;
pub type AppResult<T> = Result<T, failure::Error>;

pub fn read_file(f :&Path) -> AppResult<String> {
  use std::fs::File;
  use std::io::prelude::*;
  use std::io::BufReader;

  let file = File::open(f)?;
  let mut file = BufReader::new(&file);
  let mut contents = String::new();
  file.read_to_string(&mut contents)?;
  Ok(contents)
}

pub fn get_topology(f :&Path) -> AppResult<Topology> {
    let contents = read_file(f)?;
    get_topology_string(&contents)
}

pub fn get_topology_string(s :&str) -> AppResult<Topology> {
    let t = input::topology_parser::parse_topology(s)?;
    Ok(t)
}

pub fn get_scenario(f :&Path, line :&str) -> AppResult<Scenario> {
    let contents = read_file(f)?;
    let s = input::scenario::parse_scenario(&contents, line)?;
    Ok(s)
}
