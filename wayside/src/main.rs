use wayside::*;
use wayside::input::feed::Update;
use wayside::input::scenario::ScenarioAction;
use wayside::railway::controller::LineController;
use wayside::railway::worker::Worker;
use log::LevelFilter;
use std::path::PathBuf;
use std::time::Duration;
use structopt::StructOpt;

/// Wayside -- block authority and speed for one rail line
#[derive(StructOpt, Debug)]
#[structopt(name="wayside")]
struct Opt {
    /// Verbose mode (-v, -vv)
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: u8,

    /// Line routing table
    #[structopt(parse(from_os_str))]
    topology: PathBuf,

    /// Scenario script of field updates and operator commands
    #[structopt(parse(from_os_str))]
    scenario: PathBuf,

    /// Cycle interval in seconds
    #[structopt(short = "i", long = "interval", default_value = "2.0")]
    interval: f64,

    /// Run the scenario against the live cycle worker in wall-clock time
    #[structopt(short = "r", long = "realtime")]
    realtime: bool,

    /// Output JSON history file
    #[structopt(short = "j", long = "json", parse(from_os_str))]
    json: Option<PathBuf>,

    /// Output JSON history as JavaScript
    #[structopt(short = "J", long = "javascript", parse(from_os_str))]
    javascript: Option<PathBuf>,
}

fn realtime(opt :&Opt) -> AppResult<()> {
    let topology = get_topology(&opt.topology)?;
    let scenario = get_scenario(&opt.scenario, &topology.config.name)?;
    if !(opt.interval > 0.0) {
        failure::bail!("cycle interval must be positive, got {}", opt.interval);
    }

    let worker = Worker::spawn(LineController::new(topology), Duration::from_secs_f64(opt.interval));
    let publications = worker.subscribe();
    let feed = worker.feed();
    for action in scenario.actions {
        let sent = match action {
            ScenarioAction::Wait(dt) => {
                std::thread::sleep(Duration::from_secs_f64(dt));
                true
            }
            ScenarioAction::Cycle => feed.send(Update::Trigger),
            ScenarioAction::Update(u) => feed.send(u),
        };
        for p in publications.try_iter() {
            println!("> {} cycle {}: block {} authority {} speed {}",
                     p.line, p.cycle, p.block, p.authority, p.speed);
        }
        if !sent {
            break;
        }
    }
    worker.shutdown()?;
    Ok(())
}

fn run(opt :&Opt) -> AppResult<()> {
    if opt.realtime {
        return realtime(opt);
    }

    let topology = get_topology(&opt.topology)?;
    if opt.verbose >= 2 {
        println!("Routing table for line {}:", topology.config.name);
        for b in topology.blocks() {
            println!("  - {} {:?}", b, topology.edges(b));
        }
    }
    let scenario = get_scenario(&opt.scenario, &topology.config.name)?;
    if opt.verbose >= 1 {
        println!("Scenario:");
        for x in &scenario.actions { println!("  - {:?}", x); }
        println!("");
    }

    let history = replay(topology, &scenario, opt.interval)?;

    println!("# Line {} history:", history.line);
    for (t, report) in &history.cycles {
        println!("## Cycle {} at {:.1}s:", report.cycle, t);
        for ev in &report.events {
            println!("> {}", ev);
        }
    }

    if let Some(ref json) = opt.json {
        use std::fs::File;
        use std::io::BufWriter;
        let file = File::create(json)?;
        let mut writer = BufWriter::new(&file);
        wayside::output::json::json_history(&history, &mut writer)?;
    }

    if let Some(ref javascript) = opt.javascript {
        use std::fs::File;
        use std::io::BufWriter;
        let file = File::create(javascript)?;
        let mut writer = BufWriter::new(&file);
        wayside::output::json::javascript_history(&history, &mut writer)?;
    }

    Ok(())
}

pub fn main() {
    let opt = Opt::from_args();
    let level = match opt.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new().filter_level(level).parse_default_env().init();

    match run(&opt) {
        Ok(()) => {},
        Err(e) => {
            println!("Error:\n{}", e.as_fail());
            std::process::exit(1);
        },
    }
}
