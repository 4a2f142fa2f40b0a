//! Dedicated cycle thread for one line.
//!
//! Feeds stage updates through a channel and never touch the controller
//! directly. The worker drains the channel at the start of each cycle, so a
//! cycle always sees a consistent set of updates.

use crate::input::feed::Update;
use crate::input::topology::{Authority, BlockId, Speed};
use crate::output::history::CycleReport;
use super::controller::{CycleError, LineController};
use log::{debug, error, info};

use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

/// One changed block, as sent to train controllers and panels.
#[derive(Debug, Clone, PartialEq)]
pub struct Publication {
    pub line: String,
    pub cycle: u64,
    pub block: BlockId,
    pub authority: Authority,
    pub speed: Speed,
}

enum Message {
    Update(Update),
    Subscribe(Sender<Publication>),
    Shutdown,
}

/// Cloneable staging handle for ingestion threads.
#[derive(Clone)]
pub struct Feed {
    tx: Sender<Message>,
}

impl Feed {
    /// Returns false once the worker has stopped.
    pub fn send(&self, update :Update) -> bool {
        self.tx.send(Message::Update(update)).is_ok()
    }
}

pub struct Worker {
    tx: Sender<Message>,
    handle: thread::JoinHandle<Result<(), CycleError>>,
}

impl Worker {
    pub fn spawn(controller :LineController, interval :Duration) -> Worker {
        let (tx, rx) = channel();
        let handle = thread::spawn(move || run(controller, rx, interval));
        Worker { tx, handle }
    }

    pub fn feed(&self) -> Feed {
        Feed { tx: self.tx.clone() }
    }

    pub fn subscribe(&self) -> Receiver<Publication> {
        let (tx, rx) = channel();
        let _ = self.tx.send(Message::Subscribe(tx));
        rx
    }

    /// Stops the worker after any cycle in progress and returns how it ended.
    pub fn shutdown(self) -> Result<(), CycleError> {
        let _ = self.tx.send(Message::Shutdown);
        match self.handle.join() {
            Ok(r) => r,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

struct Listeners(Vec<Sender<Publication>>);

impl Listeners {
    /// Never blocks; listeners that hung up are dropped.
    fn publish(&mut self, line :&str, report :&CycleReport) {
        if report.changes.is_empty() {
            return;
        }
        self.0.retain(|l| {
            report.changes.iter().all(|c| l.send(Publication {
                line: line.to_string(),
                cycle: report.cycle,
                block: c.block,
                authority: c.after.authority,
                speed: c.after.speed,
            }).is_ok())
        });
    }
}

fn run(mut controller :LineController, rx :Receiver<Message>, interval :Duration) -> Result<(), CycleError> {
    let mut listeners = Listeners(Vec::new());
    let mut next_cycle = Instant::now() + interval;
    info!("Line {}: cycle worker started, interval {:?}", controller.line(), interval);

    loop {
        let wait = next_cycle.saturating_duration_since(Instant::now());
        let mut due = false;
        let mut stop = false;
        match rx.recv_timeout(wait) {
            Ok(Message::Update(u)) => {
                due = u.triggers_cycle();
                controller.stage(u);
            }
            Ok(Message::Subscribe(l)) => listeners.0.push(l),
            Ok(Message::Shutdown) => stop = true,
            Err(RecvTimeoutError::Timeout) => due = true,
            Err(RecvTimeoutError::Disconnected) => stop = true,
        }
        if stop {
            info!("Line {}: cycle worker stopping", controller.line());
            return Ok(());
        }
        if !due {
            continue;
        }

        // Everything queued so far belongs to this cycle.
        while let Ok(msg) = rx.try_recv() {
            match msg {
                Message::Update(u) => controller.stage(u),
                Message::Subscribe(l) => listeners.0.push(l),
                Message::Shutdown => stop = true,
            }
        }

        let started = Instant::now();
        let report = controller.run_cycle().map_err(|e| {
            error!("Line {}: stopping cycle worker: {}", controller.line(), e);
            e
        })?;
        debug!("Line {}: cycle {} took {:?}", controller.line(), report.cycle, started.elapsed());
        listeners.publish(controller.line(), &report);
        next_cycle = Instant::now() + interval;

        if stop {
            info!("Line {}: cycle worker stopping", controller.line());
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::feed::BlockReport;
    use crate::input::topology_parser::parse_topology;

    fn controller() -> LineController {
        let mut s = String::from("line Green\n");
        for b in 1..10 {
            s.push_str(&format!("block {} -> {}\n", b, b + 1));
        }
        LineController::new(parse_topology(&s).unwrap())
    }

    fn next(rx :&Receiver<Publication>) -> Publication {
        rx.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn publishes_on_interval_and_on_push() {
        let worker = Worker::spawn(controller(), Duration::from_millis(50));
        let rx = worker.subscribe();
        let first :Vec<Publication> = (0..10).map(|_| next(&rx)).collect();
        assert!(first.iter().all(|p| p.authority == 3 && p.speed == 31.0 && p.cycle == first[0].cycle));

        worker.feed().send(Update::Occupancy { line: "Green".to_string(), block: 5, occupied: true });
        let mut changed :Vec<(BlockId, Authority)> = (0..7).map(|_| next(&rx)).map(|p| (p.block, p.authority)).collect();
        changed.sort();
        assert_eq!(changed, vec![(2, 2), (3, 1), (4, 0), (5, 0), (6, 0), (7, 1), (8, 2)]);
        assert_eq!(worker.shutdown(), Ok(()));
    }

    #[test]
    fn incomplete_feed_stops_worker() {
        let worker = Worker::spawn(controller(), Duration::from_secs(60));
        let feed = worker.feed();
        feed.send(Update::Snapshot {
            line: "Green".to_string(),
            blocks: vec![BlockReport { block: 1, occupied: true, faulted: false }],
        });
        assert_eq!(worker.shutdown(),
                   Err(CycleError::IncompleteFeed("Green".to_string(), (2..=10).collect())));
        assert!(!feed.send(Update::Trigger));
    }
}
