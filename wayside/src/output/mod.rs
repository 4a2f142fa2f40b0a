//! Cycle snapshots, change logs and their JSON form.

pub mod history;
pub mod json;
