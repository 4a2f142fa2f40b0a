//! Interlocking logic for one line.

pub mod state;
pub mod distance;
pub mod authority;
pub mod dispatch;
pub mod maintenance;
pub mod controller;
pub mod worker;
