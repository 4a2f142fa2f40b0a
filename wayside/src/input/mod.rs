//! Routing tables, field feeds and scenario scripts.

pub mod topology;
pub mod topology_parser;
pub mod feed;
pub mod scenario;
