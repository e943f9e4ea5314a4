//! Municipal school enrollment registry: typed records, bulk import and
//! export, and the line-oriented IPC daemon that serves them.

pub mod backup;
pub mod config;
pub mod db;
pub mod demo;
pub mod enrollment;
pub mod export;
pub mod fuzzy;
pub mod import;
pub mod ipc;
pub mod model;
pub mod persist;
pub mod registry;
pub mod stats;
pub mod text;
