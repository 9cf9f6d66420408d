pub mod api;
pub mod archive;
pub mod config;
pub mod entry;
pub mod facade;
pub mod humanize;
pub mod local;
pub mod observability;
pub mod query;
pub mod search;

pub use entry::{Category, LogEntry};
pub use facade::Logbook;
