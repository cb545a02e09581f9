// Library root: re-exports all modules so integration tests and the
// command-line binary can access the crate's public API.

pub mod config;
pub mod db;
pub mod stats;
