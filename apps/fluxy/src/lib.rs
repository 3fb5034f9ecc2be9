pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod input;
pub mod job;
pub mod planner;
pub mod save;
pub mod session;
pub mod sink;
pub mod telemetry;
