//! Application core for a web-API skeleton: a Postgres-backed background job
//! queue, a console command kernel, and the configuration, database and
//! logging wiring around them.

pub mod api;
pub mod config;
pub mod console;
pub mod db;
pub mod jobs;
pub mod telemetry;
