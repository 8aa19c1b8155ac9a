#![doc = include_str!("../README.md")]

pub mod config;
pub mod engine;
pub mod issuance;
pub mod telemetry;
pub mod transport;
