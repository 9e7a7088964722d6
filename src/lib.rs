//! Track protection pipeline
//!
//! Drives a music track through verification by an external analysis
//! service, attestation on a provenance ledger and optional rights
//! registration, exposing a pollable job record for each submission.

pub mod app_state;
pub mod config;
pub mod models;
pub mod services;
pub mod telemetry;

pub use app_state::AppState;
pub use services::orchestrator::{JobEvent, Orchestrator, OrchestratorError};
