pub mod attestation;
pub mod mock;
pub mod orchestrator;
pub mod poller;
pub mod queue;
pub mod registration;
pub mod registry;
pub mod verification;
