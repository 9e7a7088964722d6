pub mod content;
pub mod job;
pub mod ledger;
pub mod report;
pub mod verification;
