use serde::{Deserialize, Serialize};

/// Opaque handle issued by the verification service for one request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestHandle(pub String);

impl std::fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalized verification decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationOutcome {
    pub passed: bool,
    pub confidence_score: f64,
    /// Service-specific analysis (content profile, similarity matches, ...).
    #[serde(default)]
    pub detail: serde_json::Value,
}

/// Result of a single status check against the verification service.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationCheck {
    Pending,
    Completed(VerificationOutcome),
    Failed(String),
}
