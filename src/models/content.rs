use garde::Validate;
use serde::{Deserialize, Serialize};

/// Opaque reference to the content being protected (e.g. an audio file URI).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ContentRef {
    #[garde(length(min = 1, max = 200))]
    pub id: String,

    /// Location of the audio (HTTP, IPFS or local path). Optional for
    /// verification services that resolve content by id.
    #[garde(length(min = 1, max = 2048))]
    pub uri: Option<String>,
}

/// Track metadata supplied by the owner at submission time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct TrackMetadata {
    #[garde(length(max = 200))]
    #[serde(default)]
    pub track_id: String,

    #[garde(length(min = 1, max = 300))]
    pub title: String,

    #[garde(length(min = 1, max = 300))]
    pub artist: String,

    #[garde(length(max = 300))]
    pub publisher: Option<String>,

    #[garde(length(max = 15))]
    pub isrc: Option<String>,

    #[garde(length(max = 14))]
    pub upc: Option<String>,

    #[garde(range(min = 0.0))]
    pub duration_secs: Option<f64>,
}

/// The party receiving the attestation and registration (a ledger address).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(transparent)]
#[garde(transparent)]
pub struct OwnerRef(#[garde(length(min = 1, max = 128))] pub String);

impl std::fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A complete submission: what to protect, how it is described and for whom.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProtectionRequest {
    #[garde(dive)]
    pub content: ContentRef,

    #[garde(dive)]
    pub metadata: TrackMetadata,

    #[garde(dive)]
    pub owner: OwnerRef,
}

impl ProtectionRequest {
    pub fn new(content: ContentRef, metadata: TrackMetadata, owner: OwnerRef) -> Self {
        Self {
            content,
            metadata,
            owner,
        }
    }

    /// Identifier used when talking to ledgers: the track id when present,
    /// otherwise the content reference id.
    pub fn content_id(&self) -> &str {
        if self.metadata.track_id.is_empty() {
            &self.content.id
        } else {
            &self.metadata.track_id
        }
    }
}
