//! Test fixtures for pipeline tests

use track_guard::models::content::{ContentRef, OwnerRef, TrackMetadata};

/// A track submission used across the pipeline tests
#[derive(Debug, Clone)]
pub struct TrackFixture {
    pub content_id: &'static str,
    pub title: &'static str,
    pub artist: &'static str,
    pub publisher: Option<&'static str>,
    pub isrc: Option<&'static str>,
    pub owner: &'static str,
}

impl TrackFixture {
    pub fn content(&self) -> ContentRef {
        ContentRef {
            id: self.content_id.to_string(),
            uri: None,
        }
    }

    pub fn metadata(&self) -> TrackMetadata {
        TrackMetadata {
            track_id: String::new(),
            title: self.title.to_string(),
            artist: self.artist.to_string(),
            publisher: self.publisher.map(str::to_string),
            isrc: self.isrc.map(str::to_string),
            upc: None,
            duration_secs: None,
        }
    }

    pub fn owner(&self) -> OwnerRef {
        OwnerRef(self.owner.to_string())
    }
}

pub const BASIC_TRACK: TrackFixture = TrackFixture {
    content_id: "trk-1",
    title: "X",
    artist: "Y",
    publisher: None,
    isrc: None,
    owner: "0x5fbdb2315678afecb367f032d93f642f64180aa3",
};

pub const CATALOG_TRACKS: &[TrackFixture] = &[
    TrackFixture {
        content_id: "trk-101",
        title: "Harbor Lights",
        artist: "The Tidewater Band",
        publisher: Some("Saltline Publishing"),
        isrc: Some("USRC17607839"),
        owner: "0x70997970c51812dc3a010c7d01b50e0d17dc79c8",
    },
    TrackFixture {
        content_id: "trk-102",
        title: "Paper Moons",
        artist: "Ivy Calder",
        publisher: Some("Northside Music"),
        isrc: Some("GBAYE0601498"),
        owner: "0x3c44cdddb6a900fa2b585dd299e03d12fa4293bc",
    },
    TrackFixture {
        content_id: "trk-103",
        title: "Static Bloom",
        artist: "Low Orbit",
        publisher: None,
        isrc: None,
        owner: "0x90f79bf6eb2c4f870365e785982e1f101e93b906",
    },
];
