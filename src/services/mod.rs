// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Generation backend abstraction.
//!
//! This module provides the asynchronous services the orchestrator consumes:
//! - Roster selection for the user's instrument
//! - Per-member track generation
//! - Combining selected tracks into a final mix
//! - Parsing a conductor instruction into per-member prompts
//!
//! Two implementations ship with the crate: [`HttpStudio`] talks JSON to
//! the BandForge backend, [`OfflineStudio`] runs everything in-process.

pub mod http;
pub mod offline;

pub use http::HttpStudio;
pub use offline::OfflineStudio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors at the service boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The request never got a response
    #[error("{endpoint}: transport error: {message}")]
    Transport {
        /// Endpoint name
        endpoint: String,
        /// Underlying error text
        message: String,
    },
    /// The backend answered with a non-success HTTP status
    #[error("{endpoint}: HTTP {status}")]
    Status {
        /// Endpoint name
        endpoint: String,
        /// HTTP status code
        status: u16,
    },
    /// The backend answered `success: false`
    #[error("{endpoint}: {message}")]
    Rejected {
        /// Endpoint name
        endpoint: String,
        /// Error text reported by the backend
        message: String,
    },
    /// The response body could not be understood
    #[error("{endpoint}: malformed response: {message}")]
    Malformed {
        /// Endpoint name
        endpoint: String,
        /// Parse error
        message: String,
    },
    /// The response was valid but carried nothing usable
    #[error("{endpoint}: empty response")]
    Empty {
        /// Endpoint name
        endpoint: String,
    },
}

/// Request for one member's track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRequest {
    /// Backend session identifier
    pub session_id: String,
    /// Instrument to generate
    #[serde(rename = "ai_instrument")]
    pub instrument: String,
    /// Member prompt
    pub prompt: String,
    /// The user's MIDI the track must complement
    #[serde(rename = "user_midi_path")]
    pub user_reference: String,
    /// Whether a previous artifact exists for this member
    #[serde(default)]
    pub is_regeneration: bool,
}

/// Request to combine tracks into a final mix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombineRequest {
    /// Backend session identifier
    pub session_id: String,
    /// Selected AI artifacts in roster order
    #[serde(rename = "wav_files")]
    pub artifact_uris: Vec<String>,
    /// The user's own recording, if selected
    #[serde(rename = "user_audio_url", skip_serializing_if = "Option::is_none", default)]
    pub user_audio_uri: Option<String>,
}

/// A member as described to the direction parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberBrief {
    /// Instrument key
    pub instrument: String,
    /// Prompt the member currently has
    pub current_prompt: String,
}

/// Request to split a conductor instruction into member prompts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionRequest {
    /// The conductor's instruction
    pub overall_prompt: String,
    /// Current AI members
    pub members: Vec<MemberBrief>,
}

/// A prompt aimed at one member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberPrompt {
    /// Instrument name as returned by the parser
    pub instrument: String,
    /// New prompt
    pub prompt: String,
}

impl MemberPrompt {
    /// Create a member prompt
    pub fn new(instrument: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            prompt: prompt.into(),
        }
    }
}

/// The asynchronous services behind a band session.
///
/// Every call is independently retryable; implementations must not keep
/// per-call state that a retry would trip over.
#[async_trait]
pub trait BandService: Send + Sync {
    /// Choose complementary instruments for `instrument`
    async fn generate_roster(&self, instrument: &str) -> Result<Vec<String>, ServiceError>;

    /// Generate one member's track and return its artifact URI
    async fn generate_track(&self, request: &TrackRequest) -> Result<String, ServiceError>;

    /// Combine tracks and return the final mix URI
    async fn combine_tracks(&self, request: &CombineRequest) -> Result<String, ServiceError>;

    /// Split a conductor instruction into per-member prompts
    async fn parse_overall_direction(
        &self,
        request: &DirectionRequest,
    ) -> Result<Vec<MemberPrompt>, ServiceError>;
}
