// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Error taxonomy for the band orchestrator.
//!
//! Every failure at a service or media boundary is caught by the owning
//! coordinator and converted to one of these kinds. None of them is fatal
//! to a session: each command can be re-issued.

use thiserror::Error;

use crate::playback::PlaybackError;
use crate::services::ServiceError;

/// Errors surfaced by session commands
#[derive(Debug, Error)]
pub enum BandError {
    /// The instrument-selection service failed or returned nothing usable
    #[error("roster generation failed: {0}")]
    RosterGenerationFailed(#[source] ServiceError),

    /// A single member's track could not be generated
    #[error("track generation failed for {member}: {cause}")]
    TrackGenerationFailed {
        /// Instrument key of the member
        member: String,
        /// What went wrong
        #[source]
        cause: TrackFailure,
    },

    /// Starting or registering a playback resource failed
    #[error(transparent)]
    Playback(#[from] PlaybackError),

    /// The combine service failed
    #[error("combine failed: {0}")]
    CombineFailed(#[source] ServiceError),

    /// Combine was requested with no generated, selected members
    #[error("no generated tracks are selected")]
    NoTracksSelected,

    /// The conductor instruction could not be parsed
    #[error("direction parse failed: {0}")]
    DirectionParseFailed(#[source] ServiceError),

    /// No member with this key exists in the current roster
    #[error("no band member named {0}")]
    UnknownMember(String),

    /// The user's own recording cannot be regenerated
    #[error("{0} is the user's recording and cannot be generated")]
    NotRegenerable(String),
}

/// Cause of a [`BandError::TrackGenerationFailed`]
#[derive(Debug, Error)]
pub enum TrackFailure {
    /// The generation service failed
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The returned artifact could not be loaded for playback
    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

impl BandError {
    /// Instrument or playback key the error is scoped to, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            BandError::TrackGenerationFailed { member, .. } => Some(member.as_str()),
            BandError::Playback(err) => Some(err.key.as_str()),
            BandError::UnknownMember(key) | BandError::NotRegenerable(key) => Some(key.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::MediaError;

    #[test]
    fn test_error_messages() {
        let err = BandError::TrackGenerationFailed {
            member: "piano".to_string(),
            cause: TrackFailure::Service(ServiceError::Rejected {
                endpoint: "track".to_string(),
                message: "model overloaded".to_string(),
            }),
        };
        let text = err.to_string();
        assert!(text.contains("piano"));
        assert!(text.contains("model overloaded"));

        assert_eq!(
            BandError::NoTracksSelected.to_string(),
            "no generated tracks are selected"
        );
    }

    #[test]
    fn test_error_key_scope() {
        let playback = BandError::from(PlaybackError {
            key: "guitar".to_string(),
            cause: MediaError::NotRegistered,
        });
        assert_eq!(playback.key(), Some("guitar"));
        assert_eq!(BandError::UnknownMember("bass".into()).key(), Some("bass"));
        assert_eq!(BandError::NoTracksSelected.key(), None);
    }
}
