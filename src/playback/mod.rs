// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Audio playback abstraction layer.
//!
//! This module provides a trait-based abstraction for playable media,
//! allowing different backends to be used interchangeably, and the
//! controller that keeps at most one resource playing at a time.

pub mod controller;
pub mod simulated;

pub use controller::PlaybackController;
pub use simulated::{SimulatedBackend, SimulatedHandle, SimulatedPlayer};

use std::time::Duration;

use thiserror::Error;

/// Reserved key for the combined final mix
pub const FINAL_MIX_KEY: &str = "final-mix";

/// Observable playback state of a registered resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Stopped at the start
    Idle,
    /// Currently audible
    Playing,
    /// Paused away from the start
    Paused,
}

/// Events emitted by a playable resource
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// Playback started
    Play,
    /// Playback paused
    Pause,
    /// Playback reached the end of the media
    Ended,
    /// The media failed
    Error(String),
}

/// Callback receiving playback events
pub type PlaybackListener = Box<dyn Fn(&PlaybackEvent) + Send + Sync>;

/// Handle for removing a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Errors raised by a media backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    /// No resource is registered under the requested key
    #[error("no track registered")]
    NotRegistered,
    /// The media could not be loaded
    #[error("failed to load {uri}: {reason}")]
    Load {
        /// Source URI
        uri: String,
        /// Backend message
        reason: String,
    },
    /// The backend refused to start playback
    #[error("playback refused: {0}")]
    Start(String),
}

/// Playback failure scoped to one key
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("playback error on {key}: {cause}")]
pub struct PlaybackError {
    /// Registry key
    pub key: String,
    /// Underlying media error
    #[source]
    pub cause: MediaError,
}

impl PlaybackError {
    /// Create a new playback error
    pub fn new(key: impl Into<String>, cause: MediaError) -> Self {
        Self {
            key: key.into(),
            cause,
        }
    }
}

/// A loaded piece of media that can be played, paused and sought.
///
/// Implementations emit [`PlaybackEvent`]s to their subscribers whenever
/// their state changes, whether or not the change was requested through
/// this trait.
pub trait Playable: Send {
    /// Load media from a URI, replacing anything loaded before
    fn load(&mut self, uri: &str) -> Result<(), MediaError>;

    /// Start or resume playback from the current position
    fn play(&mut self) -> Result<(), MediaError>;

    /// Pause playback, keeping the position
    fn pause(&mut self);

    /// Whether playback is paused (true before the first play)
    fn is_paused(&self) -> bool;

    /// Current playback position
    fn position(&self) -> Duration;

    /// Move the playback position
    fn set_position(&mut self, position: Duration);

    /// Register an event listener
    fn subscribe(&mut self, listener: PlaybackListener) -> SubscriptionId;

    /// Remove an event listener
    fn unsubscribe(&mut self, id: SubscriptionId);

    /// Pause and rewind to the start
    fn stop(&mut self) {
        self.pause();
        self.set_position(Duration::ZERO);
    }

    /// Derived playback state
    fn state(&self) -> PlaybackState {
        if !self.is_paused() {
            PlaybackState::Playing
        } else if self.position() > Duration::ZERO {
            PlaybackState::Paused
        } else {
            PlaybackState::Idle
        }
    }
}

/// Factory for playable resources
pub trait MediaBackend: Send + Sync {
    /// Create a resource and load `uri` into it
    fn open(&self, uri: &str) -> Result<Box<dyn Playable>, MediaError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_state() {
        let backend = SimulatedBackend::new();
        let mut player = backend.open("a.wav").unwrap();
        assert_eq!(player.state(), PlaybackState::Idle);

        player.play().unwrap();
        assert_eq!(player.state(), PlaybackState::Playing);

        player.set_position(Duration::from_secs(2));
        player.pause();
        assert_eq!(player.state(), PlaybackState::Paused);

        player.stop();
        assert_eq!(player.state(), PlaybackState::Idle);
        assert_eq!(player.position(), Duration::ZERO);
    }

    #[test]
    fn test_playback_error_display() {
        let err = PlaybackError::new("piano", MediaError::Start("device busy".into()));
        assert_eq!(
            err.to_string(),
            "playback error on piano: playback refused: device busy"
        );
    }
}
