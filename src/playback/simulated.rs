// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Simulated media backend.
//!
//! Players keep a position that only moves when advanced explicitly, so
//! playback behaviour is deterministic. Every opened player can be
//! inspected and driven through a [`SimulatedHandle`], which is how the
//! headless CLI and the tests observe what the controller did.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::lock;

use super::{MediaBackend, MediaError, Playable, PlaybackEvent, PlaybackListener, SubscriptionId};

struct SimState {
    uri: String,
    paused: bool,
    position: Duration,
    length: Option<Duration>,
    listeners: Vec<(SubscriptionId, PlaybackListener)>,
    next_subscription: u64,
    refuse_play: bool,
}

impl SimState {
    fn emit(&self, event: PlaybackEvent) {
        for (_, listener) in &self.listeners {
            listener(&event);
        }
    }
}

/// A player with a manually advanced clock
pub struct SimulatedPlayer {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedPlayer {
    fn new(length: Option<Duration>, refuse_play: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                uri: String::new(),
                paused: true,
                position: Duration::ZERO,
                length,
                listeners: Vec::new(),
                next_subscription: 0,
                refuse_play,
            })),
        }
    }

    /// Handle sharing this player's state
    pub fn handle(&self) -> SimulatedHandle {
        SimulatedHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Playable for SimulatedPlayer {
    fn load(&mut self, uri: &str) -> Result<(), MediaError> {
        if uri.trim().is_empty() {
            return Err(MediaError::Load {
                uri: uri.to_string(),
                reason: "empty uri".to_string(),
            });
        }
        let mut state = lock(&self.state);
        state.uri = uri.to_string();
        state.paused = true;
        state.position = Duration::ZERO;
        Ok(())
    }

    fn play(&mut self) -> Result<(), MediaError> {
        let mut state = lock(&self.state);
        if state.refuse_play {
            let message = format!("cannot decode {}", state.uri);
            state.emit(PlaybackEvent::Error(message.clone()));
            return Err(MediaError::Start(message));
        }
        if state.paused {
            state.paused = false;
            state.emit(PlaybackEvent::Play);
        }
        Ok(())
    }

    fn pause(&mut self) {
        let mut state = lock(&self.state);
        if !state.paused {
            state.paused = true;
            state.emit(PlaybackEvent::Pause);
        }
    }

    fn is_paused(&self) -> bool {
        lock(&self.state).paused
    }

    fn position(&self) -> Duration {
        lock(&self.state).position
    }

    fn set_position(&mut self, position: Duration) {
        let mut state = lock(&self.state);
        state.position = match state.length {
            Some(length) => position.min(length),
            None => position,
        };
    }

    fn subscribe(&mut self, listener: PlaybackListener) -> SubscriptionId {
        let mut state = lock(&self.state);
        state.next_subscription += 1;
        let id = SubscriptionId(state.next_subscription);
        state.listeners.push((id, listener));
        id
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        lock(&self.state).listeners.retain(|(existing, _)| *existing != id);
    }
}

/// Inspection and control handle for a simulated player
#[derive(Clone)]
pub struct SimulatedHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedHandle {
    /// URI loaded into the player
    pub fn uri(&self) -> String {
        lock(&self.state).uri.clone()
    }

    /// Whether the player is paused
    pub fn is_paused(&self) -> bool {
        lock(&self.state).paused
    }

    /// Current position
    pub fn position(&self) -> Duration {
        lock(&self.state).position
    }

    /// Number of attached listeners
    pub fn listener_count(&self) -> usize {
        lock(&self.state).listeners.len()
    }

    /// Advance the clock of a playing player. Reaching the media length
    /// pauses the player and emits `Ended`.
    pub fn advance(&self, by: Duration) {
        let mut state = lock(&self.state);
        if state.paused {
            return;
        }
        state.position += by;
        if let Some(length) = state.length {
            if state.position >= length {
                state.position = length;
                state.paused = true;
                state.emit(PlaybackEvent::Pause);
                state.emit(PlaybackEvent::Ended);
            }
        }
    }

    /// Pause from outside the controller (e.g. a hardware media key)
    pub fn pause_externally(&self) {
        let mut state = lock(&self.state);
        if !state.paused {
            state.paused = true;
            state.emit(PlaybackEvent::Pause);
        }
    }

    /// Start from outside the controller
    pub fn play_externally(&self) {
        let mut state = lock(&self.state);
        if state.paused {
            state.paused = false;
            state.emit(PlaybackEvent::Play);
        }
    }

    /// Simulate a decoding failure mid-playback
    pub fn fail(&self, message: &str) {
        let mut state = lock(&self.state);
        state.paused = true;
        state.emit(PlaybackEvent::Error(message.to_string()));
    }
}

/// Backend producing [`SimulatedPlayer`]s
#[derive(Default)]
pub struct SimulatedBackend {
    opened: Mutex<Vec<SimulatedHandle>>,
    refuse_play: Mutex<HashSet<String>>,
    refuse_load: Mutex<HashSet<String>>,
    length: Option<Duration>,
}

impl SimulatedBackend {
    /// Create a backend whose media never ends
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend whose media all have the given length
    pub fn with_length(length: Duration) -> Self {
        Self {
            length: Some(length),
            ..Self::default()
        }
    }

    /// Make players for `uri` refuse to start
    pub fn refuse_playback_of(&self, uri: impl Into<String>) {
        lock(&self.refuse_play).insert(uri.into());
    }

    /// Make `uri` fail to load
    pub fn refuse_loading_of(&self, uri: impl Into<String>) {
        lock(&self.refuse_load).insert(uri.into());
    }

    /// Handles of every player opened so far, in order
    pub fn handles(&self) -> Vec<SimulatedHandle> {
        lock(&self.opened).clone()
    }

    /// Most recently opened player for `uri`
    pub fn handle_for(&self, uri: &str) -> Option<SimulatedHandle> {
        lock(&self.opened)
            .iter()
            .rev()
            .find(|handle| handle.uri() == uri)
            .cloned()
    }

    /// Number of players currently playing
    pub fn playing_count(&self) -> usize {
        lock(&self.opened).iter().filter(|h| !h.is_paused()).count()
    }
}

impl MediaBackend for SimulatedBackend {
    fn open(&self, uri: &str) -> Result<Box<dyn Playable>, MediaError> {
        if lock(&self.refuse_load).contains(uri) {
            return Err(MediaError::Load {
                uri: uri.to_string(),
                reason: "unsupported format".to_string(),
            });
        }
        let refuse_play = lock(&self.refuse_play).contains(uri);
        let mut player = SimulatedPlayer::new(self.length, refuse_play);
        player.load(uri)?;
        lock(&self.opened).push(player.handle());
        Ok(Box::new(player))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_events_reach_subscribers() {
        let backend = SimulatedBackend::new();
        let mut player = backend.open("a.wav").unwrap();
        let (tx, rx) = mpsc::channel();
        let id = player.subscribe(Box::new(move |event| {
            let _ = tx.send(event.clone());
        }));

        player.play().unwrap();
        player.pause();
        player.unsubscribe(id);
        player.play().unwrap();

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events, vec![PlaybackEvent::Play, PlaybackEvent::Pause]);
    }

    #[test]
    fn test_advance_only_when_playing() {
        let backend = SimulatedBackend::new();
        let mut player = backend.open("a.wav").unwrap();
        let handle = backend.handle_for("a.wav").unwrap();

        handle.advance(Duration::from_secs(1));
        assert_eq!(handle.position(), Duration::ZERO);

        player.play().unwrap();
        handle.advance(Duration::from_secs(1));
        assert_eq!(player.position(), Duration::from_secs(1));
    }

    #[test]
    fn test_reaching_length_ends_playback() {
        let backend = SimulatedBackend::with_length(Duration::from_secs(3));
        let mut player = backend.open("a.wav").unwrap();
        let handle = backend.handle_for("a.wav").unwrap();
        let (tx, rx) = mpsc::channel();
        player.subscribe(Box::new(move |event| {
            let _ = tx.send(event.clone());
        }));

        player.play().unwrap();
        handle.advance(Duration::from_secs(5));
        assert!(player.is_paused());
        assert_eq!(player.position(), Duration::from_secs(3));
        assert!(rx.try_iter().any(|e| e == PlaybackEvent::Ended));
    }

    #[test]
    fn test_refusals() {
        let backend = SimulatedBackend::new();
        backend.refuse_loading_of("bad.wav");
        backend.refuse_playback_of("mute.wav");

        assert!(matches!(backend.open("bad.wav"), Err(MediaError::Load { .. })));

        let mut player = backend.open("mute.wav").unwrap();
        assert!(matches!(player.play(), Err(MediaError::Start(_))));
        assert!(player.is_paused());
    }
}
