// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Playback controller with global exclusivity.
//!
//! Owns every registered playback resource, keyed by logical track name,
//! and the single "currently playing" pointer. All check-and-set work on
//! the pointer happens under one lock, so at most one resource is playing
//! whenever the registry is observed.
//!
//! Resources report their own state changes through events. The controller
//! queues those events and reconciles them against the resource's actual
//! state before every operation, which keeps the pointer honest when a
//! track ends, errors, or is paused from outside.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::lock;

use super::{
    MediaBackend, MediaError, Playable, PlaybackError, PlaybackEvent, PlaybackState,
    SubscriptionId,
};

/// Event tagged with the key and serial of the resource that emitted it
type TaggedEvent = (String, u64, PlaybackEvent);

struct Resource {
    source_uri: String,
    player: Box<dyn Playable>,
    subscription: SubscriptionId,
    serial: u64,
}

impl Resource {
    fn release(mut self) {
        self.player.stop();
        self.player.unsubscribe(self.subscription);
    }
}

struct Registry {
    resources: HashMap<String, Resource>,
    current: Option<String>,
    next_serial: u64,
    events: Receiver<TaggedEvent>,
}

impl Registry {
    /// Apply queued resource events
    fn reconcile(&mut self) {
        while let Ok((key, serial, event)) = self.events.try_recv() {
            let Some(resource) = self.resources.get(&key) else {
                continue;
            };
            if resource.serial != serial {
                continue;
            }
            let is_current = self.current.as_deref() == Some(key.as_str());
            match event {
                PlaybackEvent::Error(message) => {
                    warn!(key = %key, error = %message, "playback resource reported an error");
                    if is_current {
                        self.current = None;
                    }
                }
                PlaybackEvent::Pause | PlaybackEvent::Ended => {
                    if is_current && resource.player.is_paused() {
                        debug!(key = %key, "current track stopped on its own");
                        self.current = None;
                    }
                }
                PlaybackEvent::Play => {
                    if !is_current && !resource.player.is_paused() {
                        debug!(key = %key, "track started outside the controller");
                        if let Some(previous) = self.current.take() {
                            if let Some(other) = self.resources.get_mut(&previous) {
                                other.player.stop();
                            }
                        }
                        self.current = Some(key);
                    }
                }
            }
        }
    }
}

/// Registry of playable tracks enforcing that at most one plays at a time
pub struct PlaybackController {
    backend: Arc<dyn MediaBackend>,
    registry: Mutex<Registry>,
    events: Sender<TaggedEvent>,
}

impl PlaybackController {
    /// Create a controller that opens media through `backend`
    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        let (events, receiver) = mpsc::channel();
        Self {
            backend,
            registry: Mutex::new(Registry {
                resources: HashMap::new(),
                current: None,
                next_serial: 0,
                events: receiver,
            }),
            events,
        }
    }

    /// Install a resource for `key`, replacing and releasing any previous one.
    ///
    /// The new media is opened before the old resource is touched, so a
    /// load failure leaves the previous registration intact.
    pub fn register(&self, key: &str, source_uri: &str) -> Result<(), PlaybackError> {
        let mut player = self
            .backend
            .open(source_uri)
            .map_err(|cause| PlaybackError::new(key, cause))?;

        let mut registry = lock(&self.registry);
        registry.reconcile();

        registry.next_serial += 1;
        let serial = registry.next_serial;
        let sender = self.events.clone();
        let tag = key.to_string();
        let subscription = player.subscribe(Box::new(move |event| {
            let _ = sender.send((tag.clone(), serial, event.clone()));
        }));

        let resource = Resource {
            source_uri: source_uri.to_string(),
            player,
            subscription,
            serial,
        };

        if let Some(previous) = registry.resources.insert(key.to_string(), resource) {
            if registry.current.as_deref() == Some(key) {
                registry.current = None;
            }
            debug!(key = %key, old = %previous.source_uri, "replacing playback resource");
            previous.release();
        }
        info!(key = %key, uri = %source_uri, "registered playback resource");
        Ok(())
    }

    /// Stop and remove the resource for `key`
    pub fn unregister(&self, key: &str) -> bool {
        let mut registry = lock(&self.registry);
        registry.reconcile();
        match registry.resources.remove(key) {
            Some(resource) => {
                if registry.current.as_deref() == Some(key) {
                    registry.current = None;
                }
                resource.release();
                debug!(key = %key, "released playback resource");
                true
            }
            None => false,
        }
    }

    /// Play `key`, or pause it if it is already playing.
    ///
    /// Pausing keeps the position so the next toggle resumes in place.
    /// Starting a track stops (and rewinds) whichever other track held the
    /// slot. If the track refuses to start, nothing else is affected.
    pub fn toggle(&self, key: &str) -> Result<PlaybackState, PlaybackError> {
        let mut registry = lock(&self.registry);
        registry.reconcile();

        if !registry.resources.contains_key(key) {
            return Err(PlaybackError::new(key, MediaError::NotRegistered));
        }

        if registry.current.as_deref() == Some(key) {
            if let Some(resource) = registry.resources.get_mut(key) {
                resource.player.pause();
            }
            registry.current = None;
            // Drop the echo of our own pause
            registry.reconcile();
            debug!(key = %key, "paused");
            return Ok(PlaybackState::Paused);
        }

        if let Some(resource) = registry.resources.get_mut(key) {
            resource
                .player
                .play()
                .map_err(|cause| PlaybackError::new(key, cause))?;
        }

        if let Some(previous) = registry.current.take() {
            if let Some(other) = registry.resources.get_mut(&previous) {
                other.player.stop();
            }
            debug!(from = %previous, to = %key, "handing over playback");
        }
        registry.current = Some(key.to_string());
        registry.reconcile();
        info!(key = %key, "playing");
        Ok(PlaybackState::Playing)
    }

    /// Stop (pause and rewind) a single track
    pub fn stop(&self, key: &str) {
        let mut registry = lock(&self.registry);
        registry.reconcile();
        if let Some(resource) = registry.resources.get_mut(key) {
            resource.player.stop();
        }
        if registry.current.as_deref() == Some(key) {
            registry.current = None;
        }
        registry.reconcile();
    }

    /// Stop every registered track and clear the pointer
    pub fn stop_all(&self) {
        let mut registry = lock(&self.registry);
        registry.reconcile();
        for resource in registry.resources.values_mut() {
            resource.player.stop();
        }
        registry.current = None;
        registry.reconcile();
        debug!("stopped all playback");
    }

    /// Key of the track currently playing
    pub fn currently_playing(&self) -> Option<String> {
        let mut registry = lock(&self.registry);
        registry.reconcile();
        registry.current.clone()
    }

    /// Playback state of `key`
    pub fn state(&self, key: &str) -> Option<PlaybackState> {
        let mut registry = lock(&self.registry);
        registry.reconcile();
        registry.resources.get(key).map(|r| r.player.state())
    }

    /// Playback position of `key`
    pub fn position(&self, key: &str) -> Option<Duration> {
        lock(&self.registry)
            .resources
            .get(key)
            .map(|r| r.player.position())
    }

    /// Move the playback position of `key`
    pub fn seek(&self, key: &str, position: Duration) -> Result<(), PlaybackError> {
        let mut registry = lock(&self.registry);
        let resource = registry
            .resources
            .get_mut(key)
            .ok_or_else(|| PlaybackError::new(key, MediaError::NotRegistered))?;
        resource.player.set_position(position);
        Ok(())
    }

    /// Source URI registered for `key`
    pub fn source_uri(&self, key: &str) -> Option<String> {
        lock(&self.registry)
            .resources
            .get(key)
            .map(|r| r.source_uri.clone())
    }

    /// Registered keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.registry).resources.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        let registry = match self.registry.get_mut() {
            Ok(registry) => registry,
            Err(poisoned) => poisoned.into_inner(),
        };
        for (_, resource) in registry.resources.drain() {
            resource.release();
        }
        registry.current = None;
    }
}
