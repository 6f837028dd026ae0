// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Band data model.
//!
//! This module provides:
//! - The immutable recording session
//! - Band member records with their generation state machine
//! - The roster and the pure selection filter used for combining
//! - The instrument catalog

pub mod instruments;
pub mod member;

pub use instruments::{Instrument, CATALOG};
pub use member::{BandMember, GenerationState, MemberView};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The user's recording session, fixed once analysis completes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Backend session identifier
    pub session_id: String,
    /// Instrument the user played
    pub user_instrument: String,
    /// Path of the MIDI extracted from the user's recording
    pub user_midi_reference: String,
    /// URI of the user's own audio, if it should be part of the band
    #[serde(default)]
    pub user_audio_reference: Option<String>,
}

impl Session {
    /// Create a session with a fresh identifier
    pub fn new(user_instrument: impl Into<String>, user_midi_reference: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            user_instrument: user_instrument.into(),
            user_midi_reference: user_midi_reference.into(),
            user_audio_reference: None,
        }
    }

    /// Set the session identifier
    pub fn with_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Attach the user's own recording
    pub fn with_user_audio(mut self, uri: impl Into<String>) -> Self {
        self.user_audio_reference = Some(uri.into());
        self
    }
}

/// Ordered list of band members with unique instrument keys
#[derive(Debug, Clone, Default)]
pub struct Roster {
    members: Vec<BandMember>,
    generation: u64,
}

impl Roster {
    /// Create an empty roster
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every member at once. Duplicate keys keep their first
    /// occurrence. Returns the new roster generation.
    pub fn replace(&mut self, members: Vec<BandMember>) -> u64 {
        let mut unique: Vec<BandMember> = Vec::with_capacity(members.len());
        for member in members {
            if !unique.iter().any(|m| m.instrument == member.instrument) {
                unique.push(member);
            }
        }
        self.members = unique;
        self.generation += 1;
        self.generation
    }

    /// Counter bumped by every replacement
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Members in roster order
    pub fn members(&self) -> &[BandMember] {
        &self.members
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the roster has no members
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Get a member by key
    pub fn get(&self, key: &str) -> Option<&BandMember> {
        self.members.iter().find(|m| m.instrument == key)
    }

    /// Get a mutable member by key
    pub fn get_mut(&mut self, key: &str) -> Option<&mut BandMember> {
        self.members.iter_mut().find(|m| m.instrument == key)
    }

    /// Find an AI member by case-insensitive instrument name
    pub fn find_ai_mut(&mut self, name: &str) -> Option<&mut BandMember> {
        let name = name.trim();
        self.members
            .iter_mut()
            .find(|m| !m.is_user_track() && m.instrument.eq_ignore_ascii_case(name))
    }

    /// AI members in roster order
    pub fn ai_members(&self) -> impl Iterator<Item = &BandMember> {
        self.members.iter().filter(|m| !m.is_user_track())
    }

    /// Views of every member
    pub fn views(&self) -> Vec<MemberView> {
        self.members.iter().map(BandMember::view).collect()
    }

    /// Members that would contribute to a combine right now
    pub fn selection(&self) -> MixSelection {
        let mut selection = MixSelection::default();
        for member in self.members.iter().filter(|m| m.is_mixable()) {
            let Some(artifact) = member.artifact() else {
                continue;
            };
            selection.keys.push(member.instrument.clone());
            if member.is_user_track() {
                selection.user_audio = Some(artifact.to_string());
            } else {
                selection.artifacts.push(artifact.to_string());
            }
        }
        selection
    }
}

/// Result of filtering the roster for a combine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MixSelection {
    /// Contributing keys in roster order (user track included)
    pub keys: Vec<String>,
    /// Artifacts of the selected AI members, in roster order
    pub artifacts: Vec<String>,
    /// The user's recording, when selected
    pub user_audio: Option<String>,
}

impl MixSelection {
    /// Whether no AI track is available to combine
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}
