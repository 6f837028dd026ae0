// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Band member records and their generation state machine.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Generation lifecycle of a band member
///
/// ```text
/// NotGenerated -> Generating -> {Generated, Failed}
/// Generated    -> Generating -> {Generated, Failed}   (regenerate)
/// Failed       -> Generating -> {Generated, Failed}   (retry)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationState {
    /// No track requested yet
    NotGenerated,
    /// A generation call is in flight
    Generating,
    /// An artifact is available
    Generated,
    /// The last generation failed and no artifact exists
    Failed,
}

impl Default for GenerationState {
    fn default() -> Self {
        GenerationState::NotGenerated
    }
}

impl GenerationState {
    /// Check whether `next` is a legal successor of this state
    pub fn can_transition_to(self, next: GenerationState) -> bool {
        use GenerationState::*;
        matches!(
            (self, next),
            (NotGenerated | Generated | Failed, Generating) | (Generating, Generated | Failed)
        )
    }

    /// Whether a generation call is in flight
    pub fn is_busy(self) -> bool {
        self == GenerationState::Generating
    }
}

/// One instrument's generation record
#[derive(Debug, Clone, PartialEq)]
pub struct BandMember {
    /// Instrument name, unique within a roster
    pub instrument: String,
    /// Prompt sent with the next generation call
    pub prompt: String,
    state: GenerationState,
    artifact: Option<String>,
    selected: bool,
    epoch: u64,
    user_track: bool,
    last_error: Option<String>,
}

impl BandMember {
    /// Create an AI member that has not been generated yet
    pub fn new(instrument: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            prompt: prompt.into(),
            state: GenerationState::NotGenerated,
            artifact: None,
            selected: true,
            epoch: 0,
            user_track: false,
            last_error: None,
        }
    }

    /// Create the pseudo-member for the user's own recording
    pub fn user_track(key: impl Into<String>, audio_uri: impl Into<String>) -> Self {
        Self {
            instrument: key.into(),
            prompt: String::new(),
            state: GenerationState::Generated,
            artifact: Some(audio_uri.into()),
            selected: true,
            epoch: 0,
            user_track: true,
            last_error: None,
        }
    }

    /// Current generation state
    pub fn state(&self) -> GenerationState {
        self.state
    }

    /// URI of the current artifact
    pub fn artifact(&self) -> Option<&str> {
        self.artifact.as_deref()
    }

    /// Whether this member takes part in the next combine
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Current generation epoch
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether this is the user's pre-recorded track
    pub fn is_user_track(&self) -> bool {
        self.user_track
    }

    /// Message from the most recent failed generation
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether the member contributes an artifact to a combine
    pub fn is_mixable(&self) -> bool {
        self.selected && self.state == GenerationState::Generated && self.artifact.is_some()
    }

    /// Toggle selection. Only a generated AI member can change; returns the
    /// resulting selection.
    pub fn toggle_selection(&mut self) -> bool {
        if self.state == GenerationState::Generated && !self.user_track {
            self.selected = !self.selected;
        }
        self.selected
    }

    /// Enter `Generating` and return the new epoch
    pub fn begin_generation(&mut self) -> u64 {
        self.epoch += 1;
        if self.state != GenerationState::Generating {
            self.transition(GenerationState::Generating);
        }
        self.epoch
    }

    /// Apply a successful generation
    pub fn finish_generation(&mut self, artifact: impl Into<String>) {
        if self.transition(GenerationState::Generated) {
            self.artifact = Some(artifact.into());
            self.last_error = None;
        }
    }

    /// Apply a failed generation. A member that already held an artifact
    /// keeps it and returns to `Generated`.
    pub fn fail_generation(&mut self, message: impl Into<String>) {
        let next = if self.artifact.is_some() {
            GenerationState::Generated
        } else {
            GenerationState::Failed
        };
        if self.transition(next) {
            self.last_error = Some(message.into());
        }
    }

    fn transition(&mut self, next: GenerationState) -> bool {
        if self.state.can_transition_to(next) {
            self.state = next;
            true
        } else {
            warn!(
                instrument = %self.instrument,
                from = ?self.state,
                to = ?next,
                "rejected illegal generation transition"
            );
            false
        }
    }

    /// Read-only view for observers
    pub fn view(&self) -> MemberView {
        MemberView {
            instrument: self.instrument.clone(),
            prompt: self.prompt.clone(),
            generation_state: self.state,
            artifact_uri: self.artifact.clone(),
            is_selected: self.selected,
            is_user_track: self.user_track,
        }
    }
}

/// Snapshot of a member exposed to the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberView {
    /// Instrument key
    pub instrument: String,
    /// Current prompt
    pub prompt: String,
    /// Generation state
    pub generation_state: GenerationState,
    /// Current artifact
    pub artifact_uri: Option<String>,
    /// Selection for the final mix
    pub is_selected: bool,
    /// Whether this is the user's own recording
    #[serde(default)]
    pub is_user_track: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use GenerationState::*;
        assert!(NotGenerated.can_transition_to(Generating));
        assert!(Generated.can_transition_to(Generating));
        assert!(Failed.can_transition_to(Generating));
        assert!(Generating.can_transition_to(Generated));
        assert!(Generating.can_transition_to(Failed));

        assert!(!NotGenerated.can_transition_to(Generated));
        assert!(!Generated.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(NotGenerated));
        assert!(!Generating.can_transition_to(NotGenerated));
    }

    #[test]
    fn test_generation_cycle() {
        let mut member = BandMember::new("piano", "bright");
        assert_eq!(member.state(), GenerationState::NotGenerated);
        assert!(member.is_selected());

        let epoch = member.begin_generation();
        assert_eq!(epoch, 1);
        assert_eq!(member.state(), GenerationState::Generating);

        member.finish_generation("a.wav");
        assert_eq!(member.state(), GenerationState::Generated);
        assert_eq!(member.artifact(), Some("a.wav"));
    }

    #[test]
    fn test_failure_without_artifact_marks_failed() {
        let mut member = BandMember::new("drums", "");
        member.begin_generation();
        member.fail_generation("timeout");
        assert_eq!(member.state(), GenerationState::Failed);
        assert_eq!(member.last_error(), Some("timeout"));
        assert_eq!(member.artifact(), None);
    }

    #[test]
    fn test_failed_regeneration_keeps_previous_artifact() {
        let mut member = BandMember::new("bass", "");
        member.begin_generation();
        member.finish_generation("first.wav");

        member.begin_generation();
        member.fail_generation("backend down");
        assert_eq!(member.state(), GenerationState::Generated);
        assert_eq!(member.artifact(), Some("first.wav"));
    }

    #[test]
    fn test_reentry_bumps_epoch_only() {
        let mut member = BandMember::new("guitar", "");
        assert_eq!(member.begin_generation(), 1);
        assert_eq!(member.begin_generation(), 2);
        assert_eq!(member.state(), GenerationState::Generating);
    }

    #[test]
    fn test_selection_only_when_generated() {
        let mut member = BandMember::new("flute", "");
        assert!(member.toggle_selection());
        assert!(member.is_selected());

        member.begin_generation();
        member.finish_generation("f.wav");
        assert!(!member.toggle_selection());
        assert!(member.toggle_selection());
    }

    #[test]
    fn test_user_track_is_fixed() {
        let mut user = BandMember::user_track("user:piano", "mine.wav");
        assert_eq!(user.state(), GenerationState::Generated);
        assert!(user.is_user_track());
        assert!(user.toggle_selection());
        assert!(user.is_mixable());
    }

    #[test]
    fn test_finish_without_generating_is_rejected() {
        let mut member = BandMember::new("cello", "");
        member.finish_generation("x.wav");
        assert_eq!(member.state(), GenerationState::NotGenerated);
        assert_eq!(member.artifact(), None);
    }
}
