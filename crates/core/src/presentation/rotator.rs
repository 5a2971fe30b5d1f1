use std::sync::Arc;

use serde::Serialize;

use crate::suggestions::{RankedSuggestions, Suggestion};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "index")]
pub enum RotationState {
    Idle,
    Showing(usize),
}

/// Cycles through the ranked list one suggestion at a time.
///
/// Each call to [`Rotator::replace`] starts a new generation; a dismissal only
/// lasts until the next generation. Callers check [`Rotator::holds`] first so
/// an identical list does not count as a change.
#[derive(Debug, Clone)]
pub struct Rotator {
    state: RotationState,
    ranked: Option<Arc<RankedSuggestions>>,
    generation: u64,
    enabled: bool,
    dismissed: bool,
}

impl Default for Rotator {
    fn default() -> Self {
        Self { state: RotationState::Idle, ranked: None, generation: 0, enabled: true, dismissed: false }
    }
}

impl Rotator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RotationState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_dismissed(&self) -> bool {
        self.dismissed
    }

    pub fn len(&self) -> usize {
        self.ranked.as_ref().map_or(0, |ranked| ranked.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn current(&self) -> Option<&Suggestion> {
        match self.state {
            RotationState::Idle => None,
            RotationState::Showing(index) => {
                self.ranked.as_ref().and_then(|ranked| ranked.suggestions.get(index))
            }
        }
    }

    /// Whether the installed list already has exactly these suggestions.
    pub fn holds(&self, suggestions: &[Suggestion]) -> bool {
        self.ranked.as_ref().is_some_and(|ranked| ranked.suggestions == suggestions)
    }

    /// True while there is more than one suggestion to cycle through.
    pub fn needs_ticks(&self) -> bool {
        matches!(self.state, RotationState::Showing(_)) && self.len() > 1
    }

    /// Installs a new ranked list and restarts from its first entry.
    pub fn replace(&mut self, ranked: Arc<RankedSuggestions>) -> RotationState {
        self.ranked = Some(ranked);
        self.generation += 1;
        self.dismissed = false;
        self.state = self.initial_state();
        self.state
    }

    pub fn set_enabled(&mut self, enabled: bool) -> RotationState {
        if self.enabled != enabled {
            self.enabled = enabled;
            self.state = if enabled && !self.dismissed { self.initial_state() } else { RotationState::Idle };
        }
        self.state
    }

    /// Advances to the next suggestion, wrapping around.
    pub fn tick(&mut self) -> RotationState {
        if let RotationState::Showing(index) = self.state {
            let len = self.len();
            if len > 1 {
                self.state = RotationState::Showing((index + 1) % len);
            }
        }
        self.state
    }

    /// Hides suggestions until the ranked list changes.
    pub fn dismiss(&mut self) -> RotationState {
        self.dismissed = true;
        self.state = RotationState::Idle;
        self.state
    }

    fn initial_state(&self) -> RotationState {
        if self.enabled && !self.is_empty() {
            RotationState::Showing(0)
        } else {
            RotationState::Idle
        }
    }
}
