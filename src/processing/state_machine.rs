//! Generic whitelist state machine
//!
//! States plus an explicit set of allowed `(from, to)` transitions, a
//! history log and per-state entry callbacks. Milestones do not use this
//! (their state follows payload content); it drives auxiliary workflows
//! such as the service lifecycle.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One applied transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateTransition<S> {
    pub from_state: S,
    pub to_state: S,
    pub condition: Option<String>,
    pub timestamp: DateTime<Utc>,
}

type Callback<S> = Box<dyn Fn(&StateTransition<S>) + Send + Sync>;

pub struct StateMachine<S> {
    current: S,
    initial: S,
    allowed: HashMap<S, Vec<S>>,
    history: Vec<StateTransition<S>>,
    callbacks: HashMap<S, Vec<Callback<S>>>,
}

impl<S: fmt::Debug> fmt::Debug for StateMachine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("current", &self.current)
            .field("initial", &self.initial)
            .field("history_len", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl<S> StateMachine<S>
where
    S: Clone + Eq + Hash,
{
    pub fn new(initial: S) -> Self {
        Self {
            current: initial.clone(),
            initial,
            allowed: HashMap::new(),
            history: Vec::new(),
            callbacks: HashMap::new(),
        }
    }

    /// Allow `from → to`. Adding the same pair twice is a no-op.
    pub fn add_transition(&mut self, from: S, to: S) {
        let targets = self.allowed.entry(from).or_default();
        if !targets.contains(&to) {
            targets.push(to);
        }
    }

    pub fn can_transition(&self, to: &S) -> bool {
        self.allowed
            .get(&self.current)
            .is_some_and(|targets| targets.contains(to))
    }

    /// Move to `to` if allowed, recording the transition and firing the
    /// callbacks registered for `to`.
    pub fn transition(&mut self, to: S, condition: Option<&str>) -> bool {
        if !self.can_transition(&to) {
            return false;
        }

        let transition = StateTransition {
            from_state: self.current.clone(),
            to_state: to.clone(),
            condition: condition.map(str::to_string),
            timestamp: Utc::now(),
        };
        self.current = to;

        if let Some(callbacks) = self.callbacks.get(&transition.to_state) {
            for callback in callbacks {
                callback(&transition);
            }
        }
        self.history.push(transition);
        true
    }

    /// Run `callback` whenever `state` is entered.
    pub fn register_callback<F>(&mut self, state: S, callback: F)
    where
        F: Fn(&StateTransition<S>) + Send + Sync + 'static,
    {
        self.callbacks
            .entry(state)
            .or_default()
            .push(Box::new(callback));
    }

    pub fn current(&self) -> &S {
        &self.current
    }

    pub fn history(&self) -> &[StateTransition<S>] {
        &self.history
    }

    /// Back to the initial state with an empty history. Allowed
    /// transitions and callbacks are kept.
    pub fn reset(&mut self) {
        self.current = self.initial.clone();
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn countdown() -> StateMachine<&'static str> {
        let mut sm = StateMachine::new("idle");
        sm.add_transition("idle", "running");
        sm.add_transition("running", "hold");
        sm.add_transition("hold", "running");
        sm
    }

    #[test]
    fn test_allowed_transition_recorded() {
        let mut sm = countdown();
        assert!(sm.transition("running", Some("operator go")));
        assert_eq!(*sm.current(), "running");

        let history = sm.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from_state, "idle");
        assert_eq!(history[0].to_state, "running");
        assert_eq!(history[0].condition.as_deref(), Some("operator go"));
    }

    #[test]
    fn test_disallowed_transition_rejected() {
        let mut sm = countdown();
        assert!(!sm.can_transition(&"hold"));
        assert!(!sm.transition("hold", None));
        assert_eq!(*sm.current(), "idle");
        assert!(sm.history().is_empty());
    }

    #[test]
    fn test_unknown_source_state_has_no_transitions() {
        let mut sm = StateMachine::new("orphan");
        assert!(!sm.transition("anything", None));
    }

    #[test]
    fn test_duplicate_transition_added_once() {
        let mut sm = countdown();
        sm.add_transition("idle", "running");
        assert_eq!(sm.allowed["idle"], vec!["running"]);
    }

    #[test]
    fn test_callbacks_fire_on_entry() {
        let mut sm = countdown();
        let entered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&entered);
        sm.register_callback("running", move |t| {
            assert_eq!(t.to_state, "running");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        sm.transition("running", None);
        sm.transition("hold", None);
        sm.transition("running", None);
        assert_eq!(entered.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut sm = countdown();
        sm.transition("running", None);
        sm.reset();
        assert_eq!(*sm.current(), "idle");
        assert!(sm.history().is_empty());
        assert!(sm.transition("running", None));
    }
}
