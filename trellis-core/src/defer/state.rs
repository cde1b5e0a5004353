//! The fragment state machine.
//!
//! ```text
//! Placeholder --trigger--> Loading --resolved--> Ready
//!                                  \--failed---> Error
//! ```
//!
//! `Ready` and `Error` are terminal. Retrying means registering a new
//! fragment.

use std::fmt;

use super::trigger::{FragmentId, HostEvent, Trigger};

/// Where a fragment is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentState {
    Placeholder,
    Loading,
    Ready,
    Error,
}

impl FragmentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FragmentState::Ready | FragmentState::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FragmentState::Placeholder => "placeholder",
            FragmentState::Loading => "loading",
            FragmentState::Ready => "ready",
            FragmentState::Error => "error",
        }
    }
}

impl fmt::Display for FragmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentEvent {
    Host(HostEvent),
    LoadResolved,
    LoadFailed,
}

/// Compute the next state, or `None` if `event` does not move the fragment.
pub fn advance(
    state: FragmentState,
    trigger: &Trigger,
    fragment: FragmentId,
    event: &FragmentEvent,
) -> Option<FragmentState> {
    match (state, event) {
        (FragmentState::Placeholder, FragmentEvent::Host(host)) => trigger
            .is_satisfied_by(fragment, host)
            .then_some(FragmentState::Loading),
        (FragmentState::Loading, FragmentEvent::LoadResolved) => Some(FragmentState::Ready),
        (FragmentState::Loading, FragmentEvent::LoadFailed) => Some(FragmentState::Error),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn timer_fragment_waits_for_full_duration() {
        let fragment = FragmentId::new();
        let trigger = Trigger::Timer(Duration::from_millis(10_000));
        let tick = |ms| {
            FragmentEvent::Host(HostEvent::TimerElapsed {
                fragment,
                elapsed: Duration::from_millis(ms),
            })
        };

        assert_eq!(advance(FragmentState::Placeholder, &trigger, fragment, &tick(9_999)), None);
        assert_eq!(
            advance(FragmentState::Placeholder, &trigger, fragment, &tick(10_000)),
            Some(FragmentState::Loading)
        );
        assert_eq!(
            advance(FragmentState::Loading, &trigger, fragment, &FragmentEvent::LoadResolved),
            Some(FragmentState::Ready)
        );
    }

    #[test]
    fn second_trigger_is_ignored_once_loading() {
        let fragment = FragmentId::new();
        let trigger = Trigger::Interaction("button".into());
        let click = FragmentEvent::Host(HostEvent::Interaction("button".into()));

        let state = advance(FragmentState::Placeholder, &trigger, fragment, &click);
        assert_eq!(state, Some(FragmentState::Loading));
        assert_eq!(advance(FragmentState::Loading, &trigger, fragment, &click), None);
    }

    #[test]
    fn terminal_states_do_not_move() {
        let fragment = FragmentId::new();
        let trigger = Trigger::IdlePrefetch;
        let events = [
            FragmentEvent::Host(HostEvent::Idle),
            FragmentEvent::LoadResolved,
            FragmentEvent::LoadFailed,
        ];

        for state in [FragmentState::Ready, FragmentState::Error] {
            assert!(state.is_terminal());
            for event in &events {
                assert_eq!(advance(state, &trigger, fragment, event), None);
            }
        }
    }

    #[test]
    fn load_outcome_ignored_before_trigger() {
        let fragment = FragmentId::new();
        assert_eq!(
            advance(FragmentState::Placeholder, &Trigger::Viewport, fragment, &FragmentEvent::LoadResolved),
            None
        );
    }

    #[test]
    fn failed_load_ends_in_error() {
        let fragment = FragmentId::new();
        assert_eq!(
            advance(FragmentState::Loading, &Trigger::Viewport, fragment, &FragmentEvent::LoadFailed),
            Some(FragmentState::Error)
        );
    }
}
