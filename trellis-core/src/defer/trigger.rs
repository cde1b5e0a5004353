//! Triggers and host events.
//!
//! A [`Trigger`] says what has to happen before a fragment starts loading.
//! A [`HostEvent`] is the host telling the core that something happened.
//! Detecting the event (layout, input, idle callbacks) is the host's job;
//! matching it against a trigger is ours.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Identifier of a registered deferred fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FragmentId(u64);

impl FragmentId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for FragmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fragment#{}", self.0)
    }
}

/// A named element in the host's view, e.g. a button a trigger listens on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(Arc<str>);

impl ElementRef {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ElementRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The condition that starts a fragment loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// The fragment's bounds intersect the visible region.
    Viewport,

    /// The element receives a primary activation (click, tap, Enter).
    Interaction(ElementRef),

    /// The pointer enters the element.
    Hover(ElementRef),

    /// The duration has passed since registration.
    Timer(Duration),

    /// The host has nothing better to do. Unlike the other triggers this is
    /// not driven by the user, so the fragment may load before it is shown.
    IdlePrefetch,

    /// Load as soon as the fragment is registered.
    Immediate,
}

impl Trigger {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Trigger::Viewport => "viewport",
            Trigger::Interaction(_) => "interaction",
            Trigger::Hover(_) => "hover",
            Trigger::Timer(_) => "timer",
            Trigger::IdlePrefetch => "idle-prefetch",
            Trigger::Immediate => "immediate",
        }
    }

    /// Whether `event` satisfies this trigger for the given fragment.
    pub fn is_satisfied_by(&self, fragment: FragmentId, event: &HostEvent) -> bool {
        match (self, event) {
            (Trigger::Viewport, HostEvent::EnteredViewport(id)) => *id == fragment,
            (Trigger::Interaction(element), HostEvent::Interaction(target)) => element == target,
            (Trigger::Hover(element), HostEvent::PointerEnter(target)) => element == target,
            (Trigger::Timer(duration), HostEvent::TimerElapsed { fragment: id, elapsed }) => {
                *id == fragment && elapsed >= duration
            }
            (Trigger::IdlePrefetch, HostEvent::Idle) => true,
            (Trigger::Immediate, HostEvent::Mounted(id)) => *id == fragment,
            _ => false,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Interaction(element) => write!(f, "interaction({element})"),
            Trigger::Hover(element) => write!(f, "hover({element})"),
            Trigger::Timer(duration) => write!(f, "timer({}ms)", duration.as_millis()),
            other => f.write_str(other.kind()),
        }
    }
}

/// Something the host observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    EnteredViewport(FragmentId),
    Interaction(ElementRef),
    PointerEnter(ElementRef),

    /// Time since the fragment was registered. Delivered by the controller's
    /// own timer for `Trigger::Timer` fragments.
    TimerElapsed { fragment: FragmentId, elapsed: Duration },

    Idle,

    /// The fragment was registered.
    Mounted(FragmentId),
}
