//! Usage events
//!
//! Every state change the checker makes is recorded as a tagged event, in
//! program order. An accepted function yields its event list so a later
//! stage can tell moved-from, borrowed-from and untouched bindings apart
//! without re-running the analysis.

use tether_ir::{RefKind, Span};
use tracing::trace;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UsageEvent {
    Define {
        name: String,
        at: Span,
        linear: bool,
    },
    Consume {
        name: String,
        at: Span,
    },
    /// Non-consuming use through a path.
    Read {
        name: String,
        at: Span,
    },
    Borrow {
        name: String,
        kind: RefKind,
        region: String,
        at: Span,
    },
    Close {
        region: String,
        at: Span,
    },
}

impl UsageEvent {
    pub fn at(&self) -> Span {
        match self {
            UsageEvent::Define { at, .. }
            | UsageEvent::Consume { at, .. }
            | UsageEvent::Read { at, .. }
            | UsageEvent::Borrow { at, .. }
            | UsageEvent::Close { at, .. } => *at,
        }
    }
}

/// What happened to a binding over the whole function.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingFate {
    Moved,
    Borrowed,
    Untouched,
}

#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Vec<UsageEvent>,
}

impl EventLog {
    pub fn push(&mut self, event: UsageEvent) {
        trace!(?event, "usage");
        self.events.push(event);
    }

    pub fn into_events(self) -> Vec<UsageEvent> {
        self.events
    }
}

/// Usage record of one accepted function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionSummary {
    pub name: String,
    pub events: Vec<UsageEvent>,
}

impl FunctionSummary {
    /// Fate of every binding with this name; a move anywhere wins over a
    /// borrow.
    pub fn fate(&self, name: &str) -> BindingFate {
        let mut fate = BindingFate::Untouched;
        for event in &self.events {
            match event {
                UsageEvent::Consume { name: n, .. } if n == name => return BindingFate::Moved,
                UsageEvent::Borrow { name: n, .. } if n == name => fate = BindingFate::Borrowed,
                _ => {}
            }
        }
        fate
    }

    pub fn consumes(&self) -> impl Iterator<Item = &str> {
        self.events.iter().filter_map(|e| match e {
            UsageEvent::Consume { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }
}
