//! Append-only deployment state history.
//!
//! The history is the single source of truth for where a deployment is in
//! its lifecycle. It only ever grows: entries are never reordered or
//! removed, the first entry is always `Initialized` and the current state
//! is the last entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{DeploymentCreated, DeploymentState, LeaseCreated};
use crate::error::{Error, Result};

/// Nanoseconds since the Unix epoch, as stamped by the authority.
pub type TimestampNs = u64;

/// One `(timestamp, state)` pair.
pub type HistoryEntry = (TimestampNs, DeploymentState);

/// Current wall-clock time in nanoseconds.
pub fn now_ns() -> TimestampNs {
    Utc::now()
        .timestamp_nanos_opt()
        .and_then(|ns| u64::try_from(ns).ok())
        .unwrap_or_default()
}

/// Ordered list of state transitions.
///
/// [`append`](Self::append) enforces the lifecycle. Histories decoded from
/// the authority are only required to start with `Initialized`: the
/// authority records failures unconditionally, so a stored history may hold
/// sequences the client would never build itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<HistoryEntry>", into = "Vec<HistoryEntry>")]
pub struct StateHistory(Vec<HistoryEntry>);

impl StateHistory {
    /// Start a history with the `Initialized` seed.
    pub fn new(at: TimestampNs) -> Self {
        Self(vec![(at, DeploymentState::Initialized)])
    }

    /// Rebuild a history from raw entries, checking every transition.
    pub fn from_entries(entries: Vec<HistoryEntry>) -> Result<Self> {
        let mut iter = entries.into_iter();
        let (at, _) = check_seed(iter.next())?;
        let mut history = Self::new(at);
        for (at, state) in iter {
            history.append(at, state)?;
        }
        Ok(history)
    }

    /// Take a history as recorded by the authority.
    ///
    /// Only the `Initialized` seed is checked.
    pub fn from_stored(entries: Vec<HistoryEntry>) -> Result<Self> {
        check_seed(entries.first().cloned())?;
        Ok(Self(entries))
    }

    /// Append a state, rejecting transitions the lifecycle forbids.
    pub fn append(&mut self, at: TimestampNs, state: DeploymentState) -> Result<()> {
        self.check_transition(&state)?;
        self.0.push((at, state));
        Ok(())
    }

    fn check_transition(&self, next: &DeploymentState) -> Result<()> {
        let current = self.current();
        match (current, next) {
            (_, DeploymentState::Initialized) => Err(Error::InvalidHistory(
                "Initialized can only be the first state".into(),
            )),
            (DeploymentState::Closed, _) => Err(Error::InvalidHistory(format!(
                "deployment is closed, cannot append {next}"
            ))),
            // A failed deployment can still be closed by the user.
            (DeploymentState::FailedOnCanister { .. } | DeploymentState::FailedOnClient { .. }, DeploymentState::Closed) => {
                Ok(())
            }
            (DeploymentState::FailedOnCanister { .. } | DeploymentState::FailedOnClient { .. }, _) => {
                Err(Error::InvalidHistory(format!(
                    "deployment already failed ({current}), cannot append {next}"
                )))
            }
            (_, DeploymentState::LeaseCreated(_)) if self.deployment_created().is_none() => {
                Err(Error::InvalidHistory(
                    "LeaseCreated received before DeploymentCreated".into(),
                ))
            }
            _ => Ok(()),
        }
    }

    /// The current (last) state.
    pub fn current(&self) -> &DeploymentState {
        // Construction guarantees at least the Initialized seed.
        self.0.last().map_or(&DeploymentState::Initialized, |(_, s)| s)
    }

    /// Timestamp of the `Initialized` entry.
    pub fn created_at(&self) -> TimestampNs {
        self.0.first().map_or(0, |(at, _)| *at)
    }

    /// Creation time as a UTC date.
    pub fn created_at_utc(&self) -> DateTime<Utc> {
        to_utc(self.created_at())
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// States in arrival order.
    pub fn states(&self) -> impl Iterator<Item = &DeploymentState> {
        self.0.iter().map(|(_, s)| s)
    }

    /// State names in arrival order.
    pub fn state_names(&self) -> Vec<&'static str> {
        self.states().map(DeploymentState::name).collect()
    }

    /// The `DeploymentCreated` payload, if it was recorded.
    pub fn deployment_created(&self) -> Option<&DeploymentCreated> {
        self.states().find_map(|s| match s {
            DeploymentState::DeploymentCreated(created) => Some(created),
            _ => None,
        })
    }

    /// The `LeaseCreated` payload, if it was recorded.
    pub fn lease(&self) -> Option<&LeaseCreated> {
        self.states().find_map(|s| match s {
            DeploymentState::LeaseCreated(lease) => Some(lease),
            _ => None,
        })
    }

    /// Whether any entry has the given state name.
    pub fn contains(&self, name: &str) -> bool {
        self.states().any(|s| s.name() == name)
    }

    pub fn is_active(&self) -> bool {
        self.contains("Active")
    }

    pub fn is_closed(&self) -> bool {
        self.contains("Closed")
    }

    pub fn is_failed(&self) -> bool {
        self.states().any(DeploymentState::is_failure)
    }

    /// Whether `self` is a prefix of `later` (history only grows).
    pub fn is_prefix_of(&self, later: &Self) -> bool {
        later.0.len() >= self.0.len() && later.0[..self.0.len()] == self.0[..]
    }
}

impl TryFrom<Vec<HistoryEntry>> for StateHistory {
    type Error = Error;

    fn try_from(entries: Vec<HistoryEntry>) -> Result<Self> {
        Self::from_stored(entries)
    }
}

fn check_seed(first: Option<HistoryEntry>) -> Result<HistoryEntry> {
    match first {
        None => Err(Error::InvalidHistory("history is empty".into())),
        Some((_, ref state)) if *state != DeploymentState::Initialized => Err(
            Error::InvalidHistory(format!("first state must be Initialized, got {state}")),
        ),
        Some(entry) => Ok(entry),
    }
}

impl From<StateHistory> for Vec<HistoryEntry> {
    fn from(history: StateHistory) -> Self {
        history.0
    }
}

/// Convert an authority timestamp to a UTC date.
pub fn to_utc(at: TimestampNs) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(i64::try_from(at).unwrap_or(i64::MAX))
}
