//! Manager lifecycle
//!
//! The state lives in a `watch` channel. Claiming the `Uninitialized ->
//! Initializing` transition is a compare-and-set through `send_if_modified`;
//! everyone else waits on the channel, so no lock is held while discovery
//! runs.

use std::fmt;

use serde::Serialize;
use tokio::sync::watch;

use crate::error::{HubError, HubResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerState {
    Uninitialized,
    Initializing,
    Ready,
    ShuttingDown,
    Closed,
}

impl ManagerState {
    pub fn as_str(self) -> &'static str {
        match self {
            ManagerState::Uninitialized => "uninitialized",
            ManagerState::Initializing => "initializing",
            ManagerState::Ready => "ready",
            ManagerState::ShuttingDown => "shutting_down",
            ManagerState::Closed => "closed",
        }
    }

    pub fn is_closed(self) -> bool {
        matches!(self, ManagerState::ShuttingDown | ManagerState::Closed)
    }
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of trying to claim initialization
pub(crate) enum Claim {
    /// This caller owns initialization; the guard rolls back if dropped
    Owner(InitGuard),
    /// Someone else is initializing
    InProgress,
    Ready,
    Closed,
}

pub(crate) struct Lifecycle {
    tx: watch::Sender<ManagerState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ManagerState::Uninitialized);
        Self { tx }
    }

    pub fn current(&self) -> ManagerState {
        *self.tx.borrow()
    }

    /// Compare-and-set on `Uninitialized -> Initializing`
    ///
    /// Retries when an owner rolls back between the attempt and the read, so
    /// `InProgress` always means another caller holds the transition.
    pub fn try_claim(&self) -> Claim {
        loop {
            if self.claim_once() {
                return Claim::Owner(InitGuard {
                    tx: self.tx.clone(),
                    armed: true,
                });
            }
            if let Some(claim) = observed_claim(self.current()) {
                return claim;
            }
        }
    }

    fn claim_once(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == ManagerState::Uninitialized {
                *state = ManagerState::Initializing;
                true
            } else {
                false
            }
        })
    }

    /// Wait until the in-flight initialization settles
    pub async fn wait_settled(&self) -> HubResult<ManagerState> {
        let mut rx = self.tx.subscribe();
        let state = rx
            .wait_for(|s| *s != ManagerState::Initializing)
            .await
            .map_err(|_| HubError::ManagerClosed)?;
        Ok(*state)
    }

    /// Move to `ShuttingDown` unless already shutting down or closed
    ///
    /// Returns false when another caller got there first.
    pub fn begin_shutdown(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if state.is_closed() {
                false
            } else {
                *state = ManagerState::ShuttingDown;
                true
            }
        })
    }

    pub fn finish_shutdown(&self) {
        self.tx.send_replace(ManagerState::Closed);
    }

    /// Fail fast once closing has started
    pub fn check_open(&self) -> HubResult<()> {
        if self.current().is_closed() {
            Err(HubError::ManagerClosed)
        } else {
            Ok(())
        }
    }
}

/// Outcome of a lost compare-and-set given the state read afterwards;
/// `None` when the owner rolled back and the claim must be retried
fn observed_claim(state: ManagerState) -> Option<Claim> {
    match state {
        ManagerState::Initializing => Some(Claim::InProgress),
        ManagerState::Ready => Some(Claim::Ready),
        ManagerState::ShuttingDown | ManagerState::Closed => Some(Claim::Closed),
        ManagerState::Uninitialized => None,
    }
}

/// Held by the caller running initialization
///
/// Dropping it before [`InitGuard::complete`] puts the manager back into
/// `Uninitialized` so a later caller can retry.
pub(crate) struct InitGuard {
    tx: watch::Sender<ManagerState>,
    armed: bool,
}

impl InitGuard {
    /// Publish `Ready`, unless the manager was closed meanwhile
    pub fn complete(mut self) -> HubResult<()> {
        self.armed = false;
        let published = self.tx.send_if_modified(|state| {
            if *state == ManagerState::Initializing {
                *state = ManagerState::Ready;
                true
            } else {
                false
            }
        });
        if published {
            Ok(())
        } else {
            Err(HubError::ManagerClosed)
        }
    }
}

impl Drop for InitGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.tx.send_if_modified(|state| {
            if *state == ManagerState::Initializing {
                *state = ManagerState::Uninitialized;
                true
            } else {
                false
            }
        });
    }
}
