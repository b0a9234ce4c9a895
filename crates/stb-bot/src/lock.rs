//! Dangerous-Operation Lock.
//!
//! Process-wide singleton guarding the role commands. States:
//!
//! ```text
//! Idle -> InUse(command, owner, channel) -> [AwaitingInput(.., expected)] -> Idle
//! ```
//!
//! Check-and-set happens under one mutex acquisition, so two commands
//! racing for an idle lock cannot both win. The lock is in-memory only and
//! not shared across processes.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, info};

/// What the owner's next message must be.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedInput {
    BatchId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LockState {
    Idle,
    InUse {
        command: String,
        owner: String,
        channel: String,
    },
    AwaitingInput {
        command: String,
        owner: String,
        channel: String,
        expected: ExpectedInput,
    },
}

impl LockState {
    pub fn is_idle(&self) -> bool {
        matches!(self, LockState::Idle)
    }

    pub fn label(&self) -> &'static str {
        match self {
            LockState::Idle => "idle",
            LockState::InUse { .. } => "in_use",
            LockState::AwaitingInput { .. } => "awaiting_input",
        }
    }

    /// Command holding the lock, if any.
    pub fn command(&self) -> Option<&str> {
        match self {
            LockState::Idle => None,
            LockState::InUse { command, .. } | LockState::AwaitingInput { command, .. } => {
                Some(command.as_str())
            }
        }
    }
}

/// A guarded command was issued while the lock was held.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockBusy {
    /// Command currently holding the lock.
    pub held_by: String,
}

impl fmt::Display for LockBusy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation lock held by {}", self.held_by)
    }
}

impl std::error::Error for LockBusy {}

/// Input consumed from the owner while in `AwaitingInput`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingInput {
    pub command: String,
    pub channel: String,
    pub expected: ExpectedInput,
}

#[derive(Debug)]
pub struct OperationLock {
    state: Mutex<LockState>,
}

impl Default for OperationLock {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationLock {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LockState::Idle),
        }
    }

    fn guard(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> LockState {
        self.guard().clone()
    }

    /// Idle -> InUse. Any other state is left untouched and refused.
    ///
    /// The returned ticket releases the lock when dropped unless it is
    /// handed over with [`LockTicket::await_input`].
    pub fn try_enter(
        &self,
        command: &str,
        owner: &str,
        channel: &str,
    ) -> Result<LockTicket<'_>, LockBusy> {
        let mut st = self.guard();
        if let Some(held) = st.command() {
            debug!(command, held_by = held, "operation lock busy");
            return Err(LockBusy {
                held_by: held.to_string(),
            });
        }
        *st = LockState::InUse {
            command: command.to_string(),
            owner: owner.to_string(),
            channel: channel.to_string(),
        };
        info!(command, owner, channel, "operation lock acquired");
        Ok(LockTicket {
            lock: self,
            armed: true,
        })
    }

    /// True when `author` owes the lock its follow-up message.
    pub fn awaits_input_from(&self, author: &str) -> bool {
        matches!(&*self.guard(), LockState::AwaitingInput { owner, .. } if owner == author)
    }

    /// AwaitingInput(owner = author) -> Idle, returning what was awaited.
    /// Anyone else's message leaves the lock alone.
    pub fn take_input(&self, author: &str) -> Option<PendingInput> {
        let mut st = self.guard();
        let pending = match &*st {
            LockState::AwaitingInput {
                command,
                owner,
                channel,
                expected,
            } if owner == author => PendingInput {
                command: command.clone(),
                channel: channel.clone(),
                expected: *expected,
            },
            _ => return None,
        };
        *st = LockState::Idle;
        info!(command = %pending.command, "operation lock released after input");
        Some(pending)
    }

    /// Unconditional reset to Idle.
    pub fn release(&self) {
        let mut st = self.guard();
        if let Some(command) = st.command() {
            info!(command, "operation lock released");
        }
        *st = LockState::Idle;
    }
}

/// Proof of holding the lock in `InUse`. Dropping it releases the lock.
#[must_use = "dropping the ticket releases the lock"]
#[derive(Debug)]
pub struct LockTicket<'a> {
    lock: &'a OperationLock,
    armed: bool,
}

impl LockTicket<'_> {
    /// InUse -> AwaitingInput. The lock stays held after the ticket is gone
    /// and is released by [`OperationLock::take_input`].
    pub fn await_input(mut self, expected: ExpectedInput) {
        let mut st = self.lock.guard();
        let next = match &*st {
            LockState::InUse {
                command,
                owner,
                channel,
            } => Some(LockState::AwaitingInput {
                command: command.clone(),
                owner: owner.clone(),
                channel: channel.clone(),
                expected,
            }),
            _ => None,
        };
        if let Some(next) = next {
            *st = next;
        }
        self.armed = false;
    }
}

impl Drop for LockTicket<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.lock.release();
        }
    }
}
