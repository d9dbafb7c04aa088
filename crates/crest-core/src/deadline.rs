//! Command-wide cancellation: a single deadline value threaded as an explicit
//! argument through every remote call, never ambient global state.

use std::time::{Duration, Instant};

use crate::error::CrestError;

/// Optional expiry instant shared by all remote calls of one command
/// invocation. Once expired, every subsequent `check` fails; work already
/// completed is not rolled back.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// No deadline: `check` always passes.
    pub fn none() -> Deadline {
        Deadline { at: None }
    }

    /// Deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Deadline {
        Deadline {
            at: Some(Instant::now() + timeout),
        }
    }

    /// Fail with `Canceled` if the deadline has passed.
    pub fn check(&self, operation: &str) -> Result<(), CrestError> {
        match self.at {
            Some(at) if Instant::now() >= at => Err(CrestError::Canceled {
                operation: operation.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Time left until expiry, if a deadline is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.at.map(|at| at.saturating_duration_since(Instant::now()))
    }
}
