//! Container exit-code condition

use std::sync::Arc;

use stevedore_core::prelude::*;

use crate::client::EngineQuery;

/// Which exit outcome satisfies the condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitMatch {
    /// Any non-null exit code.
    Any,
    /// Exactly this exit code.
    Code(i64),
}

/// Check whether a container has exited (optionally with a specific code).
///
/// While the container runs, the engine reports no exit code and the check
/// is "not yet". The two flavors disagree on an inspect failure: waiting
/// for *any* exit treats a vanished container as finished-and-gone
/// (success), while waiting for an *exact* code fails closed because the
/// code can no longer be confirmed.
pub struct ExitCodeCondition {
    engine: Arc<dyn EngineQuery>,
    container_id: String,
    expected: ExitMatch,
}

impl ExitCodeCondition {
    pub fn new(engine: Arc<dyn EngineQuery>, container_id: &str, expected: ExitMatch) -> Self {
        Self {
            engine,
            container_id: container_id.to_string(),
            expected,
        }
    }

    pub fn describe(&self) -> String {
        match self.expected {
            ExitMatch::Any => "on exit".to_string(),
            ExitMatch::Code(code) => format!("on exit code {code}"),
        }
    }

    pub async fn check(&mut self) -> Result<bool> {
        let status = match self.engine.container_status(&self.container_id).await {
            Ok(status) => status,
            Err(e) => {
                debug!("cannot inspect {} for exit code: {e}", self.container_id);
                return Ok(matches!(self.expected, ExitMatch::Any));
            }
        };
        match status.exit_code {
            None => Ok(false),
            Some(code) => Ok(match self.expected {
                ExitMatch::Any => true,
                ExitMatch::Code(expected) => code == expected,
            }),
        }
    }

    pub async fn cleanup(&mut self) {}
}
