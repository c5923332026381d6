//! Permission providers used by the CLI host.

use std::sync::{Arc, Mutex, PoisonError};

use clap::ValueEnum;
use console::{Term, style};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ConsentDecision, ConsentTicket, PermissionProvider, PermissionState};

/// How the user answers consent prompts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentAnswer {
    /// Prompt on the terminal.
    #[default]
    Ask,
    /// Grant without prompting.
    Allow,
    /// Deny without prompting.
    Deny,
}

/// Grant state shared between a provider and the decisions it delivers.
#[derive(Debug, Clone)]
struct GrantState(Arc<Mutex<PermissionState>>);

impl GrantState {
    fn new(initial: PermissionState) -> Self {
        Self(Arc::new(Mutex::new(initial)))
    }

    fn get(&self) -> PermissionState {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, decision: ConsentDecision) {
        let state = if decision.is_granted() {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        };
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

/// Answers every prompt with a fixed decision, delivered asynchronously on a
/// spawned task the way an OS callback would arrive.
#[derive(Debug, Clone)]
pub struct ScriptedConsent {
    state: GrantState,
    decision: ConsentDecision,
}

impl ScriptedConsent {
    pub fn new(initial: PermissionState, decision: ConsentDecision) -> Self {
        Self {
            state: GrantState::new(initial),
            decision,
        }
    }
}

impl PermissionProvider for ScriptedConsent {
    fn status(&self) -> PermissionState {
        self.state.get()
    }

    fn request(&self, ticket: ConsentTicket) {
        let state = self.state.clone();
        let decision = self.decision;
        debug!(request_id = %ticket.id(), ?decision, "Scripted consent prompt");
        tokio::spawn(async move {
            state.record(decision);
            ticket.resolve(decision);
        });
    }
}

/// Prompts the user on the controlling terminal.
#[derive(Debug, Clone)]
pub struct TerminalConsent {
    state: GrantState,
}

impl TerminalConsent {
    pub fn new(initial: PermissionState) -> Self {
        Self {
            state: GrantState::new(initial),
        }
    }

    fn prompt() -> ConsentDecision {
        let term = Term::stderr();
        let question = format!(
            "{} Allow image-saver to write to your shared photos? [y/N] ",
            style("?").yellow().bold()
        );
        if let Err(e) = term.write_str(&question) {
            warn!(error = %e, "Could not show permission prompt");
            return ConsentDecision::Denied;
        }
        match term.read_line() {
            Ok(answer) if matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes") => {
                ConsentDecision::Granted
            }
            Ok(_) => ConsentDecision::Denied,
            Err(e) => {
                warn!(error = %e, "Could not read permission answer");
                ConsentDecision::Denied
            }
        }
    }
}

impl PermissionProvider for TerminalConsent {
    fn status(&self) -> PermissionState {
        self.state.get()
    }

    fn request(&self, ticket: ConsentTicket) {
        let state = self.state.clone();
        tokio::task::spawn_blocking(move || {
            let decision = Self::prompt();
            state.record(decision);
            ticket.resolve(decision);
        });
    }
}
