//! Finite state machine for the create-or-update service protocol

use serde::{Deserialize, Serialize};

/// Service deployment state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    /// Existence check found no service
    NotExists,

    /// Existence check found the service
    Exists,

    /// Dry run accepted, or skipped after the permission fallback
    DryRunValidated,

    /// New service created
    Created,

    /// Existing service updated with a new revision
    Updated,
}

/// Deployment event
#[derive(Debug, Clone)]
pub enum ServiceEvent {
    /// Dry run of the intended mutation succeeded
    DryRunPassed,

    /// Dry run failed with an IAM-shaped error and the invoker flag was dropped
    InvokerFallback,

    /// The real mutation finished
    Committed,
}

/// Service deployment FSM
#[derive(Debug, Clone)]
pub struct ServiceFsm {
    initial: ServiceState,
    state: ServiceState,
    fallback_taken: bool,
}

impl ServiceFsm {
    /// Start from the result of the single existence check
    pub fn new(exists: bool) -> Self {
        let initial = if exists {
            ServiceState::Exists
        } else {
            ServiceState::NotExists
        };
        Self {
            initial,
            state: initial,
            fallback_taken: false,
        }
    }

    /// Get current state
    pub fn state(&self) -> ServiceState {
        self.state
    }

    /// Whether the deployment updates an existing service
    pub fn is_update(&self) -> bool {
        self.initial == ServiceState::Exists
    }

    /// Whether the invoker flag was dropped
    pub fn fallback_taken(&self) -> bool {
        self.fallback_taken
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, ServiceState::Created | ServiceState::Updated)
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: ServiceEvent) -> Result<(), String> {
        let new_state = match (self.state, &event) {
            (ServiceState::NotExists | ServiceState::Exists, ServiceEvent::DryRunPassed) => {
                ServiceState::DryRunValidated
            }
            (ServiceState::NotExists | ServiceState::Exists, ServiceEvent::InvokerFallback) => {
                self.fallback_taken = true;
                ServiceState::DryRunValidated
            }

            (ServiceState::DryRunValidated, ServiceEvent::Committed) => {
                if self.is_update() {
                    ServiceState::Updated
                } else {
                    ServiceState::Created
                }
            }

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }
}
