//! Per-attempt operation results.
//!
//! Eligibility checks and the build cause producer report into a mutable
//! [`OperationResult`] instead of returning early: expected ineligibility is
//! a state written here, never an error. The first failure written wins;
//! later writes cannot resurrect a dead attempt.

use crate::health::{HealthScope, ServerHealthState};

/// Terminal disposition of a scheduling attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    /// Nothing written yet; the attempt may proceed.
    Ready,
    /// Attempt finished cleanly.
    Success,
    /// Request accepted for asynchronous processing.
    Accepted,
    /// Rejected because a conflicting attempt is in flight.
    Conflict,
    /// Rejected by a policy gate or failed outright.
    Failed,
}

#[derive(Debug, Clone)]
pub struct OperationResult {
    state: OperationState,
    health_state: Option<ServerHealthState>,
}

impl OperationResult {
    pub fn new() -> Self {
        Self {
            state: OperationState::Ready,
            health_state: None,
        }
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    /// Whether the attempt may keep going.
    pub fn can_continue(&self) -> bool {
        matches!(
            self.state,
            OperationState::Ready | OperationState::Success | OperationState::Accepted
        )
    }

    pub fn is_accepted(&self) -> bool {
        self.state == OperationState::Accepted
    }

    pub fn is_conflict(&self) -> bool {
        self.state == OperationState::Conflict
    }

    pub fn success(&mut self, scope: HealthScope) {
        if !self.can_continue() {
            return;
        }
        self.state = OperationState::Success;
        self.health_state = Some(ServerHealthState::success(scope));
    }

    pub fn accepted(&mut self, message: &str, description: &str, scope: HealthScope) {
        if !self.can_continue() {
            return;
        }
        self.state = OperationState::Accepted;
        self.health_state = Some(ServerHealthState::success(scope).with_message(message, description));
    }

    pub fn conflict(&mut self, message: &str, description: &str, scope: HealthScope) {
        if !self.can_continue() {
            return;
        }
        self.state = OperationState::Conflict;
        self.health_state = Some(ServerHealthState::error(message, description, scope));
    }

    pub fn error(&mut self, message: &str, description: &str, scope: HealthScope) {
        if !self.can_continue() {
            return;
        }
        self.state = OperationState::Failed;
        self.health_state = Some(ServerHealthState::error(message, description, scope));
    }

    /// A request that was understood but cannot be acted on (bad pinned
    /// revisions, vanished pipeline).
    pub fn unprocessable_entity(&mut self, message: &str, description: &str, scope: HealthScope) {
        self.error(message, description, scope);
    }

    pub fn message(&self) -> &str {
        self.health_state
            .as_ref()
            .map(|s| s.message.as_str())
            .unwrap_or("")
    }

    /// The health state accumulated so far; a fresh result reads as global
    /// success.
    pub fn server_health_state(&self) -> ServerHealthState {
        self.health_state
            .clone()
            .unwrap_or_else(|| ServerHealthState::success(HealthScope::Global))
    }
}

impl Default for OperationResult {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_result_can_continue() {
        assert!(OperationResult::new().can_continue());
    }

    #[test]
    fn test_conflict_stops_the_attempt() {
        let mut result = OperationResult::new();
        result.conflict("busy", "already triggered", HealthScope::for_pipeline("p"));
        assert!(!result.can_continue());
        assert!(result.is_conflict());
    }

    #[test]
    fn test_first_failure_wins() {
        let mut result = OperationResult::new();
        result.error("broken", "first", HealthScope::Global);
        result.success(HealthScope::Global);
        result.accepted("late", "", HealthScope::Global);
        assert_eq!(result.state(), OperationState::Failed);
        assert_eq!(result.message(), "broken");
    }

    #[test]
    fn test_accepted_still_continues() {
        let mut result = OperationResult::new();
        result.accepted("queued", "", HealthScope::Global);
        assert!(result.can_continue());
        assert!(result.is_accepted());
    }
}
