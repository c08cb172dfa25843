use chrono::{DateTime, Duration, Utc};

use crate::db::models::User;
use crate::db::DbOperations;
use crate::error::AppError;

/// Lockout thresholds, read-only after startup.
#[derive(Debug, Clone)]
pub struct LockoutPolicy {
    pub threshold: i32,
    pub duration: Duration,
}

/// The per-account login state machine:
/// {Open} → (threshold failures) → {Locked(until)} → (time elapses) → {Open}.
///
/// The transitions are pure; `LoginGuard` persists them through the store on
/// every attempt, including attempts that end in a generic failure response.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginState {
    pub failed_attempts: i32,
    pub lock_until: Option<DateTime<Utc>>,
    pub last_failed_login: Option<DateTime<Utc>>,
}

impl LoginState {
    pub fn of(user: &User) -> Self {
        Self {
            failed_attempts: user.failed_login_attempts,
            lock_until: user.lock_until,
            last_failed_login: user.last_failed_login,
        }
    }

    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lock_until.map_or(false, |until| now < until)
    }

    pub fn after_failure(&self, now: DateTime<Utc>, policy: &LockoutPolicy) -> Self {
        let failed_attempts = self.failed_attempts + 1;
        let lock_until = if failed_attempts >= policy.threshold {
            Some(now + policy.duration)
        } else {
            self.lock_until
        };
        Self {
            failed_attempts,
            lock_until,
            last_failed_login: Some(now),
        }
    }

    pub fn after_success(&self) -> Self {
        Self {
            failed_attempts: 0,
            lock_until: None,
            last_failed_login: None,
        }
    }
}

#[derive(Clone)]
pub struct LoginGuard {
    db: DbOperations,
    policy: LockoutPolicy,
}

impl LoginGuard {
    pub fn new(db: DbOperations, policy: LockoutPolicy) -> Self {
        Self { db, policy }
    }

    /// Must be consulted before the password is verified.
    pub fn check_locked(&self, user: &User) -> bool {
        LoginState::of(user).is_locked(Utc::now())
    }

    pub async fn record_failure(&self, user: &User) -> Result<(), AppError> {
        let next = LoginState::of(user).after_failure(Utc::now(), &self.policy);
        if next.failed_attempts == self.policy.threshold {
            tracing::warn!(user_id = %user.id, "Account locked due to repeated login failures");
        }
        self.db
            .update_login_state(
                user.id,
                next.failed_attempts,
                next.lock_until,
                next.last_failed_login,
            )
            .await
    }

    pub async fn record_success(&self, user: &User) -> Result<(), AppError> {
        let next = LoginState::of(user).after_success();
        self.db
            .update_login_state(
                user.id,
                next.failed_attempts,
                next.lock_until,
                next.last_failed_login,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> LockoutPolicy {
        LockoutPolicy {
            threshold: 5,
            duration: Duration::minutes(15),
        }
    }

    fn open_state() -> LoginState {
        LoginState {
            failed_attempts: 0,
            lock_until: None,
            last_failed_login: None,
        }
    }

    #[test]
    fn test_failures_below_threshold_do_not_lock() {
        let now = Utc::now();
        let mut state = open_state();
        for _ in 0..4 {
            state = state.after_failure(now, &policy());
        }
        assert_eq!(state.failed_attempts, 4);
        assert!(!state.is_locked(now));
        assert_eq!(state.last_failed_login, Some(now));
    }

    #[test]
    fn test_threshold_failure_locks() {
        let now = Utc::now();
        let mut state = open_state();
        for _ in 0..5 {
            state = state.after_failure(now, &policy());
        }
        assert_eq!(state.failed_attempts, 5);
        assert!(state.is_locked(now));
        assert_eq!(state.lock_until, Some(now + Duration::minutes(15)));
    }

    #[test]
    fn test_lock_opens_after_duration_elapses() {
        let now = Utc::now();
        let mut state = open_state();
        for _ in 0..5 {
            state = state.after_failure(now, &policy());
        }
        assert!(state.is_locked(now + Duration::minutes(14)));
        assert!(!state.is_locked(now + Duration::minutes(15)));
        assert!(!state.is_locked(now + Duration::minutes(16)));
    }

    #[test]
    fn test_success_resets_everything() {
        let now = Utc::now();
        let mut state = open_state();
        for _ in 0..5 {
            state = state.after_failure(now, &policy());
        }
        let state = state.after_success();
        assert_eq!(state.failed_attempts, 0);
        assert!(state.lock_until.is_none());
        assert!(state.last_failed_login.is_none());
        assert!(!state.is_locked(now));
    }

    #[test]
    fn test_failures_past_threshold_extend_lock() {
        let now = Utc::now();
        let mut state = open_state();
        for _ in 0..5 {
            state = state.after_failure(now, &policy());
        }
        let later = now + Duration::minutes(1);
        let state = state.after_failure(later, &policy());
        assert_eq!(state.failed_attempts, 6);
        assert_eq!(state.lock_until, Some(later + Duration::minutes(15)));
    }
}
