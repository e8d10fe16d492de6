//! Client-side authentication state machine.
//!
//! The observable phase starts at `Unknown` on every mount and resolves
//! exactly once to `Authenticated` or `Unauthenticated`. Navigation is a
//! command returned from the transition handler, not a reactive side effect,
//! so "redirect fires exactly once" holds by construction: only the
//! transition out of `Unknown` (or an explicit logout) can produce one.

use crate::api::handlers::auth::types::UserSummary;

/// Observable authentication phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Session validity not yet confirmed; render a loading indicator and
    /// perform no navigation.
    Unknown,
    Authenticated,
    Unauthenticated,
}

/// Navigation side effect requested by a phase transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    RedirectToLogin,
}

/// Owns the phase and the (nullable) user summary for one mount.
///
/// A new mount always constructs a fresh controller; resolved phases are
/// never cached across mounts.
#[derive(Debug, Default)]
pub struct SessionController {
    phase: Option<ResolvedPhase>,
}

#[derive(Debug)]
enum ResolvedPhase {
    Authenticated(UserSummary),
    Unauthenticated,
}

impl SessionController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        match &self.phase {
            None => SessionPhase::Unknown,
            Some(ResolvedPhase::Authenticated(_)) => SessionPhase::Authenticated,
            Some(ResolvedPhase::Unauthenticated) => SessionPhase::Unauthenticated,
        }
    }

    /// True while the mount-time validation is still outstanding.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.phase.is_none()
    }

    #[must_use]
    pub fn user(&self) -> Option<&UserSummary> {
        match &self.phase {
            Some(ResolvedPhase::Authenticated(user)) => Some(user),
            _ => None,
        }
    }

    /// Apply the mount-time validation outcome.
    ///
    /// Only the first call transitions; phases are monotonic for a given
    /// mount, so later calls (double resolution, a stale in-flight response)
    /// change nothing and can never fire a second redirect.
    pub fn resolve(&mut self, outcome: Option<UserSummary>) -> Option<Navigation> {
        if self.phase.is_some() {
            return None;
        }
        match outcome {
            Some(user) => {
                self.phase = Some(ResolvedPhase::Authenticated(user));
                None
            }
            // Network errors and auth failures both settle as unauthenticated.
            None => {
                self.phase = Some(ResolvedPhase::Unauthenticated);
                Some(Navigation::RedirectToLogin)
            }
        }
    }

    /// Force the phase to `Unauthenticated` after local token material has
    /// been cleared. Redirects only when the phase actually changed.
    pub fn logout(&mut self) -> Option<Navigation> {
        if matches!(self.phase, Some(ResolvedPhase::Unauthenticated)) {
            return None;
        }
        self.phase = Some(ResolvedPhase::Unauthenticated);
        Some(Navigation::RedirectToLogin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserSummary {
        UserSummary {
            id: "7e2f9ce8-6f1a-49a3-bd83-6a9e2a4f8c11".to_string(),
            email: "alice@example.com".to_string(),
        }
    }

    #[test]
    fn starts_unknown_and_loading() {
        let controller = SessionController::new();
        assert_eq!(controller.phase(), SessionPhase::Unknown);
        assert!(controller.is_loading());
        assert!(controller.user().is_none());
    }

    #[test]
    fn failed_validation_redirects_exactly_once() {
        let mut controller = SessionController::new();

        assert_eq!(controller.resolve(None), Some(Navigation::RedirectToLogin));
        assert_eq!(controller.phase(), SessionPhase::Unauthenticated);

        // A stale second resolution must not fire again.
        assert_eq!(controller.resolve(None), None);
        assert_eq!(controller.resolve(Some(user())), None);
        assert_eq!(controller.phase(), SessionPhase::Unauthenticated);
    }

    #[test]
    fn successful_validation_never_redirects() {
        let mut controller = SessionController::new();

        assert_eq!(controller.resolve(Some(user())), None);
        assert_eq!(controller.phase(), SessionPhase::Authenticated);
        assert_eq!(
            controller.user().map(|user| user.email.as_str()),
            Some("alice@example.com")
        );

        // Monotonic: a late failure cannot demote the phase.
        assert_eq!(controller.resolve(None), None);
        assert_eq!(controller.phase(), SessionPhase::Authenticated);
    }

    #[test]
    fn logout_redirects_once_from_any_phase() {
        let mut controller = SessionController::new();
        controller.resolve(Some(user()));

        assert_eq!(controller.logout(), Some(Navigation::RedirectToLogin));
        assert_eq!(controller.phase(), SessionPhase::Unauthenticated);
        assert_eq!(controller.logout(), None);
    }

    #[test]
    fn fresh_mount_restarts_from_unknown() {
        let mut first = SessionController::new();
        first.resolve(Some(user()));

        // The previous mount's resolution does not leak into a new one.
        let second = SessionController::new();
        assert_eq!(second.phase(), SessionPhase::Unknown);
    }
}
