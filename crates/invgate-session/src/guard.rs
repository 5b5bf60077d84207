//! Route guard: decides whether a protected view may render.

use invgate_core::permission::{Section, landing_section};

use crate::session::SessionView;

/// Default entry point for unauthenticated viewers.
pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
  /// The session is still loading: show a placeholder, do not navigate.
  Pending,
  Allow,
  /// Navigate to `to`. With `replace` the guarded entry is replaced in the
  /// history, so going back cannot return to it.
  Redirect { to: &'static str, replace: bool },
}

#[derive(Debug, Clone, Copy)]
pub struct RouteGuard {
  login_path: &'static str,
}

impl Default for RouteGuard {
  fn default() -> Self { Self { login_path: LOGIN_PATH } }
}

impl RouteGuard {
  pub fn new(login_path: &'static str) -> Self { Self { login_path } }

  fn to_login(&self) -> GuardDecision {
    GuardDecision::Redirect { to: self.login_path, replace: true }
  }

  /// Authentication-only check.
  pub fn check(&self, view: &SessionView) -> GuardDecision {
    if view.is_loading() {
      GuardDecision::Pending
    } else if view.is_authenticated() {
      GuardDecision::Allow
    } else {
      self.to_login()
    }
  }

  /// Authentication plus role check for a navigation section. A viewer whose
  /// role cannot see `section` is sent to their landing section.
  pub fn check_section(&self, view: &SessionView, section: Section) -> GuardDecision {
    match self.check(view) {
      GuardDecision::Allow => match view.user() {
        Some(user) if section.visible_to(user) => GuardDecision::Allow,
        Some(user) => GuardDecision::Redirect {
          to:      landing_section(user).path(),
          replace: true,
        },
        // Token without a loaded user: rehydration has not run yet.
        None => GuardDecision::Pending,
      },
      decision => decision,
    }
  }

  /// Where the application root should send the viewer.
  pub fn landing(&self, view: &SessionView) -> GuardDecision {
    match self.check(view) {
      GuardDecision::Allow => match view.user() {
        Some(user) => GuardDecision::Redirect {
          to:      landing_section(user).path(),
          replace: true,
        },
        None => GuardDecision::Pending,
      },
      decision => decision,
    }
  }
}
