use crate::auth::AuthContext;
use crate::session::AuthStatus;
use crate::types::Role;

/// View shown when the user's role may not open a page.
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";

/// Route gating decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Session state is still being resolved; render a placeholder.
    Pending,
    Allow,
    RedirectToLogin,
    /// Signed in, but with the wrong role.
    Forbidden,
}

impl Access {
    /// Where to navigate for this decision, if anywhere.
    #[must_use]
    pub fn redirect<'a>(self, login_path: &'a str) -> Option<&'a str> {
        match self {
            Self::RedirectToLogin => Some(login_path),
            Self::Forbidden => Some(UNAUTHORIZED_PATH),
            Self::Pending | Self::Allow => None,
        }
    }
}

/// Decide whether a view requiring `required` (or just a session, when
/// `None`) may be shown.
#[must_use]
pub fn check(status: &AuthStatus, is_loading: bool, required: Option<Role>) -> Access {
    match status {
        AuthStatus::Authenticating => Access::Pending,
        _ if is_loading => Access::Pending,
        AuthStatus::Anonymous | AuthStatus::Expired => Access::RedirectToLogin,
        AuthStatus::Authenticated(user) => match required {
            Some(role) if role != user.role => Access::Forbidden,
            _ => Access::Allow,
        },
    }
}

/// Landing dashboard for a role.
#[must_use]
pub fn dashboard_for(role: Role) -> &'static str {
    match role {
        Role::Buyer => "/buyer",
        Role::Supplier => "/supplier",
    }
}

impl AuthContext {
    /// Gate a view on the current session.
    #[must_use]
    pub fn access(&self, required: Option<Role>) -> Access {
        check(&self.status(), self.is_loading(), required)
    }
}
