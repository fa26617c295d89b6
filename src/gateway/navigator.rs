/// Host UI hook for session-invalidation redirects.
///
/// The gateway never touches routing itself. When a refresh fails it asks
/// the navigator where the user currently is, and requests a move to the
/// login view unless they are already there.
///
/// # Example
///
/// ```rust,ignore
/// struct AppRouter { history: Mutex<Vec<String>> }
///
/// impl Navigator for AppRouter {
///     fn current_path(&self) -> String {
///         self.history.lock().last().cloned().unwrap_or_else(|| "/".into())
///     }
///
///     fn navigate(&self, path: &str) {
///         self.history.lock().push(path.to_owned());
///     }
/// }
/// ```
pub trait Navigator: Send + Sync + 'static {
    /// Path of the view currently shown.
    fn current_path(&self) -> String;

    /// Move to `path`.
    fn navigate(&self, path: &str);
}

/// Target for the login redirect. Carries the current path as `from` so the
/// login view can send the user back after signing in.
pub(crate) fn login_target(login_path: &str, current: &str) -> String {
    if current.is_empty() || current == "/" {
        login_path.to_owned()
    } else {
        format!("{login_path}?from={}", urlencoding::encode(current))
    }
}

/// Whether `current` already shows the login view.
pub(crate) fn is_login_view(login_path: &str, current: &str) -> bool {
    current.contains(login_path)
}
