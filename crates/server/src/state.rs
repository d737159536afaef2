use std::sync::Arc;

use service::auth::JwtKeys;
use service::scheduler::SchedulerService;
use service::tasks::TaskInvoker;
use service::users::{UserRepository, UserService};

/// Settings read by the bearer-token middleware.
#[derive(Clone)]
pub struct AuthSettings {
    pub keys: JwtKeys,
    pub exclude_paths: Vec<String>,
}

impl AuthSettings {
    pub fn new(keys: JwtKeys, exclude_paths: &[String]) -> Self {
        Self { keys, exclude_paths: exclude_paths.iter().map(|p| normalize_path(p).to_string()).collect() }
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.exclude_paths.iter().any(|p| p == path)
    }
}

/// Strip trailing slashes; the root stays `/`.
pub fn normalize_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

#[derive(Clone)]
pub struct ServerState {
    pub users: UserService<dyn UserRepository>,
    pub invoker: TaskInvoker,
    pub scheduler: SchedulerService,
    pub auth: Arc<AuthSettings>,
    /// Public base URL for links in outgoing mail; `None` means derive from the request.
    pub base_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusion_ignores_trailing_slashes() {
        let keys = JwtKeys::new("s", chrono::Duration::minutes(1), chrono::Duration::days(1));
        let settings = AuthSettings::new(keys, &["/".to_string(), "/health/".to_string()]);
        assert!(settings.is_excluded("/"));
        assert!(settings.is_excluded("/health"));
        assert!(settings.is_excluded("/health//"));
        assert!(!settings.is_excluded("/health/check"));
        assert!(!settings.is_excluded("/api/v1/users"));
    }
}
