//! REST client for the school portal backend.

mod client;

pub use client::{ApiClient, LoginRequest};

/// Route the user is sent to when the session expires.
pub const LOGIN_PATH: &str = "/login";

pub const LOGIN_ENDPOINT: &str = "/auth/login";
pub const SIGNUP_ENDPOINT: &str = "/auth/signup";

/// Endpoints that never carry the bearer token and never trigger the session-expired flow.
pub const UNAUTHENTICATED_ENDPOINTS: [&str; 2] = [LOGIN_ENDPOINT, SIGNUP_ENDPOINT];

pub fn is_unauthenticated(path: &str) -> bool {
    let path = path.split('?').next().unwrap_or(path).trim_end_matches('/');
    UNAUTHENTICATED_ENDPOINTS.contains(&path)
}

pub fn student_report_path(student_id: &str) -> String {
    format!("/students/{student_id}/report")
}

pub fn student_feedback_path(student_id: &str) -> String {
    format!("/students/{student_id}/feedbacks")
}

pub fn student_counseling_path(student_id: &str) -> String {
    format!("/students/{student_id}/counselings")
}

/// Receives the forced-logout signal after a 401.
pub trait SessionListener: Send + Sync {
    fn on_session_expired(&self, login_path: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_auth_entry_points_skip_the_token() {
        assert!(is_unauthenticated("/auth/login"));
        assert!(is_unauthenticated("/auth/signup/"));
        assert!(is_unauthenticated("/auth/login?next=/"));
        assert!(!is_unauthenticated("/auth/logout"));
        assert!(!is_unauthenticated(&student_report_path("12")));
    }
}
