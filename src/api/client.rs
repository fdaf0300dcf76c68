use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{
    is_unauthenticated, student_counseling_path, student_feedback_path, student_report_path,
    SessionListener, LOGIN_ENDPOINT, LOGIN_PATH, SIGNUP_ENDPOINT,
};
use crate::auth::{CredentialStore, Session};
use crate::error::{ReportError, ReportResult};
use crate::fetcher::ReportSource;
use crate::model::{
    CounselingDraft, CounselingEntry, FeedbackEntry, FeedbackFormData, StudentReportRecord,
};
use crate::validation::SignupForm;

/// Body of the authorization-code exchange.
#[derive(Clone, Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub code: &'a str,
}

/// Backend client. The bearer token is attached to every call except the login and signup
/// endpoints; a 401 clears the stored credentials and signals the session listener.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    credentials: CredentialStore,
    listener: Option<Arc<dyn SessionListener>>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, credentials: CredentialStore) -> ReportResult<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ReportError::Config("API base URL is empty".into()));
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("school-report/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| ReportError::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            http,
            base_url,
            credentials,
            listener: None,
        })
    }

    pub fn with_session_listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Exchanges an OAuth authorization code and stores the resulting session.
    pub async fn login(&self, code: &str) -> ReportResult<Session> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ReportError::validation("authorization code is empty"));
        }

        let request = self
            .request(Method::POST, LOGIN_ENDPOINT)
            .json(&LoginRequest { code });
        let session: Session = self.execute(LOGIN_ENDPOINT, request).await?;
        self.credentials.store_session(&session)?;
        info!("Logged in as {} ({:?})", session.user.name, session.user.role);
        Ok(session)
    }

    /// Registers a new account. The form is validated before anything is sent.
    pub async fn signup(&self, form: &SignupForm) -> ReportResult<Session> {
        form.validate()
            .map_err(|errors| ReportError::validation(errors.to_string()))?;

        let request = self.request(Method::POST, SIGNUP_ENDPOINT).json(form);
        let session: Session = self.execute(SIGNUP_ENDPOINT, request).await?;
        self.credentials.store_session(&session)?;
        Ok(session)
    }

    pub async fn student_report(&self, student_id: &str) -> ReportResult<StudentReportRecord> {
        let path = student_report_path(checked_id(student_id)?);
        let request = self.request(Method::GET, &path);
        self.execute(&path, request).await
    }

    pub async fn submit_feedback(
        &self,
        student_id: &str,
        form: &FeedbackFormData,
    ) -> ReportResult<FeedbackEntry> {
        if form.is_empty() {
            return Err(ReportError::validation("feedback has no content"));
        }
        let path = student_feedback_path(checked_id(student_id)?);
        let request = self.request(Method::POST, &path).json(form);
        self.execute(&path, request).await
    }

    pub async fn create_counseling(
        &self,
        student_id: &str,
        draft: &CounselingDraft,
    ) -> ReportResult<CounselingEntry> {
        if draft.title.trim().is_empty() && draft.context.trim().is_empty() {
            return Err(ReportError::validation("counseling record needs a title or content"));
        }
        let path = student_counseling_path(checked_id(student_id)?);
        let request = self.request(Method::POST, &path).json(draft);
        self.execute(&path, request).await
    }

    /// Forgets the stored session.
    pub fn logout(&self) -> ReportResult<()> {
        self.credentials.clear()?;
        info!("Logged out");
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let request = self.http.request(method, url);
        if is_unauthenticated(path) {
            return request;
        }
        match self.credentials.access_token() {
            Some(token) => request.bearer_auth(token),
            None => {
                debug!("No access token stored; calling {path} anonymously");
                request
            }
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        path: &str,
        request: RequestBuilder,
    ) -> ReportResult<T> {
        let response = request.send().await.map_err(|source| {
            warn!("Request to {path} failed: {source}");
            ReportError::Transport {
                endpoint: path.to_string(),
                source,
            }
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED && !is_unauthenticated(path) {
            self.expire_session(path);
            return Err(ReportError::Unauthorized);
        }
        if !status.is_success() {
            warn!("{path} answered with status {status}");
            return Err(ReportError::Http {
                endpoint: path.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|source| {
            warn!("Reading the response of {path} failed: {source}");
            ReportError::Transport {
                endpoint: path.to_string(),
                source,
            }
        })?;

        serde_json::from_slice(&body).map_err(|err| {
            warn!("Could not decode the response of {path}: {err}");
            ReportError::Decode {
                endpoint: path.to_string(),
                message: err.to_string(),
            }
        })
    }

    fn expire_session(&self, path: &str) {
        warn!("{path} rejected the stored credentials; clearing the session");
        if let Err(err) = self.credentials.clear() {
            warn!("Failed to clear credentials after 401: {err}");
        }
        if let Some(listener) = &self.listener {
            listener.on_session_expired(LOGIN_PATH);
        }
    }
}

fn checked_id(student_id: &str) -> ReportResult<&str> {
    let id = student_id.trim();
    if id.is_empty() || !id.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_') {
        return Err(ReportError::validation(format!(
            "invalid student id {student_id:?}"
        )));
    }
    Ok(id)
}

#[async_trait]
impl ReportSource for ApiClient {
    async fn fetch_report(&self, student_id: &str) -> ReportResult<StudentReportRecord> {
        self.student_report(student_id).await
    }
}
