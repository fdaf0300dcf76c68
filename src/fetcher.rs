//! Loads the composite report record for one student.

use async_trait::async_trait;
use log::{info, warn};

use crate::error::ReportResult;
use crate::model::StudentReportRecord;

/// Anything able to produce a student's report record.
#[async_trait]
pub trait ReportSource: Send + Sync {
    async fn fetch_report(&self, student_id: &str) -> ReportResult<StudentReportRecord>;
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum FetchState {
    #[default]
    Idle,
    Loaded {
        student_id: String,
        record: StudentReportRecord,
    },
    Failed {
        student_id: String,
        message: String,
    },
}

/// Caches the last fetched record and exposes a manual retry after failures.
///
/// Methods take `&mut self`, so at most one fetch is in flight per fetcher.
pub struct ReportFetcher<S> {
    source: S,
    state: FetchState,
}

impl<S: ReportSource> ReportFetcher<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: FetchState::Idle,
        }
    }

    pub fn state(&self) -> &FetchState {
        &self.state
    }

    pub fn record(&self) -> Option<&StudentReportRecord> {
        match &self.state {
            FetchState::Loaded { record, .. } => Some(record),
            _ => None,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetches `student_id` unless that record is already loaded.
    ///
    /// A failed attempt for the same id is fetched again.
    pub async fn load(&mut self, student_id: &str) -> &FetchState {
        let already_loaded = matches!(
            &self.state,
            FetchState::Loaded { student_id: loaded, .. } if loaded == student_id
        );
        if !already_loaded {
            self.fetch(student_id.to_string()).await;
        }
        &self.state
    }

    /// Whether the last attempt failed and can be retried.
    pub fn can_retry(&self) -> bool {
        matches!(self.state, FetchState::Failed { .. })
    }

    /// Re-issues the last failed fetch. Does nothing in any other state.
    pub async fn retry(&mut self) -> &FetchState {
        if let FetchState::Failed { student_id, .. } = &self.state {
            let student_id = student_id.clone();
            self.fetch(student_id).await;
        }
        &self.state
    }

    /// Takes the loaded record out, leaving the fetcher idle.
    pub fn take_record(&mut self) -> Option<StudentReportRecord> {
        match std::mem::take(&mut self.state) {
            FetchState::Loaded { record, .. } => Some(record),
            other => {
                self.state = other;
                None
            }
        }
    }

    async fn fetch(&mut self, student_id: String) {
        self.state = match self.source.fetch_report(&student_id).await {
            Ok(record) => {
                info!("Loaded report record for student {student_id}");
                FetchState::Loaded { student_id, record }
            }
            Err(err) => {
                warn!("Failed to load report record for student {student_id}: {err}");
                FetchState::Failed {
                    student_id,
                    message: err.to_string(),
                }
            }
        };
    }
}
