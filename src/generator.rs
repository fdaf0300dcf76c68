//! Report generation: render, capture, assemble, deliver.
//!
//! [`ReportGenerator::generate`] is the single entry point. It never returns an error;
//! failures are logged in full and reported to the user through one [`Notification`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};

use crate::assemble::{assemble, deliver, report_file_name, Delivery, DocumentViewer, OutputMode};
use crate::capture::{capture_all, PageRasterizer};
use crate::error::ReportResult;
use crate::fragment::PageKind;
use crate::model::StudentReportRecord;
use crate::pages::render_report_pages;
use crate::scores::FinalScorePolicy;

/// Shared "a report is being generated" flag.
#[derive(Clone, Debug, Default)]
pub struct GenerationStatus {
    flag: Arc<AtomicBool>,
}

impl GenerationStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_generating(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Marks generation as started. Returns `None` when another generation is running.
    ///
    /// The flag is cleared when the returned guard is dropped, including during unwinding.
    pub fn begin(&self) -> Option<GenerationGuard> {
        self.flag
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| GenerationGuard {
                flag: Arc::clone(&self.flag),
            })
    }
}

#[derive(Debug)]
pub struct GenerationGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

/// Transient message for the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

pub const GENERATION_FAILED_MESSAGE: &str = "PDF 생성 중 오류가 발생했습니다. 다시 시도해 주세요.";
pub const ALREADY_GENERATING_MESSAGE: &str = "이미 보고서를 생성하고 있습니다.";

/// A delivered report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedReport {
    pub file_name: String,
    pub kinds: Vec<PageKind>,
    pub delivery: Delivery,
}

impl GeneratedReport {
    pub fn page_count(&self) -> usize {
        self.kinds.len()
    }
}

pub struct ReportGenerator {
    rasterizer: Arc<dyn PageRasterizer>,
    viewer: Arc<dyn DocumentViewer>,
    notifier: Arc<dyn Notifier>,
    status: GenerationStatus,
    policy: FinalScorePolicy,
}

impl ReportGenerator {
    pub fn new(
        rasterizer: Arc<dyn PageRasterizer>,
        viewer: Arc<dyn DocumentViewer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            rasterizer,
            viewer,
            notifier,
            status: GenerationStatus::new(),
            policy: FinalScorePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FinalScorePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Shares an existing flag, e.g. one observed by a progress indicator.
    pub fn with_status(mut self, status: GenerationStatus) -> Self {
        self.status = status;
        self
    }

    pub fn status(&self) -> &GenerationStatus {
        &self.status
    }

    /// Generates the three-page report for `record` and saves or previews it.
    ///
    /// Exactly one notification is emitted per call.
    pub async fn generate(
        &self,
        record: &StudentReportRecord,
        mode: &OutputMode,
    ) -> Option<GeneratedReport> {
        let Some(_guard) = self.status.begin() else {
            warn!("Report generation requested while another one is running");
            self.notifier.notify(Notification::error(ALREADY_GENERATING_MESSAGE));
            return None;
        };

        match self.run(record, mode).await {
            Ok(report) => {
                let message = match &report.delivery {
                    Delivery::Saved(path) => format!("PDF가 저장되었습니다: {}", path.display()),
                    Delivery::Previewed => format!("PDF 미리보기를 열었습니다: {}", report.file_name),
                };
                self.notifier.notify(Notification::info(message));
                Some(report)
            }
            Err(err) => {
                warn!("Report generation failed: {err}");
                self.notifier.notify(Notification::error(GENERATION_FAILED_MESSAGE));
                None
            }
        }
    }

    async fn run(&self, record: &StudentReportRecord, mode: &OutputMode) -> ReportResult<GeneratedReport> {
        let student_name = record.student_name().unwrap_or_default();
        info!("Generating report for {:?}", student_name);

        let fragments: Vec<_> = render_report_pages(record, self.policy).into_iter().collect();
        let pages = capture_all(Arc::clone(&self.rasterizer), fragments).await;

        let title = format!("{} 종합보고서", student_name).trim().to_string();
        let document = assemble(pages, &title)?;
        #[cfg(feature = "bookmarks")]
        let document = with_bookmarks(document)?;

        let file_name = report_file_name(student_name);
        let delivery = deliver(&document, &file_name, mode, self.viewer.as_ref())?;

        Ok(GeneratedReport {
            file_name,
            kinds: document.kinds,
            delivery,
        })
    }
}

#[cfg(feature = "bookmarks")]
fn with_bookmarks(
    mut document: crate::assemble::ReportDocument,
) -> ReportResult<crate::assemble::ReportDocument> {
    document.bytes = crate::bookmarks::apply_page_bookmarks(&document.bytes, &document.kinds)?;
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_begin_is_refused_until_guard_drops() {
        let status = GenerationStatus::new();
        let guard = status.begin().expect("first begin");
        assert!(status.is_generating());
        assert!(status.begin().is_none());

        drop(guard);
        assert!(!status.is_generating());
        assert!(status.begin().is_some());
    }

    #[test]
    fn flag_resets_when_generation_panics() {
        let status = GenerationStatus::new();
        let shared = status.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = shared.begin().expect("begin");
            panic!("capture blew up");
        });
        assert!(result.is_err());
        assert!(!status.is_generating());
    }
}
