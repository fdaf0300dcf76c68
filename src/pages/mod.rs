//! Pure renderers turning a [`StudentReportRecord`] into the three report pages.
//!
//! Renderers never fail: absent sections become placeholders and absent values become a dash.

mod feedback;
mod profile;
mod scores;

pub use feedback::render_feedback_page;
pub use profile::render_profile_page;
pub use scores::render_scores_page;

use crate::fragment::PageFragment;
use crate::model::StudentReportRecord;
use crate::scores::FinalScorePolicy;

/// Renders all pages in print order: profile, scores, feedback.
pub fn render_report_pages(
    record: &StudentReportRecord,
    policy: FinalScorePolicy,
) -> [PageFragment; 3] {
    [
        render_profile_page(record),
        render_scores_page(record, policy),
        render_feedback_page(record),
    ]
}

fn subtitle(record: &StudentReportRecord) -> Option<String> {
    let name = record.student_name()?;
    let class_line = record.student.as_ref().and_then(|student| {
        match (student.grade, student.class_num, student.number) {
            (Some(grade), Some(class_num), Some(number)) => {
                Some(format!("{grade}학년 {class_num}반 {number}번"))
            }
            (Some(grade), Some(class_num), None) => Some(format!("{grade}학년 {class_num}반")),
            _ => None,
        }
    });
    Some(match class_line {
        Some(line) => format!("{name} · {line}"),
        None => name.to_string(),
    })
}
