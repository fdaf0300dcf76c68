//! Reconciliation of per-exam subject scores into one row per subject.
//!
//! The backend reports midterm and final results as separate entries that share a subject
//! name. The scores page shows a single row per subject, so entries are grouped by name and
//! assigned to the midterm/final slots here.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::fragment::Color;
use crate::model::{ExamKind, SubjectScoreEntry};

/// How a missing final-exam score is handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FinalScorePolicy {
    /// Leave the final slot empty. The page shows a placeholder.
    #[default]
    LeaveEmpty,
    /// Synthesize `midterm - random(0..=max_offset)` and mark the row as provisional.
    ///
    /// This mirrors a demo fallback of the web portal. The value is invented, so rows built
    /// this way always carry `final_is_provisional` and the page labels them.
    Provisional { max_offset: u32 },
}

/// One reconciled table row.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreRow {
    pub subject: String,
    pub midterm: Option<f64>,
    pub final_score: Option<f64>,
    pub final_is_provisional: bool,
    pub average: f64,
    pub letter_grade: Option<String>,
}

impl ScoreRow {
    fn new(subject: &str) -> Self {
        Self {
            subject: subject.to_string(),
            midterm: None,
            final_score: None,
            final_is_provisional: false,
            average: 0.0,
            letter_grade: None,
        }
    }

    fn assign(&mut self, entry: &SubjectScoreEntry) {
        if self.letter_grade.is_none() {
            self.letter_grade = entry
                .grade
                .as_deref()
                .map(str::trim)
                .filter(|grade| !grade.is_empty())
                .map(str::to_string);
        }

        let Some(score) = entry.score.filter(|score| score.is_finite()) else {
            return;
        };

        match entry.exam_kind() {
            Some(ExamKind::Midterm) => self.midterm = Some(score),
            Some(ExamKind::Final) => self.final_score = Some(score),
            None => {
                if self.midterm.is_none() {
                    self.midterm = Some(score);
                }
            }
        }
    }

    fn finish<R: Rng + ?Sized>(&mut self, policy: FinalScorePolicy, rng: &mut R) {
        if let (None, Some(midterm), FinalScorePolicy::Provisional { max_offset }) =
            (self.final_score, self.midterm, policy)
        {
            let offset = f64::from(rng.gen_range(0..=max_offset));
            self.final_score = Some((midterm - offset).max(0.0));
            self.final_is_provisional = true;
        }

        self.average = match (self.midterm, self.final_score) {
            (Some(midterm), Some(final_score)) => ((midterm + final_score) / 2.0).round(),
            (Some(single), None) | (None, Some(single)) => single,
            (None, None) => 0.0,
        };
    }
}

/// Groups entries by subject name and fills the midterm/final slots.
///
/// Rows keep the order in which each subject first appears.
pub fn reconcile_subjects(entries: &[SubjectScoreEntry], policy: FinalScorePolicy) -> Vec<ScoreRow> {
    reconcile_subjects_with(entries, policy, &mut rand::thread_rng())
}

/// Same as [`reconcile_subjects`] with an explicit random source for the provisional policy.
pub fn reconcile_subjects_with<R: Rng + ?Sized>(
    entries: &[SubjectScoreEntry],
    policy: FinalScorePolicy,
    rng: &mut R,
) -> Vec<ScoreRow> {
    let mut rows: Vec<ScoreRow> = Vec::new();

    for entry in entries {
        let subject = entry.subject.trim();
        let index = match rows.iter().position(|row| row.subject == subject) {
            Some(index) => index,
            None => {
                rows.push(ScoreRow::new(subject));
                rows.len() - 1
            }
        };
        rows[index].assign(entry);
    }

    for row in &mut rows {
        row.finish(policy, rng);
    }

    rows
}

/// Color classification of a 0-100 score.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoreBand {
    Excellent,
    Good,
    Fair,
    Low,
}

impl ScoreBand {
    pub fn classify(score: f64) -> Self {
        let score = if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 100.0)
        };
        if score >= 90.0 {
            Self::Excellent
        } else if score >= 80.0 {
            Self::Good
        } else if score >= 70.0 {
            Self::Fair
        } else {
            Self::Low
        }
    }

    pub fn color(self) -> Color {
        match self {
            Self::Excellent => Color::rgb(22, 163, 74),
            Self::Good => Color::rgb(37, 99, 235),
            Self::Fair => Color::rgb(234, 88, 12),
            Self::Low => Color::rgb(220, 38, 38),
        }
    }
}

/// Formats a score without a trailing `.0` for whole numbers.
pub fn format_score(score: f64) -> String {
    if (score - score.round()).abs() < f64::EPSILON {
        format!("{}", score.round() as i64)
    } else {
        format!("{score:.1}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn midterm_and_final_merge_into_one_row() {
        let entries = vec![
            SubjectScoreEntry::new("Math", 80.0).with_exam_type("midterm"),
            SubjectScoreEntry::new("Math", 90.0).with_exam_type("final"),
        ];
        let rows = reconcile_subjects(&entries, FinalScorePolicy::LeaveEmpty);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].midterm, Some(80.0));
        assert_eq!(rows[0].final_score, Some(90.0));
        assert_eq!(rows[0].average, 85.0);
        assert!(!rows[0].final_is_provisional);
    }

    #[test]
    fn untagged_entry_fills_midterm_only() {
        let entries = vec![SubjectScoreEntry::new("Math", 70.0)];
        let rows = reconcile_subjects(&entries, FinalScorePolicy::LeaveEmpty);

        assert_eq!(rows[0].midterm, Some(70.0));
        assert_eq!(rows[0].final_score, None);
        assert_eq!(rows[0].average, 70.0);
    }

    #[test]
    fn untagged_entry_does_not_override_tagged_midterm() {
        let entries = vec![
            SubjectScoreEntry::new("국어", 88.0).with_exam_type("midterm"),
            SubjectScoreEntry::new("국어", 50.0),
        ];
        let rows = reconcile_subjects(&entries, FinalScorePolicy::LeaveEmpty);
        assert_eq!(rows[0].midterm, Some(88.0));
    }

    #[test]
    fn rows_keep_first_appearance_order() {
        let entries = vec![
            SubjectScoreEntry::new("영어", 91.0),
            SubjectScoreEntry::new("수학", 72.0),
            SubjectScoreEntry::new("영어", 95.0).with_exam_type("final"),
        ];
        let rows = reconcile_subjects(&entries, FinalScorePolicy::LeaveEmpty);
        let subjects: Vec<_> = rows.iter().map(|row| row.subject.as_str()).collect();
        assert_eq!(subjects, vec!["영어", "수학"]);
        assert_eq!(rows[0].average, 93.0);
    }

    #[test]
    fn scoreless_subject_averages_to_zero() {
        let entries = vec![SubjectScoreEntry {
            subject: "체육".into(),
            grade: Some("P".into()),
            ..SubjectScoreEntry::default()
        }];
        let rows = reconcile_subjects(&entries, FinalScorePolicy::LeaveEmpty);
        assert_eq!(rows[0].average, 0.0);
        assert_eq!(rows[0].letter_grade.as_deref(), Some("P"));
    }

    #[test]
    fn provisional_final_is_marked_and_bounded() {
        let entries = vec![SubjectScoreEntry::new("과학", 84.0)];
        let mut rng = StdRng::seed_from_u64(7);
        let rows = reconcile_subjects_with(
            &entries,
            FinalScorePolicy::Provisional { max_offset: 5 },
            &mut rng,
        );

        let row = &rows[0];
        assert!(row.final_is_provisional);
        let final_score = row.final_score.expect("provisional final");
        assert!((79.0..=84.0).contains(&final_score));
        assert_eq!(row.average, ((84.0 + final_score) / 2.0).round());
    }

    #[test]
    fn bands_follow_thresholds() {
        assert_eq!(ScoreBand::classify(95.0), ScoreBand::Excellent);
        assert_eq!(ScoreBand::classify(90.0), ScoreBand::Excellent);
        assert_eq!(ScoreBand::classify(89.9), ScoreBand::Good);
        assert_eq!(ScoreBand::classify(80.0), ScoreBand::Good);
        assert_eq!(ScoreBand::classify(79.0), ScoreBand::Fair);
        assert_eq!(ScoreBand::classify(70.0), ScoreBand::Fair);
        assert_eq!(ScoreBand::classify(69.5), ScoreBand::Low);
        assert_eq!(ScoreBand::classify(140.0), ScoreBand::Excellent);
        assert_eq!(ScoreBand::classify(-3.0), ScoreBand::Low);
    }

    #[test]
    fn whole_scores_format_without_decimals() {
        assert_eq!(format_score(85.0), "85");
        assert_eq!(format_score(85.26), "85.3");
    }
}
