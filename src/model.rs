//! Data structures describing the records exchanged with the school backend.
//!
//! The report endpoint returns one aggregate document per student. Any part of it may be
//! missing or `null`: a grade-year can exist without semesters, a student can have no
//! attendance summary yet. The types below therefore default every field and the accessors
//! report absence as `None` instead of failing, so the page renderers can fall back to
//! placeholders.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Composite record backing the three report pages.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentReportRecord {
    pub student: Option<StudentProfile>,
    pub attendance: Option<AttendanceSummary>,
    #[serde(deserialize_with = "null_as_default")]
    pub grades: GradeTable,
    #[serde(deserialize_with = "null_as_default")]
    pub feedbacks: Vec<FeedbackEntry>,
    #[serde(deserialize_with = "null_as_default")]
    pub counselings: Vec<CounselingEntry>,
}

impl StudentReportRecord {
    /// Name of the student, if the profile carries a non-blank one.
    pub fn student_name(&self) -> Option<&str> {
        self.student
            .as_ref()
            .and_then(|student| student.name.as_deref())
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentProfile {
    pub name: Option<String>,
    pub grade: Option<u32>,
    pub class_num: Option<u32>,
    pub number: Option<u32>,
    pub birth_date: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub parent_phone: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttendanceSummary {
    #[serde(deserialize_with = "null_as_default")]
    pub present: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub absent: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub late: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub early_leave: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub sick: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub records: Vec<AttendanceRecord>,
}

/// A dated exception to regular attendance (absence, lateness, ...).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttendanceRecord {
    pub date: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub reason: Option<String>,
}

/// Grade table keyed by grade-year, then by semester.
///
/// Keys are kept as the backend sends them (`"1"`, `"2"`, ...). Iteration through
/// [`GradeTable::semesters`] orders numeric keys numerically.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GradeTable(pub BTreeMap<String, Option<BTreeMap<String, Option<SemesterRecord>>>>);

impl GradeTable {
    /// Returns the record for a grade-year and semester, if present.
    pub fn semester(&self, year: &str, semester: &str) -> Option<&SemesterRecord> {
        self.0.get(year)?.as_ref()?.get(semester)?.as_ref()
    }

    /// Iterates over every populated semester in grade-year, then semester order.
    pub fn semesters(&self) -> Vec<(&str, &str, &SemesterRecord)> {
        let mut years: Vec<_> = self.0.iter().collect();
        years.sort_by(|a, b| key_order(a.0, b.0));

        let mut out = Vec::new();
        for (year, semesters) in years {
            let Some(semesters) = semesters else {
                continue;
            };
            let mut entries: Vec<_> = semesters.iter().collect();
            entries.sort_by(|a, b| key_order(a.0, b.0));
            for (semester, record) in entries {
                if let Some(record) = record {
                    out.push((year.as_str(), semester.as_str(), record));
                }
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.semesters().is_empty()
    }
}

fn key_order(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<u32>(), b.parse::<u32>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SemesterRecord {
    pub average: Option<f64>,
    pub class_rank: Option<u32>,
    pub total_rank: Option<u32>,
    pub total_score: Option<f64>,
    #[serde(deserialize_with = "null_as_default")]
    pub subjects: Vec<SubjectScoreEntry>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubjectScoreEntry {
    #[serde(deserialize_with = "null_as_default")]
    pub subject: String,
    pub score: Option<f64>,
    pub grade: Option<String>,
    pub exam_type: Option<String>,
}

impl SubjectScoreEntry {
    pub fn new(subject: impl Into<String>, score: f64) -> Self {
        Self {
            subject: subject.into(),
            score: Some(score),
            ..Self::default()
        }
    }

    pub fn with_exam_type(mut self, exam_type: impl Into<String>) -> Self {
        self.exam_type = Some(exam_type.into());
        self
    }

    pub fn with_grade(mut self, grade: impl Into<String>) -> Self {
        self.grade = Some(grade.into());
        self
    }

    pub fn exam_kind(&self) -> Option<ExamKind> {
        self.exam_type.as_deref().and_then(ExamKind::parse)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExamKind {
    Midterm,
    Final,
}

impl ExamKind {
    /// Recognizes the exam-type tags used by the backend. Unknown tags yield `None`.
    pub fn parse(tag: &str) -> Option<Self> {
        let tag = tag.trim();
        if tag.eq_ignore_ascii_case("midterm") || tag == "중간" || tag == "중간고사" {
            Some(Self::Midterm)
        } else if tag.eq_ignore_ascii_case("final") || tag == "기말" || tag == "기말고사" {
            Some(Self::Final)
        } else {
            None
        }
    }
}

/// The fixed feedback categories a teacher writes about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedbackCategory {
    Academic,
    Behavior,
    Attendance,
    Attitude,
    Other,
}

impl FeedbackCategory {
    pub const ALL: [Self; 5] = [
        Self::Academic,
        Self::Behavior,
        Self::Attendance,
        Self::Attitude,
        Self::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Academic => "학업",
            Self::Behavior => "행동",
            Self::Attendance => "출결",
            Self::Attitude => "태도",
            Self::Other => "기타",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedbackEntry {
    pub academic: Option<String>,
    pub behavior: Option<String>,
    pub attendance: Option<String>,
    pub attitude: Option<String>,
    pub other: Option<String>,
    pub created_at: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub is_shared_with_student: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub is_shared_with_parent: bool,
}

impl FeedbackEntry {
    pub fn text(&self, category: FeedbackCategory) -> Option<&str> {
        let value = match category {
            FeedbackCategory::Academic => &self.academic,
            FeedbackCategory::Behavior => &self.behavior,
            FeedbackCategory::Attendance => &self.attendance,
            FeedbackCategory::Attitude => &self.attitude,
            FeedbackCategory::Other => &self.other,
        };
        value
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// Working state of the feedback authoring form, submitted wholesale.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackFormData {
    pub academic: String,
    pub behavior: String,
    pub attendance: String,
    pub attitude: String,
    pub other: String,
    pub is_shared_with_student: bool,
    pub is_shared_with_parent: bool,
}

impl FeedbackFormData {
    pub fn field_mut(&mut self, category: FeedbackCategory) -> &mut String {
        match category {
            FeedbackCategory::Academic => &mut self.academic,
            FeedbackCategory::Behavior => &mut self.behavior,
            FeedbackCategory::Attendance => &mut self.attendance,
            FeedbackCategory::Attitude => &mut self.attitude,
            FeedbackCategory::Other => &mut self.other,
        }
    }

    pub fn with_text(mut self, category: FeedbackCategory, text: impl Into<String>) -> Self {
        *self.field_mut(category) = text.into();
        self
    }

    /// True when every category is blank.
    pub fn is_empty(&self) -> bool {
        [
            &self.academic,
            &self.behavior,
            &self.attendance,
            &self.attitude,
            &self.other,
        ]
        .iter()
        .all(|text| text.trim().is_empty())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CounselingEntry {
    pub title: Option<String>,
    pub context: Option<String>,
    pub plan: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounselingDraft {
    pub title: String,
    pub context: String,
    pub plan: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Parent,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
}

/// Formats a backend timestamp as `YYYY-MM-DD HH:MM`.
///
/// Accepts RFC 3339, naive ISO date-times and plain dates; anything else is returned as-is.
pub fn format_timestamp(raw: &str) -> String {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.format("%Y-%m-%d %H:%M").to_string();
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, pattern) {
            return parsed.format("%Y-%m-%d %H:%M").to_string();
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format("%Y-%m-%d").to_string();
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_record_deserializes() {
        let record: StudentReportRecord = serde_json::from_str(
            r#"{
                "student": {"name": "김하늘", "grade": 2},
                "attendance": null,
                "grades": {"1": {}, "2": {"1": {"average": 85.5, "subjects": null}}},
                "feedbacks": null
            }"#,
        )
        .expect("record parses");

        assert_eq!(record.student_name(), Some("김하늘"));
        assert!(record.attendance.is_none());
        assert!(record.feedbacks.is_empty());
        assert!(record.counselings.is_empty());
        assert!(record.grades.semester("1", "1").is_none());
        let semester = record.grades.semester("2", "1").expect("semester present");
        assert_eq!(semester.average, Some(85.5));
        assert!(semester.subjects.is_empty());
    }

    #[test]
    fn explicit_nulls_fall_back_to_defaults() {
        let record: StudentReportRecord = serde_json::from_str(
            r#"{
                "attendance": {"present": null, "late": 2, "records": null},
                "grades": {"1": {"1": {"subjects": [{"subject": null, "score": 80}]}}},
                "feedbacks": [{
                    "academic": "x",
                    "isSharedWithStudent": null,
                    "isSharedWithParent": null
                }]
            }"#,
        )
        .expect("record parses");

        let attendance = record.attendance.expect("attendance present");
        assert_eq!((attendance.present, attendance.late), (0, 2));
        let subject = &record.grades.semester("1", "1").expect("semester").subjects[0];
        assert_eq!(subject.subject, "");
        assert_eq!(subject.score, Some(80.0));
        let feedback = &record.feedbacks[0];
        assert!(!feedback.is_shared_with_student);
        assert!(!feedback.is_shared_with_parent);
        assert_eq!(feedback.text(FeedbackCategory::Academic), Some("x"));
    }

    #[test]
    fn semesters_are_ordered_numerically() {
        let record: StudentReportRecord = serde_json::from_str(
            r#"{"grades": {
                "10": {"1": {}},
                "2": {"2": {}, "1": {}},
                "1": {"1": null},
                "3": null
            }}"#,
        )
        .expect("record parses");

        let order: Vec<_> = record
            .grades
            .semesters()
            .into_iter()
            .map(|(year, semester, _)| (year, semester))
            .collect();
        assert_eq!(order, vec![("2", "1"), ("2", "2"), ("10", "1")]);
    }

    #[test]
    fn exam_kind_recognizes_tags() {
        assert_eq!(ExamKind::parse("Midterm"), Some(ExamKind::Midterm));
        assert_eq!(ExamKind::parse("기말"), Some(ExamKind::Final));
        assert_eq!(ExamKind::parse("quiz"), None);
    }

    #[test]
    fn feedback_form_emptiness() {
        let form = FeedbackFormData::default();
        assert!(form.is_empty());
        let form = form.with_text(FeedbackCategory::Attitude, "성실함");
        assert!(!form.is_empty());
        assert_eq!(form.attitude, "성실함");
    }

    #[test]
    fn timestamps_are_normalized() {
        assert_eq!(format_timestamp("2024-05-01T09:30:00Z"), "2024-05-01 09:30");
        assert_eq!(format_timestamp("2024-05-01T09:30:12.123"), "2024-05-01 09:30");
        assert_eq!(format_timestamp("2024-05-01"), "2024-05-01");
        assert_eq!(format_timestamp("yesterday"), "yesterday");
    }
}
