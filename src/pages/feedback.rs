use crate::fragment::{Block, Field, PageFragment, PageKind, NO_DATA};
use crate::model::{
    format_timestamp, CounselingEntry, FeedbackCategory, FeedbackEntry, StudentReportRecord,
};

/// Feedback and counseling page.
pub fn render_feedback_page(record: &StudentReportRecord) -> PageFragment {
    let mut page = PageFragment::new(PageKind::Feedback).with_block(Block::Title {
        title: PageKind::Feedback.title().to_string(),
        subtitle: super::subtitle(record),
    });

    page.push(Block::heading("교사 피드백"));
    if record.feedbacks.is_empty() {
        page.push(Block::placeholder("등록된 피드백이 없습니다"));
    } else {
        for (index, entry) in record.feedbacks.iter().enumerate() {
            page.push(feedback_card(index + 1, entry));
        }
    }

    page.push(Block::Spacer(12));
    page.push(Block::heading("상담 기록"));
    if record.counselings.is_empty() {
        page.push(Block::placeholder("등록된 상담 기록이 없습니다"));
    } else {
        for entry in &record.counselings {
            page.push(counseling_card(entry));
        }
    }

    page
}

fn feedback_card(number: usize, entry: &FeedbackEntry) -> Block {
    let mut lines: Vec<Field> = FeedbackCategory::ALL
        .iter()
        .filter_map(|category| {
            entry
                .text(*category)
                .map(|text| Field::new(category.label(), Some(text)))
        })
        .collect();
    if lines.is_empty() {
        lines.push(Field::new("내용", Some(NO_DATA)));
    }

    let mut meta = Vec::new();
    if let Some(created_at) = entry.created_at.as_deref() {
        meta.push(format_timestamp(created_at));
    }
    meta.push(sharing_label(entry));

    Block::Card {
        title: format!("피드백 {number}"),
        meta: Some(meta.join(" · ")),
        lines,
    }
}

fn sharing_label(entry: &FeedbackEntry) -> String {
    match (entry.is_shared_with_student, entry.is_shared_with_parent) {
        (true, true) => "학생·학부모 공개".to_string(),
        (true, false) => "학생 공개".to_string(),
        (false, true) => "학부모 공개".to_string(),
        (false, false) => "비공개".to_string(),
    }
}

fn counseling_card(entry: &CounselingEntry) -> Block {
    let title = entry
        .title
        .as_deref()
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or("상담")
        .to_string();

    Block::Card {
        title,
        meta: entry.created_at.as_deref().map(format_timestamp),
        lines: vec![
            Field::new("상담 내용", entry.context.clone()),
            Field::new("향후 계획", entry.plan.clone()),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::PLACEHOLDER_DASH;

    fn cards(page: &PageFragment) -> Vec<(&String, &Option<String>, &Vec<Field>)> {
        page.blocks()
            .iter()
            .filter_map(|block| match block {
                Block::Card { title, meta, lines } => Some((title, meta, lines)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn missing_lists_render_placeholders() {
        let page = render_feedback_page(&StudentReportRecord::default());
        assert!(page.has_placeholder("등록된 피드백이 없습니다"));
        assert!(page.has_placeholder("등록된 상담 기록이 없습니다"));
        assert!(cards(&page).is_empty());
    }

    #[test]
    fn feedback_cards_skip_blank_categories() {
        let record = StudentReportRecord {
            feedbacks: vec![FeedbackEntry {
                academic: Some("수학 실력이 크게 늘었습니다.".into()),
                behavior: Some("  ".into()),
                created_at: Some("2024-06-01T10:15:00".into()),
                is_shared_with_parent: true,
                ..FeedbackEntry::default()
            }],
            ..StudentReportRecord::default()
        };
        let page = render_feedback_page(&record);
        let cards = cards(&page);
        assert_eq!(cards.len(), 1);
        let (title, meta, lines) = cards[0];
        assert_eq!(title, "피드백 1");
        assert_eq!(meta.as_deref(), Some("2024-06-01 10:15 · 학부모 공개"));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].label, "학업");
        assert!(page.has_placeholder("등록된 상담 기록이 없습니다"));
    }

    #[test]
    fn counseling_cards_fill_missing_text_with_dash() {
        let record = StudentReportRecord {
            counselings: vec![CounselingEntry {
                title: Some("진로 상담".into()),
                context: Some("이공계 진학 희망".into()),
                ..CounselingEntry::default()
            }],
            ..StudentReportRecord::default()
        };
        let page = render_feedback_page(&record);
        let cards = cards(&page);
        let (title, meta, lines) = cards[0];
        assert_eq!(title, "진로 상담");
        assert!(meta.is_none());
        assert_eq!(lines[1].value, PLACEHOLDER_DASH);
    }
}
