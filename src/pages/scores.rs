use crate::fragment::{
    or_dash, Block, Cell, Color, Column, Field, PageFragment, PageKind, Span, Table,
    PLACEHOLDER_DASH,
};
use crate::model::{SemesterRecord, StudentReportRecord};
use crate::scores::{format_score, reconcile_subjects, FinalScorePolicy, ScoreBand, ScoreRow};

const PROVISIONAL_NOTE: &str =
    "* 표시된 기말 점수는 실제 성적이 아닌 임시 추정치입니다. 성적 확정 후 다시 출력하세요.";

/// Grades page: one section per grade-year and semester.
pub fn render_scores_page(record: &StudentReportRecord, policy: FinalScorePolicy) -> PageFragment {
    let mut page = PageFragment::new(PageKind::Scores).with_block(Block::Title {
        title: PageKind::Scores.title().to_string(),
        subtitle: super::subtitle(record),
    });

    let semesters = record.grades.semesters();
    if semesters.is_empty() {
        page.push(Block::no_data());
        return page;
    }

    let mut any_provisional = false;
    for (index, (year, semester, data)) in semesters.into_iter().enumerate() {
        if index > 0 {
            page.push(Block::Spacer(10));
        }
        page.push(Block::heading(format!("{year}학년 {semester}학기")));
        page.push(Block::Fields(summary_fields(data)));

        let rows = reconcile_subjects(&data.subjects, policy);
        if rows.is_empty() {
            page.push(Block::placeholder("과목 성적이 없습니다"));
            continue;
        }
        any_provisional |= rows.iter().any(|row| row.final_is_provisional);
        page.push(Block::Table(score_table(&rows)));
    }

    if any_provisional {
        page.push(Block::Spacer(6));
        page.push(Block::paragraph(vec![
            Span::new(PROVISIONAL_NOTE).colored(Color::MUTED)
        ]));
    }

    page
}

fn summary_fields(data: &SemesterRecord) -> Vec<Field> {
    vec![
        Field::new("평균", data.average.map(format_score)),
        Field::new("반 석차", data.class_rank.map(|rank| format!("{rank}등"))),
        Field::new("전체 석차", data.total_rank.map(|rank| format!("{rank}등"))),
        Field::new("총점", data.total_score.map(format_score)),
    ]
}

fn score_table(rows: &[ScoreRow]) -> Table {
    let mut table = Table::new(vec![
        Column::new("과목", 3),
        Column::new("중간고사", 2).centered(),
        Column::new("기말고사", 2).centered(),
        Column::new("평균", 2).centered(),
        Column::new("등급", 1).centered(),
    ]);

    for row in rows {
        let final_cell = match row.final_score {
            Some(score) if row.final_is_provisional => {
                score_cell(score).with_suffix(Span::new("*").colored(Color::MUTED))
            }
            Some(score) => score_cell(score),
            None => Cell::new(PLACEHOLDER_DASH),
        };

        table = table.with_row(vec![
            Cell::new(Span::new(row.subject.clone()).bold()),
            row.midterm.map_or_else(|| Cell::new(PLACEHOLDER_DASH), score_cell),
            final_cell,
            score_cell(row.average),
            Cell::new(or_dash(row.letter_grade.clone())),
        ]);
    }

    table
}

fn score_cell(score: f64) -> Cell {
    Cell::new(
        Span::new(format_score(score))
            .bold()
            .colored(ScoreBand::classify(score).color()),
    )
}
