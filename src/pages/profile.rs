use crate::fragment::{
    or_dash, Block, Cell, Color, Column, Field, PageFragment, PageKind, Stat, Table,
};
use crate::model::{AttendanceSummary, StudentProfile, StudentReportRecord};

/// Profile and attendance page.
pub fn render_profile_page(record: &StudentReportRecord) -> PageFragment {
    let mut page = PageFragment::new(PageKind::Profile).with_block(Block::Title {
        title: PageKind::Profile.title().to_string(),
        subtitle: super::subtitle(record),
    });

    page.push(Block::heading("기본 정보"));
    match &record.student {
        Some(student) => page.push(Block::Fields(profile_fields(student))),
        None => page.push(Block::no_data()),
    }

    page.push(Block::Spacer(12));
    page.push(Block::heading("출결 현황"));
    match &record.attendance {
        Some(attendance) => {
            for block in attendance_blocks(attendance) {
                page.push(block);
            }
        }
        None => page.push(Block::no_data()),
    }

    page
}

fn profile_fields(student: &StudentProfile) -> Vec<Field> {
    vec![
        Field::new("이름", student.name.clone()),
        Field::new("학년", student.grade.map(|grade| format!("{grade}학년"))),
        Field::new("반", student.class_num.map(|class_num| format!("{class_num}반"))),
        Field::new("번호", student.number.map(|number| format!("{number}번"))),
        Field::new("생년월일", student.birth_date.clone()),
        Field::new("연락처", student.phone.clone()),
        Field::new("보호자 연락처", student.parent_phone.clone()),
        Field::new("주소", student.address.clone()),
    ]
}

fn attendance_blocks(attendance: &AttendanceSummary) -> Vec<Block> {
    let stats = vec![
        Stat::new("출석", attendance.present, Color::rgb(22, 163, 74)),
        Stat::new("결석", attendance.absent, Color::rgb(220, 38, 38)),
        Stat::new("지각", attendance.late, Color::rgb(234, 88, 12)),
        Stat::new("조퇴", attendance.early_leave, Color::rgb(202, 138, 4)),
        Stat::new("병결", attendance.sick, Color::rgb(124, 58, 237)),
    ];

    let mut blocks = vec![Block::Stats(stats), Block::Spacer(8), Block::heading("출결 특이사항")];

    if attendance.records.is_empty() {
        blocks.push(Block::placeholder("특이사항이 없습니다"));
        return blocks;
    }

    let mut table = Table::new(vec![
        Column::new("날짜", 2).centered(),
        Column::new("구분", 1).centered(),
        Column::new("사유", 4),
    ]);
    for entry in &attendance.records {
        table = table.with_row(vec![
            Cell::new(or_dash(entry.date.clone())),
            Cell::new(or_dash(entry.kind.as_deref().map(attendance_kind_label))),
            Cell::new(or_dash(entry.reason.clone())),
        ]);
    }
    blocks.push(Block::Table(table));
    blocks
}

fn attendance_kind_label(kind: &str) -> String {
    match kind.trim().to_ascii_lowercase().as_str() {
        "absent" => "결석".to_string(),
        "late" => "지각".to_string(),
        "early_leave" | "earlyleave" => "조퇴".to_string(),
        "sick" => "병결".to_string(),
        "present" => "출석".to_string(),
        _ => kind.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::{NO_DATA, PLACEHOLDER_DASH};
    use crate::model::AttendanceRecord;

    #[test]
    fn missing_attendance_renders_placeholder() {
        let record = StudentReportRecord {
            student: Some(StudentProfile {
                name: Some("이서준".into()),
                ..StudentProfile::default()
            }),
            ..StudentReportRecord::default()
        };
        let page = render_profile_page(&record);
        assert!(page.has_placeholder(NO_DATA));
        assert!(page.blocks().iter().all(|block| !matches!(block, Block::Stats(_))));
    }

    #[test]
    fn missing_profile_values_render_as_dash() {
        let record = StudentReportRecord {
            student: Some(StudentProfile {
                name: Some("이서준".into()),
                grade: Some(2),
                ..StudentProfile::default()
            }),
            ..StudentReportRecord::default()
        };
        let page = render_profile_page(&record);
        let fields = page
            .blocks()
            .iter()
            .find_map(|block| match block {
                Block::Fields(fields) => Some(fields),
                _ => None,
            })
            .expect("profile fields");
        assert_eq!(fields[1].value, "2학년");
        assert_eq!(fields[2].value, PLACEHOLDER_DASH);
    }

    #[test]
    fn attendance_exceptions_become_table_rows() {
        let record = StudentReportRecord {
            attendance: Some(AttendanceSummary {
                present: 180,
                late: 2,
                records: vec![
                    AttendanceRecord {
                        date: Some("2024-04-02".into()),
                        kind: Some("late".into()),
                        reason: None,
                    },
                    AttendanceRecord::default(),
                ],
                ..AttendanceSummary::default()
            }),
            ..StudentReportRecord::default()
        };
        let page = render_profile_page(&record);
        let table = page.tables().next().expect("exception table");
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][1].text(), "지각");
        assert_eq!(table.rows[0][2].text(), PLACEHOLDER_DASH);
        assert_eq!(table.rows[1][0].text(), PLACEHOLDER_DASH);
    }
}
