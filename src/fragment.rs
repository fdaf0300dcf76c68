//! Layout model for a single printed report page.
//!
//! A [`PageFragment`] is the print-styled view of one report page: a vertical stack of
//! [`Block`]s that the capture step lays out onto a fixed-size viewport. The types only
//! describe content and emphasis. Geometry is decided later by [`crate::capture::layout`],
//! so renderers stay pure and easy to test.

/// Text shown for a missing scalar value.
pub const PLACEHOLDER_DASH: &str = "-";

/// Message shown when a whole section has no data.
pub const NO_DATA: &str = "데이터가 없습니다";

/// Returns the value, or [`PLACEHOLDER_DASH`] when it is missing or blank.
pub fn or_dash<S: Into<String>>(value: Option<S>) -> String {
    value
        .map(Into::into)
        .filter(|value: &String| !value.trim().is_empty())
        .unwrap_or_else(|| PLACEHOLDER_DASH.to_string())
}

/// RGB color used for text emphasis and table accents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Self = Self::rgb(17, 24, 39);
    pub const MUTED: Self = Self::rgb(107, 114, 128);
    pub const ACCENT: Self = Self::rgb(30, 64, 175);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `#rrggbb` notation.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Horizontal alignment of text inside its box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// A slice of text together with inline style attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Span {
    text: String,
    bold: bool,
    color: Option<Color>,
}

impl Span {
    /// Creates a new span with the provided text and no styles applied.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_bold(&self) -> bool {
        self.bold
    }

    pub fn color(&self) -> Option<Color> {
        self.color
    }

    /// Sets the bold flag and returns the updated span.
    pub fn with_bold(mut self, bold: bool) -> Self {
        self.bold = bold;
        self
    }

    /// Sets the span color and returns the updated span.
    pub fn with_color(mut self, color: Option<Color>) -> Self {
        self.color = color;
        self
    }

    /// Copies the style of this span onto new text.
    pub fn restyle(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: self.bold,
            color: self.color,
        }
    }

    /// Whether both spans share bold and color settings.
    pub fn same_style(&self, other: &Self) -> bool {
        self.bold == other.bold && self.color == other.color
    }

    pub(crate) fn push_str(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Convenience shorthand that marks the span as bold.
    pub fn bold(self) -> Self {
        self.with_bold(true)
    }

    /// Convenience shorthand that assigns a color to the span.
    pub fn colored(self, color: Color) -> Self {
        self.with_color(Some(color))
    }
}

impl From<&str> for Span {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Span {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

/// Label/value pair rendered in a two-column grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub label: String,
    pub value: String,
}

impl Field {
    /// Creates a field; blank or missing values render as [`PLACEHOLDER_DASH`].
    pub fn new(label: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        Self {
            label: label.into(),
            value: or_dash(value),
        }
    }
}

/// A highlighted counter tile (e.g. number of absent days).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stat {
    pub label: String,
    pub value: String,
    pub color: Color,
}

impl Stat {
    pub fn new(label: impl Into<String>, value: impl ToString, color: Color) -> Self {
        Self {
            label: label.into(),
            value: value.to_string(),
            color,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    pub header: String,
    /// Relative share of the table width.
    pub weight: u32,
    pub alignment: Alignment,
}

impl Column {
    pub fn new(header: impl Into<String>, weight: u32) -> Self {
        Self {
            header: header.into(),
            weight: weight.max(1),
            alignment: Alignment::Left,
        }
    }

    pub fn centered(mut self) -> Self {
        self.alignment = Alignment::Center;
        self
    }
}

/// A table cell made of styled spans.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cell {
    pub spans: Vec<Span>,
}

impl Cell {
    pub fn new(span: impl Into<Span>) -> Self {
        Self {
            spans: vec![span.into()],
        }
    }

    /// Appends a span and returns the updated cell.
    pub fn with_suffix(mut self, span: Span) -> Self {
        self.spans.push(span);
        self
    }

    pub fn text(&self) -> String {
        self.spans.iter().map(Span::text).collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Appends a row. Missing trailing cells are padded with empty ones.
    pub fn with_row(mut self, mut cells: Vec<Cell>) -> Self {
        cells.resize_with(self.columns.len().max(cells.len()), Cell::default);
        self.rows.push(cells);
        self
    }
}

/// Individual content blocks stacked vertically on a page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Block {
    /// Page title with an optional subtitle line.
    Title {
        title: String,
        subtitle: Option<String>,
    },
    Heading(String),
    Fields(Vec<Field>),
    Stats(Vec<Stat>),
    Table(Table),
    Paragraph(Vec<Span>),
    /// Bordered card with a title, a muted meta line and labelled body lines.
    Card {
        title: String,
        meta: Option<String>,
        lines: Vec<Field>,
    },
    /// Muted, centered message standing in for missing data.
    Placeholder(String),
    /// Vertical gap in logical pixels.
    Spacer(u32),
}

impl Block {
    pub fn heading(text: impl Into<String>) -> Self {
        Self::Heading(text.into())
    }

    pub fn paragraph(spans: impl Into<Vec<Span>>) -> Self {
        Self::Paragraph(spans.into())
    }

    pub fn placeholder(text: impl Into<String>) -> Self {
        Self::Placeholder(text.into())
    }

    pub fn no_data() -> Self {
        Self::placeholder(NO_DATA)
    }
}

/// The three pages of a student report, in print order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PageKind {
    Profile,
    Scores,
    Feedback,
}

impl PageKind {
    pub const ORDER: [Self; 3] = [Self::Profile, Self::Scores, Self::Feedback];

    /// Title used for the page heading and the PDF outline.
    pub fn title(self) -> &'static str {
        match self {
            Self::Profile => "학생 정보 및 출결",
            Self::Scores => "성적",
            Self::Feedback => "피드백 및 상담",
        }
    }
}

/// One laid-out page of the report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageFragment {
    kind: PageKind,
    blocks: Vec<Block>,
}

impl PageFragment {
    pub fn new(kind: PageKind) -> Self {
        Self {
            kind,
            blocks: Vec::new(),
        }
    }

    pub fn kind(&self) -> PageKind {
        self.kind
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Appends a block and returns the updated page.
    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    /// Extends the page with multiple blocks and returns the updated instance.
    pub fn with_blocks<I>(mut self, blocks: I) -> Self
    where
        I: IntoIterator<Item = Block>,
    {
        self.blocks.extend(blocks);
        self
    }

    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Every table on the page, in order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Table(table) => Some(table),
            _ => None,
        })
    }

    /// Whether the page shows the given placeholder text anywhere.
    pub fn has_placeholder(&self, text: &str) -> bool {
        self.blocks
            .iter()
            .any(|block| matches!(block, Block::Placeholder(value) if value == text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_field_values_become_dash() {
        assert_eq!(Field::new("주소", None::<String>).value, PLACEHOLDER_DASH);
        assert_eq!(Field::new("주소", Some("   ")).value, PLACEHOLDER_DASH);
        assert_eq!(Field::new("주소", Some("서울")).value, "서울");
    }

    #[test]
    fn table_rows_are_padded_to_column_count() {
        let table = Table::new(vec![Column::new("a", 1), Column::new("b", 1)])
            .with_row(vec![Cell::new("only")]);
        assert_eq!(table.rows[0].len(), 2);
        assert_eq!(table.rows[0][1].text(), "");
    }

    #[test]
    fn span_builders_set_flags() {
        let span = Span::new("92").bold().colored(Color::ACCENT);
        assert!(span.is_bold());
        assert_eq!(span.color(), Some(Color::ACCENT));
        assert_eq!(Color::rgb(255, 0, 16).to_hex(), "#ff0010");
    }
}
