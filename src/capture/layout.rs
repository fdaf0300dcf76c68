//! Lays a [`PageFragment`] out as an SVG document of exactly one page.
//!
//! Glyph widths are estimated rather than measured: full width for Hangul and CJK, a
//! narrower advance for Latin text. That is enough to wrap labels and table cells inside
//! their boxes. Content running past the bottom margin is clipped by the page viewport.

use std::fmt::Write as _;

use crate::fonts::{DEFAULT_FONT_FAMILY_NAME, FALLBACK_FONT_FAMILY_NAME};
use crate::fragment::{Alignment, Block, Cell, Color, Field, PageFragment, Span, Stat, Table};

/// Logical page size the layout targets, plus the pixel density used when rasterizing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub density: f32,
}

impl Viewport {
    /// A4 at 96 dpi, captured at 2x.
    pub const A4: Self = Self {
        width: 794,
        height: 1123,
        density: 2.0,
    };

    /// Size of the captured bitmap in device pixels.
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            (self.width as f32 * self.density).round() as u32,
            (self.height as f32 * self.density).round() as u32,
        )
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::A4
    }
}

const MARGIN: f32 = 48.0;
const BODY_SIZE: f32 = 13.0;
const SMALL_SIZE: f32 = 11.5;
const LINE_GAP: f32 = 1.45;
const CELL_PADDING: f32 = 8.0;
const BORDER: &str = "#d1d5db";
const HEADER_FILL: &str = "#f3f4f6";

/// Result of laying out one page.
#[derive(Clone, Debug)]
pub struct PageLayout {
    pub svg: String,
    /// Height used by the content, including the top margin.
    pub content_height: f32,
}

impl PageLayout {
    pub fn overflows(&self, viewport: Viewport) -> bool {
        self.content_height > viewport.height as f32 - MARGIN
    }
}

/// Convenience wrapper returning only the SVG markup.
pub fn to_svg(fragment: &PageFragment, viewport: Viewport) -> String {
    layout(fragment, viewport).svg
}

pub fn layout(fragment: &PageFragment, viewport: Viewport) -> PageLayout {
    let mut writer = SvgWriter::new(viewport);
    for block in fragment.blocks() {
        writer.block(block);
    }
    writer.finish()
}

fn is_wide(ch: char) -> bool {
    matches!(ch as u32,
        0x1100..=0x11FF
        | 0x2E80..=0x9FFF
        | 0xAC00..=0xD7AF
        | 0xF900..=0xFAFF
        | 0xFF00..=0xFF60)
}

fn char_width(ch: char, size: f32) -> f32 {
    if is_wide(ch) {
        size
    } else if ch.is_ascii_uppercase() || ch.is_ascii_digit() {
        size * 0.62
    } else if ch == ' ' {
        size * 0.3
    } else {
        size * 0.52
    }
}

/// Estimated advance of `text` at `size` in logical pixels.
pub fn text_width(text: &str, size: f32) -> f32 {
    text.chars().map(|ch| char_width(ch, size)).sum()
}

const BOLD_WIDENING: f32 = 1.05;

fn span_width(span: &Span, text: &str, size: f32) -> f32 {
    let width = text_width(text, size);
    if span.is_bold() {
        width * BOLD_WIDENING
    } else {
        width
    }
}

/// Splits text into words that keep their trailing whitespace.
fn words(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_space = false;
    for (index, ch) in text.char_indices() {
        if ch.is_whitespace() {
            in_space = true;
        } else if in_space {
            out.push(&text[start..index]);
            start = index;
            in_space = false;
        }
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

fn push_styled(line: &mut Vec<Span>, style: &Span, text: &str) {
    if text.is_empty() {
        return;
    }
    match line.last_mut() {
        Some(last) if last.same_style(style) => last.push_str(text),
        _ => line.push(style.restyle(text)),
    }
}

/// Greedy line breaking over styled spans. Explicit newlines always break.
pub fn wrap_spans(spans: &[Span], size: f32, max_width: f32) -> Vec<Vec<Span>> {
    let mut lines: Vec<Vec<Span>> = vec![Vec::new()];
    let mut width = 0.0_f32;

    for span in spans {
        for (segment_index, segment) in span.text().split('\n').enumerate() {
            if segment_index > 0 {
                lines.push(Vec::new());
                width = 0.0;
            }
            for word in words(segment) {
                let mut word = word;
                let word_width = span_width(span, word, size);
                if width > 0.0 && width + word_width.min(max_width) > max_width {
                    lines.push(Vec::new());
                    width = 0.0;
                    word = word.trim_start();
                }

                let word_width = span_width(span, word, size);
                if word_width <= max_width {
                    if let Some(line) = lines.last_mut() {
                        push_styled(line, span, word);
                    }
                    width += word_width;
                    continue;
                }

                for ch in word.chars() {
                    let mut advance = char_width(ch, size);
                    if span.is_bold() {
                        advance *= BOLD_WIDENING;
                    }
                    if width > 0.0 && width + advance > max_width {
                        lines.push(Vec::new());
                        width = 0.0;
                    }
                    let mut buffer = [0u8; 4];
                    if let Some(line) = lines.last_mut() {
                        push_styled(line, span, ch.encode_utf8(&mut buffer));
                    }
                    width += advance;
                }
            }
        }
    }

    lines
}

/// Escapes markup characters and drops control characters XML 1.0 cannot carry.
fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(ch),
            ch if ch.is_control() => {}
            ch => out.push(ch),
        }
    }
    out
}

struct SvgWriter {
    viewport: Viewport,
    out: String,
    y: f32,
}

impl SvgWriter {
    fn new(viewport: Viewport) -> Self {
        let mut out = String::new();
        let _ = write!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="{primary}, {fallback}" xml:space="preserve">"#,
            w = viewport.width,
            h = viewport.height,
            primary = DEFAULT_FONT_FAMILY_NAME,
            fallback = FALLBACK_FONT_FAMILY_NAME,
        );
        let _ = write!(
            out,
            r##"<rect x="0" y="0" width="{}" height="{}" fill="#ffffff"/>"##,
            viewport.width, viewport.height
        );
        Self {
            viewport,
            out,
            y: MARGIN,
        }
    }

    fn content_width(&self) -> f32 {
        self.viewport.width as f32 - 2.0 * MARGIN
    }

    fn finish(mut self) -> PageLayout {
        self.out.push_str("</svg>");
        PageLayout {
            svg: self.out,
            content_height: self.y,
        }
    }

    fn block(&mut self, block: &Block) {
        match block {
            Block::Title { title, subtitle } => self.title(title, subtitle.as_deref()),
            Block::Heading(text) => self.heading(text),
            Block::Fields(fields) => self.fields(fields),
            Block::Stats(stats) => self.stats(stats),
            Block::Table(table) => self.table(table),
            Block::Paragraph(spans) => self.paragraph(spans),
            Block::Card { title, meta, lines } => self.card(title, meta.as_deref(), lines),
            Block::Placeholder(text) => self.placeholder(text),
            Block::Spacer(height) => self.y += *height as f32,
        }
    }

    fn text_line(&mut self, x: f32, baseline: f32, size: f32, line: &[Span], anchor: Alignment) {
        let anchor = match anchor {
            Alignment::Left => "start",
            Alignment::Center => "middle",
            Alignment::Right => "end",
        };
        let _ = write!(
            self.out,
            r#"<text x="{x:.1}" y="{baseline:.1}" font-size="{size}" fill="{}" text-anchor="{anchor}">"#,
            Color::BLACK.to_hex()
        );
        for span in line {
            let weight = if span.is_bold() { "700" } else { "400" };
            match span.color() {
                Some(color) => {
                    let _ = write!(
                        self.out,
                        r#"<tspan font-weight="{weight}" fill="{}">{}</tspan>"#,
                        color.to_hex(),
                        escape_xml(span.text())
                    );
                }
                None => {
                    let _ = write!(
                        self.out,
                        r#"<tspan font-weight="{weight}">{}</tspan>"#,
                        escape_xml(span.text())
                    );
                }
            }
        }
        self.out.push_str("</text>");
    }

    /// Writes wrapped spans starting at the current cursor and returns the block height.
    fn wrapped(
        &mut self,
        x: f32,
        top: f32,
        width: f32,
        size: f32,
        spans: &[Span],
        alignment: Alignment,
    ) -> f32 {
        let lines = wrap_spans(spans, size, width);
        let line_height = size * LINE_GAP;
        let anchor_x = match alignment {
            Alignment::Left => x,
            Alignment::Center => x + width / 2.0,
            Alignment::Right => x + width,
        };
        for (index, line) in lines.iter().enumerate() {
            let baseline = top + size + index as f32 * line_height;
            self.text_line(anchor_x, baseline, size, line, alignment);
        }
        lines.len() as f32 * line_height
    }

    fn rule(&mut self, y: f32, color: &str) {
        let _ = write!(
            self.out,
            r#"<line x1="{x1}" y1="{y:.1}" x2="{x2}" y2="{y:.1}" stroke="{color}" stroke-width="1"/>"#,
            x1 = MARGIN,
            x2 = self.viewport.width as f32 - MARGIN,
        );
    }

    fn rect(&mut self, x: f32, y: f32, width: f32, height: f32, fill: &str, stroke: Option<&str>) {
        let _ = write!(
            self.out,
            r#"<rect x="{x:.1}" y="{y:.1}" width="{width:.1}" height="{height:.1}" rx="4" fill="{fill}""#
        );
        if let Some(stroke) = stroke {
            let _ = write!(self.out, r#" stroke="{stroke}" stroke-width="1""#);
        }
        self.out.push_str("/>");
    }

    fn title(&mut self, title: &str, subtitle: Option<&str>) {
        let width = self.content_width();
        let spans = [Span::new(title).bold()];
        let used = self.wrapped(MARGIN, self.y, width, 24.0, &spans, Alignment::Left);
        self.y += used;
        if let Some(subtitle) = subtitle {
            let spans = [Span::new(subtitle).colored(Color::MUTED)];
            let used = self.wrapped(MARGIN, self.y + 4.0, width, 14.0, &spans, Alignment::Left);
            self.y += 4.0 + used;
        }
        self.y += 10.0;
        self.rule(self.y, "#1e40af");
        self.y += 18.0;
    }

    fn heading(&mut self, text: &str) {
        let _ = write!(
            self.out,
            r#"<rect x="{MARGIN}" y="{:.1}" width="4" height="18" fill="{}"/>"#,
            self.y + 2.0,
            Color::ACCENT.to_hex()
        );
        let spans = [Span::new(text).bold()];
        let height = self.wrapped(
            MARGIN + 12.0,
            self.y,
            self.content_width() - 12.0,
            16.0,
            &spans,
            Alignment::Left,
        );
        self.y += height + 10.0;
    }

    fn fields(&mut self, fields: &[Field]) {
        let column_width = self.content_width() / 2.0;
        let label_width = 96.0;
        for pair in fields.chunks(2) {
            let mut row_height: f32 = 0.0;
            for (column, field) in pair.iter().enumerate() {
                let x = MARGIN + column as f32 * column_width;
                let label = [Span::new(field.label.as_str()).colored(Color::MUTED)];
                let value = [Span::new(field.value.as_str())];
                let label_height =
                    self.wrapped(x, self.y, label_width - 8.0, BODY_SIZE, &label, Alignment::Left);
                let value_height = self.wrapped(
                    x + label_width,
                    self.y,
                    column_width - label_width - 12.0,
                    BODY_SIZE,
                    &value,
                    Alignment::Left,
                );
                row_height = row_height.max(label_height).max(value_height);
            }
            self.y += row_height + 8.0;
        }
        self.y += 4.0;
    }

    fn stats(&mut self, stats: &[Stat]) {
        if stats.is_empty() {
            return;
        }
        let gap = 10.0;
        let count = stats.len() as f32;
        let tile_width = (self.content_width() - gap * (count - 1.0)) / count;
        let tile_height = 64.0;
        for (index, stat) in stats.iter().enumerate() {
            let x = MARGIN + index as f32 * (tile_width + gap);
            self.rect(x, self.y, tile_width, tile_height, "#f9fafb", Some(BORDER));
            let value = [Span::new(stat.value.as_str()).bold().colored(stat.color)];
            self.wrapped(x, self.y + 8.0, tile_width, 22.0, &value, Alignment::Center);
            let label = [Span::new(stat.label.as_str()).colored(Color::MUTED)];
            self.wrapped(x, self.y + 40.0, tile_width, SMALL_SIZE, &label, Alignment::Center);
        }
        self.y += tile_height + 10.0;
    }

    fn column_widths(&self, table: &Table) -> Vec<f32> {
        let total: u32 = table.columns.iter().map(|column| column.weight).sum();
        let total = total.max(1) as f32;
        table
            .columns
            .iter()
            .map(|column| self.content_width() * column.weight as f32 / total)
            .collect()
    }

    fn table(&mut self, table: &Table) {
        let widths = self.column_widths(table);
        let table_width = self.content_width();

        let header_height = BODY_SIZE * LINE_GAP + 2.0 * CELL_PADDING;
        self.rect(MARGIN, self.y, table_width, header_height, HEADER_FILL, Some(BORDER));
        let mut x = MARGIN;
        for (column, width) in table.columns.iter().zip(&widths) {
            let header = [Span::new(column.header.as_str()).bold()];
            self.wrapped(
                x + CELL_PADDING,
                self.y + CELL_PADDING,
                width - 2.0 * CELL_PADDING,
                BODY_SIZE,
                &header,
                column.alignment,
            );
            x += width;
        }
        self.y += header_height;

        for row in &table.rows {
            let row_height = self.table_row(table, &widths, row);
            self.rule(self.y + row_height, BORDER);
            self.y += row_height;
        }
        self.y += 10.0;
    }

    fn table_row(&mut self, table: &Table, widths: &[f32], row: &[Cell]) -> f32 {
        let mut x = MARGIN;
        let mut height: f32 = BODY_SIZE * LINE_GAP;
        for ((column, width), cell) in table.columns.iter().zip(widths).zip(row) {
            let used = self.wrapped(
                x + CELL_PADDING,
                self.y + CELL_PADDING,
                width - 2.0 * CELL_PADDING,
                BODY_SIZE,
                &cell.spans,
                column.alignment,
            );
            height = height.max(used);
            x += width;
        }
        height + 2.0 * CELL_PADDING
    }

    fn paragraph(&mut self, spans: &[Span]) {
        let width = self.content_width();
        let used = self.wrapped(MARGIN, self.y, width, BODY_SIZE, spans, Alignment::Left);
        self.y += used + 6.0;
    }

    fn card(&mut self, title: &str, meta: Option<&str>, lines: &[Field]) {
        // Measure first so the border can be drawn underneath the text.
        let inner_width = self.content_width() - 2.0 * CELL_PADDING - 4.0;
        let label_width = 88.0;
        let title_spans = [Span::new(title).bold()];
        let mut height = wrap_spans(&title_spans, 14.0, inner_width).len() as f32 * 14.0 * LINE_GAP;
        if let Some(meta) = meta {
            let meta_spans = [Span::new(meta)];
            height += wrap_spans(&meta_spans, SMALL_SIZE, inner_width).len() as f32
                * SMALL_SIZE
                * LINE_GAP;
        }
        for field in lines {
            let value = [Span::new(field.value.as_str())];
            let value_lines = wrap_spans(&value, BODY_SIZE, inner_width - label_width).len();
            height += value_lines.max(1) as f32 * BODY_SIZE * LINE_GAP + 4.0;
        }
        let card_height = height + 2.0 * CELL_PADDING + 6.0;

        self.rect(MARGIN, self.y, self.content_width(), card_height, "#ffffff", Some(BORDER));

        let x = MARGIN + CELL_PADDING + 4.0;
        let mut y = self.y + CELL_PADDING;
        y += self.wrapped(x, y, inner_width, 14.0, &title_spans, Alignment::Left);
        if let Some(meta) = meta {
            let meta_spans = [Span::new(meta).colored(Color::MUTED)];
            y += self.wrapped(x, y, inner_width, SMALL_SIZE, &meta_spans, Alignment::Left);
        }
        y += 6.0;
        for field in lines {
            let label = [Span::new(field.label.as_str()).bold().colored(Color::ACCENT)];
            self.wrapped(x, y, label_width - 8.0, BODY_SIZE, &label, Alignment::Left);
            let value = [Span::new(field.value.as_str())];
            let used = self.wrapped(
                x + label_width,
                y,
                inner_width - label_width,
                BODY_SIZE,
                &value,
                Alignment::Left,
            );
            y += used.max(BODY_SIZE * LINE_GAP) + 4.0;
        }

        self.y += card_height + 8.0;
    }

    fn placeholder(&mut self, text: &str) {
        let height = 44.0;
        self.rect(MARGIN, self.y, self.content_width(), height, "#f9fafb", Some(BORDER));
        let spans = [Span::new(text).colored(Color::MUTED)];
        self.wrapped(
            MARGIN,
            self.y + (height - BODY_SIZE * LINE_GAP) / 2.0,
            self.content_width(),
            BODY_SIZE,
            &spans,
            Alignment::Center,
        );
        self.y += height + 8.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::{Column, PageKind};

    #[test]
    fn wrapping_breaks_between_words() {
        let spans = [Span::new("alpha beta gamma")];
        let width = text_width("alpha beta ", 10.0) + 1.0;
        let lines = wrap_spans(&spans, 10.0, width);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0][0].text(), "alpha beta ");
        assert_eq!(lines[1][0].text(), "gamma");
    }

    #[test]
    fn long_hangul_runs_break_by_character() {
        let spans = [Span::new("가나다라마바사")];
        let lines = wrap_spans(&spans, 10.0, 30.0);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0][0].text(), "가나다");
        assert_eq!(lines[2][0].text(), "사");
    }

    #[test]
    fn wrapping_keeps_span_styles() {
        let spans = [Span::new("평균 "), Span::new("92").bold()];
        let lines = wrap_spans(&spans, 10.0, 500.0);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), 2);
        assert!(lines[0][1].is_bold());
    }

    #[test]
    fn explicit_newlines_start_new_lines() {
        let spans = [Span::new("첫 줄\n둘째 줄")];
        assert_eq!(wrap_spans(&spans, 10.0, 500.0).len(), 2);
    }

    #[test]
    fn text_is_escaped() {
        let page = PageFragment::new(PageKind::Feedback)
            .with_block(Block::paragraph(vec![Span::new("A < B & \"C\"")]));
        let svg = to_svg(&page, Viewport::A4);
        assert!(svg.contains("A &lt; B &amp; &quot;C&quot;"));
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
    }

    #[test]
    fn control_characters_are_dropped() {
        let page = PageFragment::new(PageKind::Feedback)
            .with_block(Block::paragraph(vec![Span::new("good\u{8}work\u{1b}!")]));
        let svg = to_svg(&page, Viewport::A4);
        assert!(svg.contains("goodwork!"));
        assert!(!svg.chars().any(|ch| ch.is_control() && !matches!(ch, '\t' | '\n' | '\r')));
    }

    #[test]
    fn bold_text_wraps_sooner() {
        let width = text_width("alpha beta ", 10.0) + 1.0;
        let plain = wrap_spans(&[Span::new("alpha beta gamma")], 10.0, width);
        let bold = wrap_spans(&[Span::new("alpha beta gamma").bold()], 10.0, width);
        assert_eq!(plain[0][0].text(), "alpha beta ");
        assert_eq!(bold.len(), 2);
        assert_eq!(bold[0][0].text(), "alpha ");
        assert_eq!(bold[1][0].text(), "beta gamma");
    }

    #[test]
    fn tall_content_is_reported_as_overflow() {
        let mut table = Table::new(vec![Column::new("과목", 1)]);
        for index in 0..80 {
            table = table.with_row(vec![Cell::new(format!("과목 {index}"))]);
        }
        let page = PageFragment::new(PageKind::Scores).with_block(Block::Table(table));
        let layout = layout(&page, Viewport::A4);
        assert!(layout.overflows(Viewport::A4));

        let short = PageFragment::new(PageKind::Scores).with_block(Block::no_data());
        assert!(!super::layout(&short, Viewport::A4).overflows(Viewport::A4));
    }

    #[test]
    fn a4_viewport_doubles_pixels() {
        assert_eq!(Viewport::A4.pixel_size(), (1588, 2246));
    }
}
