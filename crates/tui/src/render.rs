use std::io::{self, Write};

use crossterm::cursor::{MoveToColumn, MoveToPreviousLine, MoveUp};
use crossterm::queue;
use crossterm::style::{Attribute, Color as TermColor, ContentStyle, Print, PrintStyledContent};
use crossterm::terminal::{Clear, ClearType};
use sqlwalk_core::template::{Color, Line, TextStyle};
use unicode_width::UnicodeWidthChar;

const ELLIPSIS: char = '…';
const TAB_STOP: usize = 8;

fn term_color(color: Color) -> TermColor {
    match color {
        Color::Black => TermColor::Black,
        Color::Red => TermColor::DarkRed,
        Color::Green => TermColor::DarkGreen,
        Color::Yellow => TermColor::DarkYellow,
        Color::Blue => TermColor::DarkBlue,
        Color::Magenta => TermColor::DarkMagenta,
        Color::Cyan => TermColor::DarkCyan,
        Color::White => TermColor::White,
    }
}

fn content_style(style: TextStyle) -> ContentStyle {
    let mut content = ContentStyle::new();
    content.foreground_color = style.fg.map(term_color);
    if style.bold {
        content.attributes.set(Attribute::Bold);
    }
    if style.faint {
        content.attributes.set(Attribute::Dim);
    }
    if style.italic {
        content.attributes.set(Attribute::Italic);
    }
    if style.underline {
        content.attributes.set(Attribute::Underlined);
    }
    content
}

/// Writes `line` with its styles as ANSI sequences.
pub fn paint(out: &mut impl Write, line: &Line) -> io::Result<()> {
    for segment in line.segments() {
        if segment.style.is_plain() {
            queue!(out, Print(&segment.text))?;
        } else {
            queue!(
                out,
                PrintStyledContent(content_style(segment.style).apply(segment.text.as_str()))
            )?;
        }
    }
    Ok(())
}

fn char_width(ch: char) -> usize {
    ch.width().unwrap_or(0)
}

/// Expands tabs, turns line breaks into spaces and drops other control characters.
fn sanitize(line: &Line) -> (Line, usize) {
    let mut clean = Line::default();
    let mut column = 0;
    for segment in line.segments() {
        let mut text = String::with_capacity(segment.text.len());
        for ch in segment.text.chars() {
            match ch {
                '\t' => {
                    let pad = TAB_STOP - column % TAB_STOP;
                    text.push_str(&" ".repeat(pad));
                    column += pad;
                }
                '\n' | '\r' => {
                    text.push(' ');
                    column += 1;
                }
                ch if ch.is_control() => {}
                ch => {
                    text.push(ch);
                    column += char_width(ch);
                }
            }
        }
        clean.push(text, segment.style);
    }
    (clean, column)
}

/// Fits `line` into `width` terminal columns so it never wraps.
///
/// A cut line ends with an ellipsis in the style of the text it replaced.
#[must_use]
pub fn clip(line: &Line, width: usize) -> Line {
    let (clean, columns) = sanitize(line);
    if columns <= width || width == 0 {
        return clean;
    }

    let budget = width - 1;
    let mut used = 0;
    let mut clipped = Line::default();
    let mut tail_style = TextStyle::default();
    'segments: for segment in clean.segments() {
        tail_style = segment.style;
        let mut kept = String::new();
        for ch in segment.text.chars() {
            let ch_width = char_width(ch);
            if used + ch_width > budget {
                clipped.push(kept, segment.style);
                break 'segments;
            }
            kept.push(ch);
            used += ch_width;
        }
        clipped.push(kept, segment.style);
    }
    clipped.push(ELLIPSIS.to_string(), tail_style);
    clipped
}

/// Cursor to the previous line, clear it, back to column zero.
pub fn erase_footer(out: &mut impl Write) -> io::Result<()> {
    queue!(
        out,
        MoveToPreviousLine(1),
        Clear(ClearType::CurrentLine),
        MoveToColumn(0)
    )
}

/// Bytes written by [`erase_footer`].
#[must_use]
pub fn erase_footer_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = erase_footer(&mut bytes);
    bytes
}

/// Tracks how many lines the last frame occupied so the next one overwrites it in place.
///
/// With a known width every line is clipped, so one drawn line is one terminal row.
#[derive(Debug, Default)]
pub struct Screen {
    drawn: usize,
    width: Option<usize>,
}

impl Screen {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn drawn(&self) -> usize {
        self.drawn
    }

    /// Terminal width in columns, `None` when it cannot be read.
    pub fn set_width(&mut self, columns: Option<u16>) {
        self.width = columns.map(usize::from);
    }

    fn paint_fitted(&self, out: &mut impl Write, line: &Line) -> io::Result<()> {
        match self.width {
            Some(width) => paint(out, &clip(line, width)),
            None => paint(out, &sanitize(line).0),
        }
    }

    /// Replaces the previous frame with `lines`. The cursor stays at the end of the last line.
    pub fn draw(&mut self, out: &mut impl Write, lines: &[Line]) -> io::Result<()> {
        self.rewind(out)?;
        for (index, line) in lines.iter().enumerate() {
            if index > 0 {
                queue!(out, Print("\r\n"))?;
            }
            self.paint_fitted(out, line)?;
        }
        self.drawn = lines.len();
        Ok(())
    }

    /// Replaces the previous frame with `footer` and moves below it.
    pub fn collapse(&mut self, out: &mut impl Write, footer: &Line) -> io::Result<()> {
        self.rewind(out)?;
        self.paint_fitted(out, footer)?;
        queue!(out, Print("\r\n"))?;
        self.drawn = 0;
        Ok(())
    }

    fn rewind(&mut self, out: &mut impl Write) -> io::Result<()> {
        if self.drawn == 0 {
            return Ok(());
        }
        queue!(out, MoveToColumn(0))?;
        if self.drawn > 1 {
            let up = u16::try_from(self.drawn - 1).unwrap_or(u16::MAX);
            queue!(out, MoveUp(up))?;
        }
        queue!(out, Clear(ClearType::FromCursorDown))?;
        self.drawn = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sqlwalk_core::template::{Color, Line, TextStyle};

    use super::{clip, erase_footer_bytes, paint, Screen};

    fn plain(text: &str) -> Line {
        let mut line = Line::default();
        line.push(text, TextStyle::default());
        line
    }

    #[test]
    fn plain_segments_are_written_verbatim() {
        let mut out = Vec::new();
        paint(&mut out, &plain("schemas")).expect("paint should succeed");
        assert_eq!(out, b"schemas");
    }

    #[test]
    fn styled_segments_carry_escape_sequences() {
        let mut line = Line::default();
        line.push(
            "app",
            TextStyle {
                bold: true,
                fg: Some(Color::Cyan),
                ..TextStyle::default()
            },
        );
        let mut out = Vec::new();
        paint(&mut out, &line).expect("paint should succeed");

        let text = String::from_utf8(out).expect("valid utf-8");
        assert!(text.contains("app"));
        assert!(text.starts_with('\u{1b}'));
        assert!(text.len() > "app".len());
    }

    #[test]
    fn erase_footer_is_previous_line_clear_and_column_zero() {
        let text = String::from_utf8(erase_footer_bytes()).expect("valid utf-8");
        assert_eq!(text, "\u{1b}[1F\u{1b}[2K\u{1b}[1G");
    }

    #[test]
    fn redraw_rewinds_over_previous_frame() {
        let mut screen = Screen::new();
        let mut first = Vec::new();
        screen
            .draw(&mut first, &[plain("a"), plain("b"), plain("c")])
            .expect("draw should succeed");
        assert_eq!(first, b"a\r\nb\r\nc");
        assert_eq!(screen.drawn(), 3);

        let mut second = Vec::new();
        screen
            .draw(&mut second, &[plain("d")])
            .expect("draw should succeed");
        let text = String::from_utf8(second).expect("valid utf-8");
        assert_eq!(text, "\u{1b}[1G\u{1b}[2A\u{1b}[Jd");

        let mut footer = Vec::new();
        screen
            .collapse(&mut footer, &plain("done"))
            .expect("collapse should succeed");
        assert_eq!(footer, b"\x1b[1G\x1b[Jdone\r\n");
        assert_eq!(screen.drawn(), 0);
    }

    #[test]
    fn lines_that_fit_are_kept_whole() {
        assert_eq!(clip(&plain("information_schema"), 18), plain("information_schema"));
        assert_eq!(clip(&plain("app"), 80), plain("app"));
    }

    #[test]
    fn long_lines_are_cut_to_width_with_an_ellipsis() {
        let clipped = clip(&plain("SELECT email FROM users"), 10);
        assert_eq!(clipped.plain_text(), "SELECT em…");

        let wide = clip(&plain("日本語テキスト"), 7);
        assert_eq!(wide.plain_text(), "日本語…");
    }

    #[test]
    fn ellipsis_keeps_the_style_of_the_cut_segment() {
        let cyan = TextStyle {
            fg: Some(Color::Cyan),
            ..TextStyle::default()
        };
        let mut line = Line::default();
        line.push("» ", TextStyle::default());
        line.push("inventory_movements", cyan);

        let clipped = clip(&line, 8);
        assert_eq!(clipped.plain_text(), "» inven…");
        let tail = clipped.segments().last().expect("clipped line has segments");
        assert_eq!(tail.style, cyan);
    }

    #[test]
    fn control_characters_never_reach_the_terminal() {
        let clipped = clip(&plain("a\tb\nc\u{7}d"), 80);
        assert_eq!(clipped.plain_text(), "a       b cd");

        let cut = clip(&plain("\tschema"), 10);
        assert_eq!(cut.plain_text(), "        s…");
    }

    #[test]
    fn screen_with_width_draws_one_row_per_line() {
        let mut screen = Screen::new();
        screen.set_width(Some(12));
        let long = "x".repeat(40);

        let mut first = Vec::new();
        screen
            .draw(&mut first, &[plain("Views"), plain(&long)])
            .expect("draw should succeed");
        let text = String::from_utf8(first).expect("valid utf-8");
        assert_eq!(text, format!("Views\r\n{}…", "x".repeat(11)));

        let mut second = Vec::new();
        screen
            .draw(&mut second, &[plain("Views")])
            .expect("draw should succeed");
        assert_eq!(second, b"\x1b[1G\x1b[1A\x1b[JViews");
    }
}
