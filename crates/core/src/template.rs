use thiserror::Error;

use crate::item::{field_text, Item, SELF_FIELD};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextStyle {
    pub bold: bool,
    pub faint: bool,
    pub italic: bool,
    pub underline: bool,
    pub fg: Option<Color>,
}

impl TextStyle {
    #[must_use]
    pub fn is_plain(&self) -> bool {
        *self == Self::default()
    }

    fn apply_filter(&mut self, filter: &str) -> Result<(), TemplateError> {
        match filter {
            "bold" => self.bold = true,
            "faint" => self.faint = true,
            "italic" => self.italic = true,
            "underline" => self.underline = true,
            "black" => self.fg = Some(Color::Black),
            "red" => self.fg = Some(Color::Red),
            "green" => self.fg = Some(Color::Green),
            "yellow" => self.fg = Some(Color::Yellow),
            "blue" => self.fg = Some(Color::Blue),
            "magenta" => self.fg = Some(Color::Magenta),
            "cyan" => self.fg = Some(Color::Cyan),
            "white" => self.fg = Some(Color::White),
            other => {
                return Err(TemplateError::UnknownFilter {
                    name: other.to_string(),
                })
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub style: TextStyle,
}

/// One rendered terminal line made of styled segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    segments: Vec<Segment>,
}

impl Line {
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[must_use]
    pub fn plain_text(&self) -> String {
        self.segments.iter().map(|segment| segment.text.as_str()).collect()
    }

    pub fn push(&mut self, text: impl Into<String>, style: TextStyle) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        match self.segments.last_mut() {
            Some(last) if last.style == style => last.text.push_str(&text),
            _ => self.segments.push(Segment { text, style }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unterminated action starting at byte {offset}")]
    Unterminated { offset: usize },
    #[error("empty action at byte {offset}")]
    EmptyAction { offset: usize },
    #[error("invalid expression `{expr}`")]
    InvalidExpression { expr: String },
    #[error("unknown filter `{name}`")]
    UnknownFilter { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Field(String),
    Literal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Text(String),
    Action { expr: Expr, style: TextStyle },
}

/// A compiled format string such as `» {{ name | bold | cyan }} ({{ owner | red }})`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Template {
    source: String,
    tokens: Vec<Token>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut tokens = Vec::new();
        let mut rest = source;
        let mut consumed = 0;

        while let Some(start) = rest.find(OPEN) {
            if start > 0 {
                tokens.push(Token::Text(rest[..start].to_string()));
            }
            let offset = consumed + start;
            let after_open = &rest[start + OPEN.len()..];
            let end = find_close(after_open).ok_or(TemplateError::Unterminated { offset })?;
            tokens.push(parse_action(&after_open[..end], offset)?);

            let advance = start + OPEN.len() + end + CLOSE.len();
            consumed += advance;
            rest = &rest[advance..];
        }
        if !rest.is_empty() {
            tokens.push(Token::Text(rest.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            tokens,
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of line breaks in the source; this is what the viewport gives up to the template.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.source.matches('\n').count()
    }

    /// Binds the template against `item`, splitting on line breaks in the literal text.
    ///
    /// Line breaks inside field values are flattened to spaces so that a bound
    /// value can never change how many rows a template occupies.
    #[must_use]
    pub fn render(&self, item: &dyn Item) -> Vec<Line> {
        let mut lines = vec![Line::default()];
        for token in &self.tokens {
            match token {
                Token::Text(text) => {
                    let mut parts = text.split('\n');
                    if let (Some(first), Some(line)) = (parts.next(), lines.last_mut()) {
                        line.push(first, TextStyle::default());
                    }
                    for part in parts {
                        let mut line = Line::default();
                        line.push(part, TextStyle::default());
                        lines.push(line);
                    }
                }
                Token::Action { expr, style } => {
                    let value = match expr {
                        Expr::Field(name) => flatten(&field_text(item, name)),
                        Expr::Literal(text) => text.clone(),
                    };
                    if let Some(line) = lines.last_mut() {
                        line.push(value, *style);
                    }
                }
            }
        }
        lines
    }

    /// Renders onto a single line, joining any literal line breaks with spaces.
    #[must_use]
    pub fn render_line(&self, item: &dyn Item) -> Line {
        let mut joined = Line::default();
        for (index, line) in self.render(item).into_iter().enumerate() {
            if index > 0 {
                joined.push(" ", TextStyle::default());
            }
            for segment in line.segments {
                joined.push(segment.text, segment.style);
            }
        }
        joined
    }
}

fn find_close(text: &str) -> Option<usize> {
    let mut in_literal = false;
    for (index, ch) in text.char_indices() {
        match ch {
            '"' => in_literal = !in_literal,
            '}' if !in_literal && text[index..].starts_with(CLOSE) => return Some(index),
            _ => {}
        }
    }
    None
}

fn parse_action(body: &str, offset: usize) -> Result<Token, TemplateError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(TemplateError::EmptyAction { offset });
    }

    let (expr, filters) = if let Some(literal) = body.strip_prefix('"') {
        let close = literal
            .find('"')
            .ok_or_else(|| TemplateError::InvalidExpression {
                expr: body.to_string(),
            })?;
        (
            Expr::Literal(literal[..close].to_string()),
            &literal[close + 1..],
        )
    } else {
        let (head, tail) = body.find('|').map_or((body, ""), |pipe| body.split_at(pipe));
        (parse_field(head.trim())?, tail)
    };

    let filters = filters.trim();
    let mut style = TextStyle::default();
    if !filters.is_empty() {
        let Some(filters) = filters.strip_prefix('|') else {
            return Err(TemplateError::InvalidExpression {
                expr: body.to_string(),
            });
        };
        for filter in filters.split('|') {
            style.apply_filter(filter.trim())?;
        }
    }

    Ok(Token::Action { expr, style })
}

fn parse_field(name: &str) -> Result<Expr, TemplateError> {
    if name == SELF_FIELD {
        return Ok(Expr::Field(SELF_FIELD.to_string()));
    }
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if valid {
        Ok(Expr::Field(name.to_string()))
    } else {
        Err(TemplateError::InvalidExpression {
            expr: name.to_string(),
        })
    }
}

fn flatten(value: &str) -> String {
    value
        .chars()
        .map(|ch| if ch == '\n' || ch == '\r' { ' ' } else { ch })
        .collect()
}

/// Label, row and details templates used by a selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTemplate {
    label: Template,
    active: Template,
    inactive: Template,
    details: Template,
}

impl RenderTemplate {
    pub fn new(label: &str, active: &str, inactive: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            label: Template::parse(label)?,
            active: Template::parse(active)?,
            inactive: Template::parse(inactive)?,
            details: Template::default(),
        })
    }

    pub fn with_details(mut self, details: &str) -> Result<Self, TemplateError> {
        self.details = Template::parse(details)?;
        Ok(self)
    }

    /// Template used when a caller supplies none: each item renders through its `.` field.
    #[must_use]
    pub fn plain() -> Self {
        let field = |prefix: &str| Template {
            source: format!("{prefix}{OPEN} . {CLOSE}"),
            tokens: vec![
                Token::Text(prefix.to_string()),
                Token::Action {
                    expr: Expr::Field(SELF_FIELD.to_string()),
                    style: TextStyle::default(),
                },
            ],
        };
        Self {
            label: Template {
                source: format!("{OPEN} . {CLOSE}"),
                tokens: vec![Token::Action {
                    expr: Expr::Field(SELF_FIELD.to_string()),
                    style: TextStyle::default(),
                }],
            },
            active: field("» "),
            inactive: field("  "),
            details: Template::default(),
        }
    }

    #[must_use]
    pub fn label(&self) -> &Template {
        &self.label
    }

    #[must_use]
    pub fn details(&self) -> &Template {
        &self.details
    }

    #[must_use]
    pub fn detail_line_count(&self) -> usize {
        self.details.line_count()
    }

    #[must_use]
    pub fn render_label(&self, label: &str) -> Line {
        self.label.render_line(&label)
    }

    #[must_use]
    pub fn render_row(&self, item: &dyn Item, active: bool) -> Line {
        if active {
            self.active.render_line(item)
        } else {
            self.inactive.render_line(item)
        }
    }

    #[must_use]
    pub fn render_details(&self, item: &dyn Item) -> Vec<Line> {
        if self.details.is_empty() {
            return Vec::new();
        }
        self.details.render(item)
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::{Color, RenderTemplate, Template, TemplateError, TextStyle};
    use crate::item::Item;

    struct Schema {
        name: &'static str,
        owner: Option<&'static str>,
    }

    impl Item for Schema {
        fn field(&self, name: &str) -> Option<Cow<'_, str>> {
            match name {
                "name" => Some(Cow::Borrowed(self.name)),
                "owner" => self.owner.map(Cow::Borrowed),
                _ => None,
            }
        }
    }

    #[test]
    fn binds_fields_and_styles_by_name() {
        let template = Template::parse("» {{ name | bold | cyan }} ({{ owner | red }})")
            .expect("template should parse");
        let schema = Schema {
            name: "billing",
            owner: Some("admin"),
        };

        let line = template.render_line(&schema);
        assert_eq!(line.plain_text(), "» billing (admin)");

        let name_segment = &line.segments()[1];
        assert_eq!(name_segment.text, "billing");
        assert_eq!(
            name_segment.style,
            TextStyle {
                bold: true,
                fg: Some(Color::Cyan),
                ..TextStyle::default()
            }
        );
    }

    #[test]
    fn missing_fields_render_as_empty_text() {
        let template = Template::parse("{{ name }}.{{ table }}: {{ owner }}")
            .expect("template should parse");
        let schema = Schema {
            name: "back",
            owner: None,
        };
        assert_eq!(template.render_line(&schema).plain_text(), "back.: ");
    }

    #[test]
    fn literals_keep_pipes_and_take_filters() {
        let template =
            Template::parse(r#"{{ "Name | Owner:" | faint }} {{ name }}"#).expect("should parse");
        let schema = Schema {
            name: "app",
            owner: None,
        };
        let line = template.render_line(&schema);
        assert_eq!(line.plain_text(), "Name | Owner: app");
        assert!(line.segments()[0].style.faint);
    }

    #[test]
    fn details_split_into_lines_and_count_breaks() {
        let template = RenderTemplate::new("{{ . }}", "» {{ name }}", "  {{ name }}")
            .and_then(|template| {
                template.with_details("\n--- Schema ---\nName:\t{{ name }}\nOwner:\t{{ owner }}")
            })
            .expect("template should parse");
        let schema = Schema {
            name: "app",
            owner: Some("root"),
        };

        assert_eq!(template.detail_line_count(), 3);
        let lines: Vec<String> = template
            .render_details(&schema)
            .iter()
            .map(super::Line::plain_text)
            .collect();
        assert_eq!(lines, ["", "--- Schema ---", "Name:\tapp", "Owner:\troot"]);
    }

    #[test]
    fn label_binds_the_whole_value() {
        let template = RenderTemplate::plain();
        assert_eq!(template.render_label("Options").plain_text(), "Options");
        assert_eq!(template.detail_line_count(), 0);
        assert_eq!(
            template.render_row(&"Explore", true).plain_text(),
            "» Explore"
        );
    }

    #[test]
    fn field_values_cannot_add_lines() {
        let template = Template::parse("{{ . }}").expect("template should parse");
        let lines = template.render(&"SELECT 1\nFROM dual");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].plain_text(), "SELECT 1 FROM dual");
    }

    #[test]
    fn malformed_templates_are_rejected() {
        assert_eq!(
            Template::parse("» {{ name | sparkle }}"),
            Err(TemplateError::UnknownFilter {
                name: "sparkle".to_string()
            })
        );
        assert_eq!(
            Template::parse("ab {{ name"),
            Err(TemplateError::Unterminated { offset: 3 })
        );
        assert_eq!(
            Template::parse("{{  }}"),
            Err(TemplateError::EmptyAction { offset: 0 })
        );
        assert!(matches!(
            Template::parse("{{ na-me }}"),
            Err(TemplateError::InvalidExpression { .. })
        ));
    }
}
