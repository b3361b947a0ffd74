use crate::template::RenderTemplate;

/// Rows kept free for the label, search and footer lines.
pub const RESERVED_ROWS: usize = 4;

/// Number of list rows a selector shows at once.
///
/// Falls back to a single row when the terminal size is unknown, the
/// terminal is shorter than the reserved rows, or no template is given.
#[must_use]
pub fn viewport_height(terminal_rows: Option<u16>, template: Option<&RenderTemplate>) -> usize {
    let (Some(rows), Some(template)) = (terminal_rows, template) else {
        return 1;
    };
    let rows = usize::from(rows);
    if rows < RESERVED_ROWS {
        return 1;
    }
    rows.saturating_sub(RESERVED_ROWS)
        .saturating_sub(template.detail_line_count())
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::viewport_height;
    use crate::template::RenderTemplate;

    fn template_with_details(details: &str) -> RenderTemplate {
        RenderTemplate::new("{{ . }}", "» {{ name }}", "  {{ name }}")
            .and_then(|template| template.with_details(details))
            .expect("template should parse")
    }

    #[test]
    fn short_terminals_floor_at_one_row() {
        let template = template_with_details("");
        assert_eq!(viewport_height(Some(2), Some(&template)), 1);
        assert_eq!(viewport_height(Some(4), Some(&template)), 1);
        assert_eq!(viewport_height(Some(5), Some(&template)), 1);
    }

    #[test]
    fn details_lines_are_subtracted() {
        let template = template_with_details(
            "\n--- Schema ---\nName:\t{{ name }}\nOwner:\t{{ owner }}\nCatalog:\t{{ catalog }}",
        );
        assert_eq!(template.detail_line_count(), 4);
        assert_eq!(viewport_height(Some(20), Some(&template)), 12);
    }

    #[test]
    fn large_details_never_drop_below_one_row() {
        let template = template_with_details(&"\n".repeat(30));
        assert_eq!(viewport_height(Some(24), Some(&template)), 1);
    }

    #[test]
    fn unknown_size_or_missing_template_uses_one_row() {
        let template = template_with_details("");
        assert_eq!(viewport_height(None, Some(&template)), 1);
        assert_eq!(viewport_height(Some(40), None), 1);
    }
}
