use crate::item::{field_text, Item, SELF_FIELD};

/// Lower-cases `text` and drops every whitespace character.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|ch| !ch.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Substring search over one or more item fields.
///
/// The searched text is the listed fields joined by `separator`, so a
/// predicate over `schema` and `name` with `.` lets `app.users` match a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPredicate {
    fields: Vec<String>,
    separator: String,
}

impl SearchPredicate {
    #[must_use]
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            fields: vec![name.into()],
            separator: String::new(),
        }
    }

    #[must_use]
    pub fn fields<I, S>(names: I, separator: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: names.into_iter().map(Into::into).collect(),
            separator: separator.into(),
        }
    }

    /// Predicate over the whole value of plain string items.
    #[must_use]
    pub fn whole_value() -> Self {
        Self::field(SELF_FIELD)
    }

    #[must_use]
    pub fn matches(&self, query: &str, item: &dyn Item) -> bool {
        let query = normalize(query);
        if query.is_empty() {
            return true;
        }
        self.haystack(item).contains(&query)
    }

    fn haystack(&self, item: &dyn Item) -> String {
        let mut haystack = String::new();
        for (index, name) in self.fields.iter().enumerate() {
            if index > 0 {
                haystack.push_str(&self.separator);
            }
            haystack.push_str(&normalize(&field_text(item, name)));
        }
        haystack
    }
}

/// Indices of the items matching `query`, in their original order.
#[must_use]
pub fn filter_indices(
    query: &str,
    items: &[&dyn Item],
    predicate: Option<&SearchPredicate>,
) -> Vec<usize> {
    match predicate {
        Some(predicate) => items
            .iter()
            .enumerate()
            .filter(|(_, item)| predicate.matches(query, **item))
            .map(|(index, _)| index)
            .collect(),
        None => (0..items.len()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::{filter_indices, normalize, SearchPredicate};
    use crate::item::Item;

    struct Table {
        schema: &'static str,
        name: &'static str,
    }

    impl Item for Table {
        fn field(&self, name: &str) -> Option<Cow<'_, str>> {
            match name {
                "schema" => Some(Cow::Borrowed(self.schema)),
                "name" => Some(Cow::Borrowed(self.name)),
                _ => None,
            }
        }
    }

    #[test]
    fn normalize_lowercases_and_strips_all_whitespace() {
        assert_eq!(normalize(" Table Count\tPer\nSchema "), "tablecountperschema");
    }

    #[test]
    fn empty_or_blank_query_matches_everything() {
        let predicate = SearchPredicate::whole_value();
        for value in ["", "Stats", "Table Count Per Schema"] {
            assert!(predicate.matches("", &value));
            assert!(predicate.matches("   ", &value));
        }
    }

    #[test]
    fn whitespace_and_case_are_ignored_on_both_sides() {
        let predicate = SearchPredicate::whole_value();
        let entry = "Table Count Per Schema";
        assert!(predicate.matches("tablecount", &entry));
        assert!(predicate.matches("TABLE COUNT PER SCHEMA", &entry));
        assert!(predicate.matches("countper", &entry));
        assert!(!predicate.matches("rows", &entry));
    }

    #[test]
    fn combined_fields_match_across_the_separator() {
        let predicate = SearchPredicate::fields(["schema", "name"], ".");
        let table = Table {
            schema: "billing",
            name: "Invoice Lines",
        };
        assert!(predicate.matches("billing.inv", &table));
        assert!(predicate.matches("ing.invoicel", &table));
        assert!(!predicate.matches("invoices", &table));
    }

    #[test]
    fn filtering_preserves_original_order() {
        let values = ["Tables By Size", "Empty Tables", "Postgres", "Table Row Counts"];
        let items: Vec<&dyn crate::item::Item> =
            values.iter().map(|value| value as &dyn Item).collect();

        let predicate = SearchPredicate::whole_value();
        assert_eq!(filter_indices("table", &items, Some(&predicate)), [0, 1, 3]);
        assert_eq!(filter_indices("zzz", &items, Some(&predicate)), Vec::<usize>::new());
        assert_eq!(filter_indices("anything", &items, None), [0, 1, 2, 3]);
    }
}
