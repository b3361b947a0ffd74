use std::borrow::Cow;

/// Field name that binds to the whole value of an item.
pub const SELF_FIELD: &str = ".";

/// A displayable record whose fields are looked up by name at draw time.
///
/// Templates and search predicates only ever talk to items through this
/// trait, so one selector can list menu entries, schema rows and plain
/// strings alike. Unknown fields return `None` and render as empty text.
pub trait Item: Sync {
    fn field(&self, name: &str) -> Option<Cow<'_, str>>;
}

impl Item for str {
    fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        (name == SELF_FIELD).then_some(Cow::Borrowed(self))
    }
}

impl Item for String {
    fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        self.as_str().field(name)
    }
}

impl<T: Item + ?Sized> Item for &T {
    fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        (**self).field(name)
    }
}

/// Resolves a field to text, treating missing fields as empty.
#[must_use]
pub fn field_text<'a>(item: &'a dyn Item, name: &str) -> Cow<'a, str> {
    item.field(name).unwrap_or(Cow::Borrowed(""))
}

#[cfg(test)]
mod tests {
    use super::{field_text, Item, SELF_FIELD};

    #[test]
    fn strings_expose_only_the_self_field() {
        let value = "Tables".to_string();
        assert_eq!(value.field(SELF_FIELD).as_deref(), Some("Tables"));
        assert!(value.field("name").is_none());
    }

    #[test]
    fn missing_fields_resolve_to_empty_text() {
        let value = "8.0.36";
        assert_eq!(field_text(&value, "owner"), "");
        assert_eq!(field_text(&value, SELF_FIELD), "8.0.36");
    }
}
