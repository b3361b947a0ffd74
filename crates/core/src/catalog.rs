use std::borrow::Cow;
use std::fmt;

use humansize::{format_size, BINARY};
use serde::Serialize;

use crate::item::{Item, SELF_FIELD};
use crate::search::SearchPredicate;
use crate::template::{RenderTemplate, TemplateError};

const SENTINEL_NAME: &str = "back";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRow {
    pub name: String,
    pub catalog: String,
    pub charset: String,
    pub collation: String,
    pub table_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub schema: String,
    pub name: String,
    pub catalog: String,
    pub table_type: String,
    pub engine: Option<String>,
    pub data_bytes: u64,
    pub index_bytes: u64,
    pub row_estimate: u64,
}

impl TableRow {
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.data_bytes.saturating_add(self.index_bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewRow {
    pub schema: String,
    pub name: String,
    pub definer: String,
    pub definition: String,
    pub updatable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaTableCount {
    pub schema: String,
    pub tables: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowBucket {
    pub bucket: &'static str,
    pub tables: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnFrequency {
    pub name: String,
    pub tables: u64,
    pub percent_tables: f64,
}

/// A row produced by a data provider for one listing.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogRow {
    Schema(SchemaRow),
    Table(TableRow),
    View(ViewRow),
    SchemaTableCount(SchemaTableCount),
    RowBucket(RowBucket),
    ColumnFrequency(ColumnFrequency),
    ServerVersion(String),
    /// Placeholder shown when a listing has no rows, so the user still has something to pick.
    NoResults,
}

impl Item for CatalogRow {
    fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        match self {
            Self::Schema(schema) => match name {
                "name" | SELF_FIELD => Some(Cow::Borrowed(&schema.name)),
                "catalog" => Some(Cow::Borrowed(&schema.catalog)),
                "charset" => Some(Cow::Borrowed(&schema.charset)),
                "collation" => Some(Cow::Borrowed(&schema.collation)),
                "table_count" => Some(Cow::Owned(schema.table_count.to_string())),
                _ => None,
            },
            Self::Table(table) => match name {
                "schema" => Some(Cow::Borrowed(&table.schema)),
                "name" | SELF_FIELD => Some(Cow::Borrowed(&table.name)),
                "catalog" => Some(Cow::Borrowed(&table.catalog)),
                "type" => Some(Cow::Borrowed(&table.table_type)),
                "engine" => table.engine.as_deref().map(Cow::Borrowed),
                "data_size" => Some(Cow::Owned(pretty_size(table.data_bytes))),
                "index_size" => Some(Cow::Owned(pretty_size(table.index_bytes))),
                "total_size" => Some(Cow::Owned(pretty_size(table.total_bytes()))),
                "rows" => Some(Cow::Owned(table.row_estimate.to_string())),
                _ => None,
            },
            Self::View(view) => match name {
                "schema" => Some(Cow::Borrowed(&view.schema)),
                "name" | SELF_FIELD => Some(Cow::Borrowed(&view.name)),
                "definer" => Some(Cow::Borrowed(&view.definer)),
                "definition" => Some(Cow::Borrowed(&view.definition)),
                "updatable" => Some(Cow::Borrowed(if view.updatable { "yes" } else { "no" })),
                _ => None,
            },
            Self::SchemaTableCount(count) => match name {
                "schema" | SELF_FIELD => Some(Cow::Borrowed(&count.schema)),
                "tables" => Some(Cow::Owned(count.tables.to_string())),
                _ => None,
            },
            Self::RowBucket(bucket) => match name {
                "bucket" | SELF_FIELD => Some(Cow::Borrowed(bucket.bucket)),
                "tables" => Some(Cow::Owned(bucket.tables.to_string())),
                _ => None,
            },
            Self::ColumnFrequency(column) => match name {
                "name" | SELF_FIELD => Some(Cow::Borrowed(&column.name)),
                "tables" => Some(Cow::Owned(column.tables.to_string())),
                "percent_tables" => Some(Cow::Owned(format!("{:.2}%", column.percent_tables))),
                _ => None,
            },
            Self::ServerVersion(version) => match name {
                "version" | SELF_FIELD => Some(Cow::Borrowed(version)),
                _ => None,
            },
            Self::NoResults => match name {
                "name" | SELF_FIELD => Some(Cow::Borrowed(SENTINEL_NAME)),
                _ => None,
            },
        }
    }
}

#[must_use]
pub fn pretty_size(bytes: u64) -> String {
    format_size(bytes, BINARY)
}

const ROW_BUCKETS: [(u64, &str); 6] = [
    (1_000_000_000, "1b rows and more"),
    (1_000_000, "1m - 1b rows"),
    (1_000, "1k - 1m rows"),
    (100, "100 - 1k rows"),
    (10, "10 - 100 rows"),
    (0, "0 - 10 rows"),
];

/// Bucket label for a table holding `rows` rows; bounds are exclusive below.
#[must_use]
pub fn row_bucket(rows: u64) -> &'static str {
    ROW_BUCKETS
        .iter()
        .find(|(floor, _)| rows > *floor)
        .map_or(ROW_BUCKETS[ROW_BUCKETS.len() - 1].1, |(_, label)| *label)
}

/// Counts tables per row bucket, smallest bucket first, skipping empty buckets.
#[must_use]
pub fn group_by_row_buckets<I>(row_estimates: I) -> Vec<RowBucket>
where
    I: IntoIterator<Item = u64>,
{
    let mut counts = [0_u64; ROW_BUCKETS.len()];
    for rows in row_estimates {
        let label = row_bucket(rows);
        if let Some(slot) = ROW_BUCKETS.iter().position(|(_, bucket)| *bucket == label) {
            counts[slot] += 1;
        }
    }

    ROW_BUCKETS
        .iter()
        .zip(counts)
        .rev()
        .filter(|(_, tables)| *tables > 0)
        .map(|((_, bucket), tables)| RowBucket {
            bucket: *bucket,
            tables,
        })
        .collect()
}

/// What an action node lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Listing {
    Schemas,
    UserSchemas,
    Tables,
    Views,
    MaterializedViews,
    TableCountPerSchema,
    TablesBySize,
    TablesBySizeWithIndexes,
    TableRowCounts,
    EmptyTables,
    TablesGroupedByRows,
    ColumnNameFrequencies,
    ServerVersion,
}

/// How a listing's rows are labelled, drawn and searched.
#[derive(Debug, Clone)]
pub struct Presentation {
    pub title: &'static str,
    pub template: Option<RenderTemplate>,
    pub predicate: Option<SearchPredicate>,
}

impl Listing {
    pub const ALL: [Listing; 13] = [
        Listing::Schemas,
        Listing::UserSchemas,
        Listing::Tables,
        Listing::Views,
        Listing::MaterializedViews,
        Listing::TableCountPerSchema,
        Listing::TablesBySize,
        Listing::TablesBySizeWithIndexes,
        Listing::TableRowCounts,
        Listing::EmptyTables,
        Listing::TablesGroupedByRows,
        Listing::ColumnNameFrequencies,
        Listing::ServerVersion,
    ];

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Schemas | Self::UserSchemas => "Schemas",
            Self::Tables => "Tables",
            Self::Views => "Views",
            Self::MaterializedViews => "Materialized Views",
            Self::TableCountPerSchema => "Tables by Schema",
            Self::TablesBySize => "Tables by Size",
            Self::TablesBySizeWithIndexes => "Tables by Size with Indexes",
            Self::TableRowCounts => "Tables by Rows",
            Self::EmptyTables => "Empty Tables",
            Self::TablesGroupedByRows => "Tables Grouped By Rows",
            Self::ColumnNameFrequencies => "Column Frequencies",
            Self::ServerVersion => "Server Version",
        }
    }

    pub fn presentation(self) -> Result<Presentation, TemplateError> {
        let qualified = || SearchPredicate::fields(["schema", "name"], ".");
        let (template, predicate) = match self {
            Self::Schemas | Self::UserSchemas => (
                Some(schema_template()?),
                Some(SearchPredicate::field("name")),
            ),
            Self::Tables => (Some(table_template()?), Some(qualified())),
            Self::Views | Self::MaterializedViews => (
                Some(qualified_row(": {{ definition }}")?),
                Some(qualified()),
            ),
            Self::TableCountPerSchema => (
                Some(RenderTemplate::new(
                    "{{ . }}",
                    "» {{ schema | bold | green }}: {{ tables | bold | blue }}",
                    "  {{ schema | green }}: {{ tables | blue }}",
                )?),
                Some(SearchPredicate::field("schema")),
            ),
            Self::TablesBySize => (
                Some(RenderTemplate::new(
                    "{{ . }}",
                    "» {{ schema | bold | green }}.{{ name | bold | cyan }}: {{ data_size | bold | blue }}",
                    "  {{ schema | green }}.{{ name | cyan }}: {{ data_size | blue }}",
                )?),
                Some(qualified()),
            ),
            Self::TablesBySizeWithIndexes => (
                Some(RenderTemplate::new(
                    "{{ . }}",
                    "» {{ schema | bold | green }}.{{ name | bold | cyan }}: {{ total_size | bold | blue }} (Data {{ data_size | blue }} | Index {{ index_size | blue }})",
                    "  {{ schema | green }}.{{ name | cyan }}: {{ total_size | blue }} (Data {{ data_size | blue }} | Index {{ index_size | blue }})",
                )?),
                Some(qualified()),
            ),
            Self::TableRowCounts => (
                Some(qualified_row(": {{ rows | blue }} rows")?),
                Some(qualified()),
            ),
            Self::EmptyTables => (Some(qualified_row(": 0 rows")?), Some(qualified())),
            Self::TablesGroupedByRows => (
                Some(RenderTemplate::new(
                    "{{ . }}",
                    "» {{ bucket | bold | cyan }}: {{ tables | bold | blue }}",
                    "  {{ bucket | cyan }}: {{ tables | blue }}",
                )?),
                None,
            ),
            Self::ColumnNameFrequencies => (
                Some(
                    RenderTemplate::new(
                        "{{ . }}",
                        "» {{ name | bold | green }}: {{ tables | bold | cyan }} ({{ percent_tables | bold | blue }})",
                        "  {{ name | green }}: {{ tables | cyan }} ({{ percent_tables | blue }})",
                    )?
                    .with_details(concat!(
                        "\n --------- Columns ----------",
                        "\n {{ \"Column name:\" | faint }}\t{{ name }}",
                        "\n {{ \"Table count:\" | faint }}\t{{ tables }}",
                        "\n {{ \"Share of tables:\" | faint }}\t{{ percent_tables }}",
                    ))?,
                ),
                Some(SearchPredicate::field("name")),
            ),
            Self::ServerVersion => (None, None),
        };

        Ok(Presentation {
            title: self.title(),
            template,
            predicate,
        })
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Template for the [`CatalogRow::NoResults`] placeholder.
pub fn no_results_template() -> Result<RenderTemplate, TemplateError> {
    RenderTemplate::new(
        "{{ . }}",
        "» {{ name | bold | yellow }} {{ \"(no results)\" | faint }}",
        "  {{ name | yellow }} {{ \"(no results)\" | faint }}",
    )
}

fn schema_template() -> Result<RenderTemplate, TemplateError> {
    RenderTemplate::new(
        "{{ . }}",
        "» {{ name | bold | cyan }} ({{ charset | bold | red }})",
        "  {{ name | cyan }} ({{ charset | red }})",
    )?
    .with_details(concat!(
        "\n --------- Schema ----------",
        "\n {{ \"Name:\" | faint }}\t{{ name }}",
        "\n {{ \"Charset:\" | faint }}\t{{ charset }}",
        "\n {{ \"Collation:\" | faint }}\t{{ collation }}",
        "\n {{ \"Catalog:\" | faint }}\t{{ catalog }}",
        "\n {{ \"Tables in schema:\" | faint }}\t{{ table_count }}",
    ))
}

fn table_template() -> Result<RenderTemplate, TemplateError> {
    RenderTemplate::new(
        "{{ . }}",
        "» {{ schema | bold | green }}.{{ name | bold | cyan }}",
        "  {{ schema | green }}.{{ name | cyan }}",
    )?
    .with_details(concat!(
        "\n --------- Table ----------",
        "\n {{ \"Name:\" | faint }}\t{{ name }}",
        "\n {{ \"Type:\" | faint }}\t{{ type }}",
        "\n {{ \"Engine:\" | faint }}\t{{ engine }}",
        "\n {{ \"Table size:\" | faint }}\t{{ data_size }}",
        "\n {{ \"Index size:\" | faint }}\t{{ index_size }}",
        "\n {{ \"Total size:\" | faint }}\t{{ total_size }}",
    ))
}

fn qualified_row(suffix: &str) -> Result<RenderTemplate, TemplateError> {
    RenderTemplate::new(
        "{{ . }}",
        &format!("» {{{{ schema | bold | green }}}}.{{{{ name | bold | cyan }}}}{suffix}"),
        &format!("  {{{{ schema | green }}}}.{{{{ name | cyan }}}}{suffix}"),
    )
}

#[cfg(test)]
mod tests {
    use super::{
        group_by_row_buckets, no_results_template, row_bucket, CatalogRow, Listing, RowBucket,
        TableRow, ViewRow,
    };
    use crate::item::Item;

    fn table(schema: &str, name: &str, rows: u64) -> CatalogRow {
        CatalogRow::Table(TableRow {
            schema: schema.to_string(),
            name: name.to_string(),
            catalog: "def".to_string(),
            table_type: "BASE TABLE".to_string(),
            engine: Some("InnoDB".to_string()),
            data_bytes: 16_384,
            index_bytes: 0,
            row_estimate: rows,
        })
    }

    #[test]
    fn every_listing_template_compiles() {
        for listing in Listing::ALL {
            let presentation = listing
                .presentation()
                .unwrap_or_else(|error| panic!("{listing:?} template failed: {error}"));
            assert_eq!(presentation.title, listing.title());
        }
        no_results_template().expect("sentinel template should compile");
    }

    #[test]
    fn table_rows_render_qualified_names() {
        let presentation = Listing::TableRowCounts
            .presentation()
            .expect("template should compile");
        let template = presentation.template.expect("row counts use a template");
        let row = table("app", "users", 42);
        assert_eq!(
            template.render_row(&row, false).plain_text(),
            "  app.users: 42 rows"
        );

        let predicate = presentation.predicate.expect("row counts are searchable");
        assert!(predicate.matches("app.use", &row));
        assert!(!predicate.matches("billing", &row));
    }

    #[test]
    fn sizes_are_human_readable() {
        let row = table("app", "users", 1);
        assert_eq!(row.field("data_size").as_deref(), Some("16 KiB"));
        assert_eq!(row.field("total_size").as_deref(), Some("16 KiB"));
    }

    #[test]
    fn sentinel_reads_as_back_and_nothing_else() {
        let sentinel = CatalogRow::NoResults;
        assert_eq!(sentinel.field("name").as_deref(), Some("back"));
        assert!(sentinel.field("schema").is_none());

        let template = no_results_template().expect("sentinel template should compile");
        assert_eq!(
            template.render_row(&sentinel, true).plain_text(),
            "» back (no results)"
        );
    }

    #[test]
    fn view_definitions_stay_on_one_row() {
        let view = CatalogRow::View(ViewRow {
            schema: "app".to_string(),
            name: "active_users".to_string(),
            definer: "root@%".to_string(),
            definition: "select *\nfrom users".to_string(),
            updatable: true,
        });
        let template = Listing::Views
            .presentation()
            .expect("template should compile")
            .template
            .expect("views use a template");
        assert_eq!(
            template.render_row(&view, false).plain_text(),
            "  app.active_users: select * from users"
        );
    }

    #[test]
    fn row_buckets_use_exclusive_lower_bounds() {
        assert_eq!(row_bucket(0), "0 - 10 rows");
        assert_eq!(row_bucket(10), "0 - 10 rows");
        assert_eq!(row_bucket(11), "10 - 100 rows");
        assert_eq!(row_bucket(1_000_001), "1m - 1b rows");
        assert_eq!(row_bucket(5_000_000_000), "1b rows and more");
    }

    #[test]
    fn grouping_orders_buckets_smallest_first() {
        let grouped = group_by_row_buckets([3, 5_000, 12, 7, 2_000_000]);
        assert_eq!(
            grouped,
            [
                RowBucket {
                    bucket: "0 - 10 rows",
                    tables: 2
                },
                RowBucket {
                    bucket: "10 - 100 rows",
                    tables: 1
                },
                RowBucket {
                    bucket: "1k - 1m rows",
                    tables: 1
                },
                RowBucket {
                    bucket: "1m - 1b rows",
                    tables: 1
                },
            ]
        );
    }
}
