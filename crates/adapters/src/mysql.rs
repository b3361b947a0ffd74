use async_trait::async_trait;
use mysql_async::prelude::{FromRow, Queryable};
use mysql_async::{from_row_opt, OptsBuilder, Pool, Row, SslOpts};
use sqlwalk_core::catalog::{
    group_by_row_buckets, CatalogRow, ColumnFrequency, SchemaRow, SchemaTableCount, TableRow,
    ViewRow,
};
use sqlwalk_core::profiles::{ConnectionProfile, PasswordSource, TlsMode};
use sqlwalk_core::{DataProvider, Listing, ProviderError};
use thiserror::Error;
use tracing::{debug, warn};

pub const PASSWORD_ENV: &str = "SQLWALK_DB_PASSWORD";
const DEFAULT_KEYRING_SERVICE: &str = "sqlwalk";

const SYSTEM_SCHEMAS: &str = "('mysql', 'information_schema', 'performance_schema', 'sys')";

/// Catalog listings served from `information_schema` of a MySQL server.
#[derive(Debug, Clone)]
pub struct MysqlCatalogProvider {
    pool: Pool,
}

impl MysqlCatalogProvider {
    /// Builds a lazily connecting pool. `password` is one typed in this session
    /// and wins over the environment and the keyring.
    #[must_use]
    pub fn from_profile(profile: &ConnectionProfile, password: Option<&str>) -> Self {
        Self {
            pool: Pool::new(opts_from_profile(profile, password)),
        }
    }

    /// Opens one connection and pings the server.
    pub async fn verify(&self) -> Result<(), ProviderError> {
        let mut conn = self.pool.get_conn().await.map_err(to_provider_error)?;
        conn.ping().await.map_err(to_provider_error)?;
        debug!(server_version = ?conn.server_version(), "connection verified");
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<(), ProviderError> {
        self.pool
            .clone()
            .disconnect()
            .await
            .map_err(to_provider_error)
    }

    async fn fetch_rows<T>(&self, sql: &str) -> Result<Vec<T>, ProviderError>
    where
        T: FromRow + Send + 'static,
    {
        let mut conn = self.pool.get_conn().await.map_err(to_provider_error)?;
        let rows: Vec<Row> = conn.query(sql).await.map_err(to_provider_error)?;
        rows.into_iter()
            .map(|row| {
                from_row_opt::<T>(row).map_err(|error| {
                    ProviderError::backend(format!("unexpected row shape: {error}"))
                })
            })
            .collect()
    }

    async fn schemas(&self, user_only: bool) -> Result<Vec<CatalogRow>, ProviderError> {
        let rows = self
            .fetch_rows::<(String, String, String, String, u64)>(&schema_sql(user_only))
            .await?;
        Ok(rows
            .into_iter()
            .map(|(name, catalog, charset, collation, table_count)| {
                CatalogRow::Schema(SchemaRow {
                    name,
                    catalog,
                    charset,
                    collation,
                    table_count,
                })
            })
            .collect())
    }

    async fn tables(&self, filter: &str, order: &str) -> Result<Vec<TableRow>, ProviderError> {
        let rows = self
            .fetch_rows::<(String, String, String, String, Option<String>, u64, u64, u64)>(
                &table_sql(filter, order),
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(
                |(schema, name, catalog, table_type, engine, data_bytes, index_bytes, row_estimate)| {
                    TableRow {
                        schema,
                        name,
                        catalog,
                        table_type,
                        engine,
                        data_bytes,
                        index_bytes,
                        row_estimate,
                    }
                },
            )
            .collect())
    }

    async fn table_rows(&self, filter: &str, order: &str) -> Result<Vec<CatalogRow>, ProviderError> {
        Ok(self
            .tables(filter, order)
            .await?
            .into_iter()
            .map(CatalogRow::Table)
            .collect())
    }

    async fn views(&self) -> Result<Vec<CatalogRow>, ProviderError> {
        let sql = format!(
            "SELECT TABLE_SCHEMA, TABLE_NAME, DEFINER, VIEW_DEFINITION, IS_UPDATABLE \
             FROM information_schema.VIEWS \
             WHERE TABLE_SCHEMA NOT IN {SYSTEM_SCHEMAS} \
             ORDER BY TABLE_SCHEMA, TABLE_NAME"
        );
        let rows = self
            .fetch_rows::<(String, String, String, String, String)>(&sql)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(schema, name, definer, definition, updatable)| {
                CatalogRow::View(ViewRow {
                    schema,
                    name,
                    definer,
                    definition,
                    updatable: updatable.eq_ignore_ascii_case("YES"),
                })
            })
            .collect())
    }

    async fn table_count_per_schema(&self) -> Result<Vec<CatalogRow>, ProviderError> {
        let sql = format!(
            "SELECT TABLE_SCHEMA, COUNT(*) \
             FROM information_schema.TABLES \
             WHERE TABLE_TYPE = 'BASE TABLE' AND TABLE_SCHEMA NOT IN {SYSTEM_SCHEMAS} \
             GROUP BY TABLE_SCHEMA \
             ORDER BY COUNT(*) DESC, TABLE_SCHEMA"
        );
        let rows = self.fetch_rows::<(String, u64)>(&sql).await?;
        Ok(rows
            .into_iter()
            .map(|(schema, tables)| CatalogRow::SchemaTableCount(SchemaTableCount { schema, tables }))
            .collect())
    }

    async fn column_frequencies(&self) -> Result<Vec<CatalogRow>, ProviderError> {
        let total_sql = format!(
            "SELECT COUNT(*) FROM information_schema.TABLES \
             WHERE TABLE_TYPE = 'BASE TABLE' AND TABLE_SCHEMA NOT IN {SYSTEM_SCHEMAS}"
        );
        let total_tables = self
            .fetch_rows::<(u64,)>(&total_sql)
            .await?
            .first()
            .map_or(0, |(count,)| *count);

        let sql = format!(
            "SELECT c.COLUMN_NAME, COUNT(*) \
             FROM information_schema.COLUMNS c \
             JOIN information_schema.TABLES t \
               ON t.TABLE_SCHEMA = c.TABLE_SCHEMA AND t.TABLE_NAME = c.TABLE_NAME \
             WHERE t.TABLE_TYPE = 'BASE TABLE' AND t.TABLE_SCHEMA NOT IN {SYSTEM_SCHEMAS} \
             GROUP BY c.COLUMN_NAME \
             ORDER BY COUNT(*) DESC, c.COLUMN_NAME"
        );
        let rows = self.fetch_rows::<(String, u64)>(&sql).await?;
        Ok(column_frequency_rows(rows, total_tables))
    }

    async fn server_version(&self) -> Result<Vec<CatalogRow>, ProviderError> {
        let rows = self.fetch_rows::<(String,)>("SELECT VERSION()").await?;
        Ok(rows
            .into_iter()
            .map(|(version,)| CatalogRow::ServerVersion(version))
            .collect())
    }
}

#[async_trait]
impl DataProvider for MysqlCatalogProvider {
    async fn fetch(&self, listing: Listing) -> Result<Vec<CatalogRow>, ProviderError> {
        match listing {
            Listing::Schemas => self.schemas(false).await,
            Listing::UserSchemas => self.schemas(true).await,
            Listing::Tables => self.table_rows("", "TABLE_SCHEMA, TABLE_NAME").await,
            Listing::Views => self.views().await,
            Listing::MaterializedViews => {
                debug!("mysql has no materialized views");
                Ok(Vec::new())
            }
            Listing::TableCountPerSchema => self.table_count_per_schema().await,
            Listing::TablesBySize => {
                self.table_rows("", "DATA_LENGTH DESC, TABLE_SCHEMA, TABLE_NAME")
                    .await
            }
            Listing::TablesBySizeWithIndexes => {
                self.table_rows(
                    "",
                    "DATA_LENGTH + INDEX_LENGTH DESC, TABLE_SCHEMA, TABLE_NAME",
                )
                .await
            }
            Listing::TableRowCounts => {
                self.table_rows("", "TABLE_ROWS DESC, TABLE_SCHEMA, TABLE_NAME")
                    .await
            }
            Listing::EmptyTables => {
                self.table_rows("AND COALESCE(TABLE_ROWS, 0) = 0", "TABLE_SCHEMA, TABLE_NAME")
                    .await
            }
            Listing::TablesGroupedByRows => {
                let tables = self.tables("", "TABLE_SCHEMA, TABLE_NAME").await?;
                Ok(group_by_row_buckets(tables.iter().map(|table| table.row_estimate))
                    .into_iter()
                    .map(CatalogRow::RowBucket)
                    .collect())
            }
            Listing::ColumnNameFrequencies => self.column_frequencies().await,
            Listing::ServerVersion => self.server_version().await,
        }
    }
}

fn schema_sql(user_only: bool) -> String {
    let filter = if user_only {
        format!("WHERE s.SCHEMA_NAME NOT IN {SYSTEM_SCHEMAS} ")
    } else {
        String::new()
    };
    format!(
        "SELECT s.SCHEMA_NAME, s.CATALOG_NAME, s.DEFAULT_CHARACTER_SET_NAME, \
         s.DEFAULT_COLLATION_NAME, COUNT(t.TABLE_NAME) \
         FROM information_schema.SCHEMATA s \
         LEFT JOIN information_schema.TABLES t ON t.TABLE_SCHEMA = s.SCHEMA_NAME \
         {filter}\
         GROUP BY s.SCHEMA_NAME, s.CATALOG_NAME, s.DEFAULT_CHARACTER_SET_NAME, \
         s.DEFAULT_COLLATION_NAME \
         ORDER BY s.SCHEMA_NAME"
    )
}

fn table_sql(filter: &str, order: &str) -> String {
    format!(
        "SELECT TABLE_SCHEMA, TABLE_NAME, TABLE_CATALOG, TABLE_TYPE, ENGINE, \
         COALESCE(DATA_LENGTH, 0), COALESCE(INDEX_LENGTH, 0), COALESCE(TABLE_ROWS, 0) \
         FROM information_schema.TABLES \
         WHERE TABLE_TYPE = 'BASE TABLE' AND TABLE_SCHEMA NOT IN {SYSTEM_SCHEMAS} {filter} \
         ORDER BY {order}"
    )
}

#[allow(clippy::cast_precision_loss)]
fn column_frequency_rows(rows: Vec<(String, u64)>, total_tables: u64) -> Vec<CatalogRow> {
    rows.into_iter()
        .map(|(name, tables)| {
            let percent_tables = if total_tables == 0 {
                0.0
            } else {
                tables as f64 * 100.0 / total_tables as f64
            };
            CatalogRow::ColumnFrequency(ColumnFrequency {
                name,
                tables,
                percent_tables,
            })
        })
        .collect()
}

fn opts_from_profile(profile: &ConnectionProfile, password: Option<&str>) -> OptsBuilder {
    let mut builder = OptsBuilder::default()
        .ip_or_hostname(profile.host.clone())
        .tcp_port(profile.port)
        .user(Some(profile.user.clone()))
        .prefer_socket(false);

    let password = password
        .filter(|pw| !pw.is_empty())
        .map(str::to_string)
        .or_else(|| resolve_password(profile));
    if let Some(password) = password {
        builder = builder.pass(Some(password));
    }

    if let Some(database) = profile.database.as_deref().filter(|db| !db.is_empty()) {
        builder = builder.db_name(Some(database.to_string()));
    }

    if let Some(ssl_opts) = ssl_opts_for(profile.tls_mode) {
        builder = builder.ssl_opts(ssl_opts);
    }

    builder
}

fn ssl_opts_for(mode: TlsMode) -> Option<SslOpts> {
    match mode {
        TlsMode::Disabled | TlsMode::Prefer => None,
        TlsMode::Require => Some(
            SslOpts::default()
                .with_danger_accept_invalid_certs(true)
                .with_danger_skip_domain_validation(true),
        ),
        TlsMode::VerifyIdentity => Some(SslOpts::default()),
    }
}

fn resolve_password(profile: &ConnectionProfile) -> Option<String> {
    let env_password = std::env::var(PASSWORD_ENV)
        .ok()
        .filter(|pw| !pw.is_empty());

    match profile.password_source {
        PasswordSource::EnvVar => env_password,
        PasswordSource::Keyring => load_keyring_password(profile).or(env_password),
    }
}

#[derive(Debug, Error)]
#[error("failed to store password in keyring: {message}")]
pub struct KeyringError {
    message: String,
}

impl KeyringError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Stores `password` for a keyring-backed profile. Other profiles are left alone.
pub fn remember_password(profile: &ConnectionProfile, password: &str) -> Result<(), KeyringError> {
    if profile.password_source != PasswordSource::Keyring || password.is_empty() {
        return Ok(());
    }
    store_keyring_password(profile, password)
}

fn keyring_names(profile: &ConnectionProfile) -> (String, String) {
    let service = profile
        .keyring_service
        .as_deref()
        .map(str::trim)
        .filter(|service| !service.is_empty())
        .unwrap_or(DEFAULT_KEYRING_SERVICE);
    let account = profile
        .keyring_account
        .as_deref()
        .map(str::trim)
        .filter(|account| !account.is_empty())
        .map_or_else(
            || format!("{}@{}:{}", profile.user, profile.host, profile.port),
            str::to_string,
        );
    (service.to_string(), account)
}

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
fn load_keyring_password(profile: &ConnectionProfile) -> Option<String> {
    let (service, account) = keyring_names(profile);
    match keyring::Entry::new(&service, &account).and_then(|entry| entry.get_password()) {
        Ok(password) if !password.is_empty() => Some(password),
        Ok(_) | Err(keyring::Error::NoEntry) => None,
        Err(error) => {
            warn!(%error, service, account, "keyring lookup failed");
            None
        }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn load_keyring_password(_profile: &ConnectionProfile) -> Option<String> {
    None
}

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
fn store_keyring_password(profile: &ConnectionProfile, password: &str) -> Result<(), KeyringError> {
    let (service, account) = keyring_names(profile);
    keyring::Entry::new(&service, &account)
        .and_then(|entry| entry.set_password(password))
        .map_err(|error| KeyringError::new(error.to_string()))
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn store_keyring_password(
    _profile: &ConnectionProfile,
    _password: &str,
) -> Result<(), KeyringError> {
    Err(KeyringError::new("no keyring backend on this platform"))
}

fn to_provider_error(error: mysql_async::Error) -> ProviderError {
    ProviderError::backend(error.to_string())
}
