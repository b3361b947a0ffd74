pub mod mysql;

pub use mysql::{remember_password, KeyringError, MysqlCatalogProvider};

