use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::item::{Item, SELF_FIELD};
use crate::settings::config_dir;

pub const DEFAULT_PORT: u16 = 3306;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TlsMode {
    Disabled,
    #[default]
    Prefer,
    Require,
    VerifyIdentity,
}

impl TlsMode {
    pub const ALL: [TlsMode; 4] = [
        TlsMode::Disabled,
        TlsMode::Prefer,
        TlsMode::Require,
        TlsMode::VerifyIdentity,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Prefer => "prefer",
            Self::Require => "require",
            Self::VerifyIdentity => "verify-identity",
        }
    }
}

impl fmt::Display for TlsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Item for TlsMode {
    fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        (name == SELF_FIELD).then_some(Cow::Borrowed(self.as_str()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PasswordSource {
    #[default]
    EnvVar,
    Keyring,
}

/// A saved MySQL connection. Passwords are never written to the profiles file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionProfile {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub database: Option<String>,
    #[serde(default)]
    pub tls_mode: TlsMode,
    #[serde(default)]
    pub password_source: PasswordSource,
    #[serde(default)]
    pub keyring_service: Option<String>,
    #[serde(default)]
    pub keyring_account: Option<String>,
}

impl ConnectionProfile {
    #[must_use]
    pub fn new(name: impl Into<String>, host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port: DEFAULT_PORT,
            user: user.into(),
            database: None,
            tls_mode: TlsMode::Prefer,
            password_source: PasswordSource::EnvVar,
            keyring_service: None,
            keyring_account: None,
        }
    }
}

impl Item for ConnectionProfile {
    fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "name" | SELF_FIELD => Some(Cow::Borrowed(&self.name)),
            "host" => Some(Cow::Borrowed(&self.host)),
            "port" => Some(Cow::Owned(self.port.to_string())),
            "user" => Some(Cow::Borrowed(&self.user)),
            "database" => self.database.as_deref().map(Cow::Borrowed),
            "tls_mode" => Some(Cow::Borrowed(self.tls_mode.as_str())),
            "password_source" => Some(Cow::Borrowed(match self.password_source {
                PasswordSource::EnvVar => "env",
                PasswordSource::Keyring => "keyring",
            })),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProfilesError {
    #[error("config directory is unavailable for this platform")]
    ConfigDirUnavailable,
    #[error("failed to read profiles file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse profiles file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to create config directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize profiles: {source}")]
    Serialize {
        #[source]
        source: toml::ser::Error,
    },
    #[error("failed to write profiles file at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProfilesDocument {
    #[serde(default)]
    profiles: Vec<ConnectionProfile>,
}

#[derive(Debug, Clone)]
pub struct FileProfilesStore {
    path: PathBuf,
    profiles: Vec<ConnectionProfile>,
}

impl FileProfilesStore {
    pub fn load_default() -> Result<Self, ProfilesError> {
        let path = default_profiles_path()?;
        Self::load_from_path(path)
    }

    /// Loads profiles sorted by name; the last entry wins when names repeat.
    pub fn load_from_path(path: impl Into<PathBuf>) -> Result<Self, ProfilesError> {
        let path = path.into();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(source) => return Err(ProfilesError::Read { path, source }),
        };

        let doc: ProfilesDocument = if raw.trim().is_empty() {
            ProfilesDocument::default()
        } else {
            toml::from_str(&raw).map_err(|source| ProfilesError::Parse {
                path: path.clone(),
                source,
            })?
        };

        let mut store = Self {
            path,
            profiles: Vec::with_capacity(doc.profiles.len()),
        };
        for profile in doc.profiles {
            store.upsert_profile(profile);
        }
        Ok(store)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn profiles(&self) -> &[ConnectionProfile] {
        &self.profiles
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    #[must_use]
    pub fn profile(&self, name: &str) -> Option<&ConnectionProfile> {
        self.profiles.iter().find(|profile| profile.name == name)
    }

    pub fn upsert_profile(&mut self, profile: ConnectionProfile) {
        match self
            .profiles
            .binary_search_by(|existing| existing.name.cmp(&profile.name))
        {
            Ok(index) => self.profiles[index] = profile,
            Err(index) => self.profiles.insert(index, profile),
        }
    }

    #[must_use]
    pub fn delete_profile(&mut self, name: &str) -> bool {
        let original_len = self.profiles.len();
        self.profiles.retain(|profile| profile.name != name);
        self.profiles.len() != original_len
    }

    pub fn persist(&self) -> Result<(), ProfilesError> {
        if let Some(parent_dir) = self.path.parent() {
            fs::create_dir_all(parent_dir).map_err(|source| ProfilesError::CreateDir {
                path: parent_dir.to_path_buf(),
                source,
            })?;
        }

        let doc = ProfilesDocument {
            profiles: self.profiles.clone(),
        };
        let rendered =
            toml::to_string_pretty(&doc).map_err(|source| ProfilesError::Serialize { source })?;

        fs::write(&self.path, rendered).map_err(|source| ProfilesError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

pub fn default_profiles_path() -> Result<PathBuf, ProfilesError> {
    config_dir()
        .map(|dir| dir.join("profiles.toml"))
        .ok_or(ProfilesError::ConfigDirUnavailable)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::{ConnectionProfile, FileProfilesStore, PasswordSource, ProfilesError, TlsMode};
    use crate::item::field_text;

    fn temp_profiles_path(temp_dir: &TempDir) -> PathBuf {
        temp_dir.path().join("nested").join("profiles.toml")
    }

    #[test]
    fn missing_profiles_file_loads_empty_store() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_profiles_path(&temp_dir);

        let store = FileProfilesStore::load_from_path(path).expect("failed to load store");
        assert!(store.is_empty());
    }

    #[test]
    fn upsert_persist_reload_and_delete_profile() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_profiles_path(&temp_dir);

        let mut store = FileProfilesStore::load_from_path(&path).expect("failed to load store");
        let mut profile = ConnectionProfile::new("local", "127.0.0.1", "root");
        profile.database = Some("inventory".to_string());
        profile.tls_mode = TlsMode::Require;
        profile.password_source = PasswordSource::Keyring;

        store.upsert_profile(profile.clone());
        store.upsert_profile(ConnectionProfile::new("analytics", "db.internal", "reader"));
        store.persist().expect("failed to persist store");

        let mut reloaded = FileProfilesStore::load_from_path(&path).expect("failed to reload");
        let names: Vec<&str> = reloaded
            .profiles()
            .iter()
            .map(|profile| profile.name.as_str())
            .collect();
        assert_eq!(names, ["analytics", "local"]);
        assert_eq!(reloaded.profile("local"), Some(&profile));

        let mut updated = profile.clone();
        updated.port = 3307;
        reloaded.upsert_profile(updated);
        assert_eq!(reloaded.profiles().len(), 2);
        assert!(reloaded.delete_profile("local"));
        assert!(!reloaded.delete_profile("local"));
        reloaded.persist().expect("failed to persist deletion");

        let reloaded = FileProfilesStore::load_from_path(path).expect("failed final reload");
        assert!(reloaded.profile("local").is_none());
        assert_eq!(reloaded.profiles().len(), 1);
    }

    #[test]
    fn duplicate_names_keep_the_last_entry() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_dir.path().join("profiles.toml");
        fs::write(
            &path,
            r#"
[[profiles]]
name = "local"
host = "first"
port = 3306
user = "root"

[[profiles]]
name = "local"
host = "second"
port = 3306
user = "root"
"#,
        )
        .expect("failed to write profiles");

        let store = FileProfilesStore::load_from_path(&path).expect("failed to load store");
        assert_eq!(store.profiles().len(), 1);
        assert_eq!(store.profiles()[0].host, "second");
        assert_eq!(store.profiles()[0].tls_mode, TlsMode::Prefer);
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_dir.path().join("profiles.toml");
        fs::write(&path, "profiles = 3").expect("failed to write profiles");

        let error = FileProfilesStore::load_from_path(&path).expect_err("load should fail");
        assert!(matches!(error, ProfilesError::Parse { .. }));
    }

    #[test]
    fn profile_exposes_display_fields() {
        let mut profile = ConnectionProfile::new("local", "127.0.0.1", "root");
        assert_eq!(field_text(&profile, "."), "local");
        assert_eq!(field_text(&profile, "database"), "");

        profile.database = Some("inventory".to_string());
        profile.tls_mode = TlsMode::VerifyIdentity;
        assert_eq!(field_text(&profile, "database"), "inventory");
        assert_eq!(field_text(&profile, "tls_mode"), "verify-identity");
        assert_eq!(field_text(&profile, "port"), "3306");
        assert_eq!(field_text(&TlsMode::Disabled, "."), "disabled");
    }
}
