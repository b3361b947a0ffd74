use std::fmt::Display;
use std::io;

use sqlwalk_core::error::{require_non_empty, ValidationError};
use sqlwalk_core::item::Item;
use sqlwalk_core::navigator::{PickRequest, Selection};
use sqlwalk_core::profiles::{
    ConnectionProfile, FileProfilesStore, PasswordSource, TlsMode, DEFAULT_PORT,
};
use sqlwalk_core::search::SearchPredicate;
use sqlwalk_core::template::{RenderTemplate, TemplateError};
use sqlwalk_core::PickError;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::prompt::{confirm, TextPrompt};
use crate::selector::Selector;
use crate::terminal::TerminalDriver;

const DEFAULT_USER: &str = "root";
const DEFAULT_HOST: &str = "127.0.0.1";

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("startup cancelled")]
    Cancelled,
    #[error("terminal i/o failed: {0}")]
    Io(#[source] io::Error),
    #[error("invalid template: {0}")]
    Template(#[from] TemplateError),
}

impl From<PickError> for FlowError {
    fn from(error: PickError) -> Self {
        match error {
            PickError::Cancelled => Self::Cancelled,
            PickError::Io(source) => Self::Io(source),
        }
    }
}

/// Connection details gathered at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupProfile {
    pub profile: ConnectionProfile,
    /// Password typed during this run, if any.
    pub password: Option<String>,
    /// Whether the profile was written to the profiles file.
    pub saved: bool,
}

fn profile_template() -> Result<RenderTemplate, TemplateError> {
    RenderTemplate::new(
        "{{ . }}",
        "» {{ name | bold | cyan }} {{ user | green }}@{{ host }}",
        "  {{ name | cyan }} {{ user | green }}@{{ host }}",
    )?
    .with_details(concat!(
        "\n --------- Profile ----------",
        "\n {{ \"Database:\" | faint }}\t{{ database }}",
        "\n {{ \"Port:\" | faint }}\t{{ port }}",
        "\n {{ \"TLS:\" | faint }}\t{{ tls_mode }}",
    ))
}

fn tls_template() -> Result<RenderTemplate, TemplateError> {
    RenderTemplate::new("{{ . }}", "» {{ . | bold | cyan }}", "  {{ . | cyan }}")
}

fn validate_port(input: &str) -> Result<(), ValidationError> {
    input
        .trim()
        .parse::<u16>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("valid port"))
}

/// Picks a saved profile or builds a new one from prompts, optionally saving it.
///
/// A saved profile reads its password from the keyring only when `remember`
/// stored it there; otherwise it falls back to the environment.
pub async fn choose_profile<D, R, E>(
    selector: &mut Selector<D>,
    store: &mut FileProfilesStore,
    remember: R,
    cancel: &CancellationToken,
) -> Result<StartupProfile, FlowError>
where
    D: TerminalDriver,
    R: FnOnce(&ConnectionProfile, &str) -> Result<(), E>,
    E: Display,
{
    if !store.is_empty()
        && confirm(selector.driver_mut(), "Use a saved profile?", true, cancel).await?
    {
        if let Some(profile) = pick_saved(selector, store, cancel).await? {
            return Ok(StartupProfile {
                profile,
                password: None,
                saved: true,
            });
        }
    }

    let (mut profile, password) = prompt_profile(selector, cancel).await?;
    let driver = selector.driver_mut();
    if !confirm(driver, "Save profile?", false, cancel).await? {
        return Ok(StartupProfile {
            profile,
            password: Some(password),
            saved: false,
        });
    }

    let required = require_non_empty("profile name");
    profile.name = TextPrompt::new("Profile name")
        .with_validator(&required)
        .run(driver, cancel)
        .await?;
    profile.password_source = PasswordSource::Keyring;
    if let Err(error) = remember(&profile, &password) {
        warn!(%error, profile = %profile.name, "password not stored in keyring");
        profile.password_source = PasswordSource::EnvVar;
    }

    store.upsert_profile(profile.clone());
    let saved = match store.persist() {
        Ok(()) => {
            info!(profile = %profile.name, path = %store.path().display(), "profile saved");
            true
        }
        Err(error) => {
            warn!(%error, "failed to save profile");
            false
        }
    };

    Ok(StartupProfile {
        profile,
        password: Some(password),
        saved,
    })
}

async fn pick_saved<D: TerminalDriver>(
    selector: &mut Selector<D>,
    store: &FileProfilesStore,
    cancel: &CancellationToken,
) -> Result<Option<ConnectionProfile>, FlowError> {
    let template = profile_template()?;
    let predicate = SearchPredicate::field("name");
    let items: Vec<&dyn Item> = store
        .profiles()
        .iter()
        .map(|profile| profile as &dyn Item)
        .collect();
    let request = PickRequest {
        label: "Profiles",
        items: &items,
        predicate: Some(&predicate),
        template: Some(&template),
    };

    match selector.select(request, cancel).await? {
        Selection::Chosen(index) => Ok(store.profiles().get(index).cloned()),
        Selection::Nothing => Ok(None),
    }
}

async fn prompt_profile<D: TerminalDriver>(
    selector: &mut Selector<D>,
    cancel: &CancellationToken,
) -> Result<(ConnectionProfile, String), FlowError> {
    let required_password = require_non_empty("password");
    let required_database = require_non_empty("database");
    let driver = selector.driver_mut();

    let user = TextPrompt::new("User")
        .with_default(DEFAULT_USER)
        .run(driver, cancel)
        .await?;
    let password = TextPrompt::new("Password")
        .masked()
        .with_validator(&required_password)
        .run(driver, cancel)
        .await?;
    let host = TextPrompt::new("Host")
        .with_default(DEFAULT_HOST)
        .run(driver, cancel)
        .await?;
    let database = TextPrompt::new("Database")
        .with_validator(&required_database)
        .run(driver, cancel)
        .await?;
    let default_port = DEFAULT_PORT.to_string();
    let port = TextPrompt::new("Port")
        .with_default(&default_port)
        .with_validator(&validate_port)
        .run(driver, cancel)
        .await?
        .trim()
        .parse::<u16>()
        .unwrap_or(DEFAULT_PORT);

    let template = tls_template()?;
    let all_modes = TlsMode::ALL;
    let modes: Vec<&dyn Item> = all_modes.iter().map(|mode| mode as &dyn Item).collect();
    let request = PickRequest {
        label: "TLS mode",
        items: &modes,
        predicate: None,
        template: Some(&template),
    };
    let tls_mode = match selector.select(request, cancel).await? {
        Selection::Chosen(index) => all_modes.get(index).copied().unwrap_or_default(),
        Selection::Nothing => TlsMode::default(),
    };

    let mut profile = ConnectionProfile::new(String::new(), host, user);
    profile.port = port;
    profile.database = Some(database);
    profile.tls_mode = tls_mode;
    Ok((profile, password))
}
