use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::catalog::{no_results_template, CatalogRow, Listing};
use crate::error::{NavError, PickError};
use crate::item::Item;
use crate::provider::{DataProvider, ProviderError};
use crate::search::SearchPredicate;
use crate::template::{RenderTemplate, TemplateError};
use crate::tree::{NavigationTree, State, StateKind};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a picker needs to present one list.
#[derive(Clone, Copy)]
pub struct PickRequest<'a> {
    pub label: &'a str,
    pub items: &'a [&'a dyn Item],
    pub predicate: Option<&'a SearchPredicate>,
    pub template: Option<&'a RenderTemplate>,
}

/// Outcome of a finished pick. Cancellation is reported as [`PickError::Cancelled`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Index into the request's original item list.
    Chosen(usize),
    /// There was nothing to choose from.
    Nothing,
}

#[async_trait]
pub trait Picker: Send {
    async fn pick(
        &mut self,
        request: PickRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<Selection, PickError>;
}

/// Where control goes after an action finishes or an empty menu is entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnPolicy {
    #[default]
    Root,
    Parent,
}

/// Collaborators shared by every transition of one run.
pub struct Session<'a, P: ?Sized, K> {
    provider: &'a P,
    picker: &'a mut K,
    cancel: CancellationToken,
    fetch_timeout: Duration,
}

impl<'a, P: DataProvider + ?Sized, K: Picker> Session<'a, P, K> {
    #[must_use]
    pub fn new(provider: &'a P, picker: &'a mut K, cancel: CancellationToken) -> Self {
        Self {
            provider,
            picker,
            cancel,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }
}

/// Result of a successful transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<'t> {
    Enter(&'t State),
    Done,
}

#[derive(Debug, Clone)]
pub struct Navigator {
    tree: NavigationTree,
    policy: ReturnPolicy,
}

impl Navigator {
    #[must_use]
    pub fn new(tree: NavigationTree) -> Self {
        Self {
            tree,
            policy: ReturnPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ReturnPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn tree(&self) -> &NavigationTree {
        &self.tree
    }

    /// Drives the tree until a transition fails.
    ///
    /// Finishing an action never ends the run; it returns to the root (or the
    /// parent menu under [`ReturnPolicy::Parent`]). The only way out is an
    /// error, and a user quitting shows up as [`NavError::Cancelled`].
    pub async fn run<P, K>(&self, session: &mut Session<'_, P, K>) -> NavError
    where
        P: DataProvider + ?Sized,
        K: Picker,
    {
        let root = self.tree.root();
        let mut current = root;
        let mut trail: Vec<&State> = Vec::new();

        loop {
            trace!(state = current.name(), "entering state");
            match transition(current, session).await {
                Ok(Step::Enter(next)) => {
                    if matches!(current.kind(), StateKind::Menu { .. }) {
                        trail.push(current);
                    }
                    current = next;
                }
                Ok(Step::Done) => {
                    current = match self.policy {
                        ReturnPolicy::Root => {
                            trail.clear();
                            root
                        }
                        ReturnPolicy::Parent => trail.pop().unwrap_or(root),
                    };
                    trace!(state = current.name(), "bounced");
                }
                Err(error) => {
                    debug!(state = current.name(), %error, "navigation stopped");
                    return error;
                }
            }
        }
    }
}

/// Runs one state: presents a menu, or fetches and presents an action's rows.
pub async fn transition<'t, P, K>(
    state: &'t State,
    session: &mut Session<'_, P, K>,
) -> Result<Step<'t>, NavError>
where
    P: DataProvider + ?Sized,
    K: Picker,
{
    match state.kind() {
        StateKind::Menu { label, children } => {
            if children.is_empty() {
                debug!(menu = state.name(), "menu has no entries");
                return Ok(Step::Done);
            }

            let items: Vec<&dyn Item> = children.iter().map(|child| child as &dyn Item).collect();
            let template = menu_template()?;
            let predicate = SearchPredicate::field("name");
            let request = PickRequest {
                label,
                items: &items,
                predicate: Some(&predicate),
                template: Some(&template),
            };

            match session.picker.pick(request, &session.cancel).await? {
                Selection::Chosen(index) => Ok(children.get(index).map_or(Step::Done, Step::Enter)),
                Selection::Nothing => Ok(Step::Done),
            }
        }
        StateKind::Action { listing } => {
            let rows = fetch(*listing, session).await?;
            let presentation = listing.presentation()?;

            let (rows, template, predicate) = if rows.is_empty() {
                (vec![CatalogRow::NoResults], Some(no_results_template()?), None)
            } else {
                (rows, presentation.template, presentation.predicate)
            };
            let items: Vec<&dyn Item> = rows.iter().map(|row| row as &dyn Item).collect();
            let request = PickRequest {
                label: presentation.title,
                items: &items,
                predicate: predicate.as_ref(),
                template: template.as_ref(),
            };

            session.picker.pick(request, &session.cancel).await?;
            Ok(Step::Done)
        }
    }
}

async fn fetch<P, K>(
    listing: Listing,
    session: &Session<'_, P, K>,
) -> Result<Vec<CatalogRow>, NavError>
where
    P: DataProvider + ?Sized,
    K: Picker,
{
    let started_at = Instant::now();
    let fetched = tokio::select! {
        biased;
        () = session.cancel.cancelled() => return Err(NavError::Cancelled),
        fetched = tokio::time::timeout(session.fetch_timeout, session.provider.fetch(listing)) => fetched,
    };

    let rows = fetched
        .unwrap_or(Err(ProviderError::Timeout(session.fetch_timeout)))
        .map_err(|source| NavError::Provider { listing, source })?;
    debug!(
        %listing,
        rows = rows.len(),
        elapsed_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX),
        "listing fetched"
    );
    Ok(rows)
}

fn menu_template() -> Result<RenderTemplate, TemplateError> {
    RenderTemplate::new(
        "{{ . }}",
        "» {{ name | bold | cyan }}",
        "  {{ name | cyan }}",
    )
}
