use std::borrow::Cow;

use serde::Serialize;
use thiserror::Error;

use crate::catalog::Listing;
use crate::item::{Item, SELF_FIELD};

/// A node in the navigation tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct State {
    name: String,
    #[serde(flatten)]
    kind: StateKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StateKind {
    /// Presents `children` under `label`; an empty menu bounces straight back.
    Menu { label: String, children: Vec<State> },
    /// Fetches and presents the rows of `listing`.
    Action { listing: Listing },
}

impl State {
    #[must_use]
    pub fn menu(name: impl Into<String>, label: impl Into<String>, children: Vec<State>) -> Self {
        Self {
            name: name.into(),
            kind: StateKind::Menu {
                label: label.into(),
                children,
            },
        }
    }

    #[must_use]
    pub fn action(name: impl Into<String>, listing: Listing) -> Self {
        Self {
            name: name.into(),
            kind: StateKind::Action { listing },
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> &StateKind {
        &self.kind
    }

    #[must_use]
    pub fn children(&self) -> &[State] {
        match &self.kind {
            StateKind::Menu { children, .. } => children,
            StateKind::Action { .. } => &[],
        }
    }

    #[must_use]
    pub fn child(&self, name: &str) -> Option<&State> {
        self.children().iter().find(|child| child.name == name)
    }
}

impl Item for State {
    fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "name" | SELF_FIELD => Some(Cow::Borrowed(&self.name)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("root `{name}` must be a menu")]
    RootIsAction { name: String },
    #[error("root menu `{name}` has no children")]
    EmptyRoot { name: String },
    #[error("menu `{menu}` has more than one child named `{name}`")]
    DuplicateChild { menu: String, name: String },
}

fn check_sibling_names(state: &State) -> Result<(), TreeError> {
    let children = state.children();
    for (index, child) in children.iter().enumerate() {
        if children[..index].iter().any(|earlier| earlier.name == child.name) {
            return Err(TreeError::DuplicateChild {
                menu: state.name.clone(),
                name: child.name.clone(),
            });
        }
        check_sibling_names(child)?;
    }
    Ok(())
}

/// The immutable set of states reachable from one root menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationTree {
    root: State,
}

impl NavigationTree {
    #[must_use]
    pub fn builder(name: impl Into<String>, label: impl Into<String>) -> TreeBuilder {
        TreeBuilder {
            name: name.into(),
            label: label.into(),
            children: Vec::new(),
        }
    }

    /// Wraps `root` after checking it is a non-empty menu, since bouncing to an
    /// empty root would never reach a selector. Siblings must have distinct
    /// names so every state is reachable through [`NavigationTree::find`].
    pub fn new(root: State) -> Result<Self, TreeError> {
        match &root.kind {
            StateKind::Action { .. } => Err(TreeError::RootIsAction { name: root.name }),
            StateKind::Menu { children, .. } if children.is_empty() => {
                Err(TreeError::EmptyRoot { name: root.name })
            }
            StateKind::Menu { .. } => {
                check_sibling_names(&root)?;
                Ok(Self { root })
            }
        }
    }

    #[must_use]
    pub fn root(&self) -> &State {
        &self.root
    }

    /// Follows child names from the root.
    #[must_use]
    pub fn find(&self, path: &[&str]) -> Option<&State> {
        path.iter()
            .try_fold(&self.root, |state, name| state.child(name))
    }

    /// Every action listing in the tree, depth first.
    #[must_use]
    pub fn listings(&self) -> Vec<Listing> {
        fn walk(state: &State, out: &mut Vec<Listing>) {
            match &state.kind {
                StateKind::Menu { children, .. } => {
                    for child in children {
                        walk(child, out);
                    }
                }
                StateKind::Action { listing } => out.push(*listing),
            }
        }

        let mut listings = Vec::new();
        walk(&self.root, &mut listings);
        listings
    }
}

/// Collects the root menu's children before validating the tree.
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    name: String,
    label: String,
    children: Vec<State>,
}

impl TreeBuilder {
    #[must_use]
    pub fn child(mut self, state: State) -> Self {
        self.children.push(state);
        self
    }

    #[must_use]
    pub fn action(self, name: impl Into<String>, listing: Listing) -> Self {
        self.child(State::action(name, listing))
    }

    pub fn build(self) -> Result<NavigationTree, TreeError> {
        NavigationTree::new(State::menu(self.name, self.label, self.children))
    }
}

/// The catalog explorer tree.
#[must_use]
pub fn default_tree() -> NavigationTree {
    let schemas = State::menu(
        "Schemas",
        "Schema Options",
        vec![
            State::action("All", Listing::Schemas),
            State::action("User Created", Listing::UserSchemas),
        ],
    );
    let views = State::menu(
        "Views",
        "Views",
        vec![
            State::action("All", Listing::Views),
            State::action("Materialized", Listing::MaterializedViews),
        ],
    );
    let stats = State::menu(
        "Stats",
        "Stats",
        vec![
            State::action("Table Count Per Schema", Listing::TableCountPerSchema),
            State::action("Tables By Size", Listing::TablesBySize),
            State::action("Tables By Size With Indexes", Listing::TablesBySizeWithIndexes),
            State::action("Table Row Counts", Listing::TableRowCounts),
            State::action("Empty Tables", Listing::EmptyTables),
            State::action("Tables Grouped By Rows", Listing::TablesGroupedByRows),
            State::action("Column Name Frequencies", Listing::ColumnNameFrequencies),
            State::action("Server Version", Listing::ServerVersion),
        ],
    );
    let explore = State::menu(
        "Explore",
        "Where to?",
        vec![schemas, State::action("Tables", Listing::Tables), views, stats],
    );
    let playground = State::menu("PlayGround", "PlayGround", Vec::new());

    NavigationTree {
        root: State::menu("Start", "Options", vec![explore, playground]),
    }
}
