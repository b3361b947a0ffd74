pub mod catalog;
pub mod error;
pub mod item;
pub mod navigator;
pub mod profiles;
pub mod provider;
pub mod search;
pub mod settings;
pub mod template;
pub mod tree;
pub mod viewport;

pub use catalog::{CatalogRow, Listing};
pub use error::{NavError, PickError, ValidationError};
pub use item::Item;
pub use navigator::{Navigator, PickRequest, Picker, ReturnPolicy, Selection, Session};
pub use provider::{DataProvider, ProviderError};
pub use search::SearchPredicate;
pub use template::RenderTemplate;
pub use tree::{default_tree, NavigationTree, State, StateKind};

