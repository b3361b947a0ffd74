use std::io;

use thiserror::Error;

use crate::catalog::Listing;
use crate::provider::ProviderError;
use crate::template::TemplateError;

/// Why a navigation run stopped.
#[derive(Debug, Error)]
pub enum NavError {
    /// The user backed out of a selector, or the process was asked to stop.
    #[error("navigation cancelled")]
    Cancelled,
    #[error("failed to load {listing}: {source}")]
    Provider {
        listing: Listing,
        #[source]
        source: ProviderError,
    },
    #[error("terminal i/o failed: {0}")]
    SelectorIo(#[source] io::Error),
    #[error("invalid template: {0}")]
    Template(#[from] TemplateError),
}

impl NavError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Error returned by a picker session.
#[derive(Debug, Error)]
pub enum PickError {
    #[error("selection cancelled")]
    Cancelled,
    #[error("terminal i/o failed: {0}")]
    Io(#[from] io::Error),
}

impl From<PickError> for NavError {
    fn from(error: PickError) -> Self {
        match error {
            PickError::Cancelled => Self::Cancelled,
            PickError::Io(source) => Self::SelectorIo(source),
        }
    }
}

/// A required input was left empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("must provide a {field}")]
pub struct ValidationError {
    field: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }
}

/// Validator that rejects empty input for `field`.
pub fn require_non_empty(field: &str) -> impl Fn(&str) -> Result<(), ValidationError> + Send + Sync {
    let field = field.to_string();
    move |input: &str| {
        if input.trim().is_empty() {
            Err(ValidationError::new(field.clone()))
        } else {
            Ok(())
        }
    }
}
