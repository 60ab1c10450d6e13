#[cfg(test)]
pub mod fake;
mod http;

use crate::core::models::{Recipe, RecipeId};
use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpRecipeSource;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("recipe {0} not found")]
    NotFound(RecipeId),
    #[error("recipe service unavailable: {0}")]
    Unavailable(String),
    #[error("recipe service returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Where the poller reads the current server-side state of a recipe.
///
/// Implementations must fail rather than hang so that a stuck request
/// cannot hold a polling session past its ceiling.
#[async_trait]
pub trait RecipeSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn get_recipe(&self, id: &RecipeId) -> Result<Recipe, FetchError>;
}
