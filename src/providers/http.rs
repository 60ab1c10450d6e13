use crate::core::models::{Recipe, RecipeId};
use crate::core::settings::ApiSettings;
use crate::providers::{FetchError, RecipeSource};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;

pub struct HttpRecipeSource {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpRecipeSource {
    pub fn new(settings: &ApiSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            token: settings.token.clone(),
        })
    }

    fn recipe_url(&self, id: &RecipeId) -> String {
        format!("{}/recipes/{}", self.base_url, id)
    }
}

#[async_trait]
impl RecipeSource for HttpRecipeSource {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn get_recipe(&self, id: &RecipeId) -> Result<Recipe, FetchError> {
        let mut request = self
            .client
            .get(self.recipe_url(id))
            .header(reqwest::header::ACCEPT, "application/json");

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(id.clone()));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.is_server_error() {
                return Err(FetchError::Unavailable(format!("{status} - {body}")));
            }
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<Recipe>().await?)
    }
}
