use crate::core::models::{Recipe, RecipeId};
use crate::core::schedule::PollSchedule;
use crate::core::settings::Settings;
use crate::poller::{ImageLoaded, ImagePoller, PollStatus};
use crate::providers::{HttpRecipeSource, RecipeSource};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;

#[derive(Serialize)]
struct WatchOutput {
    recipes: Vec<RecipeOutcome>,
    #[serde(with = "chrono::serde::ts_seconds")]
    fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum Outcome {
    Ready,
    TimedOut,
    Cancelled,
    Error,
}

impl Outcome {
    fn label(&self) -> &'static str {
        match self {
            Outcome::Ready => "ready",
            Outcome::TimedOut => "timed out",
            Outcome::Cancelled => "cancelled",
            Outcome::Error => "error",
        }
    }
}

#[derive(Serialize)]
struct RecipeOutcome {
    id: RecipeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    waited_ms: u64,
}

impl RecipeOutcome {
    fn failed(id: RecipeId, error: String, waited: Duration) -> Self {
        Self {
            id,
            name: None,
            outcome: Outcome::Error,
            image_url: None,
            error: Some(error),
            waited_ms: waited.as_millis() as u64,
        }
    }

    fn from_status(recipe: &Recipe, status: PollStatus, waited: Duration) -> Self {
        let outcome = if status.image_url.is_some() {
            Outcome::Ready
        } else if status.has_timed_out {
            Outcome::TimedOut
        } else {
            Outcome::Cancelled
        };

        Self {
            id: recipe.id.clone(),
            name: (!recipe.name.is_empty()).then(|| recipe.name.clone()),
            outcome,
            image_url: status.image_url,
            error: None,
            waited_ms: waited.as_millis() as u64,
        }
    }
}

pub async fn run(settings: &Settings, ids: Vec<String>, json: bool) -> Result<()> {
    let schedule = settings.polling.schedule()?;
    let source: Arc<dyn RecipeSource> = Arc::new(HttpRecipeSource::new(&settings.api)?);

    tracing::info!(
        recipes = ids.len(),
        timeout = ?schedule.timeout(),
        "Watching recipe images"
    );

    let mut tasks = JoinSet::new();
    for (index, id) in ids.into_iter().enumerate() {
        let source = Arc::clone(&source);
        tasks.spawn(async move {
            let outcome = watch_recipe(source, schedule, RecipeId::new(id)).await;
            (index, outcome)
        });
    }

    let mut outcomes = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        outcomes.push(joined?);
    }
    outcomes.sort_by_key(|(index, _)| *index);
    let outcomes: Vec<RecipeOutcome> = outcomes.into_iter().map(|(_, o)| o).collect();

    if json {
        let output = WatchOutput {
            recipes: outcomes,
            fetched_at: Utc::now(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_text_output(&outcomes);
    }

    Ok(())
}

/// Fetches the recipe once, then hands it to its own poller and waits for
/// the poller to settle. Ctrl-C tears the poller down.
async fn watch_recipe(
    source: Arc<dyn RecipeSource>,
    schedule: PollSchedule,
    id: RecipeId,
) -> RecipeOutcome {
    let started = Instant::now();

    let recipe = match source.get_recipe(&id).await {
        Ok(recipe) => recipe,
        Err(e) => {
            tracing::warn!(recipe_id = %id, error = %e, "Failed to fetch recipe");
            return RecipeOutcome::failed(id, e.to_string(), started.elapsed());
        }
    };

    let mut poller = ImagePoller::new(source, schedule);
    let mut watcher = poller.subscribe();
    let on_image_loaded: ImageLoaded = Arc::new(|loaded: Recipe| {
        tracing::info!(
            recipe_id = %loaded.id,
            image_url = loaded.ready_image().unwrap_or_default(),
            "Image loaded"
        );
    });

    poller.present(Some(recipe.clone()), Some(on_image_loaded));

    let status = tokio::select! {
        status = watcher.settled() => status,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(recipe_id = %id, "Interrupted, stopping poller");
            poller.stop();
            poller.status()
        }
    };

    RecipeOutcome::from_status(&recipe, status, started.elapsed())
}

fn print_text_output(outcomes: &[RecipeOutcome]) {
    for outcome in outcomes {
        let name = outcome
            .name
            .as_ref()
            .map(|n| format!(" ({})", n))
            .unwrap_or_default();

        println!("{}{}", outcome.id, name);

        let waited = format!("{:.1}s", outcome.waited_ms as f64 / 1000.0);
        match (&outcome.image_url, &outcome.error) {
            (Some(url), _) => println!("  {:<10} {} after {}", outcome.outcome.label(), url, waited),
            (None, Some(error)) => println!("  {:<10} {}", outcome.outcome.label(), error),
            (None, None) => println!("  {:<10} after {}", outcome.outcome.label(), waited),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_status() {
        let recipe = Recipe::new("r1");
        let waited = Duration::from_millis(10_250);

        let ready = RecipeOutcome::from_status(
            &recipe,
            PollStatus {
                image_url: Some("https://img/r1.png".to_string()),
                is_polling: false,
                has_timed_out: false,
            },
            waited,
        );
        assert_eq!(ready.outcome, Outcome::Ready);
        assert_eq!(ready.waited_ms, 10_250);
        assert!(ready.name.is_none());

        let timed_out = RecipeOutcome::from_status(
            &recipe,
            PollStatus {
                image_url: None,
                is_polling: false,
                has_timed_out: true,
            },
            waited,
        );
        assert_eq!(timed_out.outcome, Outcome::TimedOut);

        let cancelled = RecipeOutcome::from_status(
            &recipe,
            PollStatus {
                image_url: None,
                is_polling: false,
                has_timed_out: false,
            },
            waited,
        );
        assert_eq!(cancelled.outcome, Outcome::Cancelled);
    }

    #[test]
    fn test_outcome_serialization() {
        let mut recipe = Recipe::new("r1");
        recipe.name = "Shakshuka".to_string();
        let outcome = RecipeOutcome::from_status(
            &recipe,
            PollStatus {
                image_url: None,
                is_polling: false,
                has_timed_out: true,
            },
            Duration::from_secs(20),
        );

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["id"], "r1");
        assert_eq!(json["name"], "Shakshuka");
        assert_eq!(json["outcome"], "timed_out");
        assert_eq!(json["waited_ms"], 20_000);
        assert!(json.get("image_url").is_none());
        assert!(json.get("error").is_none());
    }
}
