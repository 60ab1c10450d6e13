//! Scripted recipe source for poller tests.
//!
//! Responses are served in order from a queue. Once the queue is empty every
//! call returns the recipe without an image. Each call records the instant it
//! was issued, measured on tokio's clock so paused-time tests see exact
//! offsets.

use super::{FetchError, RecipeSource};
use crate::core::models::{Recipe, RecipeId};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

pub enum Scripted {
    Pending,
    Ready(String),
    Fail(String),
}

pub struct ScriptedSource {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<(RecipeId, Instant)>>,
    latency: Duration,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    pub fn with_script(script: impl IntoIterator<Item = Scripted>) -> Self {
        let source = Self::new();
        source.script.lock().unwrap().extend(script);
        source
    }

    /// Delay every response, to model a fetch that is in flight for a while.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Call offsets from `t0` in whole milliseconds.
    pub fn call_offsets_ms(&self, t0: Instant) -> Vec<u128> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, at)| (*at - t0).as_millis())
            .collect()
    }

    pub fn call_offsets_for(&self, id: &str, t0: Instant) -> Vec<u128> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(called, _)| called.as_str() == id)
            .map(|(_, at)| (*at - t0).as_millis())
            .collect()
    }
}

#[async_trait]
impl RecipeSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn get_recipe(&self, id: &RecipeId) -> Result<Recipe, FetchError> {
        self.calls.lock().unwrap().push((id.clone(), Instant::now()));
        let next = self.script.lock().unwrap().pop_front();

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let recipe = Recipe::new(id.as_str());
        match next {
            None | Some(Scripted::Pending) => Ok(recipe),
            Some(Scripted::Ready(url)) => Ok(recipe.with_image(url)),
            Some(Scripted::Fail(message)) => Err(FetchError::Unavailable(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_pending() {
        let source = ScriptedSource::with_script([
            Scripted::Fail("boom".to_string()),
            Scripted::Ready("https://img/r1.png".to_string()),
        ]);
        let id = RecipeId::from("r1");

        assert!(source.get_recipe(&id).await.is_err());
        let recipe = source.get_recipe(&id).await.unwrap();
        assert_eq!(recipe.ready_image(), Some("https://img/r1.png"));
        let recipe = source.get_recipe(&id).await.unwrap();
        assert!(!recipe.has_image());
        assert_eq!(source.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_and_call_instants() {
        let source = ScriptedSource::new().with_latency(Duration::from_secs(2));
        let t0 = Instant::now();

        source.get_recipe(&RecipeId::from("r1")).await.unwrap();
        assert_eq!(t0.elapsed(), Duration::from_secs(2));
        assert_eq!(source.call_offsets_ms(t0), vec![0]);
        assert_eq!(source.call_offsets_for("r1", t0), vec![0]);
        assert!(source.call_offsets_for("r2", t0).is_empty());
    }
}
