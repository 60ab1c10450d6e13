//! Image-readiness poller.
//!
//! A recipe's image is generated out-of-band after the recipe is created.
//! [`ImagePoller`] watches one recipe at a time: it re-fetches the recipe on
//! a [`PollSchedule`] until an image URL shows up, the ceiling is reached, or
//! the caller moves on.
//!
//! Each session runs as its own tokio task that owns the session's single
//! pending wake-up. All state lives in a `watch` channel and every transition
//! a task makes goes through a guard checking that its session is still live,
//! so a fetch that completes after teardown or after a recipe swap is
//! dropped on the floor.

mod state;

use crate::core::models::{Recipe, RecipeId};
use crate::core::schedule::PollSchedule;
use crate::providers::RecipeSource;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;

pub use state::{PollState, PollStatus};
use state::{SessionId, Snapshot};

/// Invoked once with the freshly fetched recipe when its image turns up.
pub type ImageLoaded = Arc<dyn Fn(Recipe) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct PresentedKey {
    id: RecipeId,
    image_url: Option<String>,
}

impl PresentedKey {
    fn of(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id.clone(),
            image_url: recipe.ready_image().map(str::to_owned),
        }
    }
}

pub struct ImagePoller {
    source: Arc<dyn RecipeSource>,
    schedule: PollSchedule,
    shared: Arc<watch::Sender<Snapshot>>,
    presented: Option<PresentedKey>,
    last_session: SessionId,
}

impl ImagePoller {
    pub fn new(source: Arc<dyn RecipeSource>, schedule: PollSchedule) -> Self {
        let (tx, _rx) = watch::channel(Snapshot::idle());
        Self {
            source,
            schedule,
            shared: Arc::new(tx),
            presented: None,
            last_session: 0,
        }
    }

    /// Shows `recipe` to the poller.
    ///
    /// Presenting the same id with the same image as last time is a no-op,
    /// including the callback, which is bound when a session starts. A
    /// different id or image tears down the live session first. A recipe
    /// without an image starts a new session; this spawns a task, so it must
    /// be called from within a tokio runtime.
    pub fn present(&mut self, recipe: Option<Recipe>, on_image_loaded: Option<ImageLoaded>) {
        let key = recipe.as_ref().map(PresentedKey::of);
        if key == self.presented {
            return;
        }

        self.teardown();
        self.presented = key;

        let Some(recipe) = recipe else {
            self.shared.send_modify(|s| s.show(None, None));
            return;
        };

        match recipe.ready_image() {
            Some(url) => {
                tracing::debug!(recipe_id = %recipe.id, "Recipe already has an image");
                let url = url.to_owned();
                self.shared
                    .send_modify(|s| s.show(Some(recipe.id.clone()), Some(url)));
            }
            None => self.start_session(recipe.id, on_image_loaded),
        }
    }

    /// Tears down the live session, if any. The next `present` starts over
    /// even for the same recipe.
    pub fn stop(&mut self) {
        self.teardown();
        self.presented = None;
    }

    pub fn status(&self) -> PollStatus {
        self.shared.borrow().status()
    }

    pub fn state(&self) -> PollState {
        self.shared.borrow().state
    }

    pub fn subscribe(&self) -> PollWatcher {
        PollWatcher {
            rx: self.shared.subscribe(),
        }
    }

    fn teardown(&mut self) {
        if self.shared.send_if_modified(|s| s.stop()) {
            let recipe_id = self.shared.borrow().recipe_id.clone();
            tracing::debug!(
                recipe_id = ?recipe_id,
                session = self.last_session,
                "Image polling session torn down"
            );
        }
    }

    fn start_session(&mut self, recipe_id: RecipeId, on_image_loaded: Option<ImageLoaded>) {
        self.last_session += 1;
        let session = self.last_session;
        let started = Instant::now();

        self.shared
            .send_modify(|s| s.begin(recipe_id.clone(), session));
        tracing::debug!(%recipe_id, session, source = self.source.name(), "Polling for recipe image");

        let task = SessionTask {
            source: Arc::clone(&self.source),
            schedule: self.schedule,
            shared: Arc::clone(&self.shared),
            liveness: self.shared.subscribe(),
            recipe_id,
            session,
            started,
            on_image_loaded,
        };
        tokio::spawn(task.run());
    }
}

impl Drop for ImagePoller {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Read side of a poller, for hosts that want to react to changes.
pub struct PollWatcher {
    rx: watch::Receiver<Snapshot>,
}

impl PollWatcher {
    pub fn status(&self) -> PollStatus {
        self.rx.borrow().status()
    }

    /// Waits for the next state change. `None` once the poller and all of
    /// its sessions are gone.
    #[allow(dead_code)]
    pub async fn changed(&mut self) -> Option<PollStatus> {
        self.rx.changed().await.ok()?;
        Some(self.status())
    }

    /// Waits until the poller is no longer polling.
    pub async fn settled(&mut self) -> PollStatus {
        if let Ok(snapshot) = self.rx.wait_for(|s| !s.state.is_polling()).await {
            return snapshot.status();
        }
        self.status()
    }
}

struct SessionTask {
    source: Arc<dyn RecipeSource>,
    schedule: PollSchedule,
    shared: Arc<watch::Sender<Snapshot>>,
    liveness: watch::Receiver<Snapshot>,
    recipe_id: RecipeId,
    session: SessionId,
    started: Instant,
    on_image_loaded: Option<ImageLoaded>,
}

impl SessionTask {
    async fn run(mut self) {
        let session = self.session;
        let mut checks = 0;

        loop {
            let wake = self.schedule.next_wake(self.started, Instant::now(), checks);

            tokio::select! {
                _ = tokio::time::sleep_until(wake) => {}
                _ = self.liveness.wait_for(|s| !s.state.is_live(session)) => {
                    tracing::debug!(recipe_id = %self.recipe_id, session, "Pending check cancelled");
                    return;
                }
            }

            if self.schedule.is_expired(self.started, Instant::now()) {
                if self.shared.send_if_modified(|s| s.time_out(session)) {
                    tracing::info!(
                        recipe_id = %self.recipe_id,
                        session,
                        checks,
                        timeout = ?self.schedule.timeout(),
                        "Recipe image not ready before timeout"
                    );
                }
                return;
            }

            let mut check = None;
            self.shared.send_if_modified(|s| {
                check = s.record_check(session);
                check.is_some()
            });
            let Some(check) = check else {
                return;
            };

            match self.source.get_recipe(&self.recipe_id).await {
                Ok(recipe) => {
                    if let Some(url) = recipe.ready_image().map(str::to_owned) {
                        self.resolve(recipe, url);
                        return;
                    }
                    tracing::debug!(recipe_id = %self.recipe_id, session, check, "Image not ready yet");
                }
                Err(e) => {
                    tracing::warn!(
                        recipe_id = %self.recipe_id,
                        session,
                        check,
                        error = %e,
                        "Recipe fetch failed, retrying on schedule"
                    );
                }
            }

            if !self.shared.borrow().state.is_live(session) {
                tracing::debug!(recipe_id = %self.recipe_id, session, check, "Discarding stale check");
                return;
            }
            checks = check;
        }
    }

    fn resolve(self, recipe: Recipe, url: String) {
        let session = self.session;
        if !self.shared.send_if_modified(|s| s.resolve(session, url.clone())) {
            tracing::debug!(recipe_id = %self.recipe_id, session, "Discarding stale image result");
            return;
        }

        tracing::info!(recipe_id = %self.recipe_id, session, %url, "Recipe image ready");
        if let Some(on_image_loaded) = &self.on_image_loaded {
            on_image_loaded(recipe);
        }
    }
}
