use crate::core::models::RecipeId;
use serde::Serialize;

pub type SessionId = u64;

/// Lifecycle of the poller for the recipe currently presented to it.
///
/// `Resolved`, `TimedOut` and `Stopped` are terminal for the session that
/// reached them; only a new presentation leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// No recipe, or the recipe already had an image.
    Idle,
    Polling { session: SessionId, checks: u32 },
    Resolved,
    TimedOut,
    /// Torn down by the caller before resolving.
    Stopped,
}

impl PollState {
    /// A session may only touch shared state while this holds. It is the
    /// stopped marker every completion checks before mutating anything.
    pub fn is_live(&self, session: SessionId) -> bool {
        matches!(self, PollState::Polling { session: live, .. } if *live == session)
    }

    pub fn is_polling(&self) -> bool {
        matches!(self, PollState::Polling { .. })
    }
}

/// What the host reads back from a poller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollStatus {
    pub image_url: Option<String>,
    pub is_polling: bool,
    pub has_timed_out: bool,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub recipe_id: Option<RecipeId>,
    pub image_url: Option<String>,
    pub state: PollState,
}

impl Snapshot {
    pub fn idle() -> Self {
        Self {
            recipe_id: None,
            image_url: None,
            state: PollState::Idle,
        }
    }

    pub fn status(&self) -> PollStatus {
        PollStatus {
            image_url: self.image_url.clone(),
            is_polling: self.state.is_polling(),
            has_timed_out: self.state == PollState::TimedOut,
        }
    }

    // Transitions driven by the caller. These always apply.

    pub(crate) fn show(&mut self, recipe_id: Option<RecipeId>, image_url: Option<String>) {
        self.recipe_id = recipe_id;
        self.image_url = image_url;
        self.state = PollState::Idle;
    }

    pub(crate) fn begin(&mut self, recipe_id: RecipeId, session: SessionId) {
        self.recipe_id = Some(recipe_id);
        self.image_url = None;
        self.state = PollState::Polling { session, checks: 0 };
    }

    /// Returns whether a live session was stopped. Idempotent.
    pub(crate) fn stop(&mut self) -> bool {
        if !self.state.is_polling() {
            return false;
        }
        self.state = PollState::Stopped;
        true
    }

    // Transitions driven by a session task. Each is a no-op returning
    // false/None once `session` is no longer live.

    pub(crate) fn record_check(&mut self, session: SessionId) -> Option<u32> {
        match &mut self.state {
            PollState::Polling { session: live, checks } if *live == session => {
                *checks += 1;
                Some(*checks)
            }
            _ => None,
        }
    }

    pub(crate) fn resolve(&mut self, session: SessionId, image_url: String) -> bool {
        if !self.state.is_live(session) {
            return false;
        }
        self.image_url = Some(image_url);
        self.state = PollState::Resolved;
        true
    }

    pub(crate) fn time_out(&mut self, session: SessionId) -> bool {
        if !self.state.is_live(session) {
            return false;
        }
        self.state = PollState::TimedOut;
        true
    }
}
