//! Explicitly injected logging sink.
//!
//! `tracing` routes events through a thread-local default dispatcher, which
//! threads spawned by the matcher or the sweeper do not inherit. Components
//! therefore hold a [`Telemetry`] handle captured at construction and run
//! their work inside it.

use tracing::Dispatch;

#[derive(Clone, Debug)]
pub struct Telemetry {
    dispatch: Dispatch,
}

impl Telemetry {
    /// Route events to `dispatch`.
    #[must_use]
    pub fn new(dispatch: Dispatch) -> Self {
        Self { dispatch }
    }

    /// Capture the dispatcher active on the calling thread.
    #[must_use]
    pub fn current() -> Self {
        Self {
            dispatch: tracing::dispatcher::get_default(Dispatch::clone),
        }
    }

    /// Drop every event.
    #[must_use]
    pub fn silent() -> Self {
        Self {
            dispatch: Dispatch::none(),
        }
    }

    /// Run `f` with this handle's dispatcher as the thread default.
    pub fn in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::current()
    }
}
