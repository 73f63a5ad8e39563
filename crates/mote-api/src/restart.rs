//! Restarts deferred until a response has been delivered.
//!
//! # Design
//! - Handlers never restart inline. They hand a [`RestartGuard`] to the
//!   response body; the guard fires when the body has been fully written or
//!   the connection is dropped, whichever happens first.
//! - Once armed, a restart cannot be cancelled.

use std::convert::Infallible;
use std::sync::Arc;

use async_stream::stream;
use axum::body::{Body, Bytes};
use tracing::info;

/// Device restart hook.
pub trait Restarter: Send + Sync {
    /// Request a restart. Must not block.
    fn restart(&self);
}

/// Fires the restart when dropped.
pub struct RestartGuard {
    restarter: Arc<dyn Restarter>,
    reason: &'static str,
}

impl RestartGuard {
    /// Guard that restarts through `restarter` when dropped.
    #[must_use]
    pub fn new(restarter: Arc<dyn Restarter>, reason: &'static str) -> Self {
        Self { restarter, reason }
    }
}

impl Drop for RestartGuard {
    fn drop(&mut self) {
        info!(reason = self.reason, "response delivered; restarting");
        self.restarter.restart();
    }
}

/// Body that yields `payload` and then releases `guard`.
#[must_use]
pub fn body_then_restart(payload: impl Into<Bytes>, guard: RestartGuard) -> Body {
    let payload = payload.into();
    Body::from_stream(stream! {
        let _guard = guard;
        yield Ok::<_, Infallible>(payload);
    })
}
