//! Liveness and readiness checks.
//!
//! | Check | Path | Failure means |
//! |---|---|---|
//! | Liveness | `/internal/is_alive` | restart the pod |
//! | Readiness | `/internal/is_ready` | stop routing traffic to it |
//!
//! Both answer from [`ApplicationState`] and bypass authentication.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use http::StatusCode;

use crate::handler::Handler;
use crate::request::Request;
use crate::response::Response;

/// Process-wide health flags. Starts alive but not ready.
#[derive(Debug)]
pub struct ApplicationState {
    alive: AtomicBool,
    ready: AtomicBool,
}

impl ApplicationState {
    pub fn new() -> Self {
        Self {
            alive: AtomicBool::new(true),
            ready: AtomicBool::new(false),
        }
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::Release);
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

impl Default for ApplicationState {
    fn default() -> Self { Self::new() }
}

/// `200 I'm alive` while the alive flag is up, `503` otherwise.
pub fn liveness(state: Arc<ApplicationState>) -> impl Handler {
    move |_req: Request| {
        let alive = state.is_alive();
        async move {
            if alive {
                Response::text("I'm alive")
            } else {
                Response::builder()
                    .status(StatusCode::SERVICE_UNAVAILABLE)
                    .text("I'm dead x_x")
            }
        }
    }
}

/// `200 I'm ready` while the ready flag is up, `503` otherwise.
pub fn readiness(state: Arc<ApplicationState>) -> impl Handler {
    move |_req: Request| {
        let ready = state.is_ready();
        async move {
            if ready {
                Response::text("I'm ready")
            } else {
                Response::builder()
                    .status(StatusCode::SERVICE_UNAVAILABLE)
                    .text("Please wait! I'm not ready :(")
            }
        }
    }
}
