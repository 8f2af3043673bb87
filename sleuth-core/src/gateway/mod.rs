//! # HTTP Gateway
//!
//! Exposes research runs over HTTP. `POST /api/deep-research` streams a
//! run's events as server-sent events, `POST /api/generate-questions` returns
//! clarifying questions, and `GET /health` reports liveness.

mod server;

pub use server::{GatewayState, router as gateway_router, run as run_gateway};
