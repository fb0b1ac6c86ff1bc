//! HTTP API for the task lifecycle.
//!
//! ## Endpoints
//!
//! - `POST /tasks` - Submit a new task
//! - `GET /tasks` - List task summaries
//! - `GET /tasks/{id}` - Poll a task snapshot
//! - `DELETE /tasks/{id}` - Request cooperative cancellation
//! - `GET /tasks/{id}/logs/{iter}` - Fetch one iteration's raw log
//! - `GET /health` - Health check

mod routes;
pub mod types;

pub use routes::serve;
pub use types::*;
