//! # taskloop
//!
//! Control process for long-running, open-ended agent tasks.
//!
//! A task is a bounded loop of independent reasoning-tool invocations. The
//! tool is stateless between invocations; the task's workspace directory is
//! the only memory that carries progress from one iteration to the next. An
//! iteration ends the loop when its output contains the task's completion
//! token as a literal substring.
//!
//! ## Task Flow
//! 1. Receive a task via `POST /tasks`, create its workspace, persist the prompt
//! 2. Drive iterations: invoke the tool, persist the raw log and summary, check the token
//! 3. Expose status via polling until the task reaches a terminal state
//!
//! ## Modules
//! - `api`: HTTP lifecycle surface (submit, poll, list, cancel, fetch logs)
//! - `registry`: concurrent in-memory task registry, the source of truth for status
//! - `driver`: the bounded per-task iteration loop
//! - `runner`: subprocess invocation of the reasoning tool
//! - `workspace`: per-task on-disk layout (prompt, iteration logs, summary)
//! - `trace`: optional observability collaborator (no-op without credentials)

pub mod api;
pub mod config;
pub mod driver;
pub mod registry;
pub mod runner;
pub mod trace;
pub mod util;
pub mod workspace;

pub use config::Config;
