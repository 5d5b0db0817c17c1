//! Teafarm: per-user job orchestration for the TeaBank reward-farming API.
//!
//! The crate automates recurring interactions with the TeaBank web API on
//! behalf of many independent users:
//!
//! - **API client** ([`api`]): HTTP session with fixed headers, bounded
//!   transport retry, and the four upstream operations.
//! - **Session store** ([`session`]): per-user credentials captured once at
//!   bootstrap, in memory for the process lifetime.
//! - **Orchestrator** ([`orchestrator`]): starts, mutually excludes, stops,
//!   and reports on the per-user worker loops through a synchronized
//!   live-job registry.
//! - **Workers** (mining, tasks, ads): the three recurring loops, each a
//!   tokio task with cooperative cancellation.
//! - **Bridge** ([`bridge`]): the stdio command front end used by the
//!   daemon binary.

pub mod api;
pub mod bridge;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod session;
pub(crate) mod workers;

pub use config::BotConfig;
pub use error::{FarmError, Result};
pub use orchestrator::registry::JobKind;
pub use orchestrator::{JobState, Orchestrator, StartOutcome, UserStatus};
pub use session::Session;
