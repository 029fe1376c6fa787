//! SectorWatch Runner: configuration, webhook delivery, run orchestration, logging.
//!
//! This crate builds on `sectorwatch-core` to provide:
//! - Settings and line-oriented config file loading
//! - Webhook notifier (HTTP and recording)
//! - Run orchestrator with a private worker pool and per-symbol isolation
//! - Log sink initialization

pub mod config;
pub mod logging;
pub mod notifier;
pub mod orchestrator;

pub use config::{load_tickers, ConfigError, RoleIds, RunnerSettings, SectorHooks};
pub use logging::{init_logging, LoggingError};
pub use notifier::{Notifier, NotifyError, RecordingNotifier, WebhookNotifier, WebhookPayload};
pub use orchestrator::{Orchestrator, RunContext, RunError, RunReport, RunState};
