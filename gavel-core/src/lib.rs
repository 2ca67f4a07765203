//! # gavel-core
//!
//! Core library for gavel - a compliance-review event console.
//!
//! This library provides:
//! - Domain types for runs, timeline events, and exchanges
//! - The backend adapter (historical fetch + live push channel)
//! - Reconciliation of both feeds into one ordered sequence
//! - Playback, filtering, metrics, and the audited reveal gate
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Data flows one way: the adapter feeds the reconciliation buffer, the
//! buffer feeds the exchange grouper, and the playback controller and filter
//! set jointly pick the visible window that the metrics engine and reveal
//! gate operate on. Every derived layer is recomputed from the buffer; no
//! component patches another's output in place.
//!
//! ## Example
//!
//! ```rust,no_run
//! use gavel_core::{ApiClient, Config, EventBuffer};
//!
//! # async fn example() -> gavel_core::Result<()> {
//! let config = Config::load()?;
//! let client = ApiClient::new(&config.console)?;
//!
//! let mut buffer = EventBuffer::new();
//! buffer.set_historical(client.fetch_timeline("run-1").await?);
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use client::{ApiClient, ChannelFrame, ChannelStatus, LiveChannel};
pub use config::Config;
pub use error::{Error, Result};
pub use exchange::{group_exchanges, Exchange, RevealStage, StagePacer};
pub use playback::{PlaybackController, PlaybackPhase};
pub use reconcile::{merge, EventBuffer};
pub use reveal::RevealGate;
pub use types::*;

// Public modules
pub mod analytics;
pub mod client;
pub mod config;
pub mod demo;
pub mod error;
pub mod exchange;
pub mod format;
pub mod logging;
pub mod playback;
pub mod reconcile;
pub mod reveal;
pub mod types;
