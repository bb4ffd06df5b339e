//! # rconbot - Game server administration over chat
//!
//! rconbot lets a small group of administrators manage game servers
//! (Minecraft, Factorio, Source engine titles and anything else speaking
//! the Source RCON protocol) from a Telegram private chat.
//!
//! ## Features
//!
//! - **Server registry**: each user keeps their own list of servers, persisted as JSON.
//! - **Guided setup**: a step-by-step wizard collects name, host, port and RCON password.
//! - **Quick actions**: server status and online players with one button.
//! - **Command and console modes**: run a single command, or keep a console open.
//! - **Allow-list**: only configured user ids may use the bot.
//! - **Async design**: built on Tokio; one user's slow server never blocks another.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rconbot::profile::ConnectionProfile;
//! use rconbot::rcon::RconClient;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = RconClient::new(Duration::from_secs(5));
//!     let profile = ConnectionProfile::new("Survival", "127.0.0.1", 25575, "secret");
//!     println!("{}", client.execute(&profile, "list").await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`bot`] - conversation state machine, router and per-user workers
//! - [`rcon`] - Source RCON client and packet codec
//! - [`registry`] - per-user server registry
//! - [`storage`] - JSON persistence with atomic writes
//! - [`config`] - configuration loading and validation
//! - [`validation`] - wizard input validation
//! - `telegram` - Telegram Bot API transport (feature `telegram`)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │    Telegram     │ ← long polling, send/edit/answer
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   Bot server    │ ← per-user workers, router, sessions
//! └─────────────────┘
//!      │        │
//! ┌────────┐ ┌──────────┐
//! │  RCON  │ │ Registry │ ← game servers / servers.json
//! └────────┘ └──────────┘
//! ```

pub mod bot;
pub mod config;
pub mod logutil;
pub mod metrics;
pub mod profile;
pub mod rcon;
pub mod registry;
pub mod storage;
#[cfg(feature = "telegram")]
pub mod telegram;
pub mod validation;
