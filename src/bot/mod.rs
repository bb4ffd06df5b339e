//! # Bot Module - Conversation Handling
//!
//! Everything between the chat transport and the RCON client:
//!
//! - [`transport`] - inbound event types and the [`transport::ChatTransport`] trait
//! - [`action`] - button selectors
//! - [`session`] - per-user conversation flow
//! - [`router`] - dispatch of one event against one session
//! - [`server`] - event loop and per-user workers
//! - [`ui`] - message texts and keyboards
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rconbot::bot::{AppContext, BotServer, CommandRouter};
//! # use std::sync::Arc;
//! # async fn demo(ctx: AppContext, events: tokio::sync::mpsc::UnboundedReceiver<rconbot::bot::InboundEvent>) -> anyhow::Result<()> {
//! let router = Arc::new(CommandRouter::new(Arc::new(ctx)));
//! BotServer::new(router, events, None).run().await?;
//! # Ok(())
//! # }
//! ```

// Security-relevant events go to the dedicated `security` log target.
macro_rules! sec_log {
    ($($arg:tt)*) => { log::warn!(target: "security", $($arg)*); };
}

pub mod action;
pub mod router;
pub mod server;
pub mod session;
pub mod transport;
pub mod ui;

pub use action::Action;
pub use router::{AppContext, CommandRouter};
pub use server::{BotServer, SessionStore};
pub use session::{Flow, FlowTag, ServerDraft, Session, WizardStep};
pub use transport::{Button, ChatTransport, EventKind, InboundEvent, Keyboard};
