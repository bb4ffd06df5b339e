//! Test utilities & fixtures.
//! Fake chat transport and remote console, plus a router harness backed by a
//! temp-dir registry.
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rconbot::bot::{AppContext, ChatTransport, CommandRouter, InboundEvent, Keyboard, Session};
use rconbot::config::Config;
use rconbot::profile::{ConnectionProfile, ProfileId, UserId};
use rconbot::rcon::{CommandResult, RemoteConsole};
use rconbot::registry::ServerRegistry;
use rconbot::storage::JsonFileStore;

/// One call the router made on the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Send {
        user: UserId,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Edit {
        user: UserId,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Answer {
        callback_id: String,
        toast: Option<String>,
    },
}

impl Outbound {
    pub fn text(&self) -> Option<&str> {
        match self {
            Outbound::Send { text, .. } | Outbound::Edit { text, .. } => Some(text),
            Outbound::Answer { toast, .. } => toast.as_deref(),
        }
    }
}

/// Records every outbound call.
#[derive(Default)]
pub struct FakeTransport {
    log: Mutex<Vec<Outbound>>,
    reject_answers: AtomicBool,
}

impl FakeTransport {
    /// Make every `answer_callback` fail, as an expired callback query does.
    pub fn reject_answers(&self) {
        self.reject_answers.store(true, Ordering::SeqCst);
    }

    pub fn all(&self) -> Vec<Outbound> {
        self.log.lock().unwrap().clone()
    }

    /// Return and clear the recorded calls.
    pub fn take(&self) -> Vec<Outbound> {
        std::mem::take(&mut *self.log.lock().unwrap())
    }

    /// Texts of sends, edits and toasts, in order.
    pub fn texts(&self) -> Vec<String> {
        self.all()
            .iter()
            .filter_map(|o| o.text().map(str::to_string))
            .collect()
    }

    pub fn any_text_contains(&self, needle: &str) -> bool {
        self.texts().iter().any(|t| t.contains(needle))
    }

    pub fn texts_for(&self, user: UserId) -> Vec<String> {
        self.all()
            .iter()
            .filter_map(|o| match o {
                Outbound::Send { user: u, text, .. } | Outbound::Edit { user: u, text, .. }
                    if *u == user =>
                {
                    Some(text.clone())
                }
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChatTransport for FakeTransport {
    async fn send_text(&self, user: UserId, text: &str, keyboard: Option<&Keyboard>) -> Result<()> {
        self.log.lock().unwrap().push(Outbound::Send {
            user,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn edit_last_message(
        &self,
        user: UserId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<()> {
        self.log.lock().unwrap().push(Outbound::Edit {
            user,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, toast: Option<&str>) -> Result<()> {
        if self.reject_answers.load(Ordering::SeqCst) {
            anyhow::bail!("Bad Request: query is too old and response timeout expired");
        }
        self.log.lock().unwrap().push(Outbound::Answer {
            callback_id: callback_id.to_string(),
            toast: toast.map(str::to_string),
        });
        Ok(())
    }
}

/// Remote console that records calls and replays scripted results.
/// Without a script it answers `ran: <command>`.
#[derive(Default)]
pub struct FakeConsole {
    calls: Mutex<Vec<(ConnectionProfile, String)>>,
    script: Mutex<VecDeque<CommandResult>>,
    delay: Mutex<Option<Duration>>,
}

impl FakeConsole {
    pub fn push_result(&self, result: CommandResult) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> Vec<(ConnectionProfile, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls().into_iter().map(|(_, c)| c).collect()
    }
}

#[async_trait]
impl RemoteConsole for FakeConsole {
    async fn execute(&self, profile: &ConnectionProfile, command: &str) -> CommandResult {
        self.calls
            .lock()
            .unwrap()
            .push((profile.clone(), command.to_string()));
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(format!("ran: {}", command)))
    }
}

pub struct Harness {
    pub tmp: tempfile::TempDir,
    pub transport: Arc<FakeTransport>,
    pub console: Arc<FakeConsole>,
    pub registry: Arc<ServerRegistry>,
    pub router: Arc<CommandRouter>,
}

pub fn harness() -> Harness {
    harness_with(Config::default())
}

pub fn harness_with(mut config: Config) -> Harness {
    let tmp = tempfile::tempdir().expect("tempdir");
    config.storage.data_dir = tmp.path().to_string_lossy().to_string();
    let store = Arc::new(JsonFileStore::new(tmp.path()).expect("store"));
    let registry = Arc::new(ServerRegistry::new(store));
    let transport = Arc::new(FakeTransport::default());
    let console = Arc::new(FakeConsole::default());
    let ctx = AppContext {
        config: Arc::new(config),
        registry: registry.clone(),
        console: console.clone(),
        transport: transport.clone(),
    };
    Harness {
        tmp,
        transport,
        console,
        registry,
        router: Arc::new(CommandRouter::new(Arc::new(ctx))),
    }
}

impl Harness {
    pub async fn text(&self, session: &mut Session, text: &str) {
        let event = InboundEvent::from_text(session.user_id, text);
        self.router.handle(session, event).await;
    }

    pub async fn press(&self, session: &mut Session, data: &str) {
        let event = InboundEvent::callback(session.user_id, format!("cb-{}", data), data);
        self.router.handle(session, event).await;
    }

    /// Store a profile directly and return its id.
    pub async fn add_server(&self, user: UserId, name: &str) -> ProfileId {
        self.registry
            .add(user, ConnectionProfile::new(name, "127.0.0.1", 25575, "secret"))
            .await
            .expect("add server")
    }
}

/// Poll `cond` every 10ms until it holds or `timeout` elapses.
pub async fn wait_for<F: Fn() -> bool>(cond: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
