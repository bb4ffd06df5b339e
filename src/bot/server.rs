//! # Bot server
//!
//! Receives [InboundEvent]s from the transport and fans them out to one
//! worker task per user. A worker owns that user's [Session] and handles
//! its events strictly in arrival order; different users run in parallel,
//! so a slow RCON call only ever delays the user who made it.
//!
//! A worker that sees no event for the idle TTL closes its channel,
//! handles whatever was already queued, tells the user if a flow was
//! abandoned, and exits. The next event from that user starts a fresh
//! worker with an idle session.
use anyhow::Result;
use chrono::Utc;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::router::CommandRouter;
use super::session::Session;
use super::transport::InboundEvent;
use super::ui;
use crate::metrics;
use crate::profile::UserId;

const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60);

struct Worker {
    tx: mpsc::UnboundedSender<InboundEvent>,
    handle: JoinHandle<()>,
}

/// Live per-user workers keyed by user id.
pub struct SessionStore {
    router: Arc<CommandRouter>,
    idle_ttl: Option<Duration>,
    workers: HashMap<UserId, Worker>,
}

impl SessionStore {
    pub fn new(router: Arc<CommandRouter>, idle_ttl: Option<Duration>) -> Self {
        Self {
            router,
            idle_ttl,
            workers: HashMap::new(),
        }
    }

    /// Queue an event on the user's worker, starting one if needed.
    pub fn dispatch(&mut self, event: InboundEvent) {
        let user = event.user_id;
        let event = match self.workers.get(&user) {
            Some(worker) => match worker.tx.send(event) {
                Ok(()) => return,
                // Worker expired between events; start over with this one.
                Err(mpsc::error::SendError(event)) => event,
            },
            None => event,
        };

        let worker = self.spawn(user);
        if worker.tx.send(event).is_err() {
            warn!("user {}: new worker exited before its first event", user);
        }
        self.workers.insert(user, worker);
    }

    fn spawn(&self, user: UserId) -> Worker {
        let (tx, rx) = mpsc::unbounded_channel();
        debug!("starting worker for user {}", user);
        let handle = tokio::spawn(run_worker(self.router.clone(), user, rx, self.idle_ttl));
        Worker { tx, handle }
    }

    /// Forget workers that have exited.
    pub fn prune(&mut self) {
        let before = self.workers.len();
        self.workers.retain(|_, w| !w.tx.is_closed());
        let removed = before - self.workers.len();
        if removed > 0 {
            debug!("pruned {} idle workers ({} active)", removed, self.workers.len());
        }
    }

    pub fn active(&self) -> usize {
        self.workers.values().filter(|w| !w.tx.is_closed()).count()
    }

    /// Stop accepting events and wait for queued ones to finish.
    pub async fn shutdown(&mut self, grace: Duration) {
        let handles: Vec<JoinHandle<()>> = self.workers.drain().map(|(_, w)| w.handle).collect();
        if handles.is_empty() {
            return;
        }
        info!("waiting for {} workers to finish", handles.len());
        let all = join_all(handles);
        if tokio::time::timeout(grace, all).await.is_err() {
            warn!("workers did not finish within {}s", grace.as_secs());
        }
    }
}

async fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if let Err(e) = handle.await {
            warn!("worker task failed: {}", e);
        }
    }
}

async fn run_worker(
    router: Arc<CommandRouter>,
    user: UserId,
    mut rx: mpsc::UnboundedReceiver<InboundEvent>,
    idle_ttl: Option<Duration>,
) {
    let mut session = Session::new(user);
    loop {
        let next = match idle_ttl {
            Some(ttl) => match tokio::time::timeout(ttl, rx.recv()).await {
                Ok(next) => next,
                Err(_) => break,
            },
            None => rx.recv().await,
        };
        match next {
            Some(event) => router.handle(&mut session, event).await,
            None => {
                debug!("worker for user {} stopped", user);
                return;
            }
        }
    }

    // Idle: refuse new events, finish the ones already queued.
    rx.close();
    while let Some(event) = rx.recv().await {
        router.handle(&mut session, event).await;
    }

    let now = Utc::now();
    let idle_minutes = now.signed_duration_since(session.last_activity).num_minutes();
    let age_minutes = now.signed_duration_since(session.started).num_minutes();
    if !session.flow.is_idle() {
        let abandoned = session.reset();
        metrics::inc_sessions_expired();
        info!(
            "user {} session expired after {}m idle, {}m old ({} abandoned)",
            user,
            idle_minutes,
            age_minutes,
            abandoned.describe()
        );
        if let Err(e) = router
            .context()
            .transport
            .send_text(user, ui::SESSION_EXPIRED, None)
            .await
        {
            warn!("user {}: could not send expiry notice: {}", user, e);
        }
    } else {
        debug!(
            "user {} session expired after {}m idle, {}m old",
            user, idle_minutes, age_minutes
        );
    }
}

/// Event loop tying the transport's inbound channel to the session workers.
pub struct BotServer {
    events: mpsc::UnboundedReceiver<InboundEvent>,
    sessions: SessionStore,
    shutdown_grace: Duration,
}

impl BotServer {
    pub fn new(
        router: Arc<CommandRouter>,
        events: mpsc::UnboundedReceiver<InboundEvent>,
        idle_ttl: Option<Duration>,
    ) -> Self {
        let shutdown_grace = router.context().config.rcon.timeout() + Duration::from_secs(1);
        Self {
            events,
            sessions: SessionStore::new(router, idle_ttl),
            shutdown_grace,
        }
    }

    /// Run until Ctrl-C or until the inbound channel closes.
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `shutdown` resolves or the inbound channel closes.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!("bot server started");
        let mut housekeeping = tokio::time::interval(HOUSEKEEPING_INTERVAL);
        housekeeping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.sessions.dispatch(event),
                    None => {
                        info!("inbound event channel closed");
                        break;
                    }
                },
                _ = housekeeping.tick() => {
                    self.sessions.prune();
                    debug!("active sessions: {}", self.sessions.active());
                }
                _ = &mut shutdown => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    async fn shutdown(&mut self) {
        info!("Shutting down bot server...");
        self.sessions.shutdown(self.shutdown_grace).await;
        info!("metrics: {}", metrics::snapshot().summary_line());
        info!("Bot server shutdown complete");
    }
}
