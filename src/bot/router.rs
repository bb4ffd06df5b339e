//! # Command router
//!
//! Maps one inbound event onto either a stateless action (menus, server
//! cards, status, delete) or a step of the user's conversation flow.
//!
//! Routing is a table lookup on `(flow tag, event tag)` built once in
//! [CommandRouter::new]. Button presses route the same way in every flow.
//! `/start`, `/cancel` and `/close` always win over an active flow; any
//! other slash text inside a flow is input for that flow, so passwords and
//! game commands may start with `/`.
//!
//! Every error raised while handling an event is caught in
//! [CommandRouter::handle] and reported to the user.
use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

use super::action::Action;
use super::session::{Flow, FlowTag, Session, WizardStep};
use super::transport::{ChatTransport, EventKind, EventTag, InboundEvent};
use super::ui;
use crate::config::Config;
use crate::logutil::{escape_log, CHAT_PREVIEW, COMMAND_PREVIEW};
use crate::metrics;
use crate::profile::{ConnectionProfile, ProfileId, UserId};
use crate::rcon::RemoteConsole;
use crate::registry::ServerRegistry;
use crate::validation::{self, ValidationError};

/// Everything a handler may touch besides the user's own session.
pub struct AppContext {
    pub config: Arc<Config>,
    pub registry: Arc<ServerRegistry>,
    pub console: Arc<dyn RemoteConsole>,
    pub transport: Arc<dyn ChatTransport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Command,
    Callback,
    Wizard(WizardStep),
    RunOnce,
    ConsoleExec,
    IdleText,
}

/// Command both status buttons run.
const LIST_COMMAND: &str = "list";

/// Commands the bot handles itself even while a flow is active.
const RESERVED_COMMANDS: [&str; 3] = ["start", "cancel", "close"];

pub struct CommandRouter {
    ctx: Arc<AppContext>,
    table: HashMap<(FlowTag, EventTag), Route>,
}

impl CommandRouter {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        let mut table = HashMap::new();
        for flow in FlowTag::ALL {
            table.insert((flow, EventTag::Command), Route::Command);
            table.insert((flow, EventTag::Callback), Route::Callback);
            let text = match flow {
                FlowTag::Idle => Route::IdleText,
                FlowTag::Adding(step) => Route::Wizard(step),
                FlowTag::AwaitingCommand => Route::RunOnce,
                FlowTag::Console => Route::ConsoleExec,
            };
            table.insert((flow, EventTag::Text), text);
        }
        Self { ctx, table }
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    fn transport(&self) -> &dyn ChatTransport {
        self.ctx.transport.as_ref()
    }

    /// Route one event and report any failure to the user.
    pub async fn handle(&self, session: &mut Session, event: InboundEvent) {
        session.update_activity();
        if let Err(e) = self.route(session, &event).await {
            warn!("user {}: error handling event: {:#}", session.user_id, e);
            if let EventKind::Callback { id, .. } = &event.kind {
                self.ack(id, None).await;
            }
            let _ = self
                .transport()
                .send_text(session.user_id, &ui::failure(&e), None)
                .await;
        }
    }

    pub async fn route(&self, session: &mut Session, event: &InboundEvent) -> Result<()> {
        let user = event.user_id;
        if !self.ctx.config.is_admin(user) {
            sec_log!("denied user {} ({:?})", user, event.kind.tag());
            metrics::inc_access_denied();
            return match &event.kind {
                EventKind::Callback { id, .. } => {
                    self.ack(id, Some(ui::ACCESS_DENIED)).await;
                    Ok(())
                }
                _ => self.transport().send_text(user, ui::ACCESS_DENIED, None).await,
            };
        }

        let key = (session.flow.tag(), event.kind.tag());
        let route = self
            .table
            .get(&key)
            .copied()
            .ok_or_else(|| anyhow!("no route for {:?}", key))?;
        debug!("user {} {:?} -> {:?}", user, key, route);

        match (route, &event.kind) {
            (Route::Command, EventKind::Command { name, .. }) => {
                self.on_command(session, name, event).await
            }
            (Route::Callback, EventKind::Callback { id, data }) => {
                self.on_callback(session, id, data).await
            }
            (route, EventKind::Text(text)) => self.on_text(session, route, text).await,
            (route, kind) => Err(anyhow!("route {:?} does not accept {:?}", route, kind.tag())),
        }
    }

    async fn on_text(&self, session: &mut Session, route: Route, text: &str) -> Result<()> {
        match route {
            Route::Wizard(step) => self.on_wizard_text(session, step, text).await,
            Route::RunOnce => self.run_once(session, text).await,
            Route::ConsoleExec => self.console_exec(session, text).await,
            Route::IdleText => {
                self.transport()
                    .send_text(session.user_id, ui::IDLE_HINT, None)
                    .await
            }
            other => Err(anyhow!("route {:?} does not take text", other)),
        }
    }

    /// Answer a button press. Failures only cost the spinner, so they are logged.
    async fn ack(&self, callback_id: &str, toast: Option<&str>) {
        if let Err(e) = self.transport().answer_callback(callback_id, toast).await {
            warn!("could not answer callback {}: {:#}", callback_id, e);
        }
    }

    async fn send_menu(&self, user: UserId, text: &str, edit: bool) -> Result<()> {
        let servers = self.ctx.registry.list(user).await?;
        let keyboard = ui::servers_keyboard(&servers);
        if edit {
            self.transport()
                .edit_last_message(user, text, Some(&keyboard))
                .await
        } else {
            self.transport().send_text(user, text, Some(&keyboard)).await
        }
    }

    async fn on_command(&self, session: &mut Session, name: &str, event: &InboundEvent) -> Result<()> {
        let user = session.user_id;
        if !session.flow.is_idle() && !RESERVED_COMMANDS.contains(&name) {
            // Slash text inside a flow is flow input, kept exactly as typed.
            let key = (session.flow.tag(), EventTag::Text);
            let route = self
                .table
                .get(&key)
                .copied()
                .ok_or_else(|| anyhow!("no route for {:?}", key))?;
            let raw = event.raw_text().unwrap_or_default();
            return self.on_text(session, route, raw).await;
        }

        match name {
            "start" => {
                let text = format!("{}\n\n{}", ui::WELCOME, ui::CHOOSE_SERVER);
                self.send_menu(user, &text, false).await?;
                if !session.flow.is_idle() {
                    self.transport()
                        .send_text(user, &ui::finish_first(session.flow.describe()), None)
                        .await?;
                }
                Ok(())
            }
            "help" => self.transport().send_text(user, ui::HELP, None).await,
            "cancel" => match session.flow {
                Flow::Idle => self.transport().send_text(user, ui::NOTHING_TO_CANCEL, None).await,
                _ => {
                    let prev = session.reset();
                    info!("user {} cancelled {}", user, prev.describe());
                    self.transport().send_text(user, ui::CANCELLED, None).await?;
                    self.send_menu(user, ui::CHOOSE_SERVER, false).await
                }
            },
            "close" => match session.flow {
                Flow::ConsoleMode { profile_id } => {
                    session.reset();
                    info!("user {} closed console for server {}", user, profile_id);
                    self.transport().send_text(user, ui::CONSOLE_CLOSED, None).await?;
                    self.send_menu(user, ui::CHOOSE_SERVER, false).await
                }
                _ => self.transport().send_text(user, ui::NO_CONSOLE, None).await,
            },
            _ => self.transport().send_text(user, ui::UNKNOWN_COMMAND, None).await,
        }
    }

    async fn on_callback(&self, session: &mut Session, callback_id: &str, data: &str) -> Result<()> {
        let user = session.user_id;
        let Some(action) = Action::parse(data) else {
            debug!("user {} sent unknown action '{}'", user, escape_log(data, CHAT_PREVIEW));
            self.ack(callback_id, Some(ui::UNKNOWN_ACTION)).await;
            return Ok(());
        };

        if action.starts_flow() && !session.flow.is_idle() {
            let notice = ui::finish_first(session.flow.describe());
            self.ack(callback_id, Some(&notice)).await;
            return Ok(());
        }

        match action {
            Action::AddServer => {
                session.flow = Flow::start_wizard();
                metrics::inc_sessions_started();
                info!("user {} started adding a server", user);
                self.ack(callback_id, None).await;
                self.transport()
                    .edit_last_message(user, ui::ASK_NAME, Some(&ui::cancel_keyboard()))
                    .await
            }
            Action::CancelAdd => match session.flow {
                Flow::AddingServer { .. } | Flow::Idle => {
                    session.reset();
                    self.ack(callback_id, None).await;
                    self.send_menu(user, ui::CHOOSE_SERVER, true).await
                }
                _ => {
                    let notice = ui::finish_first(session.flow.describe());
                    self.ack(callback_id, Some(&notice)).await;
                    Ok(())
                }
            },
            Action::BackToServers => {
                self.ack(callback_id, None).await;
                self.send_menu(user, ui::CHOOSE_SERVER, true).await
            }
            Action::SelectServer(id) => {
                let Some(profile) = self.lookup(user, id, callback_id).await? else {
                    return Ok(());
                };
                self.ack(callback_id, None).await;
                self.transport()
                    .edit_last_message(user, &ui::server_card(&profile), Some(&ui::server_keyboard(id)))
                    .await
            }
            Action::ServerStatus(id) | Action::ServerPlayers(id) => {
                let Some(profile) = self.lookup(user, id, callback_id).await? else {
                    return Ok(());
                };
                let title = if matches!(action, Action::ServerStatus(_)) {
                    "Server status"
                } else {
                    "Online players"
                };
                // Ack first: the console call may take up to the RCON timeout.
                self.ack(callback_id, None).await;
                let result = self.ctx.console.execute(&profile, LIST_COMMAND).await;
                self.transport()
                    .edit_last_message(user, &ui::command_result(title, &result), Some(&ui::back_keyboard(id)))
                    .await
            }
            Action::ServerCommand(id) => {
                let Some(profile) = self.lookup(user, id, callback_id).await? else {
                    return Ok(());
                };
                session.flow = Flow::AwaitingCommand { profile_id: id };
                metrics::inc_sessions_started();
                self.ack(callback_id, None).await;
                self.transport()
                    .edit_last_message(user, &ui::ask_command(&profile.name), None)
                    .await
            }
            Action::OpenConsole(id) => {
                let Some(profile) = self.lookup(user, id, callback_id).await? else {
                    return Ok(());
                };
                session.flow = Flow::ConsoleMode { profile_id: id };
                metrics::inc_sessions_started();
                info!("user {} opened console for server {}", user, id);
                self.ack(callback_id, None).await;
                self.transport()
                    .edit_last_message(user, &ui::console_opened(&profile.name), None)
                    .await
            }
            Action::DeleteServer(id) => match self.ctx.registry.remove(user, id).await? {
                None => {
                    self.ack(callback_id, Some(ui::SERVER_NOT_FOUND)).await;
                    Ok(())
                }
                Some(profile) => {
                    self.ack(callback_id, Some(&ui::server_deleted(&profile.name))).await;
                    self.send_menu(user, ui::CHOOSE_SERVER, true).await
                }
            },
        }
    }

    /// Fetch a profile for a button press; answers "not found" itself.
    async fn lookup(
        &self,
        user: UserId,
        id: ProfileId,
        callback_id: &str,
    ) -> Result<Option<ConnectionProfile>> {
        let profile = self.ctx.registry.get(user, id).await?;
        if profile.is_none() {
            debug!("user {} pressed a button for missing server {}", user, id);
            self.ack(callback_id, Some(ui::SERVER_NOT_FOUND)).await;
        }
        Ok(profile)
    }

    async fn on_wizard_text(&self, session: &mut Session, step: WizardStep, text: &str) -> Result<()> {
        let user = session.user_id;
        let cancel = ui::cancel_keyboard();
        let Flow::AddingServer { step: current, draft } = &mut session.flow else {
            return Err(anyhow!("wizard text outside the wizard"));
        };

        let next = match step {
            WizardStep::Name => validation::validate_server_name(text).map(|name| {
                draft.name = Some(name);
                (WizardStep::Host, ui::ASK_HOST)
            }),
            WizardStep::Host => validation::validate_host(text).map(|host| {
                draft.host = Some(host);
                (WizardStep::Port, ui::ASK_PORT)
            }),
            WizardStep::Port => validation::parse_port(text).map(|port| {
                draft.port = Some(port);
                (WizardStep::Password, ui::ASK_PASSWORD)
            }),
            WizardStep::Password => {
                let result = validation::validate_credential(text).and_then(|credential| {
                    Ok(ConnectionProfile::new(
                        draft.name.clone().ok_or(ValidationError::MissingField("server name"))?,
                        draft.host.clone().ok_or(ValidationError::MissingField("host"))?,
                        draft.port.ok_or(ValidationError::MissingField("port"))?,
                        credential,
                    ))
                });
                return match result {
                    Ok(profile) => self.finish_wizard(session, profile).await,
                    Err(e @ ValidationError::MissingField(_)) => {
                        session.reset();
                        self.transport()
                            .send_text(user, &ui::retry(e, ui::IDLE_HINT), None)
                            .await
                    }
                    Err(e) => {
                        self.transport()
                            .send_text(user, &ui::retry(e, ui::ASK_PASSWORD), Some(&cancel))
                            .await
                    }
                };
            }
        };

        match next {
            Ok((step, prompt)) => {
                *current = step;
                self.transport().send_text(user, prompt, Some(&cancel)).await
            }
            Err(e) => {
                debug!("user {} wizard {:?} rejected: {}", user, step, e);
                let prompt = match step {
                    WizardStep::Name => ui::ASK_NAME,
                    WizardStep::Host => ui::ASK_HOST,
                    WizardStep::Port => ui::ASK_PORT,
                    WizardStep::Password => ui::ASK_PASSWORD,
                };
                self.transport()
                    .send_text(user, &ui::retry(e, prompt), Some(&cancel))
                    .await
            }
        }
    }

    async fn finish_wizard(&self, session: &mut Session, profile: ConnectionProfile) -> Result<()> {
        let user = session.user_id;
        let name = profile.name.clone();
        match self.ctx.registry.add(user, profile).await {
            Ok(_) => {
                session.reset();
                self.send_menu(user, &ui::server_added(&name), false).await
            }
            Err(e) => {
                // Stay at the password step so the user can retry or cancel.
                warn!("user {}: saving server failed: {:#}", user, e);
                self.transport()
                    .send_text(user, &ui::save_failed(&e), Some(&ui::cancel_keyboard()))
                    .await
            }
        }
    }

    async fn active_profile(&self, session: &mut Session, id: ProfileId) -> Result<Option<ConnectionProfile>> {
        let profile = self.ctx.registry.get(session.user_id, id).await?;
        if profile.is_none() {
            session.reset();
            self.transport()
                .send_text(session.user_id, ui::SERVER_NOT_FOUND, None)
                .await?;
            self.send_menu(session.user_id, ui::CHOOSE_SERVER, false).await?;
        }
        Ok(profile)
    }

    async fn run_once(&self, session: &mut Session, command: &str) -> Result<()> {
        let user = session.user_id;
        let Flow::AwaitingCommand { profile_id } = session.flow else {
            return Err(anyhow!("no pending command"));
        };
        if command.trim().is_empty() {
            return self.transport().send_text(user, ui::EMPTY_COMMAND, None).await;
        }
        let Some(profile) = self.active_profile(session, profile_id).await? else {
            return Ok(());
        };
        info!("user {} ran '{}' on server {}", user, escape_log(command, COMMAND_PREVIEW), profile_id);
        let result = self.ctx.console.execute(&profile, command.trim()).await;
        session.reset();
        self.transport()
            .send_text(user, &ui::command_result("Server response", &result), None)
            .await?;
        self.send_menu(user, ui::CHOOSE_SERVER, false).await
    }

    async fn console_exec(&self, session: &mut Session, command: &str) -> Result<()> {
        let user = session.user_id;
        let Flow::ConsoleMode { profile_id } = session.flow else {
            return Err(anyhow!("console is not open"));
        };
        if command.trim().is_empty() {
            return self.transport().send_text(user, ui::EMPTY_COMMAND, None).await;
        }
        let Some(profile) = self.active_profile(session, profile_id).await? else {
            return Ok(());
        };
        info!("user {} console '{}' on server {}", user, escape_log(command, COMMAND_PREVIEW), profile_id);
        let result = self.ctx.console.execute(&profile, command.trim()).await;
        self.transport()
            .send_text(user, &ui::command_result("Server response", &result), None)
            .await
    }
}
