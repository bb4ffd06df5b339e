use chrono::{DateTime, Utc};

use crate::profile::{ProfileId, UserId};

/// Add-server wizard position. Each step waits for one text message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WizardStep {
    Name,
    Host,
    Port,
    Password,
}

/// Fields collected so far by the wizard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerDraft {
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// # Conversation flow
///
/// The single multi-step interaction a user is in. Transitions:
///
/// ```text
/// Idle ──add_server──▶ AddingServer(Name ▶ Host ▶ Port ▶ Password) ──saved──▶ Idle
/// Idle ──server_cmd──▶ AwaitingCommand ──one text──▶ Idle
/// Idle ──open_console─▶ ConsoleMode ──/close──▶ Idle
/// ```
///
/// `/cancel` leaves `AddingServer` and `AwaitingCommand`; only `/close`
/// leaves `ConsoleMode`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Flow {
    #[default]
    Idle,
    AddingServer {
        step: WizardStep,
        draft: ServerDraft,
    },
    AwaitingCommand {
        profile_id: ProfileId,
    },
    ConsoleMode {
        profile_id: ProfileId,
    },
}

/// Flattened flow used as a dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowTag {
    Idle,
    Adding(WizardStep),
    AwaitingCommand,
    Console,
}

impl FlowTag {
    pub const ALL: [FlowTag; 7] = [
        FlowTag::Idle,
        FlowTag::Adding(WizardStep::Name),
        FlowTag::Adding(WizardStep::Host),
        FlowTag::Adding(WizardStep::Port),
        FlowTag::Adding(WizardStep::Password),
        FlowTag::AwaitingCommand,
        FlowTag::Console,
    ];
}

impl Flow {
    pub fn tag(&self) -> FlowTag {
        match self {
            Flow::Idle => FlowTag::Idle,
            Flow::AddingServer { step, .. } => FlowTag::Adding(*step),
            Flow::AwaitingCommand { .. } => FlowTag::AwaitingCommand,
            Flow::ConsoleMode { .. } => FlowTag::Console,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Flow::Idle)
    }

    /// Start of the add-server wizard.
    pub fn start_wizard() -> Self {
        Flow::AddingServer {
            step: WizardStep::Name,
            draft: ServerDraft::default(),
        }
    }

    /// Short human label, used in "finish X first" notices.
    pub fn describe(&self) -> &'static str {
        match self {
            Flow::Idle => "nothing",
            Flow::AddingServer { .. } => "adding a server",
            Flow::AwaitingCommand { .. } => "entering a command",
            Flow::ConsoleMode { .. } => "console mode",
        }
    }
}

/// Per-user conversation state, owned by that user's worker task.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: UserId,
    pub flow: Flow,
    pub started: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Session {
            user_id,
            flow: Flow::Idle,
            started: now,
            last_activity: now,
        }
    }

    pub fn update_activity(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Drop any active flow, returning what was active.
    pub fn reset(&mut self) -> Flow {
        std::mem::take(&mut self.flow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_idle() {
        let s = Session::new(1);
        assert!(s.flow.is_idle());
        assert_eq!(s.flow.tag(), FlowTag::Idle);
    }

    #[test]
    fn reset_returns_previous_flow() {
        let mut s = Session::new(1);
        s.flow = Flow::ConsoleMode {
            profile_id: ProfileId(4),
        };
        let prev = s.reset();
        assert_eq!(prev.tag(), FlowTag::Console);
        assert!(s.flow.is_idle());
    }

    #[test]
    fn wizard_tags_follow_step() {
        assert_eq!(Flow::start_wizard().tag(), FlowTag::Adding(WizardStep::Name));
    }
}
