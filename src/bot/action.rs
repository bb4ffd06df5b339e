//! Button action selectors.
//!
//! The string forms match the callback data used by earlier releases of the
//! bot, so buttons on messages sent before an upgrade keep working.
use std::fmt;

use crate::profile::ProfileId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    AddServer,
    CancelAdd,
    BackToServers,
    SelectServer(ProfileId),
    ServerStatus(ProfileId),
    ServerPlayers(ProfileId),
    ServerCommand(ProfileId),
    OpenConsole(ProfileId),
    DeleteServer(ProfileId),
}

const WITH_ID: [(&str, fn(ProfileId) -> Action); 6] = [
    ("select_server_", Action::SelectServer),
    ("server_status_", Action::ServerStatus),
    ("server_players_", Action::ServerPlayers),
    ("server_cmd_", Action::ServerCommand),
    ("open_console_", Action::OpenConsole),
    ("delete_server_", Action::DeleteServer),
];

impl Action {
    /// Decode a selector. `None` for anything unknown or with a bad id.
    pub fn parse(data: &str) -> Option<Action> {
        match data {
            "add_server" => return Some(Action::AddServer),
            "cancel_add" => return Some(Action::CancelAdd),
            "back_to_servers" => return Some(Action::BackToServers),
            _ => {}
        }
        WITH_ID.iter().find_map(|(prefix, ctor)| {
            data.strip_prefix(prefix)
                .and_then(|id| id.parse::<ProfileId>().ok())
                .map(ctor)
        })
    }

    /// Actions that enter a flow and so need an idle session.
    pub fn starts_flow(&self) -> bool {
        matches!(
            self,
            Action::AddServer | Action::ServerCommand(_) | Action::OpenConsole(_)
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::AddServer => f.write_str("add_server"),
            Action::CancelAdd => f.write_str("cancel_add"),
            Action::BackToServers => f.write_str("back_to_servers"),
            Action::SelectServer(id) => write!(f, "select_server_{}", id),
            Action::ServerStatus(id) => write!(f, "server_status_{}", id),
            Action::ServerPlayers(id) => write!(f, "server_players_{}", id),
            Action::ServerCommand(id) => write!(f, "server_cmd_{}", id),
            Action::OpenConsole(id) => write!(f, "open_console_{}", id),
            Action::DeleteServer(id) => write!(f, "delete_server_{}", id),
        }
    }
}
