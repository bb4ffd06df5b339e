//! Message texts and keyboards.
use super::action::Action;
use super::transport::{Button, Keyboard};
use crate::profile::{ConnectionProfile, ProfileId};
use crate::rcon::CommandResult;

/// Telegram's message length limit, counted in UTF-16 code units.
pub const MAX_MESSAGE_UNITS: usize = 4096;

pub const WELCOME: &str = "👋 Welcome to the RCON admin bot!\n\n\
This bot lets you manage your game servers over RCON.\n\n\
📋 What it can do:\n\
• Show server status\n\
• List online players\n\
• Run RCON commands\n\
• Manage several servers\n\
• Console mode for entering commands quickly\n\n\
🛠 How to use it:\n\
1. Add a server from the menu\n\
2. Pick a server from the list\n\
3. Choose an action";

pub const HELP: &str = "Commands:\n\
/start - show your servers\n\
/cancel - abort whatever is in progress\n\
/close - leave console mode\n\
/help - this message (outside a running flow)";

pub const CHOOSE_SERVER: &str = "Choose a server to manage or add a new one:";
pub const ASK_NAME: &str = "Enter a name for the server:";
pub const ASK_HOST: &str = "Enter the server's IP address or domain:";
pub const ASK_PORT: &str = "Enter the RCON port (usually 25575):";
pub const ASK_PASSWORD: &str = "Enter the RCON password:";
pub const CANCELLED: &str = "Operation cancelled.";
pub const CONSOLE_CLOSED: &str = "Console closed.";
pub const NO_CONSOLE: &str = "No console is open.";
pub const NOTHING_TO_CANCEL: &str = "Nothing to cancel.";
pub const SERVER_NOT_FOUND: &str = "Server not found.";
pub const UNKNOWN_ACTION: &str = "Unknown action.";
pub const UNKNOWN_COMMAND: &str = "Unknown command. Send /help for the list.";
pub const IDLE_HINT: &str = "Send /start to see your servers.";
pub const ACCESS_DENIED: &str = "⛔ Access denied.";
pub const SESSION_EXPIRED: &str = "⌛ Your session expired due to inactivity. Send /start to begin again.";
pub const NO_OUTPUT: &str = "(no output)";
pub const EMPTY_COMMAND: &str = "Enter a command to run.";

/// Server list plus the add button.
pub fn servers_keyboard(servers: &[(ProfileId, ConnectionProfile)]) -> Keyboard {
    let mut buttons: Vec<Button> = servers
        .iter()
        .map(|(id, p)| Button::new(format!("{} ({})", p.name, p.host), Action::SelectServer(*id)))
        .collect();
    buttons.push(Button::new("➕ Add server", Action::AddServer));
    Keyboard::new(buttons)
}

pub fn server_card(profile: &ConnectionProfile) -> String {
    format!(
        "🎮 Server: {}\n🌐 Address: {}\n🔌 Port: {}\n\nChoose an action:",
        profile.name, profile.host, profile.port
    )
}

pub fn server_keyboard(id: ProfileId) -> Keyboard {
    Keyboard::new(vec![
        Button::new("🔄 Server status", Action::ServerStatus(id)),
        Button::new("👥 Online players", Action::ServerPlayers(id)),
        Button::new("⚙️ Run command", Action::ServerCommand(id)),
        Button::new("📟 Open console", Action::OpenConsole(id)),
        Button::new("❌ Delete server", Action::DeleteServer(id)),
        Button::new("🔙 Back", Action::BackToServers),
    ])
}

pub fn cancel_keyboard() -> Keyboard {
    Keyboard::new(vec![Button::new("❌ Cancel", Action::CancelAdd)])
}

pub fn back_keyboard(id: ProfileId) -> Keyboard {
    Keyboard::new(vec![Button::new("🔙 Back", Action::SelectServer(id))])
}

pub fn server_added(name: &str) -> String {
    format!("✅ Server '{}' added!\n\n{}", name, CHOOSE_SERVER)
}

pub fn server_deleted(name: &str) -> String {
    format!("Server '{}' deleted.", name)
}

pub fn ask_command(name: &str) -> String {
    format!("Enter a command to run on {}:\nUse /cancel to abort.", name)
}

pub fn console_opened(name: &str) -> String {
    format!(
        "📟 Console for {} is open.\n\nEvery message you send is run as a command.\nUse /close to leave the console.",
        name
    )
}

pub fn finish_first(flow: &str) -> String {
    format!("Finish {} first (/cancel or /close).", flow)
}

pub fn retry(reason: impl std::fmt::Display, prompt: &str) -> String {
    format!("⚠️ {}. {}", capitalize(&reason.to_string()), prompt)
}

pub fn failure(e: &anyhow::Error) -> String {
    clip(&format!("❌ {:#}", e))
}

pub fn save_failed(e: &anyhow::Error) -> String {
    clip(&format!(
        "❌ Could not save the server: {:#}\nSend the password again to retry, or press Cancel.",
        e
    ))
}

/// `title` followed by the command output, or the tagged failure.
pub fn command_result(title: &str, result: &CommandResult) -> String {
    match result {
        Ok(body) if body.trim().is_empty() => format!("{}:\n{}", title, NO_OUTPUT),
        Ok(body) => clip(&format!("{}:\n{}", title, body.trim_end())),
        Err(e) => clip(&format!("❌ {}: {}", e.kind(), e)),
    }
}

/// Cut to the message limit on a char boundary. Emoji and other astral
/// characters count twice.
pub fn clip(text: &str) -> String {
    if text.encode_utf16().count() <= MAX_MESSAGE_UNITS {
        return text.to_string();
    }
    // Leave one unit for the ellipsis.
    let budget = MAX_MESSAGE_UNITS - 1;
    let mut used = 0;
    let mut out = String::new();
    for c in text.chars() {
        used += c.len_utf16();
        if used > budget {
            break;
        }
        out.push(c);
    }
    out.push('…');
    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
