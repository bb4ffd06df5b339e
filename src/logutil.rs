//! Logging helpers that keep user-supplied text on one line and secrets out of logs.
use std::fmt::Write;

/// Preview length for chat-side text: server names, button data.
pub const CHAT_PREVIEW: usize = 80;

/// Preview length for console commands sent to a game server. These lines
/// are the record of what was run.
pub const COMMAND_PREVIEW: usize = 400;

/// Escape `s` for a single log line and cut it at `max_chars`.
///
/// Line breaks, tabs and backslashes are escaped. Other control characters,
/// which is how ANSI colour sequences in console input arrive, become `\xNN`.
/// Minecraft `§` codes are kept as typed.
pub fn escape_log(s: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(s.len().min(max_chars) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= max_chars {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Stand-in for a credential in log and debug output.
pub fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}
