//! Input validation for the add-server wizard and for persisted JSON.
//!
//! Wizard steps call these helpers and re-prompt on `Err`, so every error
//! message here is shown to the user verbatim.

/// Longest display name accepted for a server.
pub const MAX_NAME_CHARS: usize = 64;
/// Longest DNS name (RFC 1035).
pub const MAX_HOST_CHARS: usize = 253;
/// Generous cap; real RCON passwords are far shorter.
pub const MAX_CREDENTIAL_BYTES: usize = 512;

/// Bad user input at a wizard step. Recovered locally by re-prompting.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    #[error("{field} is too long (maximum {max} characters)")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} contains control characters")]
    ControlChars { field: &'static str },

    #[error("host cannot contain spaces")]
    HostWhitespace,

    #[error("'{0}' is not a number")]
    PortNotNumber(String),

    #[error("port {0} is out of range (1-65535)")]
    PortOutOfRange(i64),

    #[error("missing {0}; start the wizard again")]
    MissingField(&'static str),
}

/// Errors when reading persisted files.
#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    #[error("file size exceeds limit ({limit} bytes)")]
    FileSizeExceeded { limit: usize },

    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

fn non_empty_trimmed<'a>(input: &'a str, field: &'static str) -> Result<&'a str, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::ControlChars { field });
    }
    Ok(trimmed)
}

/// Display name: trimmed, non-empty, single line.
pub fn validate_server_name(input: &str) -> Result<String, ValidationError> {
    let name = non_empty_trimmed(input, "server name")?;
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(ValidationError::TooLong {
            field: "server name",
            max: MAX_NAME_CHARS,
        });
    }
    Ok(name.to_string())
}

/// Hostname or IP literal. Resolution is left to the connect attempt.
pub fn validate_host(input: &str) -> Result<String, ValidationError> {
    let host = non_empty_trimmed(input, "host")?;
    if host.chars().any(char::is_whitespace) {
        return Err(ValidationError::HostWhitespace);
    }
    if host.chars().count() > MAX_HOST_CHARS {
        return Err(ValidationError::TooLong {
            field: "host",
            max: MAX_HOST_CHARS,
        });
    }
    // Users paste "[::1]" for IPv6; store the bare literal.
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    Ok(host.to_string())
}

/// Port number in 1..=65535.
pub fn parse_port(input: &str) -> Result<u16, ValidationError> {
    let trimmed = input.trim();
    let value: i64 = trimmed
        .parse()
        .map_err(|_| ValidationError::PortNotNumber(trimmed.to_string()))?;
    if !(1..=65535).contains(&value) {
        return Err(ValidationError::PortOutOfRange(value));
    }
    Ok(value as u16)
}

/// RCON password. Not trimmed: leading/trailing spaces may be significant.
pub fn validate_credential(input: &str) -> Result<String, ValidationError> {
    if input.trim().is_empty() {
        return Err(ValidationError::Empty { field: "password" });
    }
    if input.contains('\0') {
        return Err(ValidationError::ControlChars { field: "password" });
    }
    if input.len() > MAX_CREDENTIAL_BYTES {
        return Err(ValidationError::TooLong {
            field: "password",
            max: MAX_CREDENTIAL_BYTES,
        });
    }
    Ok(input.to_string())
}

/// Parse JSON with a size cap, tolerating leading NULs left by an interrupted write.
pub fn secure_json_parse<T>(content: &str, max_bytes: usize) -> Result<T, SecurityError>
where
    T: serde::de::DeserializeOwned,
{
    if content.len() > max_bytes {
        return Err(SecurityError::FileSizeExceeded { limit: max_bytes });
    }
    let normalized = content.trim_start_matches('\0');
    serde_json::from_str(normalized).map_err(|e| SecurityError::InvalidFormat(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_name_rules() {
        assert_eq!(validate_server_name("  Survival  ").unwrap(), "Survival");
        assert!(matches!(
            validate_server_name("   "),
            Err(ValidationError::Empty { .. })
        ));
        assert!(validate_server_name(&"n".repeat(65)).is_err());
        assert!(validate_server_name("two\nlines").is_err());
    }

    #[test]
    fn host_rules() {
        assert_eq!(validate_host("mc.example.org").unwrap(), "mc.example.org");
        assert_eq!(validate_host("[::1]").unwrap(), "::1");
        assert_eq!(validate_host("10.0.0.5 ").unwrap(), "10.0.0.5");
        assert_eq!(validate_host("mc example"), Err(ValidationError::HostWhitespace));
    }

    #[test]
    fn port_rules() {
        assert_eq!(parse_port("25575"), Ok(25575));
        assert_eq!(parse_port(" 1 "), Ok(1));
        assert_eq!(parse_port("65535"), Ok(65535));
        assert_eq!(parse_port("abc"), Err(ValidationError::PortNotNumber("abc".into())));
        assert_eq!(parse_port("70000"), Err(ValidationError::PortOutOfRange(70000)));
        assert_eq!(parse_port("0"), Err(ValidationError::PortOutOfRange(0)));
        assert_eq!(parse_port("-5"), Err(ValidationError::PortOutOfRange(-5)));
    }

    #[test]
    fn credential_keeps_spaces() {
        assert_eq!(validate_credential(" pass ").unwrap(), " pass ");
        assert!(validate_credential("").is_err());
        assert!(validate_credential("a\0b").is_err());
    }

    #[test]
    fn json_parse_limits() {
        let v: Vec<u8> = secure_json_parse("\0\0[1,2]", 100).unwrap();
        assert_eq!(v, vec![1, 2]);
        assert!(secure_json_parse::<Vec<u8>>("[1,2]", 2).is_err());
        assert!(secure_json_parse::<Vec<u8>>("{", 100).is_err());
    }
}
