//! Inbound events that drive state transitions

/// Text commands recognized regardless of stage. Commands always win over
/// stage input: a message that parses as a command is never fed to a stage
/// guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/start` — reset to null state, then re-dispatch.
    Start,
    /// `/cancel` — clear state, no re-dispatch.
    Cancel,
    /// `/help` — static usage text.
    Help,
    /// `/stats` — directory stats (admin only).
    Stats,
    /// `/broadcast <text>` — send to all reachable employees (admin only).
    Broadcast(String),
    /// `/employees` — full directory listing (admin only).
    ListEmployees,
    /// `/purge` — delete all blocked records (admin only).
    PurgeUnreachable,
}

impl Command {
    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            Command::Stats
                | Command::Broadcast(_)
                | Command::ListEmployees
                | Command::PurgeUnreachable
        )
    }
}

/// Events that trigger state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Free text that did not parse as a command.
    Text(String),
    Command(Command),
    /// The transport reported the user revoked contact (blocked the bot).
    ContactRevoked,
    /// The user re-established contact.
    ContactRestored,
}

/// Parse an inbound message into an event, giving commands precedence over
/// stage input.
pub fn classify(text: &str) -> Event {
    match parse_command(text) {
        Some(cmd) => Event::Command(cmd),
        None => Event::Text(text.to_string()),
    }
}

/// Parse a `/command` prefix. `/command@botname` suffixes are accepted the
/// way Telegram clients send them in groups.
pub fn parse_command(text: &str) -> Option<Command> {
    let text = text.trim();
    let rest = text.strip_prefix('/')?;
    let (word, args) = match rest.split_once(char::is_whitespace) {
        Some((w, a)) => (w, a.trim()),
        None => (rest, ""),
    };
    let word = word.split('@').next().unwrap_or(word);

    match word {
        "start" | "restart" => Some(Command::Start),
        "cancel" => Some(Command::Cancel),
        "help" => Some(Command::Help),
        "stats" => Some(Command::Stats),
        "broadcast" => Some(Command::Broadcast(args.to_string())),
        "employees" => Some(Command::ListEmployees),
        "purge" => Some(Command::PurgeUnreachable),
        _ => None,
    }
}
