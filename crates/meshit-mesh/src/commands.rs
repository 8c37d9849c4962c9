//! Slash-command parsing for the chat input line.

/// A recognised command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/join <channel> [password]`
    Join {
        /// Channel name as typed (normalization happens at join time).
        channel: String,
        /// Optional password.
        password: Option<String>,
    },
    /// `/leave [channel]` — no argument means the current channel.
    Leave {
        /// Explicit channel, if given.
        channel: Option<String>,
    },
    /// `/channels` or `/list`
    Channels,
    /// `/who [channel]`
    Who {
        /// Explicit channel, if given.
        channel: Option<String>,
    },
    /// `/msg <name> <text>`
    Msg {
        /// Target nickname or short fingerprint.
        name: String,
        /// Message body.
        body: String,
    },
    /// `/help`
    Help,
}

/// Outcome of parsing one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedInput {
    /// A recognised command.
    Command(Command),
    /// Leading slash but not a command we know (handled = false).
    Unhandled {
        /// The unrecognised command word.
        command: String,
    },
    /// Ordinary message text.
    Text,
}

/// Parse one line of user input.
pub fn parse_command(input: &str) -> ParsedInput {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return ParsedInput::Text;
    }

    let mut words = trimmed.split_whitespace();
    let command = words.next().unwrap_or_default().to_lowercase();
    match command.as_str() {
        "/join" | "/j" => match words.next() {
            Some(channel) => ParsedInput::Command(Command::Join {
                channel: channel.to_string(),
                password: words.next().map(str::to_string),
            }),
            None => ParsedInput::Unhandled { command },
        },
        "/leave" => ParsedInput::Command(Command::Leave {
            channel: words.next().map(str::to_string),
        }),
        "/channels" | "/list" => ParsedInput::Command(Command::Channels),
        "/who" => ParsedInput::Command(Command::Who {
            channel: words.next().map(str::to_string),
        }),
        "/msg" => {
            let name = words.next();
            let body: Vec<&str> = words.collect();
            match (name, body.is_empty()) {
                (Some(name), false) => ParsedInput::Command(Command::Msg {
                    name: name.to_string(),
                    body: body.join(" "),
                }),
                _ => ParsedInput::Unhandled { command },
            }
        }
        "/help" => ParsedInput::Command(Command::Help),
        _ => ParsedInput::Unhandled { command },
    }
}
