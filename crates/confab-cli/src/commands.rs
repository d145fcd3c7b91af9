//! Slash commands for interactive mode

/// Result of parsing one line of input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text to send to the agent
    Send(String),
    /// List conversations
    List,
    /// Create a new conversation and switch to it
    New,
    /// Switch to a conversation by list index or id
    Select(String),
    /// Delete a conversation (selected one if no argument)
    Delete(Option<String>),
    /// Cancel the outstanding task
    Cancel,
    /// Reattach to a dropped stream
    Resubscribe,
    /// Show help
    Help,
    /// Exit the application
    Exit,
    /// Unknown slash command
    Unknown(String),
}

/// Parse one line of user input
pub fn parse_line(input: &str) -> Option<Command> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if !input.starts_with('/') {
        return Some(Command::Send(input.to_string()));
    }

    let parts: Vec<&str> = input[1..].splitn(2, ' ').collect();
    let command = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => Command::Help,

        "list" | "ls" | "l" => Command::List,

        "new" | "n" => Command::New,

        "select" | "s" if !args.is_empty() => Command::Select(args.to_string()),
        "select" | "s" => Command::Unknown("select needs an index or id".to_string()),

        "delete" | "d" => Command::Delete(if args.is_empty() {
            None
        } else {
            Some(args.to_string())
        }),

        "cancel" | "c" => Command::Cancel,

        "resubscribe" | "r" => Command::Resubscribe,

        "quit" | "exit" | "q" => Command::Exit,

        _ => Command::Unknown(command),
    })
}

/// Help text for interactive mode
pub fn help_message() -> &'static str {
    r#"Available commands:
  /help, /h, /?          Show this help message
  /list, /ls, /l         List conversations
  /new, /n               Start a new conversation
  /select, /s <n|id>     Switch to a conversation (list index or id)
  /delete, /d [n|id]     Delete a conversation (selected one by default)
  /cancel, /c            Cancel the outstanding task
  /resubscribe, /r       Reattach after a dropped stream
  /quit, /exit, /q       Exit confab

Anything else is sent to the agent as a message."#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_sent() {
        assert_eq!(parse_line("hello there"), Some(Command::Send("hello there".into())));
    }

    #[test]
    fn test_empty_line_is_ignored() {
        assert_eq!(parse_line("   "), None);
    }

    #[test]
    fn test_select_with_argument() {
        assert_eq!(parse_line("/select 2"), Some(Command::Select("2".into())));
        assert_eq!(parse_line("/s ctx-abc"), Some(Command::Select("ctx-abc".into())));
    }

    #[test]
    fn test_select_without_argument_is_rejected() {
        assert!(matches!(parse_line("/select"), Some(Command::Unknown(_))));
    }

    #[test]
    fn test_delete_defaults_to_selected() {
        assert_eq!(parse_line("/delete"), Some(Command::Delete(None)));
        assert_eq!(parse_line("/d ctx-1"), Some(Command::Delete(Some("ctx-1".into()))));
    }

    #[test]
    fn test_aliases() {
        assert_eq!(parse_line("/q"), Some(Command::Exit));
        assert_eq!(parse_line("/ls"), Some(Command::List));
        assert_eq!(parse_line("/r"), Some(Command::Resubscribe));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(parse_line("/frobnicate"), Some(Command::Unknown("frobnicate".into())));
    }
}
