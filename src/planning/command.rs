//! Planning-mode commands typed by the user.

use serde::{Deserialize, Serialize};

/// Parses a line of user input into a `PlanCommand`.
pub struct PlanCommandParser;

impl PlanCommandParser {
    pub fn parse(content: &str) -> PlanCommand {
        let trimmed = content.trim();
        let body = strip_plan_prefix(trimmed);
        let lower = body.to_lowercase();

        match lower.as_str() {
            "export" => PlanCommand::Export,
            "restart" | "reset" => PlanCommand::Restart,
            "/quit" | "/exit" | "bye" => PlanCommand::Quit,
            "goto expense" | "go to expense" => PlanCommand::LeavePlanning,
            _ => PlanCommand::Answer {
                text: body.to_string(),
            },
        }
    }
}

/// `plan <text>` is accepted as `<text>`; a bare `plan` is left alone.
fn strip_plan_prefix(trimmed: &str) -> &str {
    match trimmed.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("plan ") => trimmed[5..].trim_start(),
        _ => trimmed,
    }
}

/// A command in planning mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanCommand {
    /// Free text for the dialog engine.
    Answer { text: String },
    /// Save the concluded recommendation as the user's budget.
    Export,
    /// Forget everything and start the interview over.
    Restart,
    /// Switch the front end to expense tracking.
    LeavePlanning,
    Quit,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(text: &str) -> PlanCommand {
        PlanCommand::Answer {
            text: text.to_string(),
        }
    }

    #[test]
    fn parse_commands() {
        assert_eq!(PlanCommandParser::parse("export"), PlanCommand::Export);
        assert_eq!(PlanCommandParser::parse("  EXPORT "), PlanCommand::Export);
        assert_eq!(PlanCommandParser::parse("restart"), PlanCommand::Restart);
        assert_eq!(PlanCommandParser::parse("reset"), PlanCommand::Restart);
        assert_eq!(PlanCommandParser::parse("/quit"), PlanCommand::Quit);
        assert_eq!(PlanCommandParser::parse("bye"), PlanCommand::Quit);
        assert_eq!(
            PlanCommandParser::parse("goto expense"),
            PlanCommand::LeavePlanning
        );
    }

    #[test]
    fn plan_prefix_is_stripped() {
        assert_eq!(PlanCommandParser::parse("plan export"), PlanCommand::Export);
        assert_eq!(PlanCommandParser::parse("Plan  3000"), answer("3000"));
        assert_eq!(PlanCommandParser::parse("plan"), answer("plan"));
        assert_eq!(PlanCommandParser::parse("planet"), answer("planet"));
    }

    #[test]
    fn everything_else_is_an_answer() {
        assert_eq!(PlanCommandParser::parse(" yes, $500 "), answer("yes, $500"));
        assert_eq!(PlanCommandParser::parse("exporting"), answer("exporting"));
        assert_eq!(PlanCommandParser::parse(""), answer(""));
    }

    #[test]
    fn multibyte_input_does_not_panic() {
        assert_eq!(PlanCommandParser::parse("€3000"), answer("€3000"));
    }
}
