//! A single interview step and the shared answer parsers.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

use super::attributes::{AttributeStore, AttributeUpdates, NO, YES};
use crate::error::PlanError;

/// Precondition over the known attributes.
pub type EligibilityFn = fn(&AttributeStore) -> bool;

/// Turns a trimmed, non-empty answer into attribute updates.
pub type AnswerParser = fn(&str, &AttributeStore) -> Result<AttributeUpdates, PlanError>;

static AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$?\s*((?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d{1,2})?)$").expect("valid amount regex")
});

static YES_NO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(yes|yeah|yep|sure|y|no|nope|nah|none|n)\b[\s,.:;!-]*(.*)$")
        .expect("valid yes/no regex")
});

/// An interview question. Immutable and free of session state.
#[derive(Clone)]
pub struct Question {
    key: &'static str,
    prompt: &'static str,
    provides: Vec<&'static str>,
    eligible: EligibilityFn,
    parse: AnswerParser,
}

impl std::fmt::Debug for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Question")
            .field("key", &self.key)
            .field("prompt", &self.prompt)
            .field("provides", &self.provides)
            .finish_non_exhaustive()
    }
}

fn always(_: &AttributeStore) -> bool {
    true
}

fn unanswerable(_: &str, _: &AttributeStore) -> Result<AttributeUpdates, PlanError> {
    Err(PlanError::validation("This question does not accept answers."))
}

impl Question {
    /// Create a question that provides the attribute named `key`.
    ///
    /// It is always eligible and rejects every answer until a parser is set.
    pub fn new(key: &'static str, prompt: &'static str) -> Self {
        Self {
            key,
            prompt,
            provides: vec![key],
            eligible: always,
            parse: unanswerable,
        }
    }

    /// Builder: the attributes this question fills in.
    pub fn provides(mut self, keys: &[&'static str]) -> Self {
        self.provides = keys.to_vec();
        self
    }

    /// Builder: set the eligibility predicate.
    pub fn eligible_when(mut self, eligible: EligibilityFn) -> Self {
        self.eligible = eligible;
        self
    }

    /// Builder: set the answer parser.
    pub fn parse_with(mut self, parse: AnswerParser) -> Self {
        self.parse = parse;
        self
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn prompt(&self) -> &'static str {
        self.prompt
    }

    pub fn provided_keys(&self) -> &[&'static str] {
        &self.provides
    }

    pub fn is_eligible(&self, attrs: &AttributeStore) -> bool {
        (self.eligible)(attrs)
    }

    /// Whether every attribute this question provides is already known.
    pub fn is_answered(&self, attrs: &AttributeStore) -> bool {
        self.provides.iter().all(|key| attrs.contains(key))
    }

    /// Validate a raw answer. Never touches `attrs`.
    pub fn parse_answer(
        &self,
        raw: &str,
        attrs: &AttributeStore,
    ) -> Result<AttributeUpdates, PlanError> {
        let answer = raw.trim();
        if answer.is_empty() {
            return Err(PlanError::validation("Please type an answer."));
        }

        let updates = (self.parse)(answer, attrs)?;

        // An accepted answer must fill in at least one of our own attributes,
        // otherwise the same question would be asked forever.
        let fills_own = updates
            .iter()
            .any(|(key, value)| self.provides.contains(&key.as_str()) && !value.trim().is_empty());
        if !fills_own {
            tracing::warn!(question = self.key, "Parser accepted an answer without filling its attributes");
            return Err(PlanError::validation(
                "Sorry, I couldn't use that answer. Could you rephrase it?",
            ));
        }
        Ok(updates)
    }
}

/// Parse a non-negative money amount such as `3000`, `$1,250.50`.
pub fn parse_amount(raw: &str) -> Result<Decimal, PlanError> {
    let invalid =
        || PlanError::validation("Please enter a non-negative amount, such as 3000 or $1,250.50.");
    let caps = AMOUNT.captures(raw.trim()).ok_or_else(invalid)?;
    let digits = caps[1].replace(',', "");
    Decimal::from_str(&digits).map_err(|_| invalid())
}

/// Parse a yes/no answer.
pub fn parse_yes_no(raw: &str) -> Result<bool, PlanError> {
    parse_yes_no_with_rest(raw).map(|(flag, _)| flag)
}

/// Parse a yes/no answer followed by an optional amount, e.g. `yes, $500`.
///
/// The amount is only read after a "yes"; anything after a "no" is ignored.
pub fn parse_yes_no_amount(raw: &str) -> Result<(bool, Option<Decimal>), PlanError> {
    let (flag, rest) = parse_yes_no_with_rest(raw)?;
    if !flag || rest.is_empty() {
        return Ok((flag, None));
    }
    let amount = parse_amount(rest).map_err(|_| {
        PlanError::validation(format!(
            "I couldn't read \"{rest}\" as an amount. Answer \"yes\", \"no\", or something like \"yes, $500\"."
        ))
    })?;
    Ok((true, Some(amount)))
}

fn parse_yes_no_with_rest(raw: &str) -> Result<(bool, &str), PlanError> {
    let caps = YES_NO
        .captures(raw.trim())
        .ok_or_else(|| PlanError::validation("Please answer \"yes\" or \"no\"."))?;
    let word = caps.get(1).map(|m| m.as_str().to_lowercase()).unwrap_or_default();
    let rest = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
    let flag = matches!(word.as_str(), "yes" | "yeah" | "yep" | "sure" | "y");
    Ok((flag, rest))
}

/// Parse one of a fixed set of lowercase options.
pub fn parse_choice(raw: &str, options: &[&'static str]) -> Result<&'static str, PlanError> {
    let lower = raw.trim().to_lowercase();
    options
        .iter()
        .copied()
        .find(|option| *option == lower)
        .ok_or_else(|| PlanError::validation(format!("Please choose one of: {}.", options.join(", "))))
}

/// Stored form of a yes/no flag.
pub fn flag_value(flag: bool) -> &'static str {
    if flag { YES } else { NO }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn echo(answer: &str, _: &AttributeStore) -> Result<AttributeUpdates, PlanError> {
        Ok(AttributeUpdates::from([("nickname".to_string(), answer.to_string())]))
    }

    fn wrong_key(_: &str, _: &AttributeStore) -> Result<AttributeUpdates, PlanError> {
        Ok(AttributeUpdates::from([("other".to_string(), "x".to_string())]))
    }

    #[test]
    fn amounts() {
        assert_eq!(parse_amount("3000").unwrap(), dec!(3000));
        assert_eq!(parse_amount(" $1,250.50 ").unwrap(), dec!(1250.50));
        assert_eq!(parse_amount("$ 75.5").unwrap(), dec!(75.5));
        assert_eq!(parse_amount("0").unwrap(), dec!(0));
        assert!(parse_amount("not a number").is_err());
        assert!(parse_amount("-5").is_err());
        assert!(parse_amount("12,34").is_err());
        assert!(parse_amount("1.999").is_err());
    }

    #[test]
    fn yes_no_words() {
        for yes in ["yes", "Y", "yeah", "Yep", "sure!"] {
            assert!(parse_yes_no(yes).unwrap(), "{yes} should be yes");
        }
        for no in ["no", "N", "nope", "nah", "none", "no thanks"] {
            assert!(!parse_yes_no(no).unwrap(), "{no} should be no");
        }
        assert!(parse_yes_no("yesterday").is_err());
        assert!(parse_yes_no("maybe").is_err());
    }

    #[test]
    fn yes_with_amount() {
        assert_eq!(parse_yes_no_amount("yes, $500").unwrap(), (true, Some(dec!(500))));
        assert_eq!(parse_yes_no_amount("Yes 1,200").unwrap(), (true, Some(dec!(1200))));
        assert_eq!(parse_yes_no_amount("yes").unwrap(), (true, None));
        assert_eq!(parse_yes_no_amount("no, $500").unwrap(), (false, None));
        let err = parse_yes_no_amount("yes, a lot").unwrap_err();
        assert!(err.to_string().contains("a lot"));
    }

    #[test]
    fn choices() {
        let options = ["low", "medium", "high"];
        assert_eq!(parse_choice("HIGH", &options).unwrap(), "high");
        let err = parse_choice("extreme", &options).unwrap_err();
        assert_eq!(err.to_string(), "Please choose one of: low, medium, high.");
    }

    #[test]
    fn parse_answer_rejects_blank_input() {
        let q = Question::new("nickname", "What should I call you?").parse_with(echo);
        let attrs = AttributeStore::new();
        assert!(q.parse_answer("   ", &attrs).is_err());
        let updates = q.parse_answer("  Sam ", &attrs).unwrap();
        assert_eq!(updates.get("nickname").map(String::as_str), Some("Sam"));
    }

    #[test]
    fn parse_answer_requires_own_attribute() {
        let q = Question::new("nickname", "What should I call you?").parse_with(wrong_key);
        assert!(q.parse_answer("Sam", &AttributeStore::new()).is_err());
    }

    #[test]
    fn default_question_rejects_everything() {
        let q = Question::new("nickname", "What should I call you?");
        assert!(q.is_eligible(&AttributeStore::new()));
        assert!(q.parse_answer("Sam", &AttributeStore::new()).is_err());
    }

    #[test]
    fn answered_when_all_provided_keys_known() {
        let q = Question::new("a", "?").provides(&["a", "b"]);
        assert!(!q.is_answered(&AttributeStore::from_map([("a", "1")])));
        assert!(q.is_answered(&AttributeStore::from_map([("a", "1"), ("b", "2")])));
    }
}
