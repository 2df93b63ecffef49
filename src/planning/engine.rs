//! Dialog engine: drives one user's planning interview.
//!
//! After every accepted answer the engine asks the catalog for the next
//! eligible question from scratch instead of popping a queue built up front.
//! Once nothing is eligible it computes the recommendation and concludes.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::attributes::AttributeStore;
use super::catalog::QuestionCatalog;
use super::question::Question;
use super::recommendation::Recommendation;
use super::state::EngineState;
use crate::error::PlanError;

/// Shown after every presentation of the recommendation.
pub const EXPORT_HINT: &str =
    "Here's a recommended budget for you, type \"export\" to export the budget";

/// Shown before re-presenting the recommendation once the interview is over.
pub const REPRESENT_PREFACE: &str =
    "Based on what you've told me, here's a recommended budget plan!";

/// Who said a dialog turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

/// One entry of the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogTurn {
    pub speaker: Speaker,
    pub text: String,
}

impl DialogTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            text: text.into(),
        }
    }
}

/// What a call to [`DialogEngine::submit`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// The answer was accepted and this question is now pending.
    Asked { question: &'static str },
    /// The answer was rejected; the same question is still pending.
    Rejected { message: String },
    /// The answer completed the interview and a recommendation was presented.
    Concluded,
    /// The interview was already over; the recommendation was shown again.
    Represented,
}

/// Callback receiving the turns appended by one `submit()` call.
pub type TurnListener = Box<dyn FnMut(&[DialogTurn]) + Send>;

/// A single planning session.
pub struct DialogEngine {
    catalog: Arc<QuestionCatalog>,
    attributes: AttributeStore,
    transcript: Vec<DialogTurn>,
    state: EngineState,
    pending: Option<Question>,
    recommendation: Option<Recommendation>,
    listeners: Vec<TurnListener>,
}

impl DialogEngine {
    /// Start a session from previously persisted attributes (possibly empty).
    ///
    /// Asks the first eligible question, or concludes immediately if the
    /// restored attributes already answer everything.
    pub fn new(catalog: Arc<QuestionCatalog>, attributes: AttributeStore) -> Result<Self, PlanError> {
        let mut engine = Self {
            catalog,
            attributes,
            transcript: Vec::new(),
            state: EngineState::AwaitingAnswer,
            pending: None,
            recommendation: None,
            listeners: Vec::new(),
        };
        engine.advance()?;
        Ok(engine)
    }

    /// Register a listener called at the end of every `submit()`.
    pub fn subscribe(&mut self, listener: TurnListener) {
        self.listeners.push(listener);
    }

    /// Feed one line of user input into the conversation.
    ///
    /// Validation failures are reported as a conversational turn and an
    /// `Ok(Rejected)` outcome. `Err` means the session cannot continue.
    pub fn submit(&mut self, raw: &str) -> Result<SubmitOutcome, PlanError> {
        let start = self.transcript.len();
        self.transcript.push(DialogTurn::user(raw));

        let result = self.process(raw);

        for listener in &mut self.listeners {
            listener(&self.transcript[start..]);
        }
        result
    }

    fn process(&mut self, raw: &str) -> Result<SubmitOutcome, PlanError> {
        if self.state.is_terminal() {
            if let Some(recommendation) = self.recommendation.clone() {
                self.say(REPRESENT_PREFACE);
                self.present(&recommendation);
            }
            return Ok(SubmitOutcome::Represented);
        }

        let Some(question) = self.pending.clone() else {
            // A previous attempt to conclude failed; it will fail the same way
            // unless the catalog changes, but the user still gets told why.
            return self.advance();
        };

        match question.parse_answer(raw, &self.attributes) {
            Ok(updates) => {
                let added = self.attributes.merge(updates);
                debug!(question = question.key(), added, "Answer accepted");
                self.advance()
            }
            Err(PlanError::Validation { message }) => {
                debug!(question = question.key(), %message, "Answer rejected");
                self.say(&message);
                Ok(SubmitOutcome::Rejected { message })
            }
            Err(err) => {
                self.say(&format!("Sorry, something went wrong: {err}"));
                Err(err)
            }
        }
    }

    /// Move to the next eligible question, or conclude.
    fn advance(&mut self) -> Result<SubmitOutcome, PlanError> {
        match self.catalog.next_question(&self.attributes).cloned() {
            Some(question) => {
                self.transition(EngineState::AwaitingAnswer);
                let key = question.key();
                info!(question = key, "Asking question");
                self.say(question.prompt());
                self.pending = Some(question);
                Ok(SubmitOutcome::Asked { question: key })
            }
            None => {
                self.pending = None;
                let recommendation = match self.catalog.recommend(&self.attributes) {
                    Ok(recommendation) => recommendation,
                    Err(err) => {
                        warn!(error = %err, "Cannot conclude planning session");
                        self.say(&format!(
                            "Sorry, I can't put together a budget right now: {err}"
                        ));
                        return Err(err);
                    }
                };
                self.transition(EngineState::Concluded);
                info!(
                    categories = recommendation.allocations().len(),
                    "Planning session concluded"
                );
                self.present(&recommendation);
                self.recommendation = Some(recommendation);
                Ok(SubmitOutcome::Concluded)
            }
        }
    }

    fn transition(&mut self, target: EngineState) {
        debug_assert!(
            self.state.can_transition_to(target),
            "invalid transition {} -> {}",
            self.state,
            target
        );
        self.state = target;
    }

    fn say(&mut self, text: &str) {
        self.transcript.push(DialogTurn::assistant(text));
    }

    fn present(&mut self, recommendation: &Recommendation) {
        self.say(&recommendation.to_string());
        self.say(EXPORT_HINT);
    }

    /// The conversation so far, oldest first.
    pub fn transcript(&self) -> &[DialogTurn] {
        &self.transcript
    }

    /// Everything learned about the user. Persist this after each `submit()`.
    pub fn known_attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// The question awaiting an answer, if any.
    pub fn pending_question(&self) -> Option<&Question> {
        self.pending.as_ref()
    }

    /// The recommendation, available once the interview has concluded.
    pub fn current_recommendation(&self) -> Result<&Recommendation, PlanError> {
        match self.state {
            EngineState::Concluded => self.recommendation.as_ref().ok_or(PlanError::NotReady),
            EngineState::AwaitingAnswer => Err(PlanError::NotReady),
        }
    }
}

impl fmt::Debug for DialogEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogEngine")
            .field("state", &self.state)
            .field("pending", &self.pending.as_ref().map(Question::key))
            .field("attributes", &self.attributes)
            .field("turns", &self.transcript.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::planning::attributes::{AttributeUpdates, keys};

    fn standard() -> Arc<QuestionCatalog> {
        Arc::new(QuestionCatalog::standard())
    }

    fn complete_attrs() -> AttributeStore {
        AttributeStore::from_map([
            (keys::MONTHLY_INCOME, "3000"),
            (keys::FIXED_EXPENSES, "1000"),
            (keys::HAS_DEBT, "no"),
            (keys::SAVINGS_GOAL, "400"),
            (keys::RISK_TOLERANCE, "medium"),
        ])
    }

    fn texts(engine: &DialogEngine) -> Vec<(Speaker, &str)> {
        engine
            .transcript()
            .iter()
            .map(|t| (t.speaker, t.text.as_str()))
            .collect()
    }

    #[test]
    fn fresh_engine_asks_for_income() {
        let mut engine = DialogEngine::new(standard(), AttributeStore::new()).unwrap();
        assert_eq!(engine.state(), EngineState::AwaitingAnswer);
        assert_eq!(
            texts(&engine),
            vec![(Speaker::Assistant, "What is your monthly income?")]
        );

        let outcome = engine.submit("3000").unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Asked {
                question: keys::FIXED_EXPENSES
            }
        );
        assert_eq!(engine.known_attributes().get(keys::MONTHLY_INCOME), Some("3000"));
        let transcript = engine.transcript();
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[1], DialogTurn::user("3000"));
        assert_eq!(transcript[2].speaker, Speaker::Assistant);
    }

    #[test]
    fn invalid_answer_reprompts_without_mutation() {
        let mut engine = DialogEngine::new(standard(), AttributeStore::new()).unwrap();

        let outcome = engine.submit("not a number").unwrap();
        assert!(matches!(outcome, SubmitOutcome::Rejected { .. }));
        assert!(engine.known_attributes().is_empty());
        assert_eq!(engine.pending_question().unwrap().key(), keys::MONTHLY_INCOME);
        assert_eq!(engine.transcript().len(), 3);
        assert_eq!(engine.transcript()[1], DialogTurn::user("not a number"));

        engine.submit("3000").unwrap();
        assert_eq!(engine.known_attributes().get(keys::MONTHLY_INCOME), Some("3000"));
        assert_eq!(engine.pending_question().unwrap().key(), keys::FIXED_EXPENSES);
    }

    #[test]
    fn no_debt_never_asks_for_repayment() {
        let mut engine = DialogEngine::new(standard(), AttributeStore::new()).unwrap();
        for answer in ["3000", "1000", "no", "250", "high"] {
            engine.submit(answer).unwrap();
            assert_ne!(
                engine.pending_question().map(Question::key),
                Some(keys::DEBT_PAYMENT)
            );
        }
        assert_eq!(engine.state(), EngineState::Concluded);
        assert!(!engine.known_attributes().contains(keys::DEBT_PAYMENT));
    }

    #[test]
    fn yes_with_amount_skips_repayment_question() {
        let mut engine = DialogEngine::new(standard(), AttributeStore::new()).unwrap();
        engine.submit("3000").unwrap();
        engine.submit("1000").unwrap();
        let outcome = engine.submit("yes, $500").unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Asked {
                question: keys::SAVINGS_GOAL
            }
        );
        assert_eq!(engine.known_attributes().get(keys::DEBT_PAYMENT), Some("500"));
    }

    #[test]
    fn complete_restore_concludes_immediately() {
        let engine = DialogEngine::new(standard(), complete_attrs()).unwrap();
        assert_eq!(engine.state(), EngineState::Concluded);
        assert!(engine.pending_question().is_none());
        let transcript = engine.transcript();
        assert_eq!(transcript.len(), 2);
        assert!(transcript.iter().all(|t| t.speaker == Speaker::Assistant));
        assert_eq!(transcript[1].text, EXPORT_HINT);
        assert!(engine.current_recommendation().is_ok());
    }

    #[test]
    fn concluded_submit_represents_without_mutation() {
        let mut engine = DialogEngine::new(standard(), complete_attrs()).unwrap();
        let before = engine.known_attributes().clone();
        let first = engine.current_recommendation().unwrap().clone();

        let outcome = engine.submit("actually my income is 5000").unwrap();
        assert_eq!(outcome, SubmitOutcome::Represented);
        assert_eq!(engine.known_attributes(), &before);
        assert!(engine.pending_question().is_none());
        assert_eq!(engine.current_recommendation().unwrap(), &first);

        let texts = texts(&engine);
        assert_eq!(texts.len(), 6);
        assert_eq!(texts[2], (Speaker::User, "actually my income is 5000"));
        assert_eq!(texts[3], (Speaker::Assistant, REPRESENT_PREFACE));
        assert_eq!(texts[5], (Speaker::Assistant, EXPORT_HINT));
    }

    #[test]
    fn recommendation_not_ready_while_asking() {
        let engine = DialogEngine::new(standard(), AttributeStore::new()).unwrap();
        assert_eq!(engine.current_recommendation(), Err(PlanError::NotReady));
    }

    #[test]
    fn successful_submits_make_progress() {
        let mut engine = DialogEngine::new(standard(), AttributeStore::new()).unwrap();
        for answer in ["4000", "x", "1500", "yes", "300", "-1", "0"] {
            let known_before = engine.known_attributes().len();
            let outcome = engine.submit(answer).unwrap();
            if matches!(outcome, SubmitOutcome::Rejected { .. }) {
                assert_eq!(engine.known_attributes().len(), known_before);
            } else {
                assert!(
                    engine.known_attributes().len() > known_before
                        || engine.state() == EngineState::Concluded
                );
            }
        }
        assert_eq!(engine.state(), EngineState::Concluded);
    }

    #[test]
    fn identical_sessions_are_identical() {
        let answers = ["2500", "$900", "yes", "150.75", "300", "LOW"];
        let run = || {
            let mut engine = DialogEngine::new(standard(), AttributeStore::new()).unwrap();
            for answer in answers {
                engine.submit(answer).unwrap();
            }
            engine
        };
        let a = run();
        let b = run();
        assert_eq!(a.transcript(), b.transcript());
        assert_eq!(a.current_recommendation(), b.current_recommendation());
        assert_eq!(a.state(), EngineState::Concluded);
    }

    #[test]
    fn listener_receives_turns_of_each_submit() {
        let seen: Arc<Mutex<Vec<Vec<DialogTurn>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut engine = DialogEngine::new(standard(), AttributeStore::new()).unwrap();
        engine.subscribe(Box::new(move |turns: &[DialogTurn]| {
            sink.lock().unwrap().push(turns.to_vec());
        }));

        engine.submit("abc").unwrap();
        engine.submit("3000").unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0][0], DialogTurn::user("abc"));
        assert_eq!(seen[0].len(), 2);
        assert_eq!(seen[1][1].speaker, Speaker::Assistant);
    }

    fn income_only(answer: &str, _: &AttributeStore) -> Result<AttributeUpdates, PlanError> {
        Ok(AttributeUpdates::from([(
            keys::MONTHLY_INCOME.to_string(),
            answer.to_string(),
        )]))
    }

    #[test]
    fn broken_catalog_surfaces_missing_attribute() {
        let catalog = QuestionCatalog::new(
            vec![Question::new(keys::MONTHLY_INCOME, "Income?").parse_with(income_only)],
            Default::default(),
        );
        let mut engine = DialogEngine::new(Arc::new(catalog), AttributeStore::new()).unwrap();

        let err = engine.submit("3000").unwrap_err();
        assert_eq!(err, PlanError::missing(keys::FIXED_EXPENSES));
        assert_eq!(engine.state(), EngineState::AwaitingAnswer);
        let last = engine.transcript().last().unwrap();
        assert_eq!(last.speaker, Speaker::Assistant);
        assert!(last.text.contains("fixed_expenses"));

        // Fails identically on the next attempt, and says so again.
        let again = engine.submit("hello").unwrap_err();
        assert_eq!(again, err);
        assert_eq!(engine.transcript().len(), 5);
    }

    #[test]
    fn broken_restore_fails_construction() {
        let catalog = QuestionCatalog::new(Vec::new(), Default::default());
        let err = DialogEngine::new(Arc::new(catalog), AttributeStore::new()).unwrap_err();
        assert_eq!(err, PlanError::missing(keys::MONTHLY_INCOME));
    }
}
