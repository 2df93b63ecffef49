//! PlanManager: one user's planning session backed by the shared store.
//!
//! Routes parsed commands to the dialog engine, persists what the engine
//! learns after every answer, and exports concluded plans as budgets.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::attributes::AttributeStore;
use super::catalog::QuestionCatalog;
use super::command::{PlanCommand, PlanCommandParser};
use super::engine::{DialogEngine, DialogTurn, SubmitOutcome};
use super::recommendation::{Budget, Recommendation};
use super::state::EngineState;
use crate::error::{Error, PlanError};
use crate::store::PlanStore;

/// What handling one line of input produced.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ManagerReply {
    /// The engine took the input. `turns` are the turns it appended.
    Replied {
        outcome: SubmitOutcome,
        turns: Vec<DialogTurn>,
    },
    /// The concluded plan was saved as the user's budget.
    Exported { budget: Budget },
    /// The session was reset. `turns` is the new transcript.
    Restarted { turns: Vec<DialogTurn> },
    /// The user asked to switch to expense tracking.
    LeftPlanning,
    Quit,
}

/// Snapshot of a planning session for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct PlanStatus {
    pub user_id: String,
    pub state: EngineState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_question: Option<String>,
    pub attributes: AttributeStore,
    pub transcript: Vec<DialogTurn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<Recommendation>,
}

/// Coordinates a user's dialog engine with persistence.
pub struct PlanManager {
    store: Arc<dyn PlanStore>,
    catalog: Arc<QuestionCatalog>,
    user_id: String,
    engine: Mutex<DialogEngine>,
}

impl PlanManager {
    /// Resume the user's interview from stored attributes.
    ///
    /// Attributes that no longer produce a usable session are discarded and
    /// the interview starts over.
    pub async fn open(
        store: Arc<dyn PlanStore>,
        catalog: Arc<QuestionCatalog>,
        user_id: impl Into<String>,
    ) -> Result<Self, Error> {
        let user_id = user_id.into();
        let attrs = store.load_plan_attributes(&user_id).await?;
        let restored = attrs.len();

        let engine = match build_engine(&catalog, &user_id, attrs) {
            Ok(engine) => engine,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Stored plan is unusable, starting over");
                store.clear_plan_attributes(&user_id).await?;
                build_engine(&catalog, &user_id, AttributeStore::new())?
            }
        };

        info!(user_id = %user_id, restored, state = %engine.state(), "Planning session opened");
        Ok(Self {
            store,
            catalog,
            user_id,
            engine: Mutex::new(engine),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Parse and handle one line of user input.
    pub async fn handle_input(&self, line: &str) -> Result<ManagerReply, Error> {
        match PlanCommandParser::parse(line) {
            PlanCommand::Answer { text } => self.answer(&text).await,
            PlanCommand::Export => {
                if self.engine.lock().await.state().is_terminal() {
                    let budget = self.export().await?;
                    Ok(ManagerReply::Exported { budget })
                } else {
                    self.answer("export").await
                }
            }
            PlanCommand::Restart => {
                let turns = self.restart().await?;
                Ok(ManagerReply::Restarted { turns })
            }
            PlanCommand::LeavePlanning => Ok(ManagerReply::LeftPlanning),
            PlanCommand::Quit => Ok(ManagerReply::Quit),
        }
    }

    /// Submit an answer to the engine and persist what it now knows.
    ///
    /// The engine stays locked until the save finishes, so stored attributes
    /// never fall behind a concurrent answer.
    pub async fn answer(&self, text: &str) -> Result<ManagerReply, Error> {
        let mut engine = self.engine.lock().await;
        let start = engine.transcript().len();
        let result = engine.submit(text);
        let turns = engine.transcript()[start..].to_vec();
        self.persist_attributes(engine.known_attributes()).await;
        drop(engine);

        let outcome = result?;
        debug!(user_id = %self.user_id, ?outcome, "Answer handled");
        Ok(ManagerReply::Replied { outcome, turns })
    }

    /// Save the concluded recommendation as the user's budget.
    pub async fn export(&self) -> Result<Budget, Error> {
        let budget = {
            let engine = self.engine.lock().await;
            Budget::from_recommendation(engine.current_recommendation()?)
        };
        self.store.save_budget(&self.user_id, &budget).await?;
        info!(
            user_id = %self.user_id,
            monthly_budget = %budget.monthly_budget,
            "Budget exported"
        );
        Ok(budget)
    }

    /// Forget the stored attributes and start a fresh interview.
    pub async fn restart(&self) -> Result<Vec<DialogTurn>, Error> {
        let mut engine = self.engine.lock().await;
        self.store.clear_plan_attributes(&self.user_id).await?;
        let fresh = build_engine(&self.catalog, &self.user_id, AttributeStore::new())?;
        let turns = fresh.transcript().to_vec();
        *engine = fresh;
        drop(engine);
        info!(user_id = %self.user_id, "Planning session restarted");
        Ok(turns)
    }

    pub async fn status(&self) -> PlanStatus {
        let engine = self.engine.lock().await;
        PlanStatus {
            user_id: self.user_id.clone(),
            state: engine.state(),
            pending_question: engine.pending_question().map(|q| q.key().to_string()),
            attributes: engine.known_attributes().clone(),
            transcript: engine.transcript().to_vec(),
            recommendation: engine.current_recommendation().ok().cloned(),
        }
    }

    pub async fn transcript(&self) -> Vec<DialogTurn> {
        self.engine.lock().await.transcript().to_vec()
    }

    pub async fn recommendation(&self) -> Result<Recommendation, PlanError> {
        self.engine.lock().await.current_recommendation().cloned()
    }

    /// The last exported budget, if any.
    pub async fn last_budget(&self) -> Result<Option<Budget>, Error> {
        Ok(self.store.load_budget(&self.user_id).await?)
    }

    async fn persist_attributes(&self, attrs: &AttributeStore) {
        if let Err(e) = self.store.save_plan_attributes(&self.user_id, attrs).await {
            warn!(user_id = %self.user_id, error = %e, "Failed to persist plan attributes");
        }
    }
}

fn build_engine(
    catalog: &Arc<QuestionCatalog>,
    user_id: &str,
    attrs: AttributeStore,
) -> Result<DialogEngine, PlanError> {
    let mut engine = DialogEngine::new(Arc::clone(catalog), attrs)?;
    let user_id = user_id.to_string();
    engine.subscribe(Box::new(move |turns: &[DialogTurn]| {
        debug!(user_id = %user_id, new_turns = turns.len(), "Planning transcript grew");
    }));
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::planning::attributes::keys;
    use crate::planning::engine::{EXPORT_HINT, Speaker};
    use crate::store::LibSqlStore;

    async fn test_store() -> Arc<dyn PlanStore> {
        Arc::new(LibSqlStore::new_memory().await.unwrap())
    }

    async fn open(store: &Arc<dyn PlanStore>) -> PlanManager {
        PlanManager::open(Arc::clone(store), Arc::new(QuestionCatalog::standard()), "u1")
            .await
            .unwrap()
    }

    async fn complete(manager: &PlanManager) {
        for answer in ["3000", "1000", "no", "400", "medium"] {
            manager.handle_input(answer).await.unwrap();
        }
    }

    #[tokio::test]
    async fn answers_are_persisted_and_restored() {
        let store = test_store().await;
        let manager = open(&store).await;

        let reply = manager.handle_input("3000").await.unwrap();
        match reply {
            ManagerReply::Replied { outcome, turns } => {
                assert_eq!(
                    outcome,
                    SubmitOutcome::Asked {
                        question: keys::FIXED_EXPENSES
                    }
                );
                assert_eq!(turns.len(), 2);
                assert_eq!(turns[0].speaker, Speaker::User);
            }
            other => panic!("unexpected reply: {other:?}"),
        }

        let stored = store.load_plan_attributes("u1").await.unwrap();
        assert_eq!(stored.get(keys::MONTHLY_INCOME), Some("3000"));

        let resumed = open(&store).await;
        let status = resumed.status().await;
        assert_eq!(status.pending_question.as_deref(), Some(keys::FIXED_EXPENSES));
        assert_eq!(status.transcript.len(), 1);
    }

    #[tokio::test]
    async fn rejected_answer_is_not_an_error() {
        let store = test_store().await;
        let manager = open(&store).await;

        let reply = manager.handle_input("lots").await.unwrap();
        assert!(matches!(
            reply,
            ManagerReply::Replied {
                outcome: SubmitOutcome::Rejected { .. },
                ..
            }
        ));
        assert!(store.load_plan_attributes("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn export_after_conclusion_saves_budget() {
        let store = test_store().await;
        let manager = open(&store).await;
        complete(&manager).await;

        let status = manager.status().await;
        assert_eq!(status.state, EngineState::Concluded);
        assert_eq!(
            status.transcript.last().map(|t| t.text.as_str()),
            Some(EXPORT_HINT)
        );

        let turns_before = manager.transcript().await.len();
        let reply = manager.handle_input("plan export").await.unwrap();
        let ManagerReply::Exported { budget } = reply else {
            panic!("expected export");
        };
        assert_eq!(budget.monthly_budget, dec!(3000));
        assert_eq!(manager.transcript().await.len(), turns_before);
        assert_eq!(manager.last_budget().await.unwrap(), Some(budget));
    }

    #[tokio::test]
    async fn export_before_conclusion_is_an_answer() {
        let store = test_store().await;
        let manager = open(&store).await;

        let reply = manager.handle_input("export").await.unwrap();
        assert!(matches!(
            reply,
            ManagerReply::Replied {
                outcome: SubmitOutcome::Rejected { .. },
                ..
            }
        ));
        assert!(manager.last_budget().await.unwrap().is_none());
        assert!(matches!(manager.export().await, Err(Error::Plan(PlanError::NotReady))));
    }

    #[tokio::test]
    async fn export_before_conclusion_records_the_command_word() {
        let store = test_store().await;
        let manager = open(&store).await;

        manager.handle_input("  PLAN export ").await.unwrap();
        let transcript = manager.transcript().await;
        let user_turns: Vec<_> = transcript
            .iter()
            .filter(|t| t.speaker == Speaker::User)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(user_turns, vec!["export"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_answers_leave_store_matching_engine() {
        let store = test_store().await;
        let manager = Arc::new(open(&store).await);
        manager.handle_input("3000").await.unwrap();

        let first = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.handle_input("1000").await }
        });
        let second = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.handle_input("no").await }
        });
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let stored = store.load_plan_attributes("u1").await.unwrap();
        assert_eq!(stored, manager.status().await.attributes);
        assert!(stored.contains(keys::MONTHLY_INCOME));
    }

    #[tokio::test]
    async fn overflowing_stored_plan_starts_over() {
        let store = test_store().await;
        let max = rust_decimal::Decimal::MAX.to_string();
        store
            .save_plan_attributes(
                "u1",
                &AttributeStore::from_map([
                    (keys::MONTHLY_INCOME, "1"),
                    (keys::FIXED_EXPENSES, max.as_str()),
                    (keys::HAS_DEBT, "no"),
                    (keys::SAVINGS_GOAL, max.as_str()),
                    (keys::RISK_TOLERANCE, "low"),
                ]),
            )
            .await
            .unwrap();

        let manager = open(&store).await;
        assert_eq!(manager.status().await.state, EngineState::AwaitingAnswer);
        assert!(store.load_plan_attributes("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn restart_clears_everything() {
        let store = test_store().await;
        let manager = open(&store).await;
        complete(&manager).await;

        let reply = manager.handle_input("restart").await.unwrap();
        let ManagerReply::Restarted { turns } = reply else {
            panic!("expected restart");
        };
        assert_eq!(turns.len(), 1);
        assert_eq!(manager.status().await.state, EngineState::AwaitingAnswer);
        assert!(store.load_plan_attributes("u1").await.unwrap().is_empty());
        assert!(manager.recommendation().await.is_err());
    }

    #[tokio::test]
    async fn unusable_stored_plan_starts_over() {
        let store = test_store().await;
        store
            .save_plan_attributes(
                "u1",
                &AttributeStore::from_map([
                    (keys::MONTHLY_INCOME, "lots"),
                    (keys::FIXED_EXPENSES, "1000"),
                    (keys::HAS_DEBT, "no"),
                    (keys::SAVINGS_GOAL, "0"),
                ]),
            )
            .await
            .unwrap();

        let manager = open(&store).await;
        let status = manager.status().await;
        assert_eq!(status.pending_question.as_deref(), Some(keys::MONTHLY_INCOME));
        assert!(status.attributes.is_empty());
        assert!(store.load_plan_attributes("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn control_commands() {
        let store = test_store().await;
        let manager = open(&store).await;
        assert!(matches!(
            manager.handle_input("goto expense").await.unwrap(),
            ManagerReply::LeftPlanning
        ));
        assert!(matches!(
            manager.handle_input("bye").await.unwrap(),
            ManagerReply::Quit
        ));
        assert_eq!(manager.transcript().await.len(), 1);
    }
}
