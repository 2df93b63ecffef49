//! Planning system: conversational budget interview.
//!
//! A `DialogEngine` asks the questions of a `QuestionCatalog` one at a time,
//! validating each answer into the `AttributeStore`. When no question is
//! eligible any more it turns the attributes into a `Recommendation`.
//! `PlanManager` ties an engine to persistence and the command surface.

pub mod attributes;
pub mod catalog;
pub mod command;
pub mod engine;
pub mod manager;
pub mod question;
pub mod recommendation;
pub mod routes;
pub mod state;

pub use attributes::{AttributeStore, AttributeUpdates};
pub use catalog::{AllocationPolicy, QuestionCatalog, RiskTolerance};
pub use command::{PlanCommand, PlanCommandParser};
pub use engine::{DialogEngine, DialogTurn, Speaker, SubmitOutcome, TurnListener};
pub use manager::{ManagerReply, PlanManager, PlanStatus};
pub use question::Question;
pub use recommendation::{Budget, Recommendation};
pub use routes::{PlanRouteState, plan_routes, serve_plan_api};
pub use state::EngineState;
