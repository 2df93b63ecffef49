//! Question catalog: the static question pool and the allocation formula.
//!
//! The catalog holds no session data. Eligibility is recomputed from the full
//! pool on every call because an answer can unlock a later question or retire
//! one that was eligible a moment ago (answering "no" to the debt question
//! retires the repayment question).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::attributes::{AttributeStore, AttributeUpdates, keys};
use super::question::{Question, flag_value, parse_amount, parse_choice, parse_yes_no_amount};
use super::recommendation::Recommendation;
use crate::error::PlanError;

/// Allocation category names.
pub mod categories {
    pub const FIXED_EXPENSES: &str = "fixed_expenses";
    pub const DEBT_REPAYMENT: &str = "debt_repayment";
    pub const EMERGENCY_FUND: &str = "emergency_fund";
    pub const INVESTMENTS: &str = "investments";
    pub const FOOD: &str = "food";
    pub const TRANSPORT: &str = "transport";
    pub const ENTERTAINMENT: &str = "entertainment";
    pub const SHOPPING: &str = "shopping";
    pub const MISCELLANEOUS: &str = "miscellaneous";
}

/// How much investment risk the user is comfortable with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTolerance {
    Low,
    Medium,
    High,
}

impl RiskTolerance {
    pub const OPTIONS: [&'static str; 3] = ["low", "medium", "high"];
}

impl FromStr for RiskTolerance {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(()),
        }
    }
}

impl fmt::Display for RiskTolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        write!(f, "{s}")
    }
}

/// Fixed ratios used by the recommendation formula.
///
/// In each split the last entry receives whatever remains after rounding the
/// others to cents, so the parts always add up to the whole.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationPolicy {
    /// Shares of the money left after fixed costs, debt and savings.
    pub discretionary: Vec<(&'static str, Decimal)>,
    /// Share of the savings goal that goes to investments (rest: emergency fund).
    pub low_risk_investment_share: Decimal,
    pub medium_risk_investment_share: Decimal,
    pub high_risk_investment_share: Decimal,
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self {
            discretionary: vec![
                (categories::FOOD, dec!(0.40)),
                (categories::TRANSPORT, dec!(0.20)),
                (categories::ENTERTAINMENT, dec!(0.15)),
                (categories::SHOPPING, dec!(0.15)),
                (categories::MISCELLANEOUS, dec!(0.10)),
            ],
            low_risk_investment_share: dec!(0.20),
            medium_risk_investment_share: dec!(0.50),
            high_risk_investment_share: dec!(0.80),
        }
    }
}

impl AllocationPolicy {
    fn investment_share(&self, risk: RiskTolerance) -> Decimal {
        match risk {
            RiskTolerance::Low => self.low_risk_investment_share,
            RiskTolerance::Medium => self.medium_risk_investment_share,
            RiskTolerance::High => self.high_risk_investment_share,
        }
    }
}

/// The full question pool, in priority order, plus the allocation policy.
#[derive(Debug, Clone)]
pub struct QuestionCatalog {
    questions: Vec<Question>,
    policy: AllocationPolicy,
}

impl QuestionCatalog {
    /// Build a catalog from questions in priority order.
    pub fn new(questions: Vec<Question>, policy: AllocationPolicy) -> Self {
        Self { questions, policy }
    }

    /// The budget-planning interview.
    pub fn standard() -> Self {
        Self::new(standard_questions(), AllocationPolicy::default())
    }

    /// Replace the allocation policy.
    pub fn with_policy(mut self, policy: AllocationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn policy(&self) -> &AllocationPolicy {
        &self.policy
    }

    /// Look up a question by key.
    pub fn question(&self, key: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.key() == key)
    }

    /// Every question that is eligible and not yet fully answered, in
    /// declaration order.
    pub fn eligible_questions<'a>(
        &'a self,
        attrs: &'a AttributeStore,
    ) -> impl Iterator<Item = &'a Question> + 'a {
        self.questions
            .iter()
            .filter(move |q| !q.is_answered(attrs) && q.is_eligible(attrs))
    }

    /// The question to ask next, or `None` when ready to recommend.
    pub fn next_question(&self, attrs: &AttributeStore) -> Option<&Question> {
        self.questions
            .iter()
            .find(|q| !q.is_answered(attrs) && q.is_eligible(attrs))
    }

    /// Compute the budget recommendation. Pure: identical attributes always
    /// produce an identical recommendation.
    pub fn recommend(&self, attrs: &AttributeStore) -> Result<Recommendation, PlanError> {
        let income = required_amount(attrs, keys::MONTHLY_INCOME)?;
        let fixed = required_amount(attrs, keys::FIXED_EXPENSES)?;
        let has_debt = required_flag(attrs, keys::HAS_DEBT)?;
        let debt = if has_debt {
            required_amount(attrs, keys::DEBT_PAYMENT)?
        } else {
            Decimal::ZERO
        };
        let savings = required_amount(attrs, keys::SAVINGS_GOAL)?;
        let risk = if savings > Decimal::ZERO {
            Some(required_risk(attrs)?)
        } else {
            None
        };

        let mut committed = fixed;
        for (key, amount) in [(keys::DEBT_PAYMENT, debt), (keys::SAVINGS_GOAL, savings)] {
            committed = committed
                .checked_add(amount)
                .ok_or_else(|| invalid(key, &amount.to_string()))?;
        }
        let leftover = income
            .checked_sub(committed)
            .ok_or_else(|| invalid(keys::MONTHLY_INCOME, &income.to_string()))?;
        let discretionary = cents(leftover.max(Decimal::ZERO));

        let mut allocations = BTreeMap::new();
        allocations.insert(categories::FIXED_EXPENSES.to_string(), cents(fixed));
        if has_debt {
            allocations.insert(categories::DEBT_REPAYMENT.to_string(), cents(debt));
        }
        if let Some(risk) = risk {
            let invest = self.policy.investment_share(risk);
            let split = split_cents(
                cents(savings),
                &[
                    (categories::INVESTMENTS, invest),
                    (categories::EMERGENCY_FUND, Decimal::ONE - invest),
                ],
            );
            allocations.extend(split);
        }
        allocations.extend(split_cents(discretionary, &self.policy.discretionary));

        let mut summary = format!(
            "Based on a monthly income of {}, after {} of fixed expenses",
            money(income),
            money(fixed)
        );
        if has_debt {
            summary.push_str(&format!(", {} of debt repayment", money(debt)));
        }
        summary.push_str(&format!(" and a savings goal of {}", money(savings)));
        if let Some(risk) = risk {
            summary.push_str(&format!(" ({risk} risk tolerance)"));
        }
        if leftover < Decimal::ZERO {
            summary.push_str(&format!(
                ", your commitments exceed your income by {} so there is nothing left for day-to-day spending.",
                money(-leftover)
            ));
        } else {
            summary.push_str(&format!(
                ", you have {} left for day-to-day spending each month.",
                money(discretionary)
            ));
        }

        Ok(Recommendation::new(allocations, summary))
    }
}

impl Default for QuestionCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

// ── Standard questions ─────────────────────────────────────────────────

fn standard_questions() -> Vec<Question> {
    vec![
        Question::new(keys::MONTHLY_INCOME, "What is your monthly income?")
            .parse_with(parse_income),
        Question::new(
            keys::FIXED_EXPENSES,
            "How much do you spend each month on fixed expenses like rent, utilities and insurance?",
        )
        .eligible_when(|attrs| attrs.contains(keys::MONTHLY_INCOME))
        .parse_with(parse_fixed_expenses),
        Question::new(
            keys::HAS_DEBT,
            "Do you have any outstanding debt? (e.g. \"no\", \"yes\" or \"yes, $500\" per month)",
        )
        .eligible_when(|attrs| attrs.contains(keys::FIXED_EXPENSES))
        .parse_with(parse_has_debt),
        Question::new(
            keys::DEBT_PAYMENT,
            "How much do you pay towards your debt each month?",
        )
        .eligible_when(|attrs| attrs.flag(keys::HAS_DEBT) == Some(true))
        .parse_with(parse_debt_payment),
        Question::new(
            keys::SAVINGS_GOAL,
            "How much would you like to save each month?",
        )
        .eligible_when(|attrs| match attrs.flag(keys::HAS_DEBT) {
            Some(true) => attrs.contains(keys::DEBT_PAYMENT),
            Some(false) => true,
            None => false,
        })
        .parse_with(parse_savings_goal),
        Question::new(
            keys::RISK_TOLERANCE,
            "How much risk are you comfortable taking with your savings? (low, medium or high)",
        )
        .eligible_when(
            |attrs| matches!(attrs.decimal(keys::SAVINGS_GOAL), Some(Ok(goal)) if goal > Decimal::ZERO),
        )
        .parse_with(parse_risk_tolerance),
    ]
}

fn single(key: &str, value: impl Into<String>) -> AttributeUpdates {
    AttributeUpdates::from([(key.to_string(), value.into())])
}

/// Money still unallocated after the listed commitments, if readable.
fn available(attrs: &AttributeStore, deductions: &[&str]) -> Option<Decimal> {
    let mut left = attrs.decimal(keys::MONTHLY_INCOME)?.ok()?;
    for key in deductions {
        if let Some(Ok(amount)) = attrs.decimal(key) {
            left -= amount;
        }
    }
    Some(left)
}

fn check_within(amount: Decimal, limit: Option<Decimal>, what: &str) -> Result<(), PlanError> {
    match limit {
        Some(limit) if amount > limit => Err(PlanError::validation(format!(
            "That's more than the {} you have available for {what}. Please enter a smaller amount.",
            money(limit.max(Decimal::ZERO))
        ))),
        _ => Ok(()),
    }
}

fn parse_income(answer: &str, _: &AttributeStore) -> Result<AttributeUpdates, PlanError> {
    let income = parse_amount(answer)?;
    if income.is_zero() {
        return Err(PlanError::validation(
            "Your monthly income needs to be more than zero to plan a budget.",
        ));
    }
    Ok(single(keys::MONTHLY_INCOME, income.to_string()))
}

fn parse_fixed_expenses(answer: &str, attrs: &AttributeStore) -> Result<AttributeUpdates, PlanError> {
    let fixed = parse_amount(answer)?;
    check_within(fixed, available(attrs, &[]), "fixed expenses")?;
    Ok(single(keys::FIXED_EXPENSES, fixed.to_string()))
}

fn parse_has_debt(answer: &str, attrs: &AttributeStore) -> Result<AttributeUpdates, PlanError> {
    let (has_debt, payment) = parse_yes_no_amount(answer)?;
    let mut updates = single(keys::HAS_DEBT, flag_value(has_debt));
    if let Some(payment) = payment {
        check_within(
            payment,
            available(attrs, &[keys::FIXED_EXPENSES]),
            "debt repayment",
        )?;
        updates.insert(keys::DEBT_PAYMENT.to_string(), payment.to_string());
    }
    Ok(updates)
}

fn parse_debt_payment(answer: &str, attrs: &AttributeStore) -> Result<AttributeUpdates, PlanError> {
    let payment = parse_amount(answer)?;
    check_within(
        payment,
        available(attrs, &[keys::FIXED_EXPENSES]),
        "debt repayment",
    )?;
    Ok(single(keys::DEBT_PAYMENT, payment.to_string()))
}

fn parse_savings_goal(answer: &str, attrs: &AttributeStore) -> Result<AttributeUpdates, PlanError> {
    let goal = parse_amount(answer)?;
    let mut deductions = vec![keys::FIXED_EXPENSES];
    if attrs.flag(keys::HAS_DEBT) == Some(true) {
        deductions.push(keys::DEBT_PAYMENT);
    }
    check_within(goal, available(attrs, &deductions), "savings")?;
    Ok(single(keys::SAVINGS_GOAL, goal.to_string()))
}

fn parse_risk_tolerance(answer: &str, _: &AttributeStore) -> Result<AttributeUpdates, PlanError> {
    let choice = parse_choice(answer, &RiskTolerance::OPTIONS)?;
    Ok(single(keys::RISK_TOLERANCE, choice))
}

// ── Formula helpers ────────────────────────────────────────────────────

fn required_amount(attrs: &AttributeStore, key: &str) -> Result<Decimal, PlanError> {
    match attrs.decimal(key) {
        None => Err(PlanError::missing(key)),
        Some(Ok(amount)) if amount >= Decimal::ZERO => Ok(amount),
        Some(Ok(amount)) => Err(invalid(key, &amount.to_string())),
        Some(Err(raw)) => Err(invalid(key, &raw)),
    }
}

fn required_flag(attrs: &AttributeStore, key: &str) -> Result<bool, PlanError> {
    let raw = attrs.get(key).ok_or_else(|| PlanError::missing(key))?;
    attrs.flag(key).ok_or_else(|| invalid(key, raw))
}

fn required_risk(attrs: &AttributeStore) -> Result<RiskTolerance, PlanError> {
    let raw = attrs
        .get(keys::RISK_TOLERANCE)
        .ok_or_else(|| PlanError::missing(keys::RISK_TOLERANCE))?;
    raw.parse().map_err(|_| invalid(keys::RISK_TOLERANCE, raw))
}

fn invalid(key: &str, value: &str) -> PlanError {
    PlanError::InvalidAttribute {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub(crate) fn money(amount: Decimal) -> String {
    format!("${:.2}", cents(amount))
}

/// Split `total` (already in cents) by `shares`; the last share takes the
/// remainder. Parts are never negative and always sum to `total`.
fn split_cents(total: Decimal, shares: &[(&'static str, Decimal)]) -> Vec<(String, Decimal)> {
    let mut remaining = total;
    let mut parts = Vec::with_capacity(shares.len());
    for (i, (name, share)) in shares.iter().enumerate() {
        let part = if i + 1 == shares.len() {
            remaining
        } else {
            cents(total * share).min(remaining).max(Decimal::ZERO)
        };
        remaining -= part;
        parts.push((name.to_string(), part));
    }
    parts
}
