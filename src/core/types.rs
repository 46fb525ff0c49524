use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinancialGoal {
    Phone,
    Car,
    Home,
    Education,
    Vacation,
    Wedding,
}

/// Longest horizon the engines simulate. Larger horizons are capped to it.
pub const MAX_HORIZON_YEARS: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DebtItem {
    pub name: String,
    pub balance: f64,
    /// Annual rate in percent, e.g. 18.0.
    pub interest_rate: f64,
    pub minimum_payment: f64,
}

/// Monthly figures for one user. `savings` is the monthly amount available to invest.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialProfile {
    pub income: f64,
    pub savings: f64,
    pub expenses: f64,
    pub age: u32,
    pub time_horizon_years: u32,
    pub location: Option<String>,
    pub debts: Vec<DebtItem>,
    pub goals: Vec<FinancialGoal>,
    pub debt_budget: Option<f64>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ProfileField {
    Income,
    Savings,
    TimeHorizon,
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileField::Income => f.write_str("income"),
            ProfileField::Savings => f.write_str("savings"),
            ProfileField::TimeHorizon => f.write_str("time horizon"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing {}", join_fields(.0))]
pub struct MissingInput(pub Vec<ProfileField>);

fn join_fields(fields: &[ProfileField]) -> String {
    let names = fields.iter().map(ToString::to_string).collect::<Vec<_>>();
    match names.as_slice() {
        [] => String::new(),
        [only] => only.clone(),
        [head @ .., last] => format!("{} and {last}", head.join(", ")),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectionConfig {
    pub investable_fraction: f64,
    pub annual_return: f64,
    pub contribution_step_up: f64,
    pub safe_annual_return: f64,
    pub target_income_multiple: f64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            investable_fraction: 0.05,
            annual_return: 0.05,
            contribution_step_up: 0.055,
            safe_annual_return: 0.06,
            target_income_multiple: 6.0,
        }
    }
}

impl ProjectionConfig {
    /// Retirement corpus of 25 years of income, built from a larger share of savings.
    pub fn retirement() -> Self {
        Self {
            investable_fraction: 0.15,
            annual_return: 0.10,
            contribution_step_up: 0.055,
            safe_annual_return: 0.07,
            target_income_multiple: 300.0,
        }
    }

    /// Shared settings for goal funds. The target multiple is replaced per goal.
    pub fn goal_fund() -> Self {
        Self {
            investable_fraction: 0.05,
            annual_return: 0.07,
            contribution_step_up: 0.055,
            safe_annual_return: 0.06,
            target_income_multiple: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionResult {
    pub is_valid: bool,
    pub future_value: f64,
    pub years_to_target: u32,
    pub months_to_target: u32,
    pub target_amount: f64,
    /// Projected value as a share of the target, capped at 100.
    pub percent_complete: f64,
    pub monthly_contribution: f64,
    pub target_reached: bool,
    pub missing: Vec<ProfileField>,
}

impl ProjectionResult {
    pub fn invalid(missing: Vec<ProfileField>) -> Self {
        Self {
            is_valid: false,
            future_value: 0.0,
            years_to_target: 0,
            months_to_target: 0,
            target_amount: 0.0,
            percent_complete: 0.0,
            monthly_contribution: 0.0,
            target_reached: false,
            missing,
        }
    }

    pub fn missing_input(&self) -> Option<MissingInput> {
        if self.is_valid {
            None
        } else {
            Some(MissingInput(self.missing.clone()))
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TierName {
    Conservative,
    Balanced,
    Growth,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetClass {
    LargeCapFund,
    MidCapFund,
    SmallCapFund,
    Gold,
    DirectEquity,
    Speculative,
}

/// Risk-band split of the mutual-fund aggregate, in percent of the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MutualFundSplit {
    pub large_cap: f64,
    pub mid_cap: f64,
    pub small_cap: f64,
}

impl MutualFundSplit {
    pub fn total(self) -> f64 {
        self.large_cap + self.mid_cap + self.small_cap
    }
}

/// Bucket percentages of the investable amount. The remainder stays as cash.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AllocationTier {
    pub name: TierName,
    pub mutual_funds: f64,
    pub fund_split: MutualFundSplit,
    pub gold: f64,
    pub direct_equity: f64,
    pub speculative: f64,
}

/// A tier applies when both thresholds hold. `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TierRule {
    pub below_annual_income: Option<f64>,
    pub below_savings: Option<f64>,
    pub tier: AllocationTier,
}

impl TierRule {
    pub fn matches(&self, annual_income: f64, savings: f64) -> bool {
        self.below_annual_income.is_none_or(|limit| annual_income < limit)
            && self.below_savings.is_none_or(|limit| savings < limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct AssetReturns {
    pub large_cap: f64,
    pub mid_cap: f64,
    pub small_cap: f64,
    pub gold: f64,
    pub direct_equity: f64,
    /// Shown to the user only; the speculative bucket is simulated from draws.
    pub speculative_expected: f64,
}

impl Default for AssetReturns {
    fn default() -> Self {
        Self {
            large_cap: 0.12,
            mid_cap: 0.14,
            small_cap: 0.16,
            gold: 0.08,
            direct_equity: 0.13,
            speculative_expected: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct AllocationConfig {
    pub investable_fraction: f64,
    pub contribution_step_up: f64,
    pub returns: AssetReturns,
    pub speculative_monthly_min: f64,
    pub speculative_monthly_max: f64,
    pub tiers: Vec<TierRule>,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            investable_fraction: 0.5,
            contribution_step_up: 0.10,
            returns: AssetReturns::default(),
            speculative_monthly_min: -0.10,
            speculative_monthly_max: 0.20,
            tiers: default_tier_rules(),
        }
    }
}

pub fn default_tier_rules() -> Vec<TierRule> {
    vec![
        TierRule {
            below_annual_income: Some(600_000.0),
            below_savings: Some(10_000.0),
            tier: AllocationTier {
                name: TierName::Conservative,
                mutual_funds: 70.0,
                fund_split: MutualFundSplit {
                    large_cap: 60.0,
                    mid_cap: 30.0,
                    small_cap: 10.0,
                },
                gold: 15.0,
                direct_equity: 5.0,
                speculative: 0.0,
            },
        },
        TierRule {
            below_annual_income: Some(1_500_000.0),
            below_savings: Some(40_000.0),
            tier: AllocationTier {
                name: TierName::Balanced,
                mutual_funds: 65.0,
                fund_split: MutualFundSplit {
                    large_cap: 50.0,
                    mid_cap: 30.0,
                    small_cap: 20.0,
                },
                gold: 10.0,
                direct_equity: 15.0,
                speculative: 0.0,
            },
        },
        TierRule {
            below_annual_income: None,
            below_savings: None,
            tier: AllocationTier {
                name: TierName::Growth,
                mutual_funds: 55.0,
                fund_split: MutualFundSplit {
                    large_cap: 40.0,
                    mid_cap: 35.0,
                    small_cap: 25.0,
                },
                gold: 10.0,
                direct_equity: 20.0,
                speculative: 10.0,
            },
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketProjection {
    pub asset: AssetClass,
    /// Percent of the investable monthly amount.
    pub percentage: f64,
    /// First-year monthly contribution.
    pub monthly_amount: f64,
    pub annual_return: f64,
    pub future_value: f64,
    pub stochastic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationResult {
    pub tier: TierName,
    pub investable_monthly: f64,
    pub buckets: Vec<BucketProjection>,
    pub total_future_value: f64,
    pub total_contributed: f64,
    pub overall_return_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtPlanEntry {
    pub debt: DebtItem,
    pub position: usize,
    pub assigned_payment: f64,
    pub extra_payment: f64,
    /// `None` when the assigned payment can never clear the balance.
    pub months_to_payoff: Option<u32>,
}

impl DebtPlanEntry {
    pub fn has_extra(&self) -> bool {
        self.extra_payment > 0.0
    }

    pub fn payoff_years(&self) -> Option<u32> {
        self.months_to_payoff.map(|months| months / 12)
    }

    pub fn payoff_remainder_months(&self) -> Option<u32> {
        self.months_to_payoff.map(|months| months % 12)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtPlan {
    pub entries: Vec<DebtPlanEntry>,
    pub total_debt: f64,
    pub total_minimum_payment: f64,
    pub extra_payment: f64,
    pub months_to_debt_free: Option<u32>,
    pub average_interest_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOverview {
    pub monthly_income: f64,
    pub monthly_expenses: f64,
    pub monthly_savings: f64,
    pub savings_rate: f64,
    /// Monthly amount placed in the asset buckets as a percent of income.
    pub investment_rate: f64,
    pub total_debt: f64,
    pub age: u32,
    pub time_horizon_years: u32,
    pub goals: Vec<FinancialGoal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialPlan {
    pub overview: PlanOverview,
    pub emergency_fund: ProjectionResult,
    pub retirement_fund: ProjectionResult,
    pub goal_funds: Vec<GoalFund>,
    pub allocation: AllocationResult,
    pub debt: DebtPlan,
}

/// Target fund for one selected goal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalFund {
    pub goal: FinancialGoal,
    #[serde(flatten)]
    pub projection: ProjectionResult,
}

/// Goal target expressed as a multiple of monthly income.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GoalTarget {
    pub goal: FinancialGoal,
    pub income_multiple: f64,
}

pub fn default_goal_targets() -> Vec<GoalTarget> {
    [
        (FinancialGoal::Phone, 1.5),
        (FinancialGoal::Vacation, 3.0),
        (FinancialGoal::Car, 12.0),
        (FinancialGoal::Wedding, 20.0),
        (FinancialGoal::Education, 30.0),
        (FinancialGoal::Home, 60.0),
    ]
    .into_iter()
    .map(|(goal, income_multiple)| GoalTarget {
        goal,
        income_multiple,
    })
    .collect()
}
