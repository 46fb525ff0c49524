use serde::{Deserialize, Deserializer, Serialize};

use super::allocation::allocate;
use super::debt::{summarize_payoff, total_minimum_payment};
use super::projection::project;
use super::returns::ReturnSource;
use super::types::{
    AllocationConfig, FinancialPlan, FinancialProfile, GoalFund, GoalTarget, PlanOverview,
    ProjectionConfig, default_goal_targets,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct PlanConfig {
    /// Emergency fund.
    pub projection: ProjectionConfig,
    #[serde(deserialize_with = "retirement_overrides")]
    pub retirement: ProjectionConfig,
    /// Years to retirement set the retirement fund's horizon. At or past this age the
    /// profile horizon is used instead.
    pub retirement_age: u32,
    #[serde(deserialize_with = "goal_fund_overrides")]
    pub goal_fund: ProjectionConfig,
    pub goal_targets: Vec<GoalTarget>,
    pub allocation: AllocationConfig,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            projection: ProjectionConfig::default(),
            retirement: ProjectionConfig::retirement(),
            retirement_age: 60,
            goal_fund: ProjectionConfig::goal_fund(),
            goal_targets: default_goal_targets(),
            allocation: AllocationConfig::default(),
        }
    }
}

/// Partial projection settings. Absent fields keep the base config's values.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
struct ProjectionOverrides {
    investable_fraction: Option<f64>,
    annual_return: Option<f64>,
    contribution_step_up: Option<f64>,
    safe_annual_return: Option<f64>,
    target_income_multiple: Option<f64>,
}

impl ProjectionOverrides {
    fn apply(self, base: ProjectionConfig) -> ProjectionConfig {
        ProjectionConfig {
            investable_fraction: self.investable_fraction.unwrap_or(base.investable_fraction),
            annual_return: self.annual_return.unwrap_or(base.annual_return),
            contribution_step_up: self
                .contribution_step_up
                .unwrap_or(base.contribution_step_up),
            safe_annual_return: self.safe_annual_return.unwrap_or(base.safe_annual_return),
            target_income_multiple: self
                .target_income_multiple
                .unwrap_or(base.target_income_multiple),
        }
    }
}

fn retirement_overrides<'de, D>(deserializer: D) -> Result<ProjectionConfig, D::Error>
where
    D: Deserializer<'de>,
{
    ProjectionOverrides::deserialize(deserializer).map(|o| o.apply(ProjectionConfig::retirement()))
}

fn goal_fund_overrides<'de, D>(deserializer: D) -> Result<ProjectionConfig, D::Error>
where
    D: Deserializer<'de>,
{
    ProjectionOverrides::deserialize(deserializer).map(|o| o.apply(ProjectionConfig::goal_fund()))
}

/// Runs every engine over one profile. Without an explicit debt budget the plan pays
/// the minimums only.
pub fn build_plan<R: ReturnSource + ?Sized>(
    profile: &FinancialProfile,
    config: &PlanConfig,
    returns: &mut R,
) -> FinancialPlan {
    let emergency_fund = project(
        profile.income,
        profile.savings,
        profile.time_horizon_years,
        &config.projection,
    );
    let retirement_fund = project(
        profile.income,
        profile.savings,
        retirement_horizon(profile, config.retirement_age),
        &config.retirement,
    );
    let goal_funds = goal_funds(profile, config);
    let allocation = allocate(
        profile.income,
        profile.savings,
        profile.time_horizon_years,
        &config.allocation,
        returns,
    );
    let budget = profile
        .debt_budget
        .unwrap_or_else(|| total_minimum_payment(&profile.debts));
    let debt = summarize_payoff(&profile.debts, budget);

    FinancialPlan {
        overview: overview(profile, allocation.investable_monthly, debt.total_debt),
        emergency_fund,
        retirement_fund,
        goal_funds,
        allocation,
        debt,
    }
}

fn retirement_horizon(profile: &FinancialProfile, retirement_age: u32) -> u32 {
    if profile.age < retirement_age {
        retirement_age - profile.age
    } else {
        profile.time_horizon_years
    }
}

/// One fund per selected goal, in selection order. Goals without a target are skipped.
fn goal_funds(profile: &FinancialProfile, config: &PlanConfig) -> Vec<GoalFund> {
    let mut funds: Vec<GoalFund> = Vec::with_capacity(profile.goals.len());
    for &goal in &profile.goals {
        if funds.iter().any(|fund| fund.goal == goal) {
            continue;
        }
        let Some(target) = config.goal_targets.iter().find(|t| t.goal == goal) else {
            continue;
        };
        let fund_config = ProjectionConfig {
            target_income_multiple: target.income_multiple,
            ..config.goal_fund.clone()
        };
        funds.push(GoalFund {
            goal,
            projection: project(
                profile.income,
                profile.savings,
                profile.time_horizon_years,
                &fund_config,
            ),
        });
    }
    funds
}

fn overview(profile: &FinancialProfile, invested_monthly: f64, total_debt: f64) -> PlanOverview {
    let share_of_income = |amount: f64| {
        if profile.income > 0.0 {
            amount / profile.income * 100.0
        } else {
            0.0
        }
    };

    PlanOverview {
        monthly_income: profile.income,
        monthly_expenses: profile.expenses,
        monthly_savings: profile.savings,
        savings_rate: share_of_income(profile.savings),
        investment_rate: share_of_income(invested_monthly),
        total_debt,
        age: profile.age,
        time_horizon_years: profile.time_horizon_years,
        goals: profile.goals.clone(),
    }
}
