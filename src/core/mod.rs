mod allocation;
mod debt;
mod plan;
mod projection;
mod returns;
mod types;

pub use allocation::{allocate, select_tier};
pub use debt::{estimate_payoff_months, plan_payoff, summarize_payoff, total_minimum_payment};
pub use plan::{PlanConfig, build_plan};
pub use projection::project;
pub use returns::{FixedReturns, ReturnSource, RngReturns};
pub use types::{
    AllocationConfig, AllocationResult, AllocationTier, AssetClass, AssetReturns,
    BucketProjection, DebtItem, DebtPlan, DebtPlanEntry, FinancialGoal, FinancialPlan,
    FinancialProfile, GoalFund, GoalTarget, MAX_HORIZON_YEARS, MissingInput, MutualFundSplit,
    PlanOverview, ProfileField, ProjectionConfig, ProjectionResult, TierName, TierRule,
    default_goal_targets, default_tier_rules,
};
