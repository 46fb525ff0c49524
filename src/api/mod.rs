mod error;

use axum::{
    Router,
    extract::{Json, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

use crate::core::{
    AllocationResult, DebtItem, DebtPlan, FinancialGoal, FinancialPlan, FinancialProfile,
    PlanConfig, ProjectionConfig, ProjectionResult, RngReturns, allocate, build_plan, project, summarize_payoff,
    total_minimum_payment,
};

pub use error::{ApiError, ApiResult};

/// Inclusive bounds applied to present, non-zero inputs.
#[derive(Copy, Clone, Debug)]
struct FieldBounds {
    min: f64,
    max: f64,
}

const INCOME_BOUNDS: FieldBounds = FieldBounds {
    min: 1_000.0,
    max: 10_000_000.0,
};
const SAVINGS_BOUNDS: FieldBounds = FieldBounds {
    min: 0.0,
    max: 10_000_000.0,
};
const EXPENSES_BOUNDS: FieldBounds = FieldBounds {
    min: 0.0,
    max: 5_000_000.0,
};
const DEBT_BALANCE_BOUNDS: FieldBounds = FieldBounds {
    min: 0.0,
    max: 10_000_000.0,
};
const AGE_BOUNDS: (u32, u32) = (18, 100);
const HORIZON_BOUNDS: (u32, u32) = (1, 40);
const DEFAULT_AGE: u32 = 30;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
struct ProfilePayload {
    income: Option<f64>,
    #[serde(alias = "monthlySavings")]
    savings: Option<f64>,
    expenses: Option<f64>,
    age: Option<u32>,
    #[serde(alias = "timeHorizonYears")]
    time_horizon: Option<u32>,
    location: Option<String>,
    debts: Vec<DebtItem>,
    #[serde(alias = "financialGoals")]
    goals: Vec<FinancialGoal>,
    debt_budget: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
struct PlanRequest {
    profile: ProfilePayload,
    config: PlanConfig,
    seed: Option<u64>,
}

#[derive(Debug)]
struct ResolvedRequest {
    profile: FinancialProfile,
    config: PlanConfig,
    seed: Option<u64>,
}

impl ResolvedRequest {
    fn returns(&self) -> RngReturns<StdRng> {
        match self.seed {
            Some(seed) => RngReturns::seeded(seed),
            None => RngReturns::from_os_rng(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanResponse {
    #[serde(flatten)]
    plan: FinancialPlan,
    warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectionResponse {
    #[serde(flatten)]
    projection: ProjectionResult,
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Parser, Debug)]
#[command(
    name = "fundplan",
    about = "Personal finance planner: target-fund projection, tiered allocation and avalanche debt payoff"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
    #[arg(
        long,
        global = true,
        default_value = "info",
        help = "Log level when RUST_LOG is unset"
    )]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the JSON API over HTTP.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Compute a full plan and print it as JSON.
    Plan(PlanArgs),
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    #[arg(long, help = "Monthly income")]
    income: f64,
    #[arg(long, help = "Monthly savings; defaults to income minus expenses")]
    savings: Option<f64>,
    #[arg(long, default_value_t = 0.0, help = "Monthly expenses")]
    expenses: f64,
    #[arg(long, default_value_t = DEFAULT_AGE)]
    age: u32,
    #[arg(long, default_value_t = 15, help = "Planning horizon in years")]
    time_horizon: u32,
    #[arg(
        long = "debt",
        value_parser = parse_debt,
        help = "Debt as name:balance:annual-rate-percent:minimum-payment, repeatable"
    )]
    debts: Vec<DebtItem>,
    #[arg(
        long = "goal",
        value_parser = parse_goal,
        help = "Goal to fund: phone, car, home, education, vacation or wedding; repeatable"
    )]
    goals: Vec<FinancialGoal>,
    #[arg(long, default_value_t = 60, help = "Age the retirement fund is projected to")]
    retirement_age: u32,
    #[arg(long, help = "Monthly debt budget; defaults to the sum of minimum payments")]
    debt_budget: Option<f64>,
    #[arg(long, help = "Seed for the speculative bucket; random when omitted")]
    seed: Option<u64>,
    #[arg(
        long,
        default_value_t = 5.0,
        help = "Share of monthly savings contributed to the target fund in percent"
    )]
    fund_contribution_rate: f64,
    #[arg(
        long,
        default_value_t = 5.0,
        help = "Annual return while accumulating in percent"
    )]
    annual_return: f64,
    #[arg(
        long,
        default_value_t = 5.5,
        help = "Annual step-up of the fund contribution in percent"
    )]
    contribution_step_up: f64,
    #[arg(
        long,
        default_value_t = 6.0,
        help = "Annual return once the target is reached in percent"
    )]
    safe_return: f64,
    #[arg(long, default_value_t = 6.0, help = "Target fund as a multiple of income")]
    target_multiple: f64,
    #[arg(
        long,
        default_value_t = 50.0,
        help = "Share of savings invested across asset buckets in percent"
    )]
    investable_rate: f64,
    #[arg(
        long,
        default_value_t = 10.0,
        help = "Annual step-up of bucket contributions in percent"
    )]
    allocation_step_up: f64,
}

fn parse_debt(raw: &str) -> Result<DebtItem, String> {
    let parts = raw.split(':').collect::<Vec<_>>();
    let &[name, balance, rate, minimum] = parts.as_slice() else {
        return Err(format!("expected name:balance:rate:minimum, got {raw:?}"));
    };
    let number = |label: &str, value: &str| {
        value
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid {label} {value:?}: {e}"))
    };

    Ok(DebtItem {
        name: name.trim().to_string(),
        balance: number("balance", balance)?,
        interest_rate: number("rate", rate)?,
        minimum_payment: number("minimum", minimum)?,
    })
}

fn parse_goal(raw: &str) -> Result<FinancialGoal, String> {
    let name = serde_json::Value::String(raw.trim().to_lowercase());
    serde_json::from_value(name).map_err(|_| format!("unknown goal {raw:?}"))
}

fn resolve_plan_args(args: PlanArgs) -> ApiResult<ResolvedRequest> {
    let mut config = PlanConfig::default();
    config.projection.investable_fraction = args.fund_contribution_rate / 100.0;
    config.projection.annual_return = args.annual_return / 100.0;
    config.projection.contribution_step_up = args.contribution_step_up / 100.0;
    config.projection.safe_annual_return = args.safe_return / 100.0;
    config.projection.target_income_multiple = args.target_multiple;
    config.allocation.investable_fraction = args.investable_rate / 100.0;
    config.allocation.contribution_step_up = args.allocation_step_up / 100.0;
    config.retirement_age = args.retirement_age;

    resolve_request(PlanRequest {
        profile: ProfilePayload {
            income: Some(args.income),
            savings: args.savings,
            expenses: Some(args.expenses),
            age: Some(args.age),
            time_horizon: Some(args.time_horizon),
            location: None,
            debts: args.debts,
            goals: args.goals,
            debt_budget: args.debt_budget,
        },
        config,
        seed: args.seed,
    })
}

pub fn run_cli_plan(args: PlanArgs) -> ApiResult<String> {
    let request = resolve_plan_args(args)?;
    let response = plan_response(&request);
    Ok(serde_json::to_string_pretty(&response)?)
}

fn resolve_request(request: PlanRequest) -> ApiResult<ResolvedRequest> {
    validate_config(&request.config)?;
    let profile = build_profile(request.profile)?;
    Ok(ResolvedRequest {
        profile,
        config: request.config,
        seed: request.seed,
    })
}

fn require_finite(field: &str, value: Option<f64>) -> ApiResult<()> {
    match value {
        Some(v) if !v.is_finite() => Err(ApiError::validation(field, "must be a finite number")),
        _ => Ok(()),
    }
}

/// Zero and absent stay zero so the engines can report them as missing.
fn clamp_amount(value: Option<f64>, bounds: FieldBounds) -> f64 {
    match value {
        Some(v) if v > 0.0 => v.clamp(bounds.min, bounds.max),
        _ => 0.0,
    }
}

fn clamp_count(value: Option<u32>, (min, max): (u32, u32)) -> u32 {
    match value {
        Some(v) if v > 0 => v.clamp(min, max),
        _ => 0,
    }
}

fn build_profile(payload: ProfilePayload) -> ApiResult<FinancialProfile> {
    require_finite("income", payload.income)?;
    require_finite("savings", payload.savings)?;
    require_finite("expenses", payload.expenses)?;
    require_finite("debtBudget", payload.debt_budget)?;

    let mut debts = Vec::with_capacity(payload.debts.len());
    for (idx, debt) in payload.debts.into_iter().enumerate() {
        require_finite(&format!("debts[{idx}].balance"), Some(debt.balance))?;
        require_finite(&format!("debts[{idx}].interestRate"), Some(debt.interest_rate))?;
        require_finite(
            &format!("debts[{idx}].minimumPayment"),
            Some(debt.minimum_payment),
        )?;
        debts.push(DebtItem {
            balance: clamp_amount(Some(debt.balance), DEBT_BALANCE_BOUNDS),
            interest_rate: debt.interest_rate.max(0.0),
            minimum_payment: debt.minimum_payment.max(0.0),
            ..debt
        });
    }

    let income = clamp_amount(payload.income, INCOME_BOUNDS);
    let expenses = clamp_amount(payload.expenses, EXPENSES_BOUNDS);
    let savings = match payload.savings {
        Some(_) => clamp_amount(payload.savings, SAVINGS_BOUNDS),
        None => (income - expenses).max(0.0),
    };

    Ok(FinancialProfile {
        income,
        savings,
        expenses,
        age: payload.age.unwrap_or(DEFAULT_AGE).clamp(AGE_BOUNDS.0, AGE_BOUNDS.1),
        time_horizon_years: clamp_count(payload.time_horizon, HORIZON_BOUNDS),
        location: payload.location,
        debts,
        goals: payload.goals,
        debt_budget: payload.debt_budget.map(|v| v.max(0.0)),
    })
}

fn require_fraction(field: &str, value: f64) -> ApiResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ApiError::validation(field, "must be between 0 and 1"))
    }
}

fn require_rate(field: &str, value: f64) -> ApiResult<()> {
    if value.is_finite() && value > -1.0 {
        Ok(())
    } else {
        Err(ApiError::validation(field, "must be a finite rate above -1"))
    }
}

fn require_non_negative(field: &str, value: f64) -> ApiResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ApiError::validation(field, "must be >= 0"))
    }
}

fn validate_projection(prefix: &str, config: &ProjectionConfig) -> ApiResult<()> {
    require_fraction(
        &format!("{prefix}.investableFraction"),
        config.investable_fraction,
    )?;
    require_rate(&format!("{prefix}.annualReturn"), config.annual_return)?;
    require_rate(
        &format!("{prefix}.contributionStepUp"),
        config.contribution_step_up,
    )?;
    require_rate(
        &format!("{prefix}.safeAnnualReturn"),
        config.safe_annual_return,
    )?;
    require_non_negative(
        &format!("{prefix}.targetIncomeMultiple"),
        config.target_income_multiple,
    )
}

fn validate_config(config: &PlanConfig) -> ApiResult<()> {
    validate_projection("projection", &config.projection)?;
    validate_projection("retirement", &config.retirement)?;
    validate_projection("goalFund", &config.goal_fund)?;

    if config.retirement_age == 0 {
        return Err(ApiError::validation("retirementAge", "must be > 0"));
    }
    for (idx, target) in config.goal_targets.iter().enumerate() {
        require_non_negative(
            &format!("goalTargets[{idx}].incomeMultiple"),
            target.income_multiple,
        )?;
    }

    require_fraction(
        "allocation.investableFraction",
        config.allocation.investable_fraction,
    )?;
    let returns = &config.allocation.returns;
    for (field, value) in [
        ("allocation.contributionStepUp", config.allocation.contribution_step_up),
        ("allocation.returns.largeCap", returns.large_cap),
        ("allocation.returns.midCap", returns.mid_cap),
        ("allocation.returns.smallCap", returns.small_cap),
        ("allocation.returns.gold", returns.gold),
        ("allocation.returns.directEquity", returns.direct_equity),
        ("allocation.speculativeMonthlyMin", config.allocation.speculative_monthly_min),
        ("allocation.speculativeMonthlyMax", config.allocation.speculative_monthly_max),
    ] {
        require_rate(field, value)?;
    }

    if config.allocation.speculative_monthly_max < config.allocation.speculative_monthly_min {
        return Err(ApiError::validation(
            "allocation.speculativeMonthlyMax",
            "must be >= speculativeMonthlyMin",
        ));
    }

    if config.allocation.tiers.is_empty() {
        return Err(ApiError::validation(
            "allocation.tiers",
            "must contain at least one rule",
        ));
    }

    for (idx, rule) in config.allocation.tiers.iter().enumerate() {
        let tier = &rule.tier;
        let field = format!("allocation.tiers[{idx}]");
        let parts = [
            tier.mutual_funds,
            tier.gold,
            tier.direct_equity,
            tier.speculative,
            tier.fund_split.large_cap,
            tier.fund_split.mid_cap,
            tier.fund_split.small_cap,
        ];
        if parts.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(ApiError::validation(field, "percentages must be >= 0"));
        }
        if (tier.fund_split.total() - 100.0).abs() > 1e-9 {
            return Err(ApiError::validation(
                field,
                "mutual fund split must sum to 100",
            ));
        }
        if tier.mutual_funds + tier.gold + tier.direct_equity + tier.speculative > 100.0 + 1e-9 {
            return Err(ApiError::validation(
                field,
                "bucket percentages must not exceed 100",
            ));
        }
    }

    Ok(())
}

fn plan_response(request: &ResolvedRequest) -> PlanResponse {
    let mut returns = request.returns();
    let plan = build_plan(&request.profile, &request.config, &mut returns);

    let mut warnings = Vec::new();
    if let Some(missing) = plan.emergency_fund.missing_input() {
        warnings.push(missing.to_string());
    }
    if let Some(budget) = request.profile.debt_budget {
        let minimums = total_minimum_payment(&request.profile.debts);
        if budget < minimums {
            warnings.push(format!(
                "debt budget {budget} is below the total minimum payment {minimums}"
            ));
        }
    }

    PlanResponse { plan, warnings }
}

fn projection_response(request: &ResolvedRequest) -> ProjectionResponse {
    let profile = &request.profile;
    let projection = project(
        profile.income,
        profile.savings,
        profile.time_horizon_years,
        &request.config.projection,
    );
    let message = projection.missing_input().map(|m| m.to_string());
    ProjectionResponse {
        projection,
        message,
    }
}

fn allocation_response(request: &ResolvedRequest) -> AllocationResult {
    let profile = &request.profile;
    allocate(
        profile.income,
        profile.savings,
        profile.time_horizon_years,
        &request.config.allocation,
        &mut request.returns(),
    )
}

fn debt_response(request: &ResolvedRequest) -> DebtPlan {
    let profile = &request.profile;
    let budget = profile
        .debt_budget
        .unwrap_or_else(|| total_minimum_payment(&profile.debts));
    summarize_payoff(&profile.debts, budget)
}

pub fn router() -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/plan", post(plan_handler))
        .route("/api/projection", post(projection_handler))
        .route("/api/allocation", post(allocation_handler))
        .route("/api/debts", post(debt_handler))
        .fallback(not_found_handler)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("fundplan HTTP API listening on http://{addr}");
    info!("Local access: http://127.0.0.1:{port}/api/health");

    axum::serve(listener, router()).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn plan_handler(payload: Result<Json<PlanRequest>, JsonRejection>) -> Response {
    respond(payload, |request| {
        let response = plan_response(&request);
        info!(
            tier = ?response.plan.allocation.tier,
            fund_valid = response.plan.emergency_fund.is_valid,
            debts = response.plan.debt.entries.len(),
            "plan computed"
        );
        response
    })
}

async fn projection_handler(payload: Result<Json<PlanRequest>, JsonRejection>) -> Response {
    respond(payload, |request| projection_response(&request))
}

async fn allocation_handler(payload: Result<Json<PlanRequest>, JsonRejection>) -> Response {
    respond(payload, |request| allocation_response(&request))
}

async fn debt_handler(payload: Result<Json<PlanRequest>, JsonRejection>) -> Response {
    respond(payload, |request| debt_response(&request))
}

fn respond<T, F>(payload: Result<Json<PlanRequest>, JsonRejection>, compute: F) -> Response
where
    T: Serialize,
    F: FnOnce(ResolvedRequest) -> T,
{
    let request = payload
        .map_err(|rejection| ApiError::Payload(rejection.body_text()))
        .and_then(|Json(request)| resolve_request(request));

    match request {
        Ok(request) => json_response(StatusCode::OK, compute(request)),
        Err(err) => {
            info!("rejected request: {err}");
            err.into_response()
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        serde_json::json!({
            "error": msg,
        }),
    )
}

#[cfg(test)]
fn plan_request_from_json(json: &str) -> ApiResult<PlanRequest> {
    serde_json::from_str::<PlanRequest>(json).map_err(|e| ApiError::Payload(e.to_string()))
}
