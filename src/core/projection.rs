use super::types::{MAX_HORIZON_YEARS, ProfileField, ProjectionConfig, ProjectionResult};

/// Projects one target fund over the horizon. Horizons above [`MAX_HORIZON_YEARS`] are
/// capped.
pub fn project(
    income: f64,
    savings: f64,
    time_horizon_years: u32,
    config: &ProjectionConfig,
) -> ProjectionResult {
    let income = income.max(0.0);
    let savings = savings.max(0.0);

    let missing = missing_fields(income, savings, time_horizon_years);
    if !missing.is_empty() {
        return ProjectionResult::invalid(missing);
    }

    let horizon_months = time_horizon_years.min(MAX_HORIZON_YEARS) * 12;
    let target = income * config.target_income_multiple;
    let starting_contribution = savings * config.investable_fraction;

    let accumulation = accumulate(starting_contribution, target, horizon_months, config);
    let balance = apply_safe_growth(
        accumulation.balance,
        horizon_months - accumulation.months,
        config.safe_annual_return,
    );
    let elapsed = accumulation.reported_elapsed();
    let future_value = balance.round();

    ProjectionResult {
        is_valid: true,
        future_value,
        years_to_target: elapsed / 12,
        months_to_target: elapsed % 12,
        target_amount: target,
        percent_complete: percent_complete(future_value, target),
        monthly_contribution: starting_contribution,
        target_reached: accumulation.target_reached,
        missing: Vec::new(),
    }
}

fn percent_complete(value: f64, target: f64) -> f64 {
    if target <= 0.0 {
        return 100.0;
    }
    (value / target * 100.0).min(100.0)
}

fn missing_fields(income: f64, savings: f64, time_horizon_years: u32) -> Vec<ProfileField> {
    let mut missing = Vec::new();
    if income <= 0.0 {
        missing.push(ProfileField::Income);
    }
    if savings <= 0.0 {
        missing.push(ProfileField::Savings);
    }
    if time_horizon_years == 0 {
        missing.push(ProfileField::TimeHorizon);
    }
    missing
}

#[derive(Debug, Clone, Copy)]
struct Accumulation {
    balance: f64,
    /// Months of contributions, including the month the target was hit.
    months: u32,
    target_reached: bool,
}

impl Accumulation {
    /// Hitting the target in the first month reads as already reached.
    fn reported_elapsed(&self) -> u32 {
        if self.target_reached && self.months == 1 {
            0
        } else {
            self.months
        }
    }
}

fn accumulate(
    starting_contribution: f64,
    target: f64,
    horizon_months: u32,
    config: &ProjectionConfig,
) -> Accumulation {
    let monthly_rate = config.annual_return / 12.0;
    let mut contribution = starting_contribution;
    let mut balance = 0.0;

    for month in 0..horizon_months {
        balance += contribution;
        balance *= 1.0 + monthly_rate;

        if balance >= target {
            return Accumulation {
                balance,
                months: month + 1,
                target_reached: true,
            };
        }

        if (month + 1) % 12 == 0 {
            contribution *= 1.0 + config.contribution_step_up;
        }
    }

    Accumulation {
        balance,
        months: horizon_months,
        target_reached: false,
    }
}

fn apply_safe_growth(balance: f64, months: u32, safe_annual_return: f64) -> f64 {
    let monthly_rate = safe_annual_return / 12.0;
    (0..months).fold(balance, |acc, _| acc * (1.0 + monthly_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn flat_config() -> ProjectionConfig {
        ProjectionConfig {
            investable_fraction: 1.0,
            annual_return: 0.0,
            contribution_step_up: 0.0,
            safe_annual_return: 0.0,
            target_income_multiple: 6.0,
        }
    }

    #[test]
    fn zero_inputs_are_invalid_and_zeroed() {
        let config = ProjectionConfig::default();
        for (income, savings, years) in [(30_000.0, 6_000.0, 0), (0.0, 6_000.0, 15), (30_000.0, 0.0, 15)]
        {
            let result = project(income, savings, years, &config);
            assert!(!result.is_valid);
            assert_approx(result.future_value, 0.0);
            assert_eq!(result.years_to_target, 0);
            assert_eq!(result.months_to_target, 0);
        }
    }

    #[test]
    fn negative_inputs_are_coerced_to_missing() {
        let result = project(-5.0, -1.0, 10, &ProjectionConfig::default());
        assert_eq!(
            result.missing,
            vec![ProfileField::Income, ProfileField::Savings]
        );
    }

    #[test]
    fn missing_input_message_names_each_field() {
        let result = project(0.0, 0.0, 0, &ProjectionConfig::default());
        let err = result.missing_input().expect("invalid result");
        assert_eq!(err.to_string(), "missing income, savings and time horizon");

        let result = project(0.0, 100.0, 5, &ProjectionConfig::default());
        let err = result.missing_input().expect("invalid result");
        assert_eq!(err.to_string(), "missing income");

        let valid = project(100.0, 100.0, 5, &ProjectionConfig::default());
        assert!(valid.missing_input().is_none());
    }

    #[test]
    fn reference_scenario_runs_full_horizon_without_reaching_target() {
        let result = project(30_000.0, 6_000.0, 15, &ProjectionConfig::default());

        assert!(result.is_valid);
        assert_approx(result.monthly_contribution, 300.0);
        assert_approx(result.target_amount, 180_000.0);
        assert!(result.future_value > 0.0);
        // 300/month stepping up 5.5% a year at 5% only reaches ~114k in 15 years.
        assert!(!result.target_reached);
        assert_eq!(result.years_to_target, 15);
        assert_eq!(result.months_to_target, 0);
        assert!((result.future_value - 114_468.0).abs() <= 1.0);
    }

    #[test]
    fn target_on_first_month_counts_as_already_reached() {
        let result = project(1_000.0, 200_000.0, 1, &ProjectionConfig::default());

        assert!(result.target_reached);
        assert_eq!(result.years_to_target, 0);
        assert_eq!(result.months_to_target, 0);
        // 10,000 contributed, one month at 5%, then the other eleven at 6%.
        let expected = 10_000.0 * (1.0 + 0.05 / 12.0) * (1.0_f64 + 0.005).powi(11);
        assert_approx(result.future_value, expected.round());
        assert_approx(result.percent_complete, 100.0);
    }

    #[test]
    fn first_month_hit_compounds_exactly_the_horizon() {
        let mut config = flat_config();
        config.safe_annual_return = 0.12;
        config.target_income_multiple = 1.0;

        let result = project(1_000.0, 1_000.0, 1, &config);
        assert!(result.target_reached);
        assert_eq!(result.months_to_target, 0);
        // One flat accumulation month, then eleven at 1%.
        assert_approx(result.future_value, (1_000.0 * 1.01_f64.powi(11)).round());
    }

    #[test]
    fn oracle_flat_accumulation_stops_at_target_month() {
        // 1,000/month with no growth hits 6 * 1,000 on the sixth contribution.
        let result = project(1_000.0, 1_000.0, 1, &flat_config());

        assert!(result.target_reached);
        assert_eq!(result.years_to_target, 0);
        assert_eq!(result.months_to_target, 6);
        assert_approx(result.future_value, 6_000.0);
    }

    #[test]
    fn target_month_counts_across_years() {
        let mut config = flat_config();
        config.target_income_multiple = 14.0;

        // The fourteenth contribution reaches 14,000.
        let result = project(1_000.0, 1_000.0, 2, &config);
        assert_eq!(result.years_to_target, 1);
        assert_eq!(result.months_to_target, 2);
    }

    #[test]
    fn percent_complete_tracks_shortfall() {
        let mut config = flat_config();
        config.target_income_multiple = 24.0;

        // 12 * 1,000 of a 24,000 target.
        let result = project(1_000.0, 1_000.0, 1, &config);
        assert!(!result.target_reached);
        assert_approx(result.percent_complete, 50.0);

        config.target_income_multiple = 0.0;
        let result = project(1_000.0, 1_000.0, 1, &config);
        assert_approx(result.percent_complete, 100.0);
    }

    #[test]
    fn huge_horizon_is_capped() {
        let config = ProjectionConfig::default();
        let capped = project(30_000.0, 6_000.0, u32::MAX, &config);
        let max = project(30_000.0, 6_000.0, MAX_HORIZON_YEARS, &config);
        assert_eq!(capped, max);
    }

    #[test]
    fn step_up_applies_after_each_completed_year() {
        let mut config = flat_config();
        config.contribution_step_up = 0.5;
        config.target_income_multiple = 1_000.0;

        // Year one: 12 * 100. Year two: 12 * 150.
        let result = project(100.0, 100.0, 2, &config);
        assert!(!result.target_reached);
        assert_eq!(result.years_to_target, 2);
        assert_approx(result.future_value, 3_000.0);
    }

    #[test]
    fn safe_growth_compounds_remaining_months_without_contributions() {
        let mut config = flat_config();
        config.safe_annual_return = 0.12;

        let result = project(1_000.0, 1_000.0, 1, &config);
        // Six accumulation months leave six of the twelve for safe growth.
        let expected = 6_000.0 * 1.01_f64.powi(6);
        assert_approx(result.future_value, expected.round());
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_future_value_non_decreasing_in_horizon(
            income in 1_000.0f64..500_000.0,
            savings in 100.0f64..200_000.0,
            years in 1u32..39,
        ) {
            let config = ProjectionConfig::default();
            let shorter = project(income, savings, years, &config);
            let longer = project(income, savings, years + 1, &config);

            prop_assert!(shorter.is_valid && longer.is_valid);
            prop_assert!(longer.future_value >= shorter.future_value);
        }

        #[test]
        fn prop_projection_is_deterministic(
            income in 1_000.0f64..500_000.0,
            savings in 100.0f64..200_000.0,
            years in 1u32..40,
        ) {
            let config = ProjectionConfig::default();
            let first = project(income, savings, years, &config);
            let second = project(income, savings, years, &config);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_elapsed_months_never_exceed_horizon(
            income in 1_000.0f64..500_000.0,
            savings in 100.0f64..200_000.0,
            years in 1u32..40,
        ) {
            let result = project(income, savings, years, &ProjectionConfig::default());
            let elapsed = result.years_to_target * 12 + result.months_to_target;
            prop_assert!(elapsed <= years * 12);
            prop_assert!(result.months_to_target < 12);
        }
    }
}
