use tracing::debug;

use super::returns::ReturnSource;
use super::types::{
    AllocationConfig, AllocationResult, AllocationTier, AssetClass, AssetReturns,
    BucketProjection, MAX_HORIZON_YEARS, TierRule, default_tier_rules,
};

#[derive(Debug, Clone, Copy)]
struct Bucket {
    asset: AssetClass,
    percentage: f64,
    initial_monthly: f64,
    monthly: f64,
    annual_return: f64,
    future_value: f64,
    stochastic: bool,
}

impl Bucket {
    fn new(asset: AssetClass, percentage: f64, monthly: f64, annual_return: f64) -> Self {
        Self {
            asset,
            percentage,
            initial_monthly: monthly,
            monthly,
            annual_return,
            future_value: 0.0,
            stochastic: asset == AssetClass::Speculative,
        }
    }

    fn into_projection(self) -> BucketProjection {
        BucketProjection {
            asset: self.asset,
            percentage: self.percentage,
            monthly_amount: self.initial_monthly,
            annual_return: self.annual_return,
            future_value: self.future_value,
            stochastic: self.stochastic,
        }
    }
}

/// Splits the investable share of savings across the tier's buckets and projects each
/// one. Horizons above [`MAX_HORIZON_YEARS`] are capped.
pub fn allocate<R: ReturnSource + ?Sized>(
    income: f64,
    savings: f64,
    time_horizon_years: u32,
    config: &AllocationConfig,
    returns: &mut R,
) -> AllocationResult {
    let income = income.max(0.0);
    let savings = savings.max(0.0);

    let tier = select_tier(income * 12.0, savings, &config.tiers);
    debug!(
        tier = ?tier.name,
        annual_income = income * 12.0,
        savings,
        "selected allocation tier"
    );

    let investable_monthly = savings * config.investable_fraction / 12.0;
    let mut buckets = build_buckets(&tier, investable_monthly, &config.returns);

    let mut total_contributed = 0.0;
    for year in 1..=time_horizon_years.min(MAX_HORIZON_YEARS) {
        if year > 1 {
            for bucket in &mut buckets {
                bucket.monthly *= 1.0 + config.contribution_step_up;
            }
        }

        total_contributed += buckets.iter().map(|b| b.monthly).sum::<f64>() * 12.0;

        for _ in 0..12 {
            for bucket in &mut buckets {
                let monthly_return = if bucket.stochastic {
                    returns.next_monthly_return(
                        config.speculative_monthly_min,
                        config.speculative_monthly_max,
                    )
                } else {
                    bucket.annual_return / 12.0
                };
                bucket.future_value =
                    (bucket.future_value + bucket.monthly) * (1.0 + monthly_return);
            }
        }
    }

    let total_future_value = buckets.iter().map(|b| b.future_value).sum::<f64>();
    let overall_return_pct = if total_contributed > 0.0 {
        (total_future_value - total_contributed) / total_contributed * 100.0
    } else {
        0.0
    };

    AllocationResult {
        tier: tier.name,
        investable_monthly,
        buckets: buckets.into_iter().map(Bucket::into_projection).collect(),
        total_future_value,
        total_contributed,
        overall_return_pct,
    }
}

/// First matching rule wins. A table with no catch-all falls back to its last rule.
pub fn select_tier(annual_income: f64, savings: f64, rules: &[TierRule]) -> AllocationTier {
    if let Some(rule) = rules.iter().find(|rule| rule.matches(annual_income, savings)) {
        return rule.tier;
    }
    match rules.last() {
        Some(rule) => rule.tier,
        None => {
            let defaults = default_tier_rules();
            select_tier(annual_income, savings, &defaults)
        }
    }
}

fn build_buckets(
    tier: &AllocationTier,
    investable_monthly: f64,
    returns: &AssetReturns,
) -> Vec<Bucket> {
    let fund_monthly = investable_monthly * tier.mutual_funds / 100.0;
    let split = tier.fund_split;

    let candidates = [
        Bucket::new(
            AssetClass::LargeCapFund,
            tier.mutual_funds * split.large_cap / 100.0,
            fund_monthly * split.large_cap / 100.0,
            returns.large_cap,
        ),
        Bucket::new(
            AssetClass::MidCapFund,
            tier.mutual_funds * split.mid_cap / 100.0,
            fund_monthly * split.mid_cap / 100.0,
            returns.mid_cap,
        ),
        Bucket::new(
            AssetClass::SmallCapFund,
            tier.mutual_funds * split.small_cap / 100.0,
            fund_monthly * split.small_cap / 100.0,
            returns.small_cap,
        ),
        Bucket::new(
            AssetClass::Gold,
            tier.gold,
            investable_monthly * tier.gold / 100.0,
            returns.gold,
        ),
        Bucket::new(
            AssetClass::DirectEquity,
            tier.direct_equity,
            investable_monthly * tier.direct_equity / 100.0,
            returns.direct_equity,
        ),
        Bucket::new(
            AssetClass::Speculative,
            tier.speculative,
            investable_monthly * tier.speculative / 100.0,
            returns.speculative_expected,
        ),
    ];

    candidates
        .into_iter()
        .filter(|bucket| bucket.percentage > 0.0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::returns::{FixedReturns, RngReturns};
    use crate::core::types::TierName;
    use proptest::prelude::{any, prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn bucket(result: &AllocationResult, asset: AssetClass) -> &BucketProjection {
        result
            .buckets
            .iter()
            .find(|b| b.asset == asset)
            .unwrap_or_else(|| panic!("missing bucket {asset:?}"))
    }

    #[test]
    fn tier_rules_are_evaluated_in_order() {
        let rules = default_tier_rules();
        for (income, savings, expected) in [
            (30_000.0, 6_000.0, TierName::Conservative),
            (30_000.0, 20_000.0, TierName::Balanced),
            (60_000.0, 5_000.0, TierName::Balanced),
            (50_000.0, 50_000.0, TierName::Growth),
            (200_000.0, 120_000.0, TierName::Growth),
        ] {
            let tier = select_tier(income * 12.0, savings, &rules);
            assert_eq!(tier.name, expected, "income {income}, savings {savings}");
        }
    }

    #[test]
    fn tier_thresholds_are_exclusive() {
        let rules = default_tier_rules();
        assert_eq!(
            select_tier(600_000.0, 5_000.0, &rules).name,
            TierName::Balanced
        );
        assert_eq!(
            select_tier(100_000.0, 10_000.0, &rules).name,
            TierName::Balanced
        );
    }

    #[test]
    fn table_without_catch_all_falls_back_to_last_rule() {
        let mut rules = default_tier_rules();
        rules.truncate(2);
        assert_eq!(
            select_tier(10_000_000.0, 1_000_000.0, &rules).name,
            TierName::Balanced
        );
        assert_eq!(select_tier(1.0, 1.0, &[]).name, TierName::Conservative);
    }

    #[test]
    fn mutual_fund_splits_sum_to_one_hundred() {
        for rule in default_tier_rules() {
            assert_approx(rule.tier.fund_split.total(), 100.0);
            let overall = rule.tier.mutual_funds
                + rule.tier.gold
                + rule.tier.direct_equity
                + rule.tier.speculative;
            assert!(overall <= 100.0, "{:?} allocates {overall}%", rule.tier.name);
        }
    }

    #[test]
    fn oracle_conservative_single_year_matches_hand_calculation() {
        let mut returns = FixedReturns::new(Vec::new());
        let result = allocate(30_000.0, 6_000.0, 1, &AllocationConfig::default(), &mut returns);

        assert_eq!(result.tier, TierName::Conservative);
        assert_approx(result.investable_monthly, 250.0);
        assert_eq!(result.buckets.len(), 5);
        assert!(result.buckets.iter().all(|b| !b.stochastic));
        assert_eq!(returns.draws(), 0);

        let large = bucket(&result, AssetClass::LargeCapFund);
        assert_approx(large.percentage, 42.0);
        assert_approx(large.monthly_amount, 105.0);
        assert_approx(large.future_value, 1_344.979_444_549_539);

        assert_approx(bucket(&result, AssetClass::MidCapFund).monthly_amount, 52.5);
        assert_approx(bucket(&result, AssetClass::SmallCapFund).monthly_amount, 17.5);
        assert_approx(bucket(&result, AssetClass::Gold).monthly_amount, 37.5);
        assert_approx(bucket(&result, AssetClass::DirectEquity).monthly_amount, 12.5);

        assert_approx(result.total_contributed, 2_700.0);
        assert_approx(result.total_future_value, 2_884.957_555_533_143);
        assert_approx(result.overall_return_pct, 6.850_279_834_560_853);
    }

    #[test]
    fn deterministic_bucket_matches_annuity_due_formula() {
        let mut returns = FixedReturns::new(Vec::new());
        let result = allocate(30_000.0, 6_000.0, 1, &AllocationConfig::default(), &mut returns);

        let r = 0.08 / 12.0;
        let growth = (1.0 + r) * ((1.0_f64 + r).powi(12) - 1.0) / r;
        assert_approx(bucket(&result, AssetClass::Gold).future_value, 37.5 * growth);
    }

    #[test]
    fn speculative_bucket_with_flat_draws_returns_contributions() {
        let mut returns = FixedReturns::new(vec![0.0]);
        let result = allocate(
            200_000.0,
            120_000.0,
            1,
            &AllocationConfig::default(),
            &mut returns,
        );

        assert_eq!(result.tier, TierName::Growth);
        let speculative = bucket(&result, AssetClass::Speculative);
        assert!(speculative.stochastic);
        assert_approx(speculative.monthly_amount, 500.0);
        assert_approx(speculative.future_value, 6_000.0);
        assert_eq!(returns.draws(), 12);
        assert_approx(result.total_contributed, 57_000.0);
        assert_approx(result.total_future_value, 60_701.824_256_252_43);
    }

    #[test]
    fn speculative_bucket_reproduces_fixed_sequence_exactly() {
        let mut returns = FixedReturns::new(vec![0.10]);
        let result = allocate(
            200_000.0,
            120_000.0,
            1,
            &AllocationConfig::default(),
            &mut returns,
        );
        let expected = 500.0 * 1.1 * (1.1_f64.powi(12) - 1.0) / 0.1;
        let actual = bucket(&result, AssetClass::Speculative).future_value;
        assert!(
            (actual - expected).abs() <= 1e-9 * expected,
            "expected {expected}, got {actual}"
        );

        let mut returns = FixedReturns::new(vec![0.1, -0.05]);
        let result = allocate(
            200_000.0,
            120_000.0,
            2,
            &AllocationConfig::default(),
            &mut returns,
        );
        assert_eq!(returns.draws(), 24);
        assert_approx(
            bucket(&result, AssetClass::Speculative).future_value,
            16_095.381_703_099_716,
        );
        assert_approx(result.total_contributed, 119_700.0);
    }

    #[test]
    fn contributions_step_up_from_second_year() {
        let mut config = AllocationConfig::default();
        config.contribution_step_up = 0.5;
        let mut returns = FixedReturns::new(Vec::new());
        let result = allocate(30_000.0, 6_000.0, 2, &config, &mut returns);

        // 250/month in year one, 375/month in year two.
        assert_approx(result.total_contributed, 250.0 * 12.0 + 375.0 * 12.0);
        assert_approx(bucket(&result, AssetClass::Gold).monthly_amount, 37.5);
    }

    #[test]
    fn zero_savings_yields_zero_values_without_dividing_by_zero() {
        let mut returns = FixedReturns::new(vec![0.2]);
        let result = allocate(30_000.0, 0.0, 10, &AllocationConfig::default(), &mut returns);

        assert_approx(result.investable_monthly, 0.0);
        assert_approx(result.total_contributed, 0.0);
        assert_approx(result.total_future_value, 0.0);
        assert_approx(result.overall_return_pct, 0.0);
        assert!(result.buckets.iter().all(|b| b.future_value == 0.0));
    }

    #[test]
    fn zero_horizon_contributes_nothing() {
        let mut returns = FixedReturns::new(vec![0.2]);
        let result = allocate(30_000.0, 6_000.0, 0, &AllocationConfig::default(), &mut returns);
        assert_approx(result.total_contributed, 0.0);
        assert_approx(result.overall_return_pct, 0.0);
        assert_eq!(returns.draws(), 0);
    }

    #[test]
    fn huge_horizon_is_capped() {
        let config = AllocationConfig::default();
        let mut capped_returns = FixedReturns::new(vec![0.0]);
        let capped = allocate(200_000.0, 120_000.0, u32::MAX, &config, &mut capped_returns);
        let mut max_returns = FixedReturns::new(vec![0.0]);
        let max = allocate(
            200_000.0,
            120_000.0,
            MAX_HORIZON_YEARS,
            &config,
            &mut max_returns,
        );

        assert_eq!(capped, max);
        assert_eq!(capped_returns.draws(), MAX_HORIZON_YEARS as usize * 12);
    }

    #[test]
    fn zero_allocation_buckets_are_omitted() {
        let mut config = AllocationConfig::default();
        config.tiers[0].tier.gold = 0.0;
        let mut returns = FixedReturns::new(Vec::new());
        let result = allocate(30_000.0, 6_000.0, 1, &config, &mut returns);

        assert!(result.buckets.iter().all(|b| b.asset != AssetClass::Gold));
        assert!(
            result
                .buckets
                .iter()
                .all(|b| b.asset != AssetClass::Speculative)
        );
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(32))]

        #[test]
        fn prop_seeded_allocation_is_reproducible(
            seed in any::<u64>(),
            income in 0.0f64..400_000.0,
            savings in 0.0f64..200_000.0,
            years in 0u32..30,
        ) {
            let config = AllocationConfig::default();
            let a = allocate(income, savings, years, &config, &mut RngReturns::seeded(seed));
            let b = allocate(income, savings, years, &config, &mut RngReturns::seeded(seed));
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_totals_are_consistent(
            seed in any::<u64>(),
            income in 0.0f64..400_000.0,
            savings in 0.0f64..200_000.0,
            years in 0u32..30,
        ) {
            let config = AllocationConfig::default();
            let result = allocate(income, savings, years, &config, &mut RngReturns::seeded(seed));

            let bucket_sum = result.buckets.iter().map(|b| b.future_value).sum::<f64>();
            prop_assert!((bucket_sum - result.total_future_value).abs() <= 1e-6 * bucket_sum.max(1.0));
            prop_assert!(result.total_future_value.is_finite());
            prop_assert!(result.total_contributed >= 0.0);
            prop_assert!(result.buckets.iter().all(|b| b.percentage > 0.0));
        }
    }
}
