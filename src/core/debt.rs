use std::cmp::Ordering;

use tracing::debug;

use super::types::{DebtItem, DebtPlan, DebtPlanEntry};

/// Monthly rates below this are treated as interest-free.
const NEGLIGIBLE_MONTHLY_RATE: f64 = 0.0001;

/// Avalanche plan: highest rate first, every surplus unit of budget on position 0.
pub fn plan_payoff(debts: &[DebtItem], monthly_budget: f64) -> Vec<DebtPlanEntry> {
    let mut ordered = debts.iter().collect::<Vec<_>>();
    // `sort_by` is stable, so equal rates keep their input order. -0.0 and 0.0 are equal.
    ordered.sort_by(|a, b| {
        b.interest_rate
            .partial_cmp(&a.interest_rate)
            .unwrap_or(Ordering::Equal)
    });

    let extra = extra_payment(debts, monthly_budget);

    ordered
        .into_iter()
        .enumerate()
        .map(|(position, debt)| {
            let extra_payment = if position == 0 { extra } else { 0.0 };
            let assigned_payment = debt.minimum_payment.max(0.0) + extra_payment;
            DebtPlanEntry {
                debt: debt.clone(),
                position,
                assigned_payment,
                extra_payment,
                months_to_payoff: estimate_payoff_months(
                    debt.balance,
                    debt.interest_rate,
                    assigned_payment,
                ),
            }
        })
        .collect()
}

pub fn summarize_payoff(debts: &[DebtItem], monthly_budget: f64) -> DebtPlan {
    let entries = plan_payoff(debts, monthly_budget);
    let total_debt = debts.iter().map(|d| d.balance.max(0.0)).sum::<f64>();
    let average_interest_rate = if total_debt > 0.0 {
        debts
            .iter()
            .map(|d| d.balance.max(0.0) * d.interest_rate.max(0.0))
            .sum::<f64>()
            / total_debt
    } else {
        0.0
    };

    let months_to_debt_free = entries
        .iter()
        .try_fold(0, |longest, entry| {
            entry.months_to_payoff.map(|months| longest.max(months))
        });

    DebtPlan {
        total_debt,
        total_minimum_payment: total_minimum_payment(debts),
        extra_payment: if entries.is_empty() {
            0.0
        } else {
            extra_payment(debts, monthly_budget)
        },
        months_to_debt_free,
        average_interest_rate,
        entries,
    }
}

pub fn total_minimum_payment(debts: &[DebtItem]) -> f64 {
    debts.iter().map(|d| d.minimum_payment.max(0.0)).sum()
}

fn extra_payment(debts: &[DebtItem], monthly_budget: f64) -> f64 {
    (monthly_budget - total_minimum_payment(debts)).max(0.0)
}

/// Closed-form amortization term. Returns `None` only when nothing is paid against a
/// positive balance.
pub fn estimate_payoff_months(balance: f64, annual_rate_pct: f64, payment: f64) -> Option<u32> {
    let balance = balance.max(0.0);
    if balance == 0.0 {
        return Some(0);
    }
    if payment <= 0.0 {
        return None;
    }

    let linear = (balance / payment).ceil();
    let monthly_rate = annual_rate_pct.max(0.0) / 100.0 / 12.0;
    if monthly_rate < NEGLIGIBLE_MONTHLY_RATE {
        return Some(to_months(linear));
    }

    let months =
        (-(1.0 - balance * monthly_rate / payment).ln() / (1.0 + monthly_rate).ln()).ceil();
    if months.is_finite() {
        Some(to_months(months))
    } else {
        debug!(
            balance,
            annual_rate_pct, payment, "payment does not cover interest, using linear estimate"
        );
        Some(to_months(linear))
    }
}

fn to_months(value: f64) -> u32 {
    // Saturating float-to-int cast.
    value as u32
}
