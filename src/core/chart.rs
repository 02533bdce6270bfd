use std::collections::HashMap;

use super::types::{ChartRow, MetricKind, PolicyId, ScenarioResult, ScenarioYearResult, YEARS};

// Pivots per-policy series into year-indexed rows, one column per selected
// policy in selection order. Always exactly one row per year: a chart axis
// is stable no matter how sparse the data behind it is.
pub fn pivot(
    results: &HashMap<PolicyId, ScenarioResult>,
    policies: &[PolicyId],
    metric: MetricKind,
    include_baseline: bool,
) -> Vec<ChartRow> {
    // The shared no-reform baseline only makes sense against the absolute
    // poverty-rate view.
    let want_baseline = include_baseline && metric == MetricKind::PovertyRate;

    YEARS
        .iter()
        .map(|year| {
            let mut values = Vec::with_capacity(policies.len());
            for policy in policies {
                let Some(point) = results.get(policy).and_then(|r| r.year(year)) else {
                    continue;
                };
                if let Some(value) = metric_value(metric, point) {
                    values.push((*policy, value));
                }
            }

            // Every policy shares the same no-reform baseline, so reading it
            // from the first selected policy is correct, not arbitrary.
            let baseline = if want_baseline {
                policies
                    .first()
                    .and_then(|p| results.get(p))
                    .and_then(|r| r.year(year))
                    .and_then(|point| point.baseline_poverty_rate)
                    .map(|rate| rate * 100.0)
            } else {
                None
            };

            ChartRow {
                year: year.to_string(),
                values,
                baseline,
            }
        })
        .collect()
}

fn metric_value(metric: MetricKind, point: &ScenarioYearResult) -> Option<f64> {
    match metric {
        MetricKind::BudgetaryImpact => point.cost.map(|v| v / 1e9),
        MetricKind::FamiliesAffected => point.families_affected.map(|v| v / 1000.0),
        MetricKind::ChildrenNoLongerLimited => {
            point.children_no_longer_limited.map(|v| v / 1000.0)
        }
        MetricKind::ChildrenOutOfPoverty => point.children_out_of_poverty.map(|v| v / 1000.0),
        MetricKind::PovertyRate => point.reformed_poverty_rate.map(|v| v * 100.0),
        MetricKind::PovertyRateReduction => match (
            point.baseline_poverty_rate,
            point.reformed_poverty_rate,
        ) {
            (Some(baseline), Some(reformed)) => Some((baseline - reformed) * 100.0),
            _ => None,
        },
    }
}
