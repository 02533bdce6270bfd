use std::collections::HashMap;

use super::store::RecordStore;
use super::types::{
    DetailValue, PolicyConfig, PolicyId, ScenarioResult, ScenarioYearResult, YEARS,
};

// The dataset keys lower-third-child-element by integer percentage, not by
// the raw 0.5..1.0 rate, so the conversion must land exactly on the
// generator's key values. f64::round is half-away-from-zero, matching the
// generator's rounding of rate * 100.
pub fn resolved_parameter(policy: PolicyId, config: PolicyConfig) -> Option<f64> {
    match policy {
        PolicyId::ThreeChildLimit => Some(f64::from(config.child_limit)),
        PolicyId::UnderFiveExemption => Some(f64::from(config.age_limit)),
        PolicyId::LowerThirdChildElement => Some((config.reduction_rate * 100.0).round()),
        PolicyId::FullAbolition
        | PolicyId::DisabledChildExemption
        | PolicyId::WorkingFamiliesExemption => None,
    }
}

pub fn aggregate(store: &RecordStore, policy: PolicyId, config: PolicyConfig) -> ScenarioResult {
    let parameter = resolved_parameter(policy, config);

    let all_years: Vec<ScenarioYearResult> = YEARS
        .iter()
        .map(|year| year_result(year, &store.query(year, policy, parameter)))
        .collect();
    let headline = all_years[0].clone();

    let headline_metrics = store.query(YEARS[0], policy, parameter);
    let details = detail_builder(policy)(&headline_metrics, config);
    let warnings = advisory_warnings(policy, &headline_metrics);

    ScenarioResult {
        policy,
        parameter,
        headline,
        all_years,
        details,
        warnings,
    }
}

fn year_result(year: &str, metrics: &HashMap<String, f64>) -> ScenarioYearResult {
    let get = |key: &str| metrics.get(key).copied();
    let cost = get("cost");
    ScenarioYearResult {
        year: year.to_string(),
        cost,
        // Scenarios without a distinct full-reform figure report their own
        // cost as the comparison point.
        full_reform_cost: get("fullReformCost").or(cost),
        families_affected: get("familiesAffected"),
        total_affected_families: get("totalAffectedFamilies"),
        children_no_longer_limited: get("childrenNoLongerLimited"),
        total_limited_children: get("totalLimitedChildren"),
        children_out_of_poverty: get("childrenOutOfPoverty"),
        baseline_poverty_rate: get("baselinePovertyRate"),
        reformed_poverty_rate: get("reformedPovertyRate"),
        poverty_rate_reduction: get("povertyRateReduction"),
        cost_per_child: get("costPerChild"),
    }
}

type DetailBuilder = fn(&HashMap<String, f64>, PolicyConfig) -> Vec<(String, DetailValue)>;

fn detail_builder(policy: PolicyId) -> DetailBuilder {
    match policy {
        PolicyId::FullAbolition => |_, _| Vec::new(),
        PolicyId::ThreeChildLimit => three_child_limit_details,
        PolicyId::UnderFiveExemption => under_five_details,
        PolicyId::DisabledChildExemption => disabled_child_details,
        PolicyId::WorkingFamiliesExemption => working_families_details,
        PolicyId::LowerThirdChildElement => lower_third_element_details,
    }
}

fn three_child_limit_details(
    metrics: &HashMap<String, f64>,
    config: PolicyConfig,
) -> Vec<(String, DetailValue)> {
    let limit = config.child_limit;
    let mut details = vec![(
        "Child limit".to_string(),
        DetailValue::Number(f64::from(limit)),
    )];
    push_number(
        &mut details,
        metrics,
        "familiesAtLimit",
        format!("Families with exactly {limit} children"),
    );
    push_number(
        &mut details,
        metrics,
        "familiesAboveLimit",
        format!("Families with {}+ children", limit + 1),
    );
    details
}

fn under_five_details(
    metrics: &HashMap<String, f64>,
    config: PolicyConfig,
) -> Vec<(String, DetailValue)> {
    let age = config.age_limit;
    let mut details = vec![(
        "Age limit".to_string(),
        DetailValue::Text(format!("{age} years")),
    )];
    push_number(
        &mut details,
        metrics,
        "totalChildrenUnderAge",
        format!("Total children under {age}"),
    );
    push_number(
        &mut details,
        metrics,
        "affectedChildrenUnderAge",
        format!("Affected children under {age}"),
    );
    details
}

fn disabled_child_details(
    metrics: &HashMap<String, f64>,
    _config: PolicyConfig,
) -> Vec<(String, DetailValue)> {
    let mut details = Vec::new();
    push_number(
        &mut details,
        metrics,
        "disabledChildren",
        "Total disabled children".to_string(),
    );
    push_number(
        &mut details,
        metrics,
        "familiesWithDisabledChild",
        "Families with disabled child".to_string(),
    );
    details
}

fn working_families_details(
    metrics: &HashMap<String, f64>,
    _config: PolicyConfig,
) -> Vec<(String, DetailValue)> {
    let mut details = Vec::new();
    push_number(
        &mut details,
        metrics,
        "workingFamilies",
        "Working families exempt".to_string(),
    );
    push_number(
        &mut details,
        metrics,
        "nonWorkingFamilies",
        "Non-working families still affected".to_string(),
    );
    details
}

fn lower_third_element_details(
    metrics: &HashMap<String, f64>,
    config: PolicyConfig,
) -> Vec<(String, DetailValue)> {
    let rate = metrics
        .get("reductionRate")
        .copied()
        .unwrap_or(config.reduction_rate);
    let mut details = vec![(
        "Reduction rate".to_string(),
        DetailValue::Text(format!("{}%", (rate * 100.0).round())),
    )];
    if let Some(standard) = metrics.get("standardElement").copied() {
        details.push((
            "Standard element".to_string(),
            DetailValue::Text(format!("\u{a3}{}/year", group_thousands(standard))),
        ));
    }
    if let Some(reduced) = metrics.get("reducedElement").copied() {
        details.push((
            "Reduced element (3rd+)".to_string(),
            DetailValue::Text(format!("\u{a3}{}/year", group_thousands(reduced))),
        ));
    }
    push_number(
        &mut details,
        metrics,
        "thirdPlusChildren",
        "Children 3rd+".to_string(),
    );
    details
}

fn push_number(
    details: &mut Vec<(String, DetailValue)>,
    metrics: &HashMap<String, f64>,
    key: &str,
    label: String,
) {
    if let Some(value) = metrics.get(key).copied() {
        details.push((label, DetailValue::Number(value)));
    }
}

// Editorial override for one specific policy: the FRS sample of disabled
// children is too small for the microsimulation to be trusted, so whenever
// the dataset carries a published figure the result points at it.
fn advisory_warnings(policy: PolicyId, metrics: &HashMap<String, f64>) -> Vec<String> {
    if policy != PolicyId::DisabledChildExemption {
        return Vec::new();
    }
    let Some(published_cost) = metrics.get("publishedCost").copied() else {
        return Vec::new();
    };
    let published_children = metrics
        .get("publishedChildrenOutOfPoverty")
        .copied()
        .unwrap_or(f64::NAN);
    vec![
        format!(
            "Published estimate: \u{a3}{:.1}bn cost, {} children lifted from poverty",
            published_cost / 1e9,
            group_thousands(published_children)
        ),
        "Large discrepancy due to small sample size in FRS data. Use published estimates for \
         policy decisions."
            .to_string(),
    ]
}

pub fn group_thousands(value: f64) -> String {
    if !value.is_finite() {
        return "n/a".to_string();
    }
    let rounded = value.round() as i64;
    let digits = rounded.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert_eq, proptest};

    fn store_from(rows: &[&str]) -> RecordStore {
        let mut text = "year,policy,parameter,metric,value\n".to_string();
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        RecordStore::parse(&text)
    }

    #[test]
    fn resolves_child_and_age_limits_as_is() {
        let config = PolicyConfig {
            child_limit: 4,
            age_limit: 7,
            ..PolicyConfig::default()
        };
        assert_eq!(
            resolved_parameter(PolicyId::ThreeChildLimit, config),
            Some(4.0)
        );
        assert_eq!(
            resolved_parameter(PolicyId::UnderFiveExemption, config),
            Some(7.0)
        );
    }

    #[test]
    fn resolves_reduction_rate_to_integer_percentage() {
        let config = |rate: f64| PolicyConfig {
            reduction_rate: rate,
            ..PolicyConfig::default()
        };
        assert_eq!(
            resolved_parameter(PolicyId::LowerThirdChildElement, config(0.7)),
            Some(70.0)
        );
        assert_eq!(
            resolved_parameter(PolicyId::LowerThirdChildElement, config(0.5)),
            Some(50.0)
        );
        assert_eq!(
            resolved_parameter(PolicyId::LowerThirdChildElement, config(1.0)),
            Some(100.0)
        );
        // 0.625 * 100 is exactly 62.5; half rounds away from zero.
        assert_eq!(
            resolved_parameter(PolicyId::LowerThirdChildElement, config(0.625)),
            Some(63.0)
        );
    }

    #[test]
    fn non_parameterized_policies_resolve_to_none() {
        let config = PolicyConfig::default();
        assert_eq!(resolved_parameter(PolicyId::FullAbolition, config), None);
        assert_eq!(
            resolved_parameter(PolicyId::DisabledChildExemption, config),
            None
        );
        assert_eq!(
            resolved_parameter(PolicyId::WorkingFamiliesExemption, config),
            None
        );
    }

    #[test]
    fn aggregates_full_abolition_headline() {
        let store = store_from(&[
            "2026,full-abolition,None,cost,5000000000",
            "2026,full-abolition,None,familiesAffected,1200000",
        ]);
        let result = aggregate(&store, PolicyId::FullAbolition, PolicyConfig::default());
        assert_eq!(result.headline.cost, Some(5e9));
        assert_eq!(result.headline.families_affected, Some(1.2e6));
        assert_eq!(result.parameter, None);
        assert_eq!(result.all_years.len(), 4);
        assert_eq!(result.all_years[0].year, "2026");
        assert_eq!(result.all_years[3].year, "2029");
    }

    #[test]
    fn full_reform_cost_defaults_to_cost() {
        let store = store_from(&["2026,full-abolition,,cost,3000000000"]);
        let result = aggregate(&store, PolicyId::FullAbolition, PolicyConfig::default());
        assert_eq!(result.headline.full_reform_cost, Some(3e9));

        let store = store_from(&[
            "2026,three-child-limit,3,cost,1000000000",
            "2026,three-child-limit,3,fullReformCost,3000000000",
        ]);
        let result = aggregate(&store, PolicyId::ThreeChildLimit, PolicyConfig::default());
        assert_eq!(result.headline.full_reform_cost, Some(3e9));
        assert_eq!(result.headline.cost, Some(1e9));
    }

    #[test]
    fn missing_years_still_produce_all_four_entries() {
        let store = store_from(&["2026,full-abolition,,cost,1"]);
        let result = aggregate(&store, PolicyId::FullAbolition, PolicyConfig::default());
        assert_eq!(result.all_years.len(), 4);
        assert_eq!(result.all_years[1].cost, None);
        assert_eq!(result.all_years[1].full_reform_cost, None);
    }

    #[test]
    fn result_is_constructed_even_without_headline_cost() {
        let store = store_from(&["2027,full-abolition,,cost,1"]);
        let result = aggregate(&store, PolicyId::FullAbolition, PolicyConfig::default());
        assert_eq!(result.headline.cost, None);
        assert_eq!(result.year("2027").and_then(|y| y.cost), Some(1.0));
    }

    #[test]
    fn three_child_limit_details_follow_configured_limit() {
        let store = store_from(&[
            "2026,three-child-limit,4,cost,1",
            "2026,three-child-limit,4,familiesAtLimit,120",
            "2026,three-child-limit,4,familiesAboveLimit,45",
        ]);
        let config = PolicyConfig {
            child_limit: 4,
            ..PolicyConfig::default()
        };
        let result = aggregate(&store, PolicyId::ThreeChildLimit, config);
        assert_eq!(
            result.details,
            vec![
                ("Child limit".to_string(), DetailValue::Number(4.0)),
                (
                    "Families with exactly 4 children".to_string(),
                    DetailValue::Number(120.0)
                ),
                (
                    "Families with 5+ children".to_string(),
                    DetailValue::Number(45.0)
                ),
            ]
        );
    }

    #[test]
    fn under_five_details_include_age_label() {
        let store = store_from(&[
            "2026,under-five-exemption,5,totalChildrenUnderAge,5000",
            "2026,under-five-exemption,5,affectedChildrenUnderAge,1500",
        ]);
        let result = aggregate(&store, PolicyId::UnderFiveExemption, PolicyConfig::default());
        assert_eq!(
            result.details[0],
            (
                "Age limit".to_string(),
                DetailValue::Text("5 years".to_string())
            )
        );
        assert_eq!(result.details.len(), 3);
    }

    #[test]
    fn lower_third_element_details_format_amounts() {
        let store = store_from(&[
            "2026,lower-third-child-element,70,reductionRate,0.7",
            "2026,lower-third-child-element,70,standardElement,3626",
            "2026,lower-third-child-element,70,reducedElement,2538",
            "2026,lower-third-child-element,70,thirdPlusChildren,800000",
        ]);
        let result = aggregate(
            &store,
            PolicyId::LowerThirdChildElement,
            PolicyConfig::default(),
        );
        assert_eq!(
            result.details,
            vec![
                (
                    "Reduction rate".to_string(),
                    DetailValue::Text("70%".to_string())
                ),
                (
                    "Standard element".to_string(),
                    DetailValue::Text("\u{a3}3,626/year".to_string())
                ),
                (
                    "Reduced element (3rd+)".to_string(),
                    DetailValue::Text("\u{a3}2,538/year".to_string())
                ),
                ("Children 3rd+".to_string(), DetailValue::Number(800000.0)),
            ]
        );
    }

    #[test]
    fn disabled_child_exemption_emits_published_estimate_warnings() {
        let store = store_from(&[
            "2026,disabled-child-exemption,,cost,400000000",
            "2026,disabled-child-exemption,,publishedCost,1200000000",
            "2026,disabled-child-exemption,,publishedChildrenOutOfPoverty,120000",
        ]);
        let result = aggregate(
            &store,
            PolicyId::DisabledChildExemption,
            PolicyConfig::default(),
        );
        assert_eq!(result.warnings.len(), 2);
        assert_eq!(
            result.warnings[0],
            "Published estimate: \u{a3}1.2bn cost, 120,000 children lifted from poverty"
        );
        assert!(result.warnings[1].contains("small sample size"));
    }

    #[test]
    fn warnings_absent_without_published_cost() {
        let store = store_from(&["2026,disabled-child-exemption,,cost,400000000"]);
        let result = aggregate(
            &store,
            PolicyId::DisabledChildExemption,
            PolicyConfig::default(),
        );
        assert!(result.warnings.is_empty());

        let store = store_from(&["2026,full-abolition,,publishedCost,1200000000"]);
        let result = aggregate(&store, PolicyId::FullAbolition, PolicyConfig::default());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn group_thousands_handles_signs_and_nan() {
        assert_eq!(group_thousands(0.0), "0");
        assert_eq!(group_thousands(999.0), "999");
        assert_eq!(group_thousands(1000.0), "1,000");
        assert_eq!(group_thousands(1234567.4), "1,234,567");
        assert_eq!(group_thousands(-42000.0), "-42,000");
        assert_eq!(group_thousands(f64::NAN), "n/a");
    }

    proptest! {
        #[test]
        fn prop_generator_rate_grid_round_trips(rate_pct in 5u32..=100) {
            // Any rate the slider can express in whole percent must resolve
            // back to that exact integer key.
            let config = PolicyConfig {
                reduction_rate: rate_pct as f64 / 100.0,
                ..PolicyConfig::default()
            };
            prop_assert_eq!(
                resolved_parameter(PolicyId::LowerThirdChildElement, config),
                Some(rate_pct as f64)
            );
        }
    }
}
