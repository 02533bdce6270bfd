use std::collections::HashMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

pub const YEARS: [&str; 4] = ["2026", "2027", "2028", "2029"];

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyId {
    #[serde(alias = "fullAbolition", alias = "full_abolition")]
    FullAbolition,
    #[serde(alias = "threeChildLimit", alias = "three_child_limit")]
    ThreeChildLimit,
    #[serde(alias = "underFiveExemption", alias = "under_five_exemption")]
    UnderFiveExemption,
    #[serde(alias = "disabledChildExemption", alias = "disabled_child_exemption")]
    DisabledChildExemption,
    #[serde(alias = "workingFamiliesExemption", alias = "working_families_exemption")]
    WorkingFamiliesExemption,
    #[serde(alias = "lowerThirdChildElement", alias = "lower_third_child_element")]
    LowerThirdChildElement,
}

impl PolicyId {
    pub const ALL: [PolicyId; 6] = [
        PolicyId::FullAbolition,
        PolicyId::ThreeChildLimit,
        PolicyId::UnderFiveExemption,
        PolicyId::DisabledChildExemption,
        PolicyId::WorkingFamiliesExemption,
        PolicyId::LowerThirdChildElement,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PolicyId::FullAbolition => "full-abolition",
            PolicyId::ThreeChildLimit => "three-child-limit",
            PolicyId::UnderFiveExemption => "under-five-exemption",
            PolicyId::DisabledChildExemption => "disabled-child-exemption",
            PolicyId::WorkingFamiliesExemption => "working-families-exemption",
            PolicyId::LowerThirdChildElement => "lower-third-child-element",
        }
    }

    pub fn from_str(value: &str) -> Option<PolicyId> {
        PolicyId::ALL.iter().copied().find(|p| p.as_str() == value)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            PolicyId::FullAbolition => "Full abolition",
            PolicyId::ThreeChildLimit => "Raised child limit",
            PolicyId::UnderFiveExemption => "Under-five exemption",
            PolicyId::DisabledChildExemption => "Disabled child exemption",
            PolicyId::WorkingFamiliesExemption => "Working families exemption",
            PolicyId::LowerThirdChildElement => "Lower third-child element",
        }
    }

    pub fn is_parameterized(self) -> bool {
        matches!(
            self,
            PolicyId::ThreeChildLimit
                | PolicyId::UnderFiveExemption
                | PolicyId::LowerThirdChildElement
        )
    }

    pub fn has_distributional(self) -> bool {
        matches!(
            self,
            PolicyId::FullAbolition | PolicyId::ThreeChildLimit | PolicyId::UnderFiveExemption
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PolicyConfig {
    pub child_limit: u32,
    pub age_limit: u32,
    pub reduction_rate: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig {
            child_limit: 3,
            age_limit: 5,
            reduction_rate: 0.7,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Selection {
    policies: Vec<PolicyId>,
    configs: HashMap<PolicyId, PolicyConfig>,
    pub year: String,
}

impl Selection {
    pub fn new(policy: PolicyId) -> Selection {
        Selection {
            policies: vec![policy],
            configs: HashMap::new(),
            year: YEARS[0].to_string(),
        }
    }

    pub fn from_parts(
        policies: Vec<PolicyId>,
        configs: HashMap<PolicyId, PolicyConfig>,
        year: String,
    ) -> Result<Selection, String> {
        if policies.is_empty() {
            return Err("at least one policy must be selected".to_string());
        }
        let mut deduped: Vec<PolicyId> = Vec::with_capacity(policies.len());
        for policy in policies {
            if !deduped.contains(&policy) {
                deduped.push(policy);
            }
        }
        Ok(Selection {
            policies: deduped,
            configs,
            year,
        })
    }

    pub fn policies(&self) -> &[PolicyId] {
        &self.policies
    }

    pub fn config(&self, policy: PolicyId) -> PolicyConfig {
        self.configs.get(&policy).copied().unwrap_or_default()
    }

    pub fn set_config(&mut self, policy: PolicyId, config: PolicyConfig) {
        self.configs.insert(policy, config);
    }

    pub fn select(&mut self, policy: PolicyId) {
        if !self.policies.contains(&policy) {
            self.policies.push(policy);
        }
    }

    pub fn deselect(&mut self, policy: PolicyId) -> Result<(), String> {
        if self.policies.len() == 1 && self.policies[0] == policy {
            return Err("the selection must keep at least one policy".to_string());
        }
        self.policies.retain(|p| *p != policy);
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricKind {
    #[serde(alias = "budgetaryImpact", alias = "cost")]
    BudgetaryImpact,
    #[serde(alias = "familiesAffected")]
    FamiliesAffected,
    #[serde(alias = "childrenNoLongerLimited")]
    ChildrenNoLongerLimited,
    #[serde(alias = "childrenOutOfPoverty")]
    ChildrenOutOfPoverty,
    #[serde(alias = "povertyRate")]
    PovertyRate,
    #[serde(alias = "povertyRateReduction")]
    PovertyRateReduction,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::BudgetaryImpact => "budgetary-impact",
            MetricKind::FamiliesAffected => "families-affected",
            MetricKind::ChildrenNoLongerLimited => "children-no-longer-limited",
            MetricKind::ChildrenOutOfPoverty => "children-out-of-poverty",
            MetricKind::PovertyRate => "poverty-rate",
            MetricKind::PovertyRateReduction => "poverty-rate-reduction",
        }
    }

    pub const ALL: [MetricKind; 6] = [
        MetricKind::BudgetaryImpact,
        MetricKind::FamiliesAffected,
        MetricKind::ChildrenNoLongerLimited,
        MetricKind::ChildrenOutOfPoverty,
        MetricKind::PovertyRate,
        MetricKind::PovertyRateReduction,
    ];
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioYearResult {
    pub year: String,
    pub cost: Option<f64>,
    pub full_reform_cost: Option<f64>,
    pub families_affected: Option<f64>,
    pub total_affected_families: Option<f64>,
    pub children_no_longer_limited: Option<f64>,
    pub total_limited_children: Option<f64>,
    pub children_out_of_poverty: Option<f64>,
    pub baseline_poverty_rate: Option<f64>,
    pub reformed_poverty_rate: Option<f64>,
    pub poverty_rate_reduction: Option<f64>,
    pub cost_per_child: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DetailValue {
    Number(f64),
    Text(String),
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    pub policy: PolicyId,
    pub parameter: Option<f64>,
    pub headline: ScenarioYearResult,
    pub all_years: Vec<ScenarioYearResult>,
    pub details: Vec<(String, DetailValue)>,
    pub warnings: Vec<String>,
}

impl ScenarioResult {
    pub fn year(&self, year: &str) -> Option<&ScenarioYearResult> {
        self.all_years.iter().find(|y| y.year == year)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChartRow {
    pub year: String,
    pub values: Vec<(PolicyId, f64)>,
    pub baseline: Option<f64>,
}

impl ChartRow {
    pub fn value(&self, policy: PolicyId) -> Option<f64> {
        self.values
            .iter()
            .find(|(p, _)| *p == policy)
            .map(|(_, v)| *v)
    }
}

// Serialized flat, one key per selected policy, so a charting client can
// consume rows without knowing the selection in advance.
impl Serialize for ChartRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let extra = 1 + usize::from(self.baseline.is_some());
        let mut map = serializer.serialize_map(Some(self.values.len() + extra))?;
        map.serialize_entry("year", &self.year)?;
        for (policy, value) in &self.values {
            map.serialize_entry(policy.as_str(), value)?;
        }
        if let Some(baseline) = self.baseline {
            map.serialize_entry("baseline", &baseline)?;
        }
        map.end()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DistRecord {
    pub decile: u8,
    pub changes: Vec<(PolicyId, f64)>,
}

impl DistRecord {
    pub fn change(&self, policy: PolicyId) -> Option<f64> {
        self.changes
            .iter()
            .find(|(p, _)| *p == policy)
            .map(|(_, v)| *v)
    }
}

impl Serialize for DistRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.changes.len() + 1))?;
        map.serialize_entry("decile", &self.decile)?;
        for (policy, value) in &self.changes {
            map.serialize_entry(policy.as_str(), value)?;
        }
        map.end()
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
#[error("fetch failed: {0}")]
pub struct FetchError(pub String);

#[derive(Debug, Error)]
pub enum EngineError {
    // The primary dataset being unreachable is blocking: the run aborts and
    // is reported once, never retried.
    #[error("analysis data is unavailable: {0}")]
    DataUnavailable(#[from] FetchError),
}
