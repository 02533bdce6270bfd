use std::collections::HashMap;

use super::types::PolicyId;

#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub year: String,
    pub policy: PolicyId,
    pub parameter: Option<f64>,
    pub metric: String,
    pub value: f64,
}

#[derive(Clone, Debug, Default)]
pub struct RecordStore {
    records: Vec<Record>,
}

impl RecordStore {
    // The dataset is long-format CSV: year,policy,parameter,metric,value.
    // The header line is discarded unconditionally and fields never contain
    // commas, so a positional split is the whole grammar. Malformed numerics
    // become NaN rather than errors; downstream formatting guards them.
    pub fn parse(raw: &str) -> RecordStore {
        let mut records = Vec::new();
        for line in raw.lines().skip(1) {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').collect();
            let field = |idx: usize| fields.get(idx).copied().unwrap_or("");

            let Some(policy) = PolicyId::from_str(field(1)) else {
                continue;
            };
            let parameter = match field(2) {
                "" | "None" => None,
                text => Some(text.parse::<f64>().unwrap_or(f64::NAN)),
            };
            records.push(Record {
                year: field(0).to_string(),
                policy,
                parameter,
                metric: field(3).to_string(),
                value: field(4).parse::<f64>().unwrap_or(f64::NAN),
            });
        }
        RecordStore { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // Returns the metric map for one (year, policy, parameter) scenario cell.
    // Parameters are compared numerically so an integer 3 from the caller
    // matches a 3.0 in the dataset; for non-parameterized policies the stored
    // parameter is ignored outright. An empty result is "no data", not an
    // error. Collisions resolve last-write-wins; uniqueness is the dataset
    // generator's contract, not ours.
    pub fn query(
        &self,
        year: &str,
        policy: PolicyId,
        parameter: Option<f64>,
    ) -> HashMap<String, f64> {
        let mut metrics = HashMap::new();
        for record in &self.records {
            if record.year != year || record.policy != policy {
                continue;
            }
            if policy.is_parameterized() && !parameters_equal(record.parameter, parameter) {
                continue;
            }
            metrics.insert(record.metric.clone(), record.value);
        }
        metrics
    }
}

fn parameters_equal(stored: Option<f64>, requested: Option<f64>) -> bool {
    match (stored, requested) {
        (None, None) => true,
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
