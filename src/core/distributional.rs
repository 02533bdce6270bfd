use std::collections::BTreeMap;

use tracing::debug;

use super::session::DataSource;
use super::types::{DistRecord, PolicyConfig, PolicyId, Selection};

pub fn distributional_file_name(
    policy: PolicyId,
    year: &str,
    config: PolicyConfig,
) -> Option<String> {
    match policy {
        PolicyId::FullAbolition => Some(format!("distributional-analysis-full-abolition-{year}.csv")),
        PolicyId::ThreeChildLimit => Some(format!(
            "distributional-analysis-three-child-limit-{year}-limit{}.csv",
            config.child_limit
        )),
        PolicyId::UnderFiveExemption => Some(format!(
            "distributional-analysis-under-five-exemption-{year}-age{}.csv",
            config.age_limit
        )),
        _ => None,
    }
}

// Merges per-scenario decile files into one decile-indexed table. Each
// eligible policy's file is fetched independently; a miss for one policy
// leaves its column absent without aborting the others. Returns None only
// when no file loaded at all.
pub async fn load_and_merge<S: DataSource>(
    source: &S,
    selection: &Selection,
) -> Option<Vec<DistRecord>> {
    let year = selection.year.as_str();
    let mut merged: BTreeMap<u8, Vec<(PolicyId, f64)>> = BTreeMap::new();
    let mut any_loaded = false;

    for policy in selection.policies() {
        let Some(file_name) = distributional_file_name(*policy, year, selection.config(*policy))
        else {
            continue;
        };
        let text = match source.fetch_distributional(&file_name).await {
            Ok(text) => text,
            Err(e) => {
                // Soft miss: the dataset simply has no file for this variant.
                debug!(policy = policy.as_str(), %e, "distributional file unavailable");
                continue;
            }
        };
        any_loaded = true;
        for (decile, change) in parse_decile_rows(&text) {
            merged.entry(decile).or_default().push((*policy, change));
        }
    }

    if any_loaded {
        Some(
            merged
                .into_iter()
                .map(|(decile, changes)| DistRecord { decile, changes })
                .collect(),
        )
    } else {
        None
    }
}

// Rows are decile,relativeChange pairs; anything that does not parse as one
// (a header line, a blank) is skipped rather than treated as an error.
fn parse_decile_rows(text: &str) -> Vec<(u8, f64)> {
    let mut rows = Vec::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        let mut fields = line.split(',');
        let (Some(decile), Some(change)) = (fields.next(), fields.next()) else {
            continue;
        };
        let (Ok(decile), Ok(change)) = (decile.trim().parse::<u8>(), change.trim().parse::<f64>())
        else {
            continue;
        };
        rows.push((decile, change));
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::FetchError;
    use std::collections::HashMap;

    struct FileMapSource {
        files: HashMap<String, String>,
    }

    impl FileMapSource {
        fn new(files: &[(&str, &str)]) -> FileMapSource {
            FileMapSource {
                files: files
                    .iter()
                    .map(|(name, body)| (name.to_string(), body.to_string()))
                    .collect(),
            }
        }
    }

    impl DataSource for FileMapSource {
        async fn fetch_results(&self) -> Result<String, FetchError> {
            Err(FetchError("no results in this source".to_string()))
        }

        async fn fetch_distributional(&self, file_name: &str) -> Result<String, FetchError> {
            self.files
                .get(file_name)
                .cloned()
                .ok_or_else(|| FetchError(format!("{file_name}: 404")))
        }
    }

    fn selection_of(policies: &[PolicyId]) -> Selection {
        let mut iter = policies.iter();
        let mut selection = Selection::new(*iter.next().expect("non-empty"));
        for policy in iter {
            selection.select(*policy);
        }
        selection
    }

    #[test]
    fn file_names_encode_policy_year_and_parameter() {
        let config = PolicyConfig {
            child_limit: 4,
            age_limit: 7,
            ..PolicyConfig::default()
        };
        assert_eq!(
            distributional_file_name(PolicyId::FullAbolition, "2026", config).as_deref(),
            Some("distributional-analysis-full-abolition-2026.csv")
        );
        assert_eq!(
            distributional_file_name(PolicyId::ThreeChildLimit, "2027", config).as_deref(),
            Some("distributional-analysis-three-child-limit-2027-limit4.csv")
        );
        assert_eq!(
            distributional_file_name(PolicyId::UnderFiveExemption, "2028", config).as_deref(),
            Some("distributional-analysis-under-five-exemption-2028-age7.csv")
        );
        assert_eq!(
            distributional_file_name(PolicyId::DisabledChildExemption, "2026", config),
            None
        );
        assert_eq!(
            distributional_file_name(PolicyId::WorkingFamiliesExemption, "2026", config),
            None
        );
        assert_eq!(
            distributional_file_name(PolicyId::LowerThirdChildElement, "2026", config),
            None
        );
    }

    #[tokio::test]
    async fn merges_columns_across_policies_sorted_by_decile() {
        let source = FileMapSource::new(&[
            (
                "distributional-analysis-full-abolition-2026.csv",
                "decile,relativeChange\n2,1.8\n1,2.4\n",
            ),
            (
                "distributional-analysis-three-child-limit-2026-limit3.csv",
                "decile,relativeChange\n1,1.1\n3,0.5\n",
            ),
        ]);
        let selection = selection_of(&[PolicyId::FullAbolition, PolicyId::ThreeChildLimit]);

        let merged = load_and_merge(&source, &selection).await.expect("data");
        let deciles: Vec<u8> = merged.iter().map(|r| r.decile).collect();
        assert_eq!(deciles, vec![1, 2, 3]);
        assert_eq!(merged[0].change(PolicyId::FullAbolition), Some(2.4));
        assert_eq!(merged[0].change(PolicyId::ThreeChildLimit), Some(1.1));
        assert_eq!(merged[1].change(PolicyId::ThreeChildLimit), None);
        assert_eq!(merged[2].change(PolicyId::FullAbolition), None);
    }

    #[tokio::test]
    async fn one_missing_file_does_not_abort_the_rest() {
        let source = FileMapSource::new(&[(
            "distributional-analysis-full-abolition-2026.csv",
            "decile,relativeChange\n1,2.4\n",
        )]);
        let selection = selection_of(&[PolicyId::ThreeChildLimit, PolicyId::FullAbolition]);

        let merged = load_and_merge(&source, &selection).await.expect("partial data");
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].change(PolicyId::FullAbolition), Some(2.4));
        assert_eq!(merged[0].change(PolicyId::ThreeChildLimit), None);
    }

    #[tokio::test]
    async fn ineligible_policies_are_silently_skipped() {
        let source = FileMapSource::new(&[]);
        let selection = selection_of(&[
            PolicyId::DisabledChildExemption,
            PolicyId::WorkingFamiliesExemption,
            PolicyId::LowerThirdChildElement,
        ]);
        assert!(load_and_merge(&source, &selection).await.is_none());
    }

    #[tokio::test]
    async fn returns_none_when_nothing_loads() {
        let source = FileMapSource::new(&[]);
        let selection = selection_of(&[PolicyId::FullAbolition, PolicyId::ThreeChildLimit]);
        assert!(load_and_merge(&source, &selection).await.is_none());
    }

    #[tokio::test]
    async fn file_name_follows_configured_parameter() {
        let source = FileMapSource::new(&[(
            "distributional-analysis-three-child-limit-2026-limit5.csv",
            "decile,relativeChange\n1,0.9\n",
        )]);
        let mut selection = selection_of(&[PolicyId::ThreeChildLimit]);
        selection.set_config(
            PolicyId::ThreeChildLimit,
            PolicyConfig {
                child_limit: 5,
                ..PolicyConfig::default()
            },
        );

        let merged = load_and_merge(&source, &selection).await.expect("data");
        assert_eq!(merged[0].change(PolicyId::ThreeChildLimit), Some(0.9));
    }

    #[test]
    fn decile_rows_tolerate_headers_and_garbage() {
        let rows = parse_decile_rows("decile,relativeChange\n1,2.5\nnot,a,row\n\n10,-0.3\n");
        assert_eq!(rows, vec![(1, 2.5), (10, -0.3)]);
    }
}
