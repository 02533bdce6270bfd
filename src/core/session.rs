use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use super::aggregate::aggregate;
use super::chart::pivot;
use super::store::RecordStore;
use super::types::{
    ChartRow, EngineError, FetchError, MetricKind, PolicyId, ScenarioResult, Selection,
};

pub const RESULTS_FILE: &str = "all-results.csv";

// A visible spinner is debounced so fast responses never flicker one in; the
// computation itself is never delayed.
pub const LOADING_INDICATOR_DELAY: Duration = Duration::from_millis(150);

pub fn show_loading_indicator(started: Instant) -> bool {
    started.elapsed() >= LOADING_INDICATOR_DELAY
}

pub trait DataSource: Send + Sync {
    fn fetch_results(&self) -> impl Future<Output = Result<String, FetchError>> + Send;
    fn fetch_distributional(
        &self,
        file_name: &str,
    ) -> impl Future<Output = Result<String, FetchError>> + Send;
}

#[derive(Clone, Debug)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> DirSource {
        DirSource { root: root.into() }
    }

    async fn read(&self, file_name: &str) -> Result<String, FetchError> {
        tokio::fs::read_to_string(self.root.join(file_name))
            .await
            .map_err(|e| FetchError(format!("{file_name}: {e}")))
    }
}

impl DataSource for DirSource {
    async fn fetch_results(&self) -> Result<String, FetchError> {
        self.read(RESULTS_FILE).await
    }

    async fn fetch_distributional(&self, file_name: &str) -> Result<String, FetchError> {
        self.read(file_name).await
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSet {
    pub budgetary_impact: Vec<ChartRow>,
    pub families_affected: Vec<ChartRow>,
    pub children_no_longer_limited: Vec<ChartRow>,
    pub children_out_of_poverty: Vec<ChartRow>,
    pub poverty_rate: Vec<ChartRow>,
    pub poverty_rate_reduction: Vec<ChartRow>,
}

impl ChartSet {
    pub fn build(
        by_policy: &HashMap<PolicyId, ScenarioResult>,
        policies: &[PolicyId],
    ) -> ChartSet {
        let chart = |metric: MetricKind, with_baseline: bool| {
            pivot(by_policy, policies, metric, with_baseline)
        };
        ChartSet {
            budgetary_impact: chart(MetricKind::BudgetaryImpact, false),
            families_affected: chart(MetricKind::FamiliesAffected, false),
            children_no_longer_limited: chart(MetricKind::ChildrenNoLongerLimited, false),
            children_out_of_poverty: chart(MetricKind::ChildrenOutOfPoverty, false),
            poverty_rate: chart(MetricKind::PovertyRate, true),
            poverty_rate_reduction: chart(MetricKind::PovertyRateReduction, false),
        }
    }

    pub fn table(&self, metric: MetricKind) -> &[ChartRow] {
        match metric {
            MetricKind::BudgetaryImpact => &self.budgetary_impact,
            MetricKind::FamiliesAffected => &self.families_affected,
            MetricKind::ChildrenNoLongerLimited => &self.children_no_longer_limited,
            MetricKind::ChildrenOutOfPoverty => &self.children_out_of_poverty,
            MetricKind::PovertyRate => &self.poverty_rate,
            MetricKind::PovertyRateReduction => &self.poverty_rate_reduction,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSnapshot {
    pub run: u64,
    pub policies: Vec<PolicyId>,
    pub results: Vec<ScenarioResult>,
    pub charts: ChartSet,
}

impl AnalysisSnapshot {
    pub fn result(&self, policy: PolicyId) -> Option<&ScenarioResult> {
        self.results.iter().find(|r| r.policy == policy)
    }
}

// Each analyze call claims a monotonically increasing token before its fetch
// suspends. Completions whose token is no longer the latest issued are
// dropped, so a slow early run can never clobber the result of a later one,
// regardless of arrival order.
pub struct AnalysisEngine<S> {
    source: S,
    latest: AtomicU64,
    published: Mutex<Option<Arc<AnalysisSnapshot>>>,
}

impl<S: DataSource> AnalysisEngine<S> {
    pub fn new(source: S) -> AnalysisEngine<S> {
        AnalysisEngine {
            source,
            latest: AtomicU64::new(0),
            published: Mutex::new(None),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn published(&self) -> Option<Arc<AnalysisSnapshot>> {
        self.published.lock().expect("published lock poisoned").clone()
    }

    // Full recomputation per run: re-fetch, re-parse, rebuild every scenario
    // and chart from scratch. No incremental patching of earlier results.
    pub async fn analyze(
        &self,
        selection: &Selection,
    ) -> Result<Option<Arc<AnalysisSnapshot>>, EngineError> {
        let token = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(token, policies = selection.policies().len(), "analysis run started");

        let raw = self.source.fetch_results().await?;
        let store = RecordStore::parse(&raw);
        debug!(token, records = store.len(), "dataset parsed");

        let mut results = Vec::with_capacity(selection.policies().len());
        let mut by_policy = HashMap::new();
        for policy in selection.policies() {
            let result = aggregate(&store, *policy, selection.config(*policy));
            by_policy.insert(*policy, result.clone());
            results.push(result);
        }

        let charts = ChartSet::build(&by_policy, selection.policies());

        let snapshot = Arc::new(AnalysisSnapshot {
            run: token,
            policies: selection.policies().to_vec(),
            results,
            charts,
        });

        let mut published = self.published.lock().expect("published lock poisoned");
        if self.latest.load(Ordering::SeqCst) == token {
            *published = Some(Arc::clone(&snapshot));
            debug!(token, "analysis run published");
            Ok(Some(snapshot))
        } else {
            debug!(token, "stale analysis run dropped");
            Ok(None)
        }
    }
}
