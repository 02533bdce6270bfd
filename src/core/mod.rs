pub mod aggregate;
pub mod chart;
pub mod distributional;
pub mod export;
pub mod session;
pub mod store;
pub mod types;

pub use aggregate::{aggregate, resolved_parameter};
pub use chart::pivot;
pub use distributional::{distributional_file_name, load_and_merge};
pub use export::{ReportFile, ReportFormat, report, todays_date};
pub use session::{
    AnalysisEngine, AnalysisSnapshot, ChartSet, DataSource, DirSource, LOADING_INDICATOR_DELAY,
    show_loading_indicator,
};
pub use store::{Record, RecordStore};
pub use types::{
    ChartRow, DetailValue, DistRecord, EngineError, FetchError, MetricKind, PolicyConfig,
    PolicyId, ScenarioResult, ScenarioYearResult, Selection, YEARS,
};
