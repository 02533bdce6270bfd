use jiff::civil::Date;

use super::session::AnalysisSnapshot;
use super::types::MetricKind;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReportFormat {
    Text,
    Csv,
}

impl ReportFormat {
    pub fn from_str(value: &str) -> Option<ReportFormat> {
        match value {
            "text" | "txt" => Some(ReportFormat::Text),
            "csv" => Some(ReportFormat::Csv),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ReportFile {
    pub file_name: String,
    pub contents: String,
}

const SECTIONS: [(MetricKind, &str, &str); 5] = [
    (MetricKind::BudgetaryImpact, "Budgetary impact", "\u{a3}bn"),
    (
        MetricKind::ChildrenNoLongerLimited,
        "Children no longer limited",
        "thousands",
    ),
    (
        MetricKind::ChildrenOutOfPoverty,
        "Children lifted from poverty",
        "thousands",
    ),
    (
        MetricKind::PovertyRateReduction,
        "Poverty rate reduction",
        "percentage points",
    ),
    (
        MetricKind::PovertyRate,
        "Child poverty rate after reform",
        "%",
    ),
];

pub fn todays_date() -> Date {
    jiff::Zoned::now().date()
}

pub fn report(snapshot: &AnalysisSnapshot, format: ReportFormat, date: Date) -> ReportFile {
    match format {
        ReportFormat::Text => text_report(snapshot, date),
        ReportFormat::Csv => csv_report(snapshot, date),
    }
}

pub fn text_report(snapshot: &AnalysisSnapshot, date: Date) -> ReportFile {
    let mut out = String::new();
    out.push_str("Two-child limit reform analysis\n");
    out.push_str(&format!("Generated {date}\n"));

    for (metric, label, unit) in SECTIONS {
        out.push('\n');
        out.push_str(&format!("{label} ({unit})\n"));
        for row in snapshot.charts.table(metric) {
            for policy in &snapshot.policies {
                out.push_str(&format!(
                    "  {}  {}  {}\n",
                    row.year,
                    policy.display_name(),
                    fmt_value(row.value(*policy))
                ));
            }
        }
    }

    ReportFile {
        file_name: format!("policy-analysis-report-{date}.txt"),
        contents: out,
    }
}

pub fn csv_report(snapshot: &AnalysisSnapshot, date: Date) -> ReportFile {
    let mut out = String::from("metric,year,policy,value\n");
    for (metric, _, _) in SECTIONS {
        for row in snapshot.charts.table(metric) {
            for policy in &snapshot.policies {
                out.push_str(&format!(
                    "{},{},{},{}\n",
                    metric.as_str(),
                    row.year,
                    policy.as_str(),
                    fmt_value(row.value(*policy))
                ));
            }
        }
    }

    ReportFile {
        file_name: format!("policy-analysis-report-{date}.csv"),
        contents: out,
    }
}

// Absent cells and NaN both render as n/a; a malformed numeric upstream must
// never panic the formatter.
fn fmt_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.2}"),
        _ => "n/a".to_string(),
    }
}
