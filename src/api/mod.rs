use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Json, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::info;

use crate::core::{
    AnalysisEngine, ChartSet, DirSource, DistRecord, PolicyConfig, PolicyId, ReportFormat,
    ScenarioResult, Selection, YEARS, load_and_merge, report, todays_date,
};

#[derive(Clone)]
struct AppState {
    engine: Arc<AnalysisEngine<DirSource>>,
    data_dir: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PolicyConfigPayload {
    child_limit: Option<u32>,
    age_limit: Option<u32>,
    reduction_rate: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AnalyzePayload {
    year: Option<String>,
    policies: Vec<PolicyId>,
    params: HashMap<PolicyId, PolicyConfigPayload>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SelectionQuery {
    year: Option<String>,
    // Comma-separated policy slugs, e.g. "full-abolition,three-child-limit".
    policies: Option<String>,
    child_limit: Option<u32>,
    age_limit: Option<u32>,
    reduction_rate: Option<f64>,
    format: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResponse<'a> {
    year: &'a str,
    run: u64,
    policies: &'a [PolicyId],
    results: &'a [ScenarioResult],
    charts: &'a ChartSet,
    distributional: Option<Vec<DistRecord>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DistributionalResponse<'a> {
    year: &'a str,
    records: Option<Vec<DistRecord>>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_config(payload: &PolicyConfigPayload) -> Result<PolicyConfig, String> {
    let mut config = PolicyConfig::default();
    if let Some(v) = payload.child_limit {
        if v == 0 {
            return Err("childLimit must be at least 1".to_string());
        }
        config.child_limit = v;
    }
    if let Some(v) = payload.age_limit {
        config.age_limit = v;
    }
    if let Some(v) = payload.reduction_rate {
        if !(0.5..=1.0).contains(&v) {
            return Err("reductionRate must be between 0.5 and 1.0".to_string());
        }
        config.reduction_rate = v;
    }
    Ok(config)
}

fn validate_year(year: Option<String>) -> Result<String, String> {
    let year = year.unwrap_or_else(|| YEARS[0].to_string());
    if !YEARS.contains(&year.as_str()) {
        return Err(format!("year must be one of {}", YEARS.join(", ")));
    }
    Ok(year)
}

fn selection_from_payload(payload: AnalyzePayload) -> Result<Selection, String> {
    let year = validate_year(payload.year)?;
    let policies = if payload.policies.is_empty() {
        vec![PolicyId::FullAbolition]
    } else {
        payload.policies
    };
    let mut configs = HashMap::new();
    for (policy, config) in &payload.params {
        configs.insert(*policy, build_config(config)?);
    }
    Selection::from_parts(policies, configs, year)
}

fn selection_from_query(query: SelectionQuery) -> Result<Selection, String> {
    let year = validate_year(query.year)?;
    let policies = match query.policies.as_deref() {
        None | Some("") => vec![PolicyId::FullAbolition],
        Some(list) => {
            let mut policies = Vec::new();
            for slug in list.split(',') {
                let slug = slug.trim();
                let Some(policy) = PolicyId::from_str(slug) else {
                    return Err(format!("unknown policy: {slug}"));
                };
                policies.push(policy);
            }
            policies
        }
    };

    let config = build_config(&PolicyConfigPayload {
        child_limit: query.child_limit,
        age_limit: query.age_limit,
        reduction_rate: query.reduction_rate,
    })?;
    let configs = policies.iter().map(|p| (*p, config)).collect();
    Selection::from_parts(policies, configs, year)
}

pub async fn run_http_server(port: u16, data_dir: PathBuf) -> std::io::Result<()> {
    let state = AppState {
        engine: Arc::new(AnalysisEngine::new(DirSource::new(&data_dir))),
        data_dir,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/analyze",
            get(analyze_get_handler).post(analyze_post_handler),
        )
        .route("/api/distributional", get(distributional_handler))
        .route("/api/report", get(report_handler))
        .route("/data/:file", get(data_file_handler))
        .fallback(not_found_handler)
        .with_state(state);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "policy analysis API listening");
    axum::serve(listener, app).await
}

async fn analyze_get_handler(
    State(state): State<AppState>,
    Query(query): Query<SelectionQuery>,
) -> Response {
    match selection_from_query(query) {
        Ok(selection) => run_analysis(&state, selection).await,
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

async fn analyze_post_handler(
    State(state): State<AppState>,
    Json(payload): Json<AnalyzePayload>,
) -> Response {
    match selection_from_payload(payload) {
        Ok(selection) => run_analysis(&state, selection).await,
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

async fn run_analysis(state: &AppState, selection: Selection) -> Response {
    let snapshot = match state.engine.analyze(&selection).await {
        Ok(Some(snapshot)) => snapshot,
        // This run was superseded mid-flight; answer with whatever the
        // winning run published.
        Ok(None) => match state.engine.published() {
            Some(snapshot) => snapshot,
            None => return error_response(StatusCode::CONFLICT, "analysis superseded; retry"),
        },
        Err(e) => return error_response(StatusCode::SERVICE_UNAVAILABLE, &e.to_string()),
    };

    let distributional = load_and_merge(state.engine.source(), &selection).await;
    json_response(
        StatusCode::OK,
        AnalyzeResponse {
            year: &selection.year,
            run: snapshot.run,
            policies: &snapshot.policies,
            results: &snapshot.results,
            charts: &snapshot.charts,
            distributional,
        },
    )
}

async fn distributional_handler(
    State(state): State<AppState>,
    Query(query): Query<SelectionQuery>,
) -> Response {
    let selection = match selection_from_query(query) {
        Ok(selection) => selection,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    let records = load_and_merge(state.engine.source(), &selection).await;
    json_response(
        StatusCode::OK,
        DistributionalResponse {
            year: &selection.year,
            records,
        },
    )
}

async fn report_handler(
    State(state): State<AppState>,
    Query(query): Query<SelectionQuery>,
) -> Response {
    let format = match query.format.as_deref() {
        None => ReportFormat::Text,
        Some(name) => match ReportFormat::from_str(name) {
            Some(format) => format,
            None => return error_response(StatusCode::BAD_REQUEST, "format must be text or csv"),
        },
    };
    let selection = match selection_from_query(query) {
        Ok(selection) => selection,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let snapshot = match state.engine.analyze(&selection).await {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => match state.engine.published() {
            Some(snapshot) => snapshot,
            None => return error_response(StatusCode::CONFLICT, "analysis superseded; retry"),
        },
        Err(e) => return error_response(StatusCode::SERVICE_UNAVAILABLE, &e.to_string()),
    };

    let file = report(&snapshot, format, todays_date());
    let content_type = match format {
        ReportFormat::Text => "text/plain; charset=utf-8",
        ReportFormat::Csv => "text/csv; charset=utf-8",
    };
    with_cache_control((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.file_name),
            ),
        ],
        file.contents,
    ))
}

async fn data_file_handler(State(state): State<AppState>, Path(file): Path<String>) -> Response {
    if file.contains('/') || file.contains('\\') || file.contains("..") {
        return error_response(StatusCode::BAD_REQUEST, "invalid file name");
    }
    match tokio::fs::read_to_string(state.data_dir.join(&file)).await {
        Ok(contents) => with_cache_control((
            [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
            contents,
        )),
        Err(_) => error_response(StatusCode::NOT_FOUND, "Not found"),
    }
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
