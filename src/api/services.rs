use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use std::collections::BTreeMap;

use super::{
    error::ApiError,
    models::{
        EntriesResponse, HealthResponse, LocalReadParams, ResetParams, ResetResponse,
        SearchParams, SearchResponse,
    },
    state::AppState,
    utils::{attachment_disposition, encode_cursor, parse_category, parse_cursor, parse_millis},
    validation::validate_search,
};
use crate::search::SearchRequest;

/// Archived entry by key (GET /logs/archive/{*key})
///
/// 404 covers both a missing object and one that failed to decode.
pub async fn fetch_archived(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if state.logbook.archive().is_none() {
        return Err(ApiError::Disabled("archive"));
    }

    let entry = state
        .logbook
        .fetch(&key)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("archived entry {key}")))?;

    Ok(Json(entry))
}

/// Recent warnings and errors, merged (GET /logs/default)
pub async fn default_view(State(state): State<AppState>) -> impl IntoResponse {
    let entries = state.logbook.default_view().await;
    Json(EntriesResponse { entries })
}

/// Ranked search with offset pagination (GET /logs/search)
///
/// The engine is asked for one page past the cursor plus one extra row, so
/// `next_cursor` is only set when another page really exists.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    validate_search(&params)?;
    let category = parse_category(&params.category)?;
    let offset = parse_cursor(params.cursor.as_deref())?;

    let settings = &state.logbook.settings().search;
    let page = settings.limit(params.limit);
    let wanted = offset.saturating_add(page).saturating_add(1);

    let request = SearchRequest::builder()
        .category(category)
        .term(params.term.as_str())
        .maybe_start(params.start.map(parse_millis).transpose()?)
        .maybe_end(params.end.map(parse_millis).transpose()?)
        .max_entries(wanted.min(settings.max_entries))
        .merge_duplicates(params.merge)
        .build();

    let found = state.logbook.search(&request).await;
    let has_more = found.len() > offset.saturating_add(page);
    let entries: Vec<_> = found.into_iter().skip(offset).take(page).collect();
    let next_cursor = has_more.then(|| encode_cursor(offset + page));

    Ok(Json(SearchResponse {
        entries,
        next_cursor,
    }))
}

/// Local buffer read-back (GET /logs/local/{category})
pub async fn read_local(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(params): Query<LocalReadParams>,
) -> Result<impl IntoResponse, ApiError> {
    let category = parse_category(&category)?;
    if state.logbook.local().is_none() {
        return Err(ApiError::Disabled("local buffer"));
    }

    let limit = state.logbook.settings().search.limit(params.limit);
    let entries = state
        .logbook
        .read_local(category, limit, params.before, params.order);

    Ok(Json(EntriesResponse { entries }))
}

/// Truncate a category to its newest records (POST /logs/local/{category}/reset)
pub async fn reset_local(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(params): Query<ResetParams>,
) -> Result<impl IntoResponse, ApiError> {
    let category = parse_category(&category)?;
    if state.logbook.local().is_none() {
        return Err(ApiError::Disabled("local buffer"));
    }

    let entries = state.logbook.reset_local(category, params.retain);
    tracing::info!(category = %category, retained = entries.len(), "Local buffer reset via API");

    Ok(Json(ResetResponse {
        retained: entries.len(),
        entries,
    }))
}

/// Category buffer as a plain-text attachment (GET /logs/local/{category}/download)
pub async fn download_local(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let category = parse_category(&category)?;
    if state.logbook.local().is_none() {
        return Err(ApiError::Disabled("local buffer"));
    }

    let text = state
        .logbook
        .download_local(category)
        .ok_or_else(|| ApiError::NotFound(format!("local buffer for {category}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, mime::TEXT_PLAIN_UTF_8.to_string()),
            (header::CONTENT_DISPOSITION, attachment_disposition(category)),
        ],
        text,
    ))
}

/// Health check endpoint (GET /health)
///
/// Reports which sinks are enabled plus the sink-failure counters. The status
/// turns `degraded` once any sink has failed; the endpoint itself always
/// answers 200.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let logbook = &state.logbook;
    let enabled = |on: bool| if on { "enabled" } else { "disabled" }.to_string();

    let mut components = BTreeMap::new();
    components.insert("local".to_string(), enabled(logbook.local().is_some()));
    components.insert("archive".to_string(), enabled(logbook.archive().is_some()));
    components.insert(
        "search".to_string(),
        enabled(logbook.search_engine().is_some()),
    );

    let failures = logbook.failures();
    let status = if failures.total() == 0 {
        "healthy"
    } else {
        "degraded"
    };

    let response = HealthResponse {
        status: status.to_string(),
        components,
        failures,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (StatusCode::OK, Json(response))
}
