//! REST API route handlers.
//!
//! Provides endpoints for translation CRUD, filtered listing, slice export,
//! tag discovery and system status. Every handler answers with
//! `(StatusCode, Json<Value>)`; store errors are mapped by [`store_error`].

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{Value, json};

use lingo_store::validate;
use lingo_store::{StoreError, TranslationFilter, ValidationErrors};

use crate::state::AppState;

type Reply = (StatusCode, Json<Value>);

/// Raw query pairs. Kept as a list so repeated `tags[]` keys survive.
type QueryPairs = Vec<(String, String)>;

// ---------------------------------------------------------------------------
// GET /api/translations
// ---------------------------------------------------------------------------

/// List translations with filters and pagination.
pub async fn list_translations(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryPairs>,
) -> Reply {
    let filter = match list_filter(&params) {
        Ok(filter) => filter,
        Err(errors) => return validation_failed(errors),
    };

    match state.service.list(filter).await {
        Ok(page) => (StatusCode::OK, Json(json!(page))),
        Err(e) => store_error(e, "Failed to list translations"),
    }
}

fn list_filter(params: &QueryPairs) -> Result<TranslationFilter, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let defaults = TranslationFilter::default();

    let active_only = match param(params, "active_only") {
        None => defaults.active_only,
        Some(raw) => parse_bool(raw).unwrap_or_else(|| {
            errors.add("active_only", "The active_only field must be true or false.");
            defaults.active_only
        }),
    };
    let per_page = integer_param(params, "per_page", &mut errors).unwrap_or(defaults.per_page);
    let page = integer_param(params, "page", &mut errors).unwrap_or(defaults.page);

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(TranslationFilter {
        locale: param(params, "locale").map(str::to_owned),
        namespace: param(params, "namespace").map(str::to_owned),
        search: param(params, "search").map(str::to_owned),
        tags: tag_params(params),
        active_only,
        page,
        per_page,
    })
}

// ---------------------------------------------------------------------------
// POST /api/translations
// ---------------------------------------------------------------------------

pub async fn create_translation(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Reply {
    let body = match json_body(payload) {
        Ok(body) => body,
        Err(reply) => return reply,
    };
    let new = match validate::new_translation(&body) {
        Ok(new) => new,
        Err(errors) => return validation_failed(errors),
    };

    match state.service.create(new).await {
        Ok(translation) => (
            StatusCode::CREATED,
            Json(json!({
                "message": "Translation created successfully",
                "data": translation,
            })),
        ),
        Err(e) => store_error(e, "Failed to create translation"),
    }
}

// ---------------------------------------------------------------------------
// GET / PUT / DELETE /api/translations/{id}
// ---------------------------------------------------------------------------

pub async fn show_translation(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> Reply {
    let id = match translation_id(path) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    match state.service.get(id).await {
        Ok(translation) => (StatusCode::OK, Json(json!({ "data": translation }))),
        Err(e) => store_error(e, "Failed to load translation"),
    }
}

pub async fn update_translation(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Reply {
    let id = match translation_id(path) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    let body = match json_body(payload) {
        Ok(body) => body,
        Err(reply) => return reply,
    };
    let patch = match validate::translation_patch(&body) {
        Ok(patch) => patch,
        Err(errors) => return validation_failed(errors),
    };

    match state.service.update(id, patch).await {
        Ok(translation) => (
            StatusCode::OK,
            Json(json!({
                "message": "Translation updated successfully",
                "data": translation,
            })),
        ),
        Err(e) => store_error(e, "Failed to update translation"),
    }
}

pub async fn delete_translation(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> Reply {
    let id = match translation_id(path) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    match state.service.delete(id).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "message": "Translation deleted successfully" })),
        ),
        Err(e) => store_error(e, "Failed to delete translation"),
    }
}

// ---------------------------------------------------------------------------
// GET /api/translations/export
// ---------------------------------------------------------------------------

/// Export a full slice as a `key → content` object.
pub async fn export_translations(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryPairs>,
) -> Reply {
    let key = match validate::export_request(
        param(&params, "locale"),
        param(&params, "namespace"),
        tag_params(&params).unwrap_or_default(),
    ) {
        Ok(key) => key,
        Err(errors) => return validation_failed(errors),
    };

    match state.service.export(&key).await {
        Ok(translations) => (
            StatusCode::OK,
            Json(json!({
                "locale": key.locale(),
                "namespace": key.namespace(),
                "count": translations.len(),
                "translations": &*translations,
                "exported_at": chrono::Utc::now().to_rfc3339(),
            })),
        ),
        Err(e) => store_error(e, "Failed to export translations"),
    }
}

// ---------------------------------------------------------------------------
// GET /api/tags
// ---------------------------------------------------------------------------

pub async fn list_tags(State(state): State<Arc<AppState>>) -> Reply {
    match state.service.tags().await {
        Ok(tags) => (StatusCode::OK, Json(json!({ "data": tags }))),
        Err(e) => store_error(e, "Failed to list tags"),
    }
}

// ---------------------------------------------------------------------------
// GET /api/status
// ---------------------------------------------------------------------------

/// Response payload for the `/api/status` endpoint.
#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: bool,
    pub cache: CacheStatus,
}

#[derive(Serialize)]
pub struct CacheStatus {
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

/// Report database health and export cache effectiveness.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let database = match state.db.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "database health check failed");
            false
        }
    };

    let exports = state.service.export_cache();
    let stats = exports.stats();

    Json(StatusResponse {
        status: if database { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
        cache: CacheStatus {
            entries: exports.entry_count(),
            hits: stats.hits(),
            misses: stats.misses(),
            hit_rate: stats.hit_rate(),
        },
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a store error onto the API's status codes.
///
/// `failure` is the message reported for storage errors, whose details
/// stay in the log.
pub fn store_error(err: StoreError, failure: &str) -> Reply {
    match err {
        StoreError::Validation(errors) => validation_failed(errors),
        StoreError::NotFound { entity, id } => {
            tracing::debug!(entity, id = %id, "not found");
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "message": not_found_message(entity) })),
            )
        }
        other => {
            tracing::error!(error = %other, "{failure}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": failure })),
            )
        }
    }
}

fn validation_failed(errors: ValidationErrors) -> Reply {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({
            "message": "The given data was invalid.",
            "errors": errors,
        })),
    )
}

/// Unreadable bodies (bad JSON, wrong content type) are validation failures.
fn json_body(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, Reply> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        let mut errors = ValidationErrors::new();
        errors.add("body", rejection.body_text());
        validation_failed(errors)
    })
}

/// An id that is not an integer names no translation.
fn translation_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, Reply> {
    path.map(|Path(id)| id).map_err(|rejection| {
        tracing::debug!(%rejection, "unparseable translation id");
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": not_found_message("translation") })),
        )
    })
}

fn not_found_message(entity: &str) -> String {
    let mut chars = entity.chars();
    match chars.next() {
        Some(first) => format!("{}{} not found", first.to_uppercase(), chars.as_str()),
        None => "Not found".to_owned(),
    }
}

/// Last value of `name`, if present.
fn param<'a>(params: &'a QueryPairs, name: &str) -> Option<&'a str> {
    params
        .iter()
        .rev()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

/// Tag names from repeated `tags[]` keys and comma-separated `tags`.
fn tag_params(params: &QueryPairs) -> Option<Vec<String>> {
    let mut tags: Option<Vec<String>> = None;
    for (k, v) in params {
        match k.as_str() {
            "tags[]" => tags.get_or_insert_with(Vec::new).push(v.clone()),
            "tags" => tags
                .get_or_insert_with(Vec::new)
                .extend(v.split(',').map(str::to_owned)),
            _ => {}
        }
    }
    tags
}

fn integer_param(params: &QueryPairs, name: &str, errors: &mut ValidationErrors) -> Option<u32> {
    let raw = param(params, name)?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<i64>() {
        Ok(n) => Some(u32::try_from(n.max(0)).unwrap_or(u32::MAX)),
        Err(_) => {
            errors.add(name, format!("The {name} field must be an integer."));
            None
        }
    }
}

/// Boolean query flag: `1/0`, `true/false`, `on/off`, `yes/no`.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> QueryPairs {
        raw.iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        for raw in ["1", "true", "TRUE", "on", "yes"] {
            assert_eq!(parse_bool(raw), Some(true), "{raw}");
        }
        for raw in ["0", "false", "off", "no", ""] {
            assert_eq!(parse_bool(raw), Some(false), "{raw}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn tags_from_both_spellings() {
        let tags = tag_params(&pairs(&[("tags", "a,b"), ("tags[]", "c")])).unwrap();
        assert_eq!(tags, ["a", "b", "c"]);
        assert!(tag_params(&pairs(&[("locale", "en")])).is_none());
    }

    #[test]
    fn list_filter_defaults_and_overrides() {
        let f = list_filter(&pairs(&[])).unwrap();
        assert_eq!(f, TranslationFilter::default());

        let f = list_filter(&pairs(&[
            ("locale", "en"),
            ("active_only", "0"),
            ("per_page", "500"),
            ("page", "2"),
        ]))
        .unwrap();
        assert_eq!(f.locale.as_deref(), Some("en"));
        assert!(!f.active_only);
        assert_eq!(f.per_page, 500);
        assert_eq!(f.page, 2);
    }

    #[test]
    fn list_filter_rejects_garbage() {
        let errors = list_filter(&pairs(&[("per_page", "lots"), ("active_only", "maybe")]))
            .unwrap_err();
        assert!(errors.contains("per_page"));
        assert!(errors.contains("active_only"));
    }

    #[test]
    fn store_errors_map_to_status_codes() {
        let (code, Json(body)) = store_error(StoreError::translation_not_found(3), "x");
        assert_eq!(code, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Translation not found");

        let (code, Json(body)) = store_error(ValidationErrors::key_taken().into(), "x");
        assert_eq!(code, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["errors"]["key"][0], "The key has already been taken.");

        let (code, Json(body)) =
            store_error(StoreError::TaskJoin("gone".into()), "Failed to create translation");
        assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Failed to create translation");
    }
}
