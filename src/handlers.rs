use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::Caller;
use crate::db::{
    EntryDraft, VocabularyEntry, WordFilter, WordFrequency, WordStats, DEFAULT_GROUP,
};
use crate::error::{ApiError, ApiJson};
use crate::server::AppState;

const DEFAULT_PAGE_SIZE: i64 = 10;
const DEFAULT_FREQUENCY_LIMIT: i64 = 20;

// ==================== Request Types ====================

#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    #[serde(default)]
    pub word: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SaveWordsRequest {
    #[serde(default)]
    pub words: Vec<EntryDraft>,
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<String>,
}

/// Query strings are kept raw so bad numbers fall back to defaults
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FrequencyParams {
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

// ==================== Response Types ====================

#[derive(Debug, Serialize)]
pub struct TranslateResponse {
    pub success: bool,
    pub word: String,
    pub translation: String,
    pub phonetic: String,
    pub sentence: String,
    pub arabic_sentence: String,
}

#[derive(Debug, Serialize)]
pub struct SaveWordsResponse {
    pub success: bool,
    pub message: String,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct WordListResponse {
    pub success: bool,
    pub words: Vec<VocabularyEntry>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub stats: WordStats,
}

#[derive(Debug, Serialize)]
pub struct FrequencyResponse {
    pub frequency: Vec<WordFrequency>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

// ==================== Helpers ====================

/// Parse an integer query value, falling back to `default` when absent or invalid
fn parse_or(value: Option<&str>, default: i64) -> i64 {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Treat missing and blank values alike
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 1-based page number; a non-positive limit is a single page.
/// Negative offsets count as 0, as SQLite treats them.
fn page_number(limit: i64, offset: i64) -> i64 {
    if limit > 0 {
        (offset.max(0) / limit).saturating_add(1)
    } else {
        1
    }
}

// ==================== Handlers ====================

/// POST /api/translate
pub async fn translate_word(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<TranslateRequest>,
) -> Result<Json<TranslateResponse>, ApiError> {
    let word = payload.word.unwrap_or_default();
    let result = state.translator.translate(&word).await?;

    Ok(Json(TranslateResponse {
        success: true,
        word: word.trim().to_string(),
        translation: result.translation,
        phonetic: result.phonetic,
        sentence: result.sentence,
        arabic_sentence: result.native_sentence,
    }))
}

/// POST /api/words
pub async fn save_words(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiJson(payload): ApiJson<SaveWordsRequest>,
) -> Result<Json<SaveWordsResponse>, ApiError> {
    if payload.words.is_empty() {
        return Err(ApiError::Validation("No words provided".to_string()));
    }

    let group_id =
        non_blank(payload.session_id).unwrap_or_else(|| DEFAULT_GROUP.to_string());
    let count = state
        .store
        .insert_batch(&payload.words, &group_id, &caller.owner_id)
        .await?;

    info!(
        "Saved {} of {} words for {} in group {}",
        count,
        payload.words.len(),
        caller.owner_id,
        group_id
    );

    Ok(Json(SaveWordsResponse {
        success: true,
        message: format!("Saved {} words", count),
        count,
    }))
}

/// GET /api/words
pub async fn list_words(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(params): Query<ListParams>,
) -> Result<Json<WordListResponse>, ApiError> {
    let limit = parse_or(params.limit.as_deref(), DEFAULT_PAGE_SIZE);
    let offset = parse_or(params.offset.as_deref(), 0);

    let filter = WordFilter {
        owner_id: caller.scope().map(str::to_string),
        group_id: non_blank(params.session_id),
        search: non_blank(params.search),
    };
    let page = state.store.list_words(&filter, limit, offset).await?;

    Ok(Json(WordListResponse {
        success: true,
        words: page.entries,
        total: page.total,
        page: page_number(limit, offset),
        per_page: limit,
    }))
}

/// GET /api/stats
pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let stats = state.store.stats().await?;
    Ok(Json(StatsResponse { stats }))
}

/// GET /api/frequency
pub async fn frequency(
    State(state): State<AppState>,
    Query(params): Query<FrequencyParams>,
) -> Result<Json<FrequencyResponse>, ApiError> {
    let limit = parse_or(params.limit.as_deref(), DEFAULT_FREQUENCY_LIMIT);
    let frequency = state.store.frequency(limit).await?;
    Ok(Json(FrequencyResponse { frequency }))
}

/// DELETE /api/words
pub async fn delete_words(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let group_id = non_blank(params.session_id);
    let deleted = state
        .store
        .delete_by_group(group_id.as_deref(), caller.scope())
        .await?;

    info!(
        "Deleted {} words (group: {:?}, owner scope: {:?})",
        deleted,
        group_id,
        caller.scope()
    );

    Ok(Json(DeleteResponse {
        success: true,
        message: "Words deleted".to_string(),
        count: Some(deleted),
    }))
}

/// DELETE /api/words/:id
pub async fn delete_word(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state.store.delete_by_id(id, caller.scope()).await?;

    Ok(Json(DeleteResponse {
        success: true,
        message: "Word deleted".to_string(),
        count: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or() {
        assert_eq!(parse_or(Some("25"), 10), 25);
        assert_eq!(parse_or(Some(" 3 "), 10), 3);
        assert_eq!(parse_or(Some("abc"), 10), 10);
        assert_eq!(parse_or(Some(""), 10), 10);
        assert_eq!(parse_or(None, 10), 10);
        assert_eq!(parse_or(Some("-1"), 10), -1);
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some(" s1 ".to_string())), Some("s1".to_string()));
        assert_eq!(non_blank(Some("   ".to_string())), None);
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn test_page_number() {
        assert_eq!(page_number(10, 0), 1);
        assert_eq!(page_number(10, 9), 1);
        assert_eq!(page_number(10, 10), 2);
        assert_eq!(page_number(10, 25), 3);
        assert_eq!(page_number(0, 50), 1);
        assert_eq!(page_number(-1, 50), 1);
    }

    #[test]
    fn test_page_number_extreme_offsets() {
        assert_eq!(page_number(1, i64::MAX), i64::MAX);
        assert_eq!(page_number(10, i64::MAX), i64::MAX / 10 + 1);
        assert_eq!(page_number(10, -25), 1);
        assert_eq!(page_number(1, i64::MIN), 1);
    }

    #[test]
    fn test_save_words_request_defaults() {
        let parsed: SaveWordsRequest =
            serde_json::from_str(r#"{"sessionId": "session_1"}"#).expect("Should parse");
        assert!(parsed.words.is_empty());
        assert_eq!(parsed.session_id.as_deref(), Some("session_1"));
    }

    #[test]
    fn test_delete_response_omits_missing_count() {
        let response = DeleteResponse {
            success: true,
            message: "Word deleted".to_string(),
            count: None,
        };
        let json = serde_json::to_value(&response).expect("Should serialize");
        assert!(json.get("count").is_none());
    }
}
