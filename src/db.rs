use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use tracing::info;

use crate::migrations;

/// Group label used when a submission carries no session id
pub const DEFAULT_GROUP: &str = "default";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("word {0} not found")]
    NotFound(i64),

    #[error("migration {version} ({name}) failed: {source}")]
    Migration {
        version: i64,
        name: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

/// A stored vocabulary entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct VocabularyEntry {
    pub id: i64,
    pub word: String,
    pub translation: String,
    pub phonetic: String,
    pub sentence: String,
    #[serde(rename = "arabic_sentence")]
    pub native_sentence: String,
    #[serde(rename = "timestamp")]
    pub created_at: String,
    #[serde(rename = "session_id")]
    pub group_id: String,
    #[serde(rename = "user_id")]
    pub owner_id: String,
}

/// A word submitted for saving. Missing or null fields become empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDraft {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub word: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub translation: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub phonetic: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sentence: String,
    #[serde(
        rename = "arabic_sentence",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub native_sentence: String,
}

impl EntryDraft {
    pub fn new(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            ..Self::default()
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Filters for [`WordStore::list_words`]. `None` means "don't filter".
#[derive(Debug, Clone, Default)]
pub struct WordFilter {
    pub owner_id: Option<String>,
    pub group_id: Option<String>,
    /// Case-sensitive substring of word or translation
    pub search: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WordPage {
    pub entries: Vec<VocabularyEntry>,
    /// Size of the filtered set before limit/offset
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct WordStats {
    pub total_words: i64,
    pub unique_words: i64,
    pub total_sessions: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct WordFrequency {
    pub word: String,
    pub count: i64,
}

// Legacy rows may hold NULL in the optional columns
const SELECT_ENTRY: &str = "SELECT id, word,
        COALESCE(translation, '') AS translation,
        COALESCE(phonetic, '') AS phonetic,
        COALESCE(sentence, '') AS sentence,
        COALESCE(arabic_sentence, '') AS native_sentence,
        COALESCE(CAST(timestamp AS TEXT), '') AS created_at,
        COALESCE(session_id, 'default') AS group_id,
        user_id AS owner_id
    FROM arabic_words";

/// Insertion time in the same layout as SQLite's CURRENT_TIMESTAMP,
/// with microseconds so rows from one second still sort by arrival
fn timestamp_now() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

#[derive(Clone)]
pub struct WordStore {
    pool: SqlitePool,
}

impl WordStore {
    /// Open (or create) the database file and bring its schema up to date
    pub async fn open(database_path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let applied = migrations::run(&pool).await?;
        info!(
            "Word store ready at {} ({} migrations applied)",
            database_path,
            applied.len()
        );

        Ok(Self { pool })
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Save a batch of drafts under one group/owner.
    /// Drafts whose trimmed word is empty are skipped; returns the number stored.
    pub async fn insert_batch(
        &self,
        entries: &[EntryDraft],
        group_id: &str,
        owner_id: &str,
    ) -> Result<u64, StoreError> {
        let created_at = timestamp_now();
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for entry in entries {
            let word = entry.word.trim();
            if word.is_empty() {
                continue;
            }

            sqlx::query(
                "INSERT INTO arabic_words
                    (word, translation, phonetic, sentence, arabic_sentence, timestamp, session_id, user_id)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(word)
            .bind(&entry.translation)
            .bind(&entry.phonetic)
            .bind(&entry.sentence)
            .bind(&entry.native_sentence)
            .bind(&created_at)
            .bind(group_id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

            inserted += 1;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Filtered page of entries, most recent first
    pub async fn list_words(
        &self,
        filter: &WordFilter,
        limit: i64,
        offset: i64,
    ) -> Result<WordPage, StoreError> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM arabic_words WHERE 1=1");
        push_filters(&mut count, filter);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut select = QueryBuilder::<Sqlite>::new(SELECT_ENTRY);
        select.push(" WHERE 1=1");
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY timestamp DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let entries = select
            .build_query_as::<VocabularyEntry>()
            .fetch_all(&self.pool)
            .await?;

        Ok(WordPage { entries, total })
    }

    /// Aggregate counts over the whole store
    pub async fn stats(&self) -> Result<WordStats, StoreError> {
        let stats = sqlx::query_as::<_, WordStats>(
            "SELECT
                COUNT(*) AS total_words,
                COUNT(DISTINCT word) AS unique_words,
                COUNT(DISTINCT session_id) AS total_sessions
             FROM arabic_words",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }

    /// Most frequently saved words, highest count first
    pub async fn frequency(&self, limit: i64) -> Result<Vec<WordFrequency>, StoreError> {
        let rows = sqlx::query_as::<_, WordFrequency>(
            "SELECT word, COUNT(*) AS count
             FROM arabic_words
             GROUP BY word
             ORDER BY count DESC, word ASC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Delete a group's rows, or every row when no group is given.
    /// An owner restricts either case to that owner's rows.
    pub async fn delete_by_group(
        &self,
        group_id: Option<&str>,
        owner_id: Option<&str>,
    ) -> Result<u64, StoreError> {
        let filter = WordFilter {
            owner_id: owner_id.map(str::to_string),
            group_id: group_id.map(str::to_string),
            search: None,
        };

        let mut delete = QueryBuilder::<Sqlite>::new("DELETE FROM arabic_words WHERE 1=1");
        push_filters(&mut delete, &filter);
        let result = delete.build().execute(&self.pool).await?;

        Ok(result.rows_affected())
    }

    /// Delete one entry. Rows owned by someone else count as missing.
    pub async fn delete_by_id(&self, id: i64, owner_id: Option<&str>) -> Result<(), StoreError> {
        let mut delete = QueryBuilder::<Sqlite>::new("DELETE FROM arabic_words WHERE id = ");
        delete.push_bind(id);
        if let Some(owner) = owner_id {
            delete.push(" AND user_id = ").push_bind(owner.to_string());
        }

        let result = delete.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }

        Ok(())
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &WordFilter) {
    if let Some(owner) = &filter.owner_id {
        builder.push(" AND user_id = ").push_bind(owner.clone());
    }
    if let Some(group) = &filter.group_id {
        builder.push(" AND session_id = ").push_bind(group.clone());
    }
    if let Some(term) = &filter.search {
        // instr() is a plain, case-sensitive substring test
        builder
            .push(" AND (instr(word, ")
            .push_bind(term.clone())
            .push(") > 0 OR instr(COALESCE(translation, ''), ")
            .push_bind(term.clone())
            .push(") > 0)");
    }
}
