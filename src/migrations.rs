//! Versioned schema migrations for the word store.
//!
//! Each migration runs in its own transaction and is recorded in
//! `schema_migrations`, so it is applied at most once per database.
//! `AddColumn` steps tolerate databases where the column was already
//! added by hand, which lets older files be adopted without a rebuild.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::db::StoreError;

pub const WORDS_TABLE: &str = "arabic_words";

#[derive(Debug, Clone, Copy)]
pub enum Step {
    /// Raw SQL, may hold several statements
    Execute(&'static str),
    /// `ALTER TABLE arabic_words ADD COLUMN`, skipped when the column exists
    AddColumn {
        column: &'static str,
        definition: &'static str,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub steps: &'static [Step],
}

/// All migrations, ordered by version
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create arabic_words",
        steps: &[Step::Execute(
            "CREATE TABLE IF NOT EXISTS arabic_words (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                word TEXT NOT NULL,
                timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
                session_id TEXT
            )",
        )],
    },
    Migration {
        version: 2,
        name: "add generated annotation columns",
        steps: &[
            Step::AddColumn {
                column: "translation",
                definition: "TEXT",
            },
            Step::AddColumn {
                column: "phonetic",
                definition: "TEXT",
            },
            Step::AddColumn {
                column: "sentence",
                definition: "TEXT",
            },
            Step::AddColumn {
                column: "arabic_sentence",
                definition: "TEXT",
            },
        ],
    },
    Migration {
        version: 3,
        name: "add owner column",
        steps: &[Step::AddColumn {
            column: "user_id",
            definition: "TEXT NOT NULL DEFAULT 'anonymous'",
        }],
    },
    Migration {
        version: 4,
        name: "add lookup indexes",
        steps: &[Step::Execute(
            "CREATE INDEX IF NOT EXISTS idx_arabic_words_owner_session
                ON arabic_words(user_id, session_id);
            CREATE INDEX IF NOT EXISTS idx_arabic_words_recent
                ON arabic_words(timestamp DESC, id DESC);",
        )],
    },
    Migration {
        version: 5,
        name: "backfill default session",
        steps: &[Step::Execute(
            "UPDATE arabic_words SET session_id = 'default' WHERE session_id IS NULL;",
        )],
    },
];

/// Apply every pending migration, returning the versions applied by this call
pub async fn run(pool: &SqlitePool) -> Result<Vec<i64>, StoreError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    let applied: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_migrations")
        .fetch_all(pool)
        .await?;

    let mut newly_applied = Vec::new();
    for migration in MIGRATIONS {
        if applied.contains(&migration.version) {
            continue;
        }

        apply(pool, migration)
            .await
            .map_err(|source| StoreError::Migration {
                version: migration.version,
                name: migration.name,
                source,
            })?;

        info!(
            "Applied migration {} ({})",
            migration.version, migration.name
        );
        newly_applied.push(migration.version);
    }

    Ok(newly_applied)
}

async fn apply(pool: &SqlitePool, migration: &Migration) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    for step in migration.steps {
        match *step {
            Step::Execute(sql) => {
                sqlx::raw_sql(sql).execute(&mut *tx).await?;
            }
            Step::AddColumn { column, definition } => {
                if column_exists(&mut tx, column).await? {
                    continue;
                }
                info!("Adding {} column...", column);
                let sql = format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    WORDS_TABLE, column, definition
                );
                sqlx::query(&sql).execute(&mut *tx).await?;
            }
        }
    }

    sqlx::query("INSERT INTO schema_migrations (version, name, applied_at) VALUES (?, ?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

    tx.commit().await
}

async fn column_exists(conn: &mut SqliteConnection, column: &str) -> Result<bool, sqlx::Error> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?")
            .bind(WORDS_TABLE)
            .bind(column)
            .fetch_one(conn)
            .await?;
    Ok(count > 0)
}
