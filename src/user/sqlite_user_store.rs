use crate::interactions::{
    Decision, DecisionRecord, DisplayMetadata, GenreId, Identity, InteractionStore, ItemId,
    NewDecision,
};
use crate::sqlite_column;
use crate::sqlite_persistence::{
    open_versioned_db, Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema,
    DEFAULT_TIMESTAMP,
};
use crate::user::*;
use anyhow::{Context, Result};
use rusqlite::{params, types::Value, Connection, Row};
use std::{
    path::Path,
    str::FromStr,
    sync::{Arc, Mutex},
    time::{Duration, SystemTime},
};
use tracing::debug;

use super::auth::PasswordHasherKind;

const USER_FOREIGN_KEY: ForeignKey = ForeignKey {
    foreign_table: "user",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

/// V 0
const USER_TABLE_V_0: Table = Table {
    name: "user",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!("handle", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[],
    indices: &[("idx_user_handle", "handle")],
};
const AUTH_TOKEN_TABLE_V_0: Table = Table {
    name: "auth_token",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FOREIGN_KEY)
        ),
        sqlite_column!("value", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("last_used", &SqlType::Integer),
    ],
    unique_constraints: &[],
    indices: &[("idx_auth_token_value", "value")],
};
const USER_PASSWORD_CREDENTIALS_V_0: Table = Table {
    name: "user_password_credentials",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            is_unique = true,
            foreign_key = Some(&USER_FOREIGN_KEY)
        ),
        sqlite_column!("salt", &SqlType::Text, non_null = true),
        sqlite_column!("hash", &SqlType::Text, non_null = true),
        sqlite_column!("hasher", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("last_tried", &SqlType::Integer),
        sqlite_column!("last_used", &SqlType::Integer),
    ],
    unique_constraints: &[],
    indices: &[],
};
const INTERACTION_TABLE_V_0: Table = Table {
    name: "interaction",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            foreign_key = Some(&USER_FOREIGN_KEY)
        ),
        sqlite_column!("session_id", &SqlType::Text),
        sqlite_column!("item_id", &SqlType::Integer, non_null = true),
        sqlite_column!("decision", &SqlType::Integer, non_null = true),
        sqlite_column!("title", &SqlType::Text),
        sqlite_column!("artist_name", &SqlType::Text),
        sqlite_column!("cover_art_url", &SqlType::Text),
        sqlite_column!("preview_url", &SqlType::Text),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[],
    indices: &[
        ("idx_interaction_user_id", "user_id"),
        ("idx_interaction_session_id", "session_id"),
    ],
};

/// V 1
/// Interactions remember the genre of the item, users get genre preferences.
const INTERACTION_TABLE_V_1: Table = Table {
    name: "interaction",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            foreign_key = Some(&USER_FOREIGN_KEY)
        ),
        sqlite_column!("session_id", &SqlType::Text),
        sqlite_column!("item_id", &SqlType::Integer, non_null = true),
        sqlite_column!("decision", &SqlType::Integer, non_null = true),
        sqlite_column!("title", &SqlType::Text),
        sqlite_column!("artist_name", &SqlType::Text),
        sqlite_column!("cover_art_url", &SqlType::Text),
        sqlite_column!("preview_url", &SqlType::Text),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("genre_id", &SqlType::Integer),
    ],
    unique_constraints: &[],
    indices: &[
        ("idx_interaction_user_id", "user_id"),
        ("idx_interaction_session_id", "session_id"),
    ],
};
const USER_GENRE_PREFERENCE_TABLE_V_1: Table = Table {
    name: "user_genre_preference",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FOREIGN_KEY)
        ),
        sqlite_column!("genre_id", &SqlType::Integer, non_null = true),
        sqlite_column!("position", &SqlType::Integer, non_null = true),
    ],
    unique_constraints: &[&["user_id", "genre_id"]],
    indices: &[("idx_user_genre_preference_user_id", "user_id")],
};

/// V 2
/// Password reset tokens, at most one pending per user.
const PASSWORD_RESET_TOKEN_TABLE_V_2: Table = Table {
    name: "password_reset_token",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            is_unique = true,
            foreign_key = Some(&USER_FOREIGN_KEY)
        ),
        sqlite_column!("value", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("expires", &SqlType::Integer, non_null = true),
    ],
    unique_constraints: &[],
    indices: &[("idx_password_reset_token_value", "value")],
};

pub const VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 0,
        tables: &[
            USER_TABLE_V_0,
            AUTH_TOKEN_TABLE_V_0,
            USER_PASSWORD_CREDENTIALS_V_0,
            INTERACTION_TABLE_V_0,
        ],
        migration: None,
    },
    VersionedSchema {
        version: 1,
        tables: &[
            USER_TABLE_V_0,
            AUTH_TOKEN_TABLE_V_0,
            USER_PASSWORD_CREDENTIALS_V_0,
            INTERACTION_TABLE_V_1,
            USER_GENRE_PREFERENCE_TABLE_V_1,
        ],
        migration: Some(|conn: &Connection| {
            conn.execute("ALTER TABLE interaction ADD COLUMN genre_id INTEGER", [])?;
            USER_GENRE_PREFERENCE_TABLE_V_1.create(conn)?;
            Ok(())
        }),
    },
    VersionedSchema {
        version: 2,
        tables: &[
            USER_TABLE_V_0,
            AUTH_TOKEN_TABLE_V_0,
            USER_PASSWORD_CREDENTIALS_V_0,
            INTERACTION_TABLE_V_1,
            USER_GENRE_PREFERENCE_TABLE_V_1,
            PASSWORD_RESET_TOKEN_TABLE_V_2,
        ],
        migration: Some(|conn: &Connection| {
            PASSWORD_RESET_TOKEN_TABLE_V_2.create(conn)?;
            Ok(())
        }),
    },
];

const INTERACTION_COLUMNS: &str = "id, user_id, session_id, item_id, decision, genre_id, \
     title, artist_name, cover_art_url, preview_url, created";

#[derive(Clone)]
pub struct SqliteUserStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let conn = open_versioned_db(db_path, VERSIONED_SCHEMAS)?;
        Ok(SqliteUserStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn system_time_from_column_result(value: i64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(value as u64)
}

/// SQL condition and bound value selecting the rows owned by an identity.
/// Session rows never match an account, even if a token collides.
fn identity_filter(identity: &Identity) -> (&'static str, Value) {
    match identity {
        Identity::Account(user_id) => ("user_id = ?1", Value::Integer(*user_id as i64)),
        Identity::Session(token) => (
            "user_id IS NULL AND session_id = ?1",
            Value::Text(token.clone()),
        ),
    }
}

fn decision_record_from_row(row: &Row) -> rusqlite::Result<DecisionRecord> {
    let identity = match row.get::<_, Option<usize>>(1)? {
        Some(user_id) => Identity::Account(user_id),
        None => Identity::Session(row.get::<_, Option<String>>(2)?.unwrap_or_default()),
    };
    let raw_decision: i32 = row.get(4)?;
    let decision = Decision::from_int(raw_decision)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(4, raw_decision as i64))?;
    Ok(DecisionRecord {
        id: row.get(0)?,
        identity,
        item_id: row.get(3)?,
        decision,
        genre_id: row.get(5)?,
        metadata: DisplayMetadata {
            title: row.get(6)?,
            artist_name: row.get(7)?,
            cover_art_url: row.get(8)?,
            preview_url: row.get(9)?,
        },
        created_at: row.get(10)?,
    })
}

impl SqliteUserStore {
    fn query_decisions(
        &self,
        identity: &Identity,
        decision: Option<Decision>,
        limit: Option<usize>,
    ) -> Result<Vec<DecisionRecord>> {
        let (filter, identity_value) = identity_filter(identity);
        let mut sql = format!(
            "SELECT {} FROM {} WHERE {}",
            INTERACTION_COLUMNS, INTERACTION_TABLE_V_1.name, filter
        );
        let mut values = vec![identity_value];
        if let Some(decision) = decision {
            values.push(Value::Integer(decision.to_int() as i64));
            sql.push_str(&format!(" AND decision = ?{}", values.len()));
        }
        sql.push_str(" ORDER BY created DESC, id DESC");
        if let Some(limit) = limit {
            values.push(Value::Integer(limit as i64));
            sql.push_str(&format!(" LIMIT ?{}", values.len()));
        }

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(rusqlite::params_from_iter(values), decision_record_from_row)?
            .collect::<Result<Vec<DecisionRecord>, _>>()
            .context("Failed to read interaction records")?;
        Ok(records)
    }
}

impl InteractionStore for SqliteUserStore {
    fn append_decision(&self, decision: NewDecision) -> Result<usize> {
        let (user_id, session_id) = match &decision.identity {
            Identity::Account(user_id) => (Some(*user_id), None),
            Identity::Session(token) => (None, Some(token.as_str())),
        };
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO interaction (user_id, session_id, item_id, decision, genre_id, title, artist_name, cover_art_url, preview_url) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                user_id,
                session_id,
                decision.item_id,
                decision.decision.to_int(),
                decision.genre_id,
                decision.metadata.title,
                decision.metadata.artist_name,
                decision.metadata.cover_art_url,
                decision.metadata.preview_url,
            ],
        )
        .with_context(|| format!("Failed to record decision on item {}", decision.item_id))?;
        Ok(conn.last_insert_rowid() as usize)
    }

    fn get_recent_decisions(
        &self,
        identity: &Identity,
        limit: usize,
    ) -> Result<Vec<DecisionRecord>> {
        self.query_decisions(identity, None, Some(limit))
    }

    fn get_recent_decisions_of_type(
        &self,
        identity: &Identity,
        decision: Decision,
        limit: usize,
    ) -> Result<Vec<DecisionRecord>> {
        self.query_decisions(identity, Some(decision), Some(limit))
    }

    fn delete_accepted_item(&self, identity: &Identity, item_id: ItemId) -> Result<usize> {
        let (filter, identity_value) = identity_filter(identity);
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            &format!(
                "DELETE FROM {} WHERE {} AND item_id = ?2 AND decision = ?3",
                INTERACTION_TABLE_V_1.name, filter
            ),
            params![identity_value, item_id, Decision::Accept.to_int()],
        )?;
        debug!("Deleted {} accept records of item {}", deleted, item_id);
        Ok(deleted)
    }

    fn get_accepted_decisions(&self, identity: &Identity) -> Result<Vec<DecisionRecord>> {
        self.query_decisions(identity, Some(Decision::Accept), None)
    }
}

impl UserStore for SqliteUserStore {
    fn create_user(&self, user_handle: &str) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO user (handle) VALUES (?1)",
            params![user_handle],
        )
        .with_context(|| format!("Failed to create user {}", user_handle))?;
        Ok(conn.last_insert_rowid() as usize)
    }

    fn get_user_handle(&self, user_id: usize) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT handle FROM {} WHERE id = ?1",
            USER_TABLE_V_0.name
        ))?;
        match stmt.query_row(params![user_id], |row| row.get(0)) {
            Ok(handle) => Ok(Some(handle)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn get_user_id(&self, user_handle: &str) -> Result<Option<usize>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT id FROM {} WHERE handle = ?1",
            USER_TABLE_V_0.name
        ))?;
        match stmt.query_row(params![user_handle], |row| row.get(0)) {
            Ok(id) => Ok(Some(id)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn get_preferred_genres(&self, user_id: usize) -> Result<Vec<GenreId>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT genre_id FROM {} WHERE user_id = ?1 ORDER BY position",
            USER_GENRE_PREFERENCE_TABLE_V_1.name
        ))?;
        let genres = stmt
            .query_map(params![user_id], |row| row.get(0))?
            .collect::<Result<Vec<GenreId>, _>>()?;
        Ok(genres)
    }

    fn set_preferred_genres(&self, user_id: usize, genres: &[GenreId]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM user_genre_preference WHERE user_id = ?1",
            params![user_id],
        )?;
        for (position, genre_id) in genres.iter().enumerate() {
            tx.execute(
                "INSERT INTO user_genre_preference (user_id, genre_id, position) VALUES (?1, ?2, ?3)",
                params![user_id, genre_id, position],
            )
            .with_context(|| format!("Failed to store preferred genre {}", genre_id))?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn auth_token_from_row(row: &Row) -> rusqlite::Result<AuthToken> {
    Ok(AuthToken {
        user_id: row.get(0)?,
        value: AuthTokenValue(row.get(1)?),
        created: system_time_from_column_result(row.get(2)?),
        last_used: row
            .get::<usize, Option<i64>>(3)?
            .map(system_time_from_column_result),
    })
}

impl UserAuthTokenStore for SqliteUserStore {
    fn get_user_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT user_id, value, created, last_used FROM auth_token WHERE value = ?1",
        )?;
        match stmt.query_row(params![value.0], auth_token_from_row) {
            Ok(token) => Ok(Some(token)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_user_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let token = match self.get_user_auth_token(token)? {
            Some(token) => token,
            None => return Ok(None),
        };
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM auth_token WHERE value = ?1",
            params![token.value.0],
        )?;
        Ok(Some(token))
    }

    fn update_user_auth_token_last_used_timestamp(&self, token: &AuthTokenValue) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "UPDATE auth_token SET last_used = {} WHERE value = ?1",
                DEFAULT_TIMESTAMP
            ),
            params![token.0],
        )?;
        Ok(())
    }

    fn add_user_auth_token(&self, token: AuthToken) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO auth_token (value, user_id) VALUES (?1, ?2)",
            params![token.value.0, token.user_id],
        )?;
        Ok(())
    }

    fn prune_unused_auth_tokens(&self, unused_for_days: u64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            &format!(
                "DELETE FROM auth_token WHERE COALESCE(last_used, created) < {} - ?1",
                DEFAULT_TIMESTAMP
            ),
            params![(unused_for_days * 24 * 60 * 60) as i64],
        )?;
        Ok(deleted)
    }
}

impl UserPasswordResetStore for SqliteUserStore {
    fn set_password_reset_token(&self, token: &PasswordResetToken) -> Result<()> {
        let expires = token
            .expires
            .duration_since(SystemTime::UNIX_EPOCH)
            .context("Reset token expires before the epoch")?
            .as_secs() as i64;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO password_reset_token (user_id, value, expires) VALUES (?1, ?2, ?3) \
             ON CONFLICT(user_id) DO UPDATE SET value = excluded.value, expires = excluded.expires, \
             created = excluded.created",
            params![token.user_id, token.value, expires],
        )
        .with_context(|| {
            format!(
                "Failed to store password reset token of user {}",
                token.user_id
            )
        })?;
        Ok(())
    }

    fn take_password_reset_token(&self, value: &str) -> Result<Option<PasswordResetToken>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let token = match tx.query_row(
            "SELECT user_id, value, expires FROM password_reset_token WHERE value = ?1",
            params![value],
            |row| {
                Ok(PasswordResetToken {
                    user_id: row.get(0)?,
                    value: row.get(1)?,
                    expires: system_time_from_column_result(row.get(2)?),
                })
            },
        ) {
            Ok(token) => token,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        tx.execute(
            "DELETE FROM password_reset_token WHERE value = ?1",
            params![value],
        )?;
        tx.commit()?;
        Ok(Some(token))
    }
}

impl UserAuthCredentialsStore for SqliteUserStore {
    fn get_password_credentials(
        &self,
        user_id: usize,
    ) -> Result<Option<UsernamePasswordCredentials>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT user_id, salt, hash, hasher, created, last_tried, last_used \
             FROM user_password_credentials WHERE user_id = ?1",
        )?;
        let result = stmt.query_row(params![user_id], |row| {
            let raw_hasher: String = row.get(3)?;
            let hasher = PasswordHasherKind::from_str(&raw_hasher).map_err(|_| {
                rusqlite::Error::InvalidColumnType(3, raw_hasher, rusqlite::types::Type::Text)
            })?;
            Ok(UsernamePasswordCredentials {
                user_id: row.get(0)?,
                salt: row.get(1)?,
                hash: row.get(2)?,
                hasher,
                created: system_time_from_column_result(row.get(4)?),
                last_tried: row
                    .get::<usize, Option<i64>>(5)?
                    .map(system_time_from_column_result),
                last_used: row
                    .get::<usize, Option<i64>>(6)?
                    .map(system_time_from_column_result),
            })
        });
        match result {
            Ok(credentials) => Ok(Some(credentials)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_password_credentials(&self, credentials: &UsernamePasswordCredentials) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO user_password_credentials (user_id, salt, hash, hasher) VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(user_id) DO UPDATE SET salt = excluded.salt, hash = excluded.hash, hasher = excluded.hasher",
            params![
                credentials.user_id,
                credentials.salt,
                credentials.hash,
                credentials.hasher.to_string()
            ],
        )
        .with_context(|| {
            format!(
                "Failed to store password credentials of user {}",
                credentials.user_id
            )
        })?;
        Ok(())
    }

    fn touch_password_credentials(&self, user_id: usize, succeeded: bool) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let sql = if succeeded {
            format!(
                "UPDATE user_password_credentials SET last_tried = {0}, last_used = {0} WHERE user_id = ?1",
                DEFAULT_TIMESTAMP
            )
        } else {
            format!(
                "UPDATE user_password_credentials SET last_tried = {} WHERE user_id = ?1",
                DEFAULT_TIMESTAMP
            )
        };
        conn.execute(&sql, params![user_id])?;
        Ok(())
    }
}
