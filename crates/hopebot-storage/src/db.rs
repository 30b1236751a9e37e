use chrono::SecondsFormat;
use rusqlite::OptionalExtension;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use hopebot_core::error::HopeBotError;
use hopebot_core::resource::NewResource;

const SCHEMA_VERSION_CURRENT: i64 = 2;

pub struct Database {
    conn: Mutex<Connection>,
}

pub async fn call_blocking<T, F>(db: std::sync::Arc<Database>, f: F) -> Result<T, HopeBotError>
where
    T: Send + 'static,
    F: FnOnce(&Database) -> Result<T, HopeBotError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(db.as_ref()))
        .await
        .map_err(|e| HopeBotError::Task(format!("DB task join error: {e}")))?
}

/// Current time in the fixed-width form every timestamp column uses, so that
/// text ordering matches time ordering.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    pub is_bot: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct Resource {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub url: String,
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn get_schema_version(conn: &Connection) -> Result<i64, HopeBotError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS db_meta (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
        [],
    )?;
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM db_meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(raw.and_then(|s| s.parse::<i64>().ok()).unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i64) -> Result<(), HopeBotError> {
    conn.execute(
        "INSERT INTO db_meta(key, value) VALUES('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![version.to_string()],
    )?;
    Ok(())
}

fn apply_schema_migrations(conn: &Connection) -> Result<(), HopeBotError> {
    let mut version = get_schema_version(conn)?;
    if version < 1 {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                content TEXT NOT NULL,
                is_bot TEXT NOT NULL DEFAULT 'false',
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_messages_user_created
                ON messages(user_id, created_at);

            CREATE TABLE IF NOT EXISTS resources (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                icon TEXT NOT NULL,
                url TEXT NOT NULL
            );",
        )?;
        set_schema_version(conn, 1)?;
        version = 1;
    }
    if version < 2 {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS auth_sessions (
                token_hash TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                revoked_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_auth_sessions_expires
                ON auth_sessions(expires_at);",
        )?;
        set_schema_version(conn, 2)?;
        version = 2;
    }
    if version != SCHEMA_VERSION_CURRENT {
        set_schema_version(conn, SCHEMA_VERSION_CURRENT)?;
    }
    Ok(())
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredMessage> {
    Ok(StoredMessage {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content: row.get(2)?,
        is_bot: row.get::<_, String>(3)? == "true",
        created_at: row.get(4)?,
    })
}

impl Database {
    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn new(data_dir: &str) -> Result<Self, HopeBotError> {
        let db_path = Path::new(data_dir).join("hopebot.db");
        std::fs::create_dir_all(data_dir)?;

        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        apply_schema_migrations(&conn)?;

        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    // --- Users ---

    /// Insert a user with case-normalized username and email.
    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, HopeBotError> {
        let conn = self.lock_conn();
        let username = username.trim().to_lowercase();
        let email = email.trim().to_lowercase();
        let now = now_timestamp();
        conn.execute(
            "INSERT INTO users (username, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![username, email, password_hash, now],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                HopeBotError::Duplicate("username or email already registered".into())
            } else {
                HopeBotError::Database(e)
            }
        })?;
        Ok(User {
            id: conn.last_insert_rowid(),
            username,
            email,
            password_hash: password_hash.to_string(),
            created_at: now,
        })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>, HopeBotError> {
        let conn = self.lock_conn();
        let user = conn
            .query_row(
                "SELECT id, username, email, password_hash, created_at
                 FROM users WHERE id = ?1",
                params![id],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>, HopeBotError> {
        let conn = self.lock_conn();
        let user = conn
            .query_row(
                "SELECT id, username, email, password_hash, created_at
                 FROM users WHERE email = ?1",
                params![email.trim().to_lowercase()],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>, HopeBotError> {
        let conn = self.lock_conn();
        let user = conn
            .query_row(
                "SELECT id, username, email, password_hash, created_at
                 FROM users WHERE username = ?1",
                params![username.trim().to_lowercase()],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    // --- Messages ---

    pub fn store_message(
        &self,
        user_id: i64,
        content: &str,
        is_bot: bool,
    ) -> Result<StoredMessage, HopeBotError> {
        let conn = self.lock_conn();
        let now = now_timestamp();
        let flag = if is_bot { "true" } else { "false" };
        conn.execute(
            "INSERT INTO messages (user_id, content, is_bot, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, content, flag, now],
        )?;
        Ok(StoredMessage {
            id: conn.last_insert_rowid(),
            user_id,
            content: content.to_string(),
            is_bot,
            created_at: now,
        })
    }

    /// All messages for a user, oldest first.
    pub fn get_messages_for_user(&self, user_id: i64) -> Result<Vec<StoredMessage>, HopeBotError> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, content, is_bot, created_at
             FROM messages
             WHERE user_id = ?1
             ORDER BY created_at ASC, id ASC",
        )?;
        let messages = stmt
            .query_map(params![user_id], row_to_message)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    pub fn count_messages_for_user(&self, user_id: i64) -> Result<i64, HopeBotError> {
        let conn = self.lock_conn();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // --- Resources ---

    pub fn list_resources(&self) -> Result<Vec<Resource>, HopeBotError> {
        let conn = self.lock_conn();
        let mut stmt =
            conn.prepare("SELECT id, title, description, icon, url FROM resources ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Resource {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    description: row.get(2)?,
                    icon: row.get(3)?,
                    url: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn create_resource(&self, resource: &NewResource) -> Result<i64, HopeBotError> {
        let conn = self.lock_conn();
        conn.execute(
            "INSERT INTO resources (title, description, icon, url) VALUES (?1, ?2, ?3, ?4)",
            params![
                resource.title,
                resource.description,
                resource.icon.as_tag(),
                resource.url
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Seed `defaults` only when the table is empty. Returns rows inserted.
    pub fn seed_resources_if_empty(&self, defaults: &[NewResource]) -> Result<usize, HopeBotError> {
        let mut conn = self.lock_conn();
        let tx = conn.transaction()?;
        let existing: i64 = tx.query_row("SELECT COUNT(*) FROM resources", [], |row| row.get(0))?;
        if existing > 0 {
            return Ok(0);
        }
        for resource in defaults {
            tx.execute(
                "INSERT INTO resources (title, description, icon, url) VALUES (?1, ?2, ?3, ?4)",
                params![
                    resource.title,
                    resource.description,
                    resource.icon.as_tag(),
                    resource.url
                ],
            )?;
        }
        tx.commit()?;
        Ok(defaults.len())
    }

    // --- Auth sessions ---

    pub fn create_auth_session(
        &self,
        token_hash: &str,
        user_id: i64,
        expires_at: &str,
    ) -> Result<(), HopeBotError> {
        let conn = self.lock_conn();
        conn.execute(
            "INSERT INTO auth_sessions(token_hash, user_id, created_at, expires_at, revoked_at)
             VALUES(?1, ?2, ?3, ?4, NULL)",
            params![token_hash, user_id, now_timestamp(), expires_at],
        )?;
        Ok(())
    }

    /// User id for a live (unexpired, unrevoked) session.
    pub fn session_user_id(&self, token_hash: &str) -> Result<Option<i64>, HopeBotError> {
        let conn = self.lock_conn();
        let user_id = conn
            .query_row(
                "SELECT user_id
                 FROM auth_sessions
                 WHERE token_hash = ?1
                   AND revoked_at IS NULL
                   AND expires_at > ?2
                 LIMIT 1",
                params![token_hash, now_timestamp()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(user_id)
    }

    pub fn revoke_auth_session(&self, token_hash: &str) -> Result<bool, HopeBotError> {
        let conn = self.lock_conn();
        let rows = conn.execute(
            "UPDATE auth_sessions
             SET revoked_at = COALESCE(revoked_at, ?2)
             WHERE token_hash = ?1",
            params![token_hash, now_timestamp()],
        )?;
        Ok(rows > 0)
    }

    /// Delete sessions that expired or were revoked before `now`.
    pub fn purge_stale_sessions(&self, now: &str) -> Result<usize, HopeBotError> {
        let conn = self.lock_conn();
        let rows = conn.execute(
            "DELETE FROM auth_sessions WHERE expires_at <= ?1 OR revoked_at IS NOT NULL",
            params![now],
        )?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hopebot_core::resource::{ResourceIcon, DEFAULT_RESOURCES};

    fn test_db() -> (Database, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("hopebot_test_{}", uuid::Uuid::new_v4()));
        let db = Database::new(dir.to_str().unwrap()).unwrap();
        (db, dir)
    }

    fn cleanup(dir: &std::path::Path) {
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_schema_version_is_tracked() {
        let (db, dir) = test_db();
        let conn = db.lock_conn();
        let version: String = conn
            .query_row(
                "SELECT value FROM db_meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION_CURRENT.to_string());
        drop(conn);
        cleanup(&dir);
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = std::env::temp_dir().join(format!("hopebot_test_{}", uuid::Uuid::new_v4()));
        {
            let db = Database::new(dir.to_str().unwrap()).unwrap();
            db.create_user("alice", "alice@example.com", "h").unwrap();
        }
        let db = Database::new(dir.to_str().unwrap()).unwrap();
        assert!(db.get_user_by_username("alice").unwrap().is_some());
        cleanup(&dir);
    }

    #[test]
    fn test_create_user_lowercases_identity() {
        let (db, dir) = test_db();
        let user = db
            .create_user(" Alice ", "Alice@Example.COM", "hash")
            .unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.email, "alice@example.com");

        let by_email = db.get_user_by_email("ALICE@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        let by_name = db.get_user_by_username("ALICE").unwrap().unwrap();
        assert_eq!(by_name.id, user.id);
        assert_eq!(db.get_user(user.id).unwrap().unwrap().password_hash, "hash");
        cleanup(&dir);
    }

    #[test]
    fn test_duplicate_email_differing_in_case_is_rejected() {
        let (db, dir) = test_db();
        db.create_user("alice", "alice@example.com", "h").unwrap();
        let err = db
            .create_user("alice2", "ALICE@example.com", "h")
            .unwrap_err();
        assert!(matches!(err, HopeBotError::Duplicate(_)));
        cleanup(&dir);
    }

    #[test]
    fn test_get_user_missing_returns_none() {
        let (db, dir) = test_db();
        assert!(db.get_user(42).unwrap().is_none());
        assert!(db.get_user_by_email("nobody@example.com").unwrap().is_none());
        cleanup(&dir);
    }

    #[test]
    fn test_messages_are_returned_oldest_first_per_user() {
        let (db, dir) = test_db();
        let alice = db.create_user("alice", "a@example.com", "h").unwrap();
        let bob = db.create_user("bob", "b@example.com", "h").unwrap();

        db.store_message(alice.id, "first", false).unwrap();
        db.store_message(bob.id, "other user", false).unwrap();
        let reply = db.store_message(alice.id, "second", true).unwrap();
        assert!(reply.is_bot);

        let msgs = db.get_messages_for_user(alice.id).unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].content, "first");
        assert!(!msgs[0].is_bot);
        assert_eq!(msgs[1].content, "second");
        assert!(msgs[1].is_bot);
        assert_eq!(db.count_messages_for_user(bob.id).unwrap(), 1);
        cleanup(&dir);
    }

    #[test]
    fn test_message_requires_existing_user() {
        let (db, dir) = test_db();
        assert!(db.store_message(999, "orphan", false).is_err());
        cleanup(&dir);
    }

    #[test]
    fn test_seed_resources_is_idempotent() {
        let (db, dir) = test_db();
        assert_eq!(db.seed_resources_if_empty(&DEFAULT_RESOURCES).unwrap(), 4);
        assert_eq!(db.seed_resources_if_empty(&DEFAULT_RESOURCES).unwrap(), 0);
        let rows = db.list_resources().unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].icon, "article-line");
        assert_eq!(rows[1].title, "Crisis Support Hotlines");
        cleanup(&dir);
    }

    #[test]
    fn test_seed_skips_when_any_resource_exists() {
        let (db, dir) = test_db();
        db.create_resource(&NewResource {
            title: "Custom",
            description: "d",
            icon: ResourceIcon::HeartPulseLine,
            url: "/x",
        })
        .unwrap();
        assert_eq!(db.seed_resources_if_empty(&DEFAULT_RESOURCES).unwrap(), 0);
        assert_eq!(db.list_resources().unwrap().len(), 1);
        cleanup(&dir);
    }

    #[test]
    fn test_session_lifecycle() {
        let (db, dir) = test_db();
        let user = db.create_user("alice", "a@example.com", "h").unwrap();
        let future = (chrono::Utc::now() + chrono::Duration::hours(24))
            .to_rfc3339_opts(SecondsFormat::Micros, true);
        db.create_auth_session("tok", user.id, &future).unwrap();
        assert_eq!(db.session_user_id("tok").unwrap(), Some(user.id));
        assert_eq!(db.session_user_id("other").unwrap(), None);

        assert!(db.revoke_auth_session("tok").unwrap());
        assert_eq!(db.session_user_id("tok").unwrap(), None);
        assert!(!db.revoke_auth_session("missing").unwrap());
        cleanup(&dir);
    }

    #[test]
    fn test_expired_session_is_invalid_and_purged() {
        let (db, dir) = test_db();
        let user = db.create_user("alice", "a@example.com", "h").unwrap();
        let past = (chrono::Utc::now() - chrono::Duration::minutes(1))
            .to_rfc3339_opts(SecondsFormat::Micros, true);
        let future = (chrono::Utc::now() + chrono::Duration::hours(1))
            .to_rfc3339_opts(SecondsFormat::Micros, true);
        db.create_auth_session("old", user.id, &past).unwrap();
        db.create_auth_session("new", user.id, &future).unwrap();
        assert_eq!(db.session_user_id("old").unwrap(), None);

        assert_eq!(db.purge_stale_sessions(&now_timestamp()).unwrap(), 1);
        assert_eq!(db.session_user_id("new").unwrap(), Some(user.id));
        cleanup(&dir);
    }
}
