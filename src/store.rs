//! SQLite persistence for accounts and per-user attempt history.
//!
//! A single connection behind a mutex is plenty at this scale; every query is
//! a point read or a small scan over one user's rows. Passwords are stored as
//! `blake3$<salt>$<hash>` with a random per-user salt.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::error::StoreError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  username TEXT UNIQUE NOT NULL,
  password_hash TEXT NOT NULL,
  created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS history (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id INTEGER NOT NULL,
  problem_data TEXT NOT NULL,
  user_code TEXT NOT NULL DEFAULT '',
  verdict TEXT NOT NULL DEFAULT '',
  language TEXT NOT NULL DEFAULT 'cpp',
  timestamp TEXT NOT NULL,
  FOREIGN KEY (user_id) REFERENCES users(id)
);
CREATE INDEX IF NOT EXISTS idx_history_user ON history(user_id);
";

#[derive(Clone, Debug)]
pub struct UserRecord {
  pub id: i64,
  pub username: String,
}

/// One attempt as returned to the client. `problem` is the stored problem
/// JSON, parsed back into a value.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
  pub id: i64,
  pub problem: Value,
  pub user_code: String,
  pub verdict: String,
  pub language: String,
  pub timestamp: String,
}

pub struct Store {
  conn: Mutex<Connection>,
}

impl Store {
  /// Open (creating if needed) the database file and ensure the schema.
  pub fn open(path: &Path) -> Result<Self, StoreError> {
    if let Some(parent) = path.parent() {
      if !parent.as_os_str().is_empty() && !parent.exists() {
        std::fs::create_dir_all(parent)?;
      }
    }
    let conn = Connection::open(path)?;
    conn.execute_batch(SCHEMA)?;
    info!(target: "algocoach_backend", path = %path.display(), "SQLite store ready");
    Ok(Store { conn: Mutex::new(conn) })
  }

  /// In-memory store for tests.
  pub fn open_in_memory() -> Result<Self, StoreError> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(SCHEMA)?;
    Ok(Store { conn: Mutex::new(conn) })
  }

  fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
    self.conn.lock().map_err(|_| StoreError::Poisoned)
  }

  pub fn register_user(&self, username: &str, password: &str) -> Result<UserRecord, StoreError> {
    if username.trim().is_empty() || password.is_empty() {
      return Err(StoreError::MissingCredentials);
    }
    let conn = self.conn()?;
    let salt = Uuid::new_v4().simple().to_string();
    let stored = format!("blake3${salt}${}", hash_password(&salt, password));
    let created_at = chrono::Utc::now().to_rfc3339();

    let inserted = conn.execute(
      "INSERT INTO users (username, password_hash, created_at) VALUES (?, ?, ?)",
      rusqlite::params![username, stored, created_at],
    );
    match inserted {
      Ok(_) => {}
      Err(rusqlite::Error::SqliteFailure(e, _))
        if e.code == rusqlite::ErrorCode::ConstraintViolation =>
      {
        return Err(StoreError::UsernameTaken)
      }
      Err(e) => return Err(e.into()),
    }

    let id = conn.last_insert_rowid();
    info!(target: "algocoach_backend", user_id = id, %username, "User registered");
    Ok(UserRecord { id, username: username.to_string() })
  }

  /// Check a username/password pair. Unknown users and wrong passwords are
  /// indistinguishable to the caller.
  pub fn verify_user(&self, username: &str, password: &str) -> Result<UserRecord, StoreError> {
    let conn = self.conn()?;
    let row: Option<(i64, String, String)> = conn
      .query_row(
        "SELECT id, username, password_hash FROM users WHERE username = ?",
        rusqlite::params![username],
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
      )
      .optional()?;

    let Some((id, username, stored)) = row else {
      return Err(StoreError::BadCredentials);
    };
    if !verify_password(&stored, password)? {
      return Err(StoreError::BadCredentials);
    }
    Ok(UserRecord { id, username })
  }

  pub fn save_history(
    &self,
    user_id: i64,
    problem: &Value,
    user_code: &str,
    verdict: &str,
    language: &str,
  ) -> Result<i64, StoreError> {
    let conn = self.conn()?;
    let problem_json = serde_json::to_string(problem)?;
    let timestamp = chrono::Utc::now().to_rfc3339();
    conn.execute(
      "INSERT INTO history (user_id, problem_data, user_code, verdict, language, timestamp)
       VALUES (?, ?, ?, ?, ?, ?)",
      rusqlite::params![user_id, problem_json, user_code, verdict, language, timestamp],
    )?;
    Ok(conn.last_insert_rowid())
  }

  /// Attach code and a verdict to an existing attempt. The row must belong
  /// to `user_id`; other users' rows are invisible here.
  pub fn update_history(
    &self,
    user_id: i64,
    history_id: i64,
    user_code: &str,
    verdict: &str,
  ) -> Result<(), StoreError> {
    let conn = self.conn()?;
    let changed = conn.execute(
      "UPDATE history SET user_code = ?, verdict = ? WHERE id = ? AND user_id = ?",
      rusqlite::params![user_code, verdict, history_id, user_id],
    )?;
    if changed == 0 {
      return Err(StoreError::NotFound);
    }
    Ok(())
  }

  /// All attempts for one user, newest first.
  pub fn load_history(&self, user_id: i64) -> Result<Vec<HistoryEntry>, StoreError> {
    let conn = self.conn()?;
    let mut stmt = conn.prepare(
      "SELECT id, problem_data, user_code, verdict, language, timestamp
       FROM history WHERE user_id = ? ORDER BY timestamp DESC, id DESC",
    )?;
    let rows = stmt.query_map(rusqlite::params![user_id], |row| {
      let problem_json: String = row.get(1)?;
      Ok(HistoryEntry {
        id: row.get(0)?,
        // One corrupt row must not take down the whole listing.
        problem: serde_json::from_str(&problem_json).unwrap_or(Value::Null),
        user_code: row.get(2)?,
        verdict: row.get(3)?,
        language: row.get(4)?,
        timestamp: row.get(5)?,
      })
    })?;

    let mut history = Vec::new();
    for row in rows {
      history.push(row?);
    }
    Ok(history)
  }
}

fn hash_password(salt: &str, password: &str) -> String {
  blake3::Hash::from(blake3::derive_key(salt, password.as_bytes())).to_hex().to_string()
}

fn verify_password(stored: &str, password: &str) -> Result<bool, StoreError> {
  let mut parts = stored.splitn(3, '$');
  let (method, salt, hash_hex) = match (parts.next(), parts.next(), parts.next()) {
    (Some(m), Some(s), Some(h)) => (m, s, h),
    _ => return Err(StoreError::BadStoredCredential),
  };
  if method != "blake3" {
    return Err(StoreError::BadStoredCredential);
  }
  let stored_hash =
    blake3::Hash::from_hex(hash_hex).map_err(|_| StoreError::BadStoredCredential)?;
  // blake3::Hash equality is constant-time.
  Ok(stored_hash == blake3::Hash::from(blake3::derive_key(salt, password.as_bytes())))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn register_then_login_roundtrip() {
    let store = Store::open_in_memory().unwrap();
    let user = store.register_user("thang", "mật-khẩu-dài").unwrap();
    assert!(user.id > 0);

    let back = store.verify_user("thang", "mật-khẩu-dài").unwrap();
    assert_eq!(back.id, user.id);
    assert_eq!(back.username, "thang");
  }

  #[test]
  fn wrong_password_and_unknown_user_look_identical() {
    let store = Store::open_in_memory().unwrap();
    store.register_user("an", "đúng").unwrap();

    let wrong = store.verify_user("an", "sai");
    let unknown = store.verify_user("bình", "đúng");
    assert!(matches!(wrong, Err(StoreError::BadCredentials)));
    assert!(matches!(unknown, Err(StoreError::BadCredentials)));
  }

  #[test]
  fn duplicate_usernames_are_rejected() {
    let store = Store::open_in_memory().unwrap();
    store.register_user("an", "a").unwrap();
    assert!(matches!(store.register_user("an", "b"), Err(StoreError::UsernameTaken)));
  }

  #[test]
  fn blank_credentials_are_rejected_up_front() {
    let store = Store::open_in_memory().unwrap();
    assert!(matches!(store.register_user("  ", "x"), Err(StoreError::MissingCredentials)));
    assert!(matches!(store.register_user("an", ""), Err(StoreError::MissingCredentials)));
  }

  #[test]
  fn stored_credentials_are_salted_blake3_not_plaintext() {
    let store = Store::open_in_memory().unwrap();
    store.register_user("an", "bí mật").unwrap();
    let conn = store.conn().unwrap();
    let stored: String = conn
      .query_row("SELECT password_hash FROM users WHERE username = 'an'", [], |r| r.get(0))
      .unwrap();
    assert!(stored.starts_with("blake3$"));
    assert!(!stored.contains("bí mật"));
    // Same password, different user => different salt and hash.
    drop(conn);
    store.register_user("hai", "bí mật").unwrap();
    let conn = store.conn().unwrap();
    let other: String = conn
      .query_row("SELECT password_hash FROM users WHERE username = 'hai'", [], |r| r.get(0))
      .unwrap();
    assert_ne!(stored, other);
  }

  #[test]
  fn history_lists_newest_first_and_parses_problem_json() {
    let store = Store::open_in_memory().unwrap();
    let user = store.register_user("an", "x").unwrap();

    let first = store
      .save_history(user.id, &json!({"title": "Bài 1"}), "", "", "cpp")
      .unwrap();
    let second = store
      .save_history(user.id, &json!({"title": "Bài 2"}), "code", "CORRECT", "python")
      .unwrap();
    assert_ne!(first, second);

    let history = store.load_history(user.id).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, second);
    assert_eq!(history[0].problem["title"], "Bài 2");
    assert_eq!(history[0].verdict, "CORRECT");
    assert_eq!(history[1].problem["title"], "Bài 1");
  }

  #[test]
  fn history_is_scoped_per_user() {
    let store = Store::open_in_memory().unwrap();
    let an = store.register_user("an", "x").unwrap();
    let binh = store.register_user("bình", "y").unwrap();
    let id = store.save_history(an.id, &json!({"title": "của An"}), "", "", "cpp").unwrap();

    assert!(store.load_history(binh.id).unwrap().is_empty());
    // Bình cannot touch An's attempt.
    assert!(matches!(
      store.update_history(binh.id, id, "hack", "EXCELLENT"),
      Err(StoreError::NotFound)
    ));

    store.update_history(an.id, id, "mới", "PARTIAL").unwrap();
    let history = store.load_history(an.id).unwrap();
    assert_eq!(history[0].user_code, "mới");
    assert_eq!(history[0].verdict, "PARTIAL");
  }

  #[test]
  fn history_entry_serializes_camel_case() {
    let entry = HistoryEntry {
      id: 1,
      problem: json!({"title": "t"}),
      user_code: "c".into(),
      verdict: "CORRECT".into(),
      language: "cpp".into(),
      timestamp: "2026-01-01T00:00:00Z".into(),
    };
    let v = serde_json::to_value(&entry).unwrap();
    assert!(v.get("userCode").is_some());
    assert!(v.get("user_code").is_none());
  }
}
