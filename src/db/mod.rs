pub mod schema;

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Local SQLite database holding the persisted session token.
pub struct Database {
  conn: Mutex<Connection>,
}

impl Database {
  /// Open or create the database at the default location
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;
    Self::open_at(&path)
  }

  /// Open or create the database at an explicit path
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create database directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open database at {}: {}", path.display(), e))?;

    let db = Self {
      conn: Mutex::new(conn),
    };
    db.run_migrations()?;

    Ok(db)
  }

  /// Get the default database path
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("pivotwatch").join("session.db"))
  }

  /// Run database migrations
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    conn
      .execute_batch(schema::SCHEMA)
      .map_err(|e| eyre!("Failed to run migrations: {}", e))?;
    Ok(())
  }

  pub fn load_token(&self) -> Result<Option<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .query_row("SELECT token FROM session WHERE id = 1", [], |row| {
        row.get(0)
      })
      .optional()
      .map_err(|e| eyre!("Failed to read session token: {}", e))
  }

  pub fn store_token(&self, token: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO session (id, token, stored_at) VALUES (1, ?, datetime('now'))",
        params![token],
      )
      .map_err(|e| eyre!("Failed to store session token: {}", e))?;

    Ok(())
  }

  pub fn clear_token(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM session", [])
      .map_err(|e| eyre!("Failed to clear session token: {}", e))?;

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_token_roundtrip_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("session.db");

    {
      let db = Database::open_at(&path).unwrap();
      assert_eq!(db.load_token().unwrap(), None);
      db.store_token("abc").unwrap();
      db.store_token("def").unwrap();
    }

    let db = Database::open_at(&path).unwrap();
    assert_eq!(db.load_token().unwrap().as_deref(), Some("def"));

    db.clear_token().unwrap();
    assert_eq!(db.load_token().unwrap(), None);
  }
}
