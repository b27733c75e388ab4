/// Schema for the local session database.
///
/// `session` holds at most one row: the bearer token of the logged-in user.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS session (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    token TEXT NOT NULL,
    stored_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
