use std::collections::HashSet;

use rusqlite::Connection;

pub(crate) fn init(conn: &Connection) -> rusqlite::Result<()> {
    // Ensure foreign keys are enforced (disabled by default in SQLite).
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS templates (
          id TEXT PRIMARY KEY,
          name TEXT NOT NULL,
          created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
          modified_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
          metadata JSON,
          is_active INTEGER NOT NULL DEFAULT 1,
          is_default INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS template_usage_types (
          template_id TEXT NOT NULL REFERENCES templates(id),
          usage_type TEXT NOT NULL,
          PRIMARY KEY (template_id, usage_type)
        );

        CREATE INDEX IF NOT EXISTS idx_template_usage_types_usage ON template_usage_types(usage_type);

        -- Append-only: rows are inserted with the next version number and never
        -- updated, so any version can be fetched again later.
        CREATE TABLE IF NOT EXISTS template_versions (
          template_id TEXT NOT NULL REFERENCES templates(id),
          version INTEGER NOT NULL CHECK (version >= 1),
          snapshot JSON NOT NULL,
          saved_at TEXT NOT NULL,
          saved_by TEXT,
          origin TEXT NOT NULL DEFAULT 'save' CHECK (origin IN ('save','resetToDefault')),
          PRIMARY KEY (template_id, version)
        );
        "#,
    )?;

    // Databases created before soft delete and default templates existed.
    ensure_template_columns(conn)?;
    // Databases created before the editor name and origin were recorded.
    ensure_version_columns(conn)?;

    Ok(())
}

fn existing_columns(conn: &Connection, table: &str) -> rusqlite::Result<HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut existing = HashSet::new();
    for name in rows {
        existing.insert(name?);
    }
    Ok(existing)
}

fn ensure_template_columns(conn: &Connection) -> rusqlite::Result<()> {
    let existing = existing_columns(conn, "templates")?;

    if !existing.contains("is_active") {
        conn.execute("ALTER TABLE templates ADD COLUMN is_active INTEGER NOT NULL DEFAULT 1", [])?;
    }
    if !existing.contains("is_default") {
        conn.execute("ALTER TABLE templates ADD COLUMN is_default INTEGER NOT NULL DEFAULT 0", [])?;
    }

    Ok(())
}

fn ensure_version_columns(conn: &Connection) -> rusqlite::Result<()> {
    let existing = existing_columns(conn, "template_versions")?;

    if !existing.contains("saved_by") {
        conn.execute("ALTER TABLE template_versions ADD COLUMN saved_by TEXT", [])?;
    }
    if !existing.contains("origin") {
        conn.execute(
            "ALTER TABLE template_versions ADD COLUMN origin TEXT NOT NULL DEFAULT 'save' CHECK (origin IN ('save','resetToDefault'))",
            [],
        )?;
    }

    Ok(())
}
