use crate::history::{check_base, VersionStore};
use crate::schema;
use crate::types::{SaveOptions, TemplateMeta, TemplateVersion, VersionOrigin};
use chrono::{DateTime, Utc};
use formgrid_model::TemplateSnapshot;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("template not found: {0}")]
    TemplateNotFound(Uuid),
    #[error("template {template_id} has no version {version}")]
    NotFound { template_id: Uuid, version: u32 },
    #[error("version conflict: expected to save on top of version {expected}, but the latest is {actual}")]
    VersionConflict { expected: u32, actual: u32 },
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// SQLite-backed template metadata and version history.
#[derive(Debug, Clone)]
pub struct Storage {
    conn: Arc<Mutex<Connection>>,
}

/// Raw `template_versions` row before the snapshot JSON is decoded.
struct VersionRow {
    version: u32,
    snapshot: String,
    saved_at: DateTime<Utc>,
    saved_by: Option<String>,
    origin: VersionOrigin,
}

impl VersionRow {
    fn from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let saved_at: String = r.get(2)?;
        let saved_at = DateTime::parse_from_rfc3339(&saved_at)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?
            .with_timezone(&Utc);
        let origin: String = r.get(4)?;
        let origin = VersionOrigin::parse(&origin).ok_or(rusqlite::Error::InvalidColumnType(
            4,
            "origin".to_string(),
            Type::Text,
        ))?;
        Ok(Self {
            version: r.get(0)?,
            snapshot: r.get(1)?,
            saved_at,
            saved_by: r.get(3)?,
            origin,
        })
    }

    fn decode(self) -> Result<TemplateVersion> {
        Ok(TemplateVersion {
            version: self.version,
            snapshot: serde_json::from_str(&self.snapshot)?,
            saved_at: self.saved_at,
            saved_by: self.saved_by,
            origin: self.origin,
        })
    }
}

impl Storage {
    fn from_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        schema::init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn open_uri(uri: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI;
        Self::from_connection(Connection::open_with_flags(uri, flags)?)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            // SQLite rolls back any transaction left open by a panicking holder.
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn create_template(&self, name: &str, metadata: Option<serde_json::Value>) -> Result<TemplateMeta> {
        let template = TemplateMeta {
            id: Uuid::new_v4(),
            name: name.to_string(),
            metadata,
            usage_types: Vec::new(),
            is_default: false,
            is_active: true,
        };

        let conn = self.lock();
        conn.execute(
            "INSERT INTO templates (id, name, metadata) VALUES (?1, ?2, ?3)",
            params![template.id.to_string(), &template.name, template.metadata.clone()],
        )?;

        Ok(template)
    }

    /// Fetch a template, including soft-deleted ones.
    pub fn get_template(&self, id: Uuid) -> Result<TemplateMeta> {
        let conn = self.lock();
        load_template(&conn, id)?.ok_or(StorageError::TemplateNotFound(id))
    }

    /// Active templates ordered by name.
    pub fn list_templates(&self) -> Result<Vec<TemplateMeta>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM templates WHERE is_active = 1 ORDER BY name, id"
        ))?;
        let rows = stmt.query_map([], template_from_row)?;

        let mut templates = Vec::new();
        for template in rows {
            let mut template = template?;
            template.usage_types = usage_types(&conn, template.id)?;
            templates.push(template);
        }
        Ok(templates)
    }

    pub fn rename_template(&self, id: Uuid, name: &str) -> Result<()> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE templates SET name = ?1, modified_at = CURRENT_TIMESTAMP WHERE id = ?2",
            params![name, id.to_string()],
        )?;
        if changed == 0 {
            return Err(StorageError::TemplateNotFound(id));
        }
        Ok(())
    }

    /// Replace the documents a template is offered for.
    pub fn set_usage_types<I, S>(&self, id: Uuid, usage_types: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        require_template(&tx, id)?;

        tx.execute(
            "DELETE FROM template_usage_types WHERE template_id = ?1",
            params![id.to_string()],
        )?;
        for usage_type in usage_types {
            tx.execute(
                "INSERT OR IGNORE INTO template_usage_types (template_id, usage_type) VALUES (?1, ?2)",
                params![id.to_string(), usage_type.as_ref()],
            )?;
        }
        tx.execute(
            "UPDATE templates SET modified_at = CURRENT_TIMESTAMP WHERE id = ?1",
            params![id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Soft delete: the template and its history stay in the database but it no
    /// longer appears in listings or default lookups. Deleting twice is an error.
    pub fn delete_template(&self, id: Uuid) -> Result<()> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE templates SET is_active = 0, modified_at = CURRENT_TIMESTAMP WHERE id = ?1 AND is_active = 1",
            params![id.to_string()],
        )?;
        if changed == 0 {
            return Err(StorageError::TemplateNotFound(id));
        }
        log::info!("template {id}: deactivated");
        Ok(())
    }

    /// Make `id` the default for each of its usage types, clearing the flag on every
    /// other template sharing one of them.
    pub fn set_default(&self, id: Uuid) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let active = load_template(&tx, id)?.is_some_and(|t| t.is_active);
        if !active {
            return Err(StorageError::TemplateNotFound(id));
        }

        let cleared = tx.execute(
            r#"
            UPDATE templates SET is_default = 0, modified_at = CURRENT_TIMESTAMP
            WHERE is_default = 1 AND id != ?1 AND id IN (
              SELECT other.template_id
              FROM template_usage_types other
              JOIN template_usage_types mine ON mine.usage_type = other.usage_type
              WHERE mine.template_id = ?1
            )
            "#,
            params![id.to_string()],
        )?;
        tx.execute(
            "UPDATE templates SET is_default = 1, modified_at = CURRENT_TIMESTAMP WHERE id = ?1",
            params![id.to_string()],
        )?;
        tx.commit()?;

        log::info!("template {id}: set as default ({cleared} previous default(s) cleared)");
        Ok(())
    }

    /// The active default for `usage_type`, falling back to the newest active
    /// template offered for it when none is marked default.
    pub fn default_for(&self, usage_type: &str) -> Result<Option<TemplateMeta>> {
        let conn = self.lock();
        let id: Option<String> = conn
            .query_row(
                r#"
                SELECT t.id
                FROM templates t
                JOIN template_usage_types u ON u.template_id = t.id
                WHERE u.usage_type = ?1 AND t.is_active = 1
                ORDER BY t.is_default DESC, t.created_at DESC, t.rowid DESC
                LIMIT 1
                "#,
                params![usage_type],
                |r| r.get(0),
            )
            .optional()?;

        match id {
            Some(id) => load_template(&conn, parse_id(0, &id)?),
            None => Ok(None),
        }
    }

    /// Copy a template under the name "<name> (Kopya)".
    ///
    /// The copy keeps the metadata and usage types, is never the default, and starts
    /// its own history with the source's latest version as version 1.
    pub fn duplicate_template(&self, id: Uuid) -> Result<TemplateMeta> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let source = load_template(&tx, id)?.ok_or(StorageError::TemplateNotFound(id))?;
        let copy = TemplateMeta {
            id: Uuid::new_v4(),
            name: format!("{} (Kopya)", source.name),
            metadata: source.metadata,
            usage_types: source.usage_types,
            is_default: false,
            is_active: true,
        };

        tx.execute(
            "INSERT INTO templates (id, name, metadata) VALUES (?1, ?2, ?3)",
            params![copy.id.to_string(), &copy.name, copy.metadata.clone()],
        )?;
        tx.execute(
            r#"
            INSERT INTO template_usage_types (template_id, usage_type)
            SELECT ?1, usage_type FROM template_usage_types WHERE template_id = ?2
            "#,
            params![copy.id.to_string(), id.to_string()],
        )?;
        let copied = tx.execute(
            r#"
            INSERT INTO template_versions (template_id, version, snapshot, saved_at, saved_by, origin)
            SELECT ?1, 1, snapshot, ?3, NULL, 'save'
            FROM template_versions
            WHERE template_id = ?2
            ORDER BY version DESC
            LIMIT 1
            "#,
            params![copy.id.to_string(), id.to_string(), Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;

        log::info!(
            "template {id}: duplicated as {} ({} version(s) copied)",
            copy.id,
            copied
        );
        Ok(copy)
    }
}

const TEMPLATE_COLUMNS: &str = "id, name, metadata, is_default, is_active";

fn parse_id(column: usize, raw: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

fn template_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<TemplateMeta> {
    let id: String = r.get(0)?;
    Ok(TemplateMeta {
        id: parse_id(0, &id)?,
        name: r.get(1)?,
        metadata: r.get(2)?,
        usage_types: Vec::new(),
        is_default: r.get(3)?,
        is_active: r.get(4)?,
    })
}

fn usage_types(conn: &Connection, id: Uuid) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT usage_type FROM template_usage_types WHERE template_id = ?1 ORDER BY usage_type",
    )?;
    let rows = stmt.query_map(params![id.to_string()], |r| r.get(0))?;
    rows.collect()
}

fn load_template(conn: &Connection, id: Uuid) -> Result<Option<TemplateMeta>> {
    let template = conn
        .query_row(
            &format!("SELECT {TEMPLATE_COLUMNS} FROM templates WHERE id = ?1"),
            params![id.to_string()],
            template_from_row,
        )
        .optional()?;

    match template {
        Some(mut template) => {
            template.usage_types = usage_types(conn, id)?;
            Ok(Some(template))
        }
        None => Ok(None),
    }
}

fn require_template(conn: &Connection, id: Uuid) -> Result<()> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM templates WHERE id = ?1",
            params![id.to_string()],
            |_| Ok(()),
        )
        .optional()?;
    exists.ok_or(StorageError::TemplateNotFound(id))
}

impl VersionStore for Storage {
    fn append(
        &self,
        template_id: Uuid,
        snapshot: &TemplateSnapshot,
        origin: VersionOrigin,
        options: SaveOptions,
    ) -> Result<TemplateVersion> {
        let json = serde_json::to_string(snapshot)?;
        let saved_at = Utc::now();

        let mut conn = self.lock();
        // Take the write lock up front: several handles may share one database file,
        // and a deferred transaction that reads first cannot upgrade once another
        // writer holds the lock.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        require_template(&tx, template_id)?;

        let actual: u32 = tx.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM template_versions WHERE template_id = ?1",
            params![template_id.to_string()],
            |r| r.get(0),
        )?;
        check_base(&options, actual)?;

        let version = actual + 1;
        tx.execute(
            r#"
            INSERT INTO template_versions (template_id, version, snapshot, saved_at, saved_by, origin)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                template_id.to_string(),
                version,
                json,
                saved_at.to_rfc3339(),
                options.saved_by.as_deref(),
                origin.as_str()
            ],
        )?;
        tx.execute(
            "UPDATE templates SET modified_at = CURRENT_TIMESTAMP WHERE id = ?1",
            params![template_id.to_string()],
        )?;
        tx.commit()?;

        log::debug!("template {template_id}: stored version {version} ({})", origin.as_str());
        Ok(TemplateVersion {
            version,
            snapshot: snapshot.clone(),
            saved_at,
            saved_by: options.saved_by,
            origin,
        })
    }

    fn get_version(&self, template_id: Uuid, version: u32) -> Result<TemplateSnapshot> {
        let conn = self.lock();
        let json: Option<String> = conn
            .query_row(
                "SELECT snapshot FROM template_versions WHERE template_id = ?1 AND version = ?2",
                params![template_id.to_string(), version],
                |r| r.get(0),
            )
            .optional()?;

        let json = json.ok_or(StorageError::NotFound { template_id, version })?;
        Ok(serde_json::from_str(&json)?)
    }

    fn get_history(&self, template_id: Uuid, limit: usize) -> Result<Vec<TemplateVersion>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT version, snapshot, saved_at, saved_by, origin
            FROM template_versions
            WHERE template_id = ?1
            ORDER BY version DESC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(params![template_id.to_string(), limit], VersionRow::from_row)?;

        let mut versions = Vec::new();
        for row in rows {
            versions.push(row?.decode()?);
        }
        Ok(versions)
    }
}
