//! Schema introspection for one open database
//!
//! Collections are user tables, key paths come from primary key columns,
//! indexes from the index list of each table.

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::ScannerError;
use crate::Result;

/// Bytes assumed per record when estimating a database's size.
/// Exact byte sizes are not available through introspection.
pub const ESTIMATED_RECORD_SIZE: u64 = 1024;

/// Key path of a collection or index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPath {
    None,
    Single(String),
    Composite(Vec<String>),
}

impl KeyPath {
    pub fn from_columns(mut columns: Vec<String>) -> Self {
        match columns.len() {
            0 => KeyPath::None,
            1 => KeyPath::Single(columns.remove(0)),
            _ => KeyPath::Composite(columns),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexInfo {
    pub name: String,
    pub key_path: KeyPath,
    pub unique: bool,
    pub multi_entry: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionInfo {
    pub name: String,
    pub key_path: KeyPath,
    pub auto_increment: bool,
    pub indexes: Vec<IndexInfo>,
    pub record_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInfo {
    pub name: String,
    pub version: i64,
    pub collections: Vec<CollectionInfo>,
    /// Estimated from record counts, see [`ESTIMATED_RECORD_SIZE`]
    pub size: u64,
}

impl DatabaseInfo {
    pub fn new(name: String, version: i64, collections: Vec<CollectionInfo>) -> Self {
        let records: u64 = collections.iter().map(|c| c.record_count).sum();
        Self {
            name,
            version,
            collections,
            size: records.saturating_mul(ESTIMATED_RECORD_SIZE),
        }
    }
}

pub fn schema_version(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

pub fn collection_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'
         ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(names)
}

pub fn collections(conn: &Connection) -> Result<Vec<CollectionInfo>> {
    collection_names(conn)?
        .into_iter()
        .map(|name| collection(conn, name))
        .collect()
}

fn collection(conn: &Connection, name: String) -> Result<CollectionInfo> {
    let sql: Option<String> = conn.query_row(
        "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [&name],
        |row| row.get(0),
    )?;
    let sql = sql.unwrap_or_default().to_ascii_uppercase();

    let mut stmt =
        conn.prepare("SELECT name, type FROM pragma_table_info(?1) WHERE pk > 0 ORDER BY pk")?;
    let key_columns = stmt
        .query_map([&name], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    // AUTOINCREMENT, or a lone INTEGER PRIMARY KEY aliasing the rowid
    let rowid_alias = key_columns.len() == 1
        && key_columns[0].1.eq_ignore_ascii_case("INTEGER")
        && !sql.contains("WITHOUT ROWID");
    let auto_increment = sql.contains("AUTOINCREMENT") || rowid_alias;

    let key_path = KeyPath::from_columns(key_columns.into_iter().map(|(column, _)| column).collect());
    let indexes = indexes(conn, &name)?;
    let record_count: i64 =
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", quote_ident(&name)), [], |row| {
            row.get(0)
        })?;

    Ok(CollectionInfo {
        name,
        key_path,
        auto_increment,
        indexes,
        record_count: record_count.max(0) as u64,
    })
}

fn indexes(conn: &Connection, table: &str) -> Result<Vec<IndexInfo>> {
    let mut stmt = conn.prepare(
        "SELECT name, \"unique\" FROM pragma_index_list(?1)
         WHERE origin IN ('c', 'u')
         ORDER BY name",
    )?;
    let listed = stmt
        .query_map([table], |row| Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut columns_stmt =
        conn.prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")?;

    let mut indexes = Vec::with_capacity(listed.len());
    for (name, unique) in listed {
        let columns = columns_stmt
            .query_map([&name], |row| row.get::<_, Option<String>>(0))?
            .map(|column| column.map(|c| c.unwrap_or_else(|| "<expression>".to_string())))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        indexes.push(IndexInfo {
            name,
            key_path: KeyPath::from_columns(columns),
            unique,
            // SQLite indexes hold one entry per row
            multi_entry: false,
        });
    }

    Ok(indexes)
}

/// Up to `limit` records of `collection` in storage order, each as an
/// object of column name to value.
pub fn sample(
    conn: &Connection,
    database: &str,
    collection: &str,
    limit: u32,
) -> Result<Vec<Value>> {
    if !collection_names(conn)?.iter().any(|name| name == collection) {
        return Err(ScannerError::CollectionNotFound {
            database: database.to_string(),
            collection: collection.to_string(),
        });
    }

    let mut stmt = conn.prepare(&format!("SELECT * FROM {} LIMIT ?1", quote_ident(collection)))?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.query([limit])?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Map::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            record.insert(column.clone(), to_json(row.get_ref(i)?));
        }
        records.push(Value::Object(record));
    }

    Ok(records)
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            PRAGMA user_version = 3;
            CREATE TABLE notes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                body BLOB
            );
            CREATE INDEX idx_notes_title ON notes(title);
            CREATE TABLE tags (
                note_id INTEGER NOT NULL,
                tag TEXT NOT NULL,
                PRIMARY KEY (note_id, tag)
            ) WITHOUT ROWID;
            CREATE TABLE events (payload TEXT, at REAL, UNIQUE(at, payload));
            CREATE TABLE sqlitebrowser_prefs (k TEXT);
            INSERT INTO notes (title, body) VALUES ('first', x'0102'), ('second', NULL);
            INSERT INTO tags VALUES (1, 'work');
            "#,
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_schema_version() {
        assert_eq!(schema_version(&fixture()).unwrap(), 3);
    }

    #[test]
    fn test_collections() {
        let conn = fixture();
        let collections = collections(&conn).unwrap();
        let names: Vec<&str> = collections.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["events", "notes", "sqlitebrowser_prefs", "tags"]);

        let notes = &collections[1];
        assert_eq!(notes.key_path, KeyPath::Single("id".to_string()));
        assert!(notes.auto_increment);
        assert_eq!(notes.record_count, 2);
        assert_eq!(notes.indexes.len(), 1);
        assert_eq!(notes.indexes[0].name, "idx_notes_title");
        assert_eq!(notes.indexes[0].key_path, KeyPath::Single("title".to_string()));
        assert!(!notes.indexes[0].unique);

        let tags = &collections[3];
        assert_eq!(
            tags.key_path,
            KeyPath::Composite(vec!["note_id".to_string(), "tag".to_string()])
        );
        assert!(!tags.auto_increment);

        let events = &collections[0];
        assert_eq!(events.key_path, KeyPath::None);
        assert!(!events.auto_increment);
        assert_eq!(events.record_count, 0);
        assert_eq!(events.indexes.len(), 1);
        assert!(events.indexes[0].unique);
        assert_eq!(
            events.indexes[0].key_path,
            KeyPath::Composite(vec!["at".to_string(), "payload".to_string()])
        );
    }

    #[test]
    fn test_size_estimate() {
        let info = DatabaseInfo::new("app".to_string(), 1, collections(&fixture()).unwrap());
        assert_eq!(info.size, 3 * ESTIMATED_RECORD_SIZE);
    }

    #[test]
    fn test_sample_respects_limit() {
        let conn = fixture();

        let rows = sample(&conn, "app", "notes", 1).unwrap();
        assert_eq!(rows, vec![json!({"id": 1, "title": "first", "body": [1, 2]})]);

        let all = sample(&conn, "app", "notes", 50).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1]["body"], Value::Null);
    }

    #[test]
    fn test_sample_unknown_collection() {
        assert!(matches!(
            sample(&fixture(), "app", "missing", 10),
            Err(ScannerError::CollectionNotFound { .. })
        ));
    }

    #[test]
    fn test_key_path_wire_shape() {
        assert_eq!(serde_json::to_value(KeyPath::None).unwrap(), Value::Null);
        assert_eq!(serde_json::to_value(KeyPath::Single("id".into())).unwrap(), json!("id"));
        assert_eq!(
            serde_json::to_value(KeyPath::Composite(vec!["a".into(), "b".into()])).unwrap(),
            json!(["a", "b"])
        );
    }
}
