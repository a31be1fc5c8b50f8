// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Database module for persistent storage

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::employees::EmployeeRecord;
use crate::violations::{NewViolation, ViolationId, ViolationRecord};

/// SQLite-backed persistence for the ledger and the employee directory.
///
/// The connection is serialized by its own mutex. Callers that also hold a
/// ledger or directory lock must take that lock first.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create database
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        // Create parent directories
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&config.path)
            .with_context(|| format!("failed to open database at {:?}", config.path))?;

        conn.execute_batch(r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        "#)?;

        let db = Self { conn: Mutex::new(conn) };
        db.create_tables()?;

        info!("Database opened at {:?}", config.path);
        Ok(db)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        db.create_tables()?;
        Ok(db)
    }

    fn create_tables(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS violations (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                timestamp TEXT NOT NULL,
                employee_id TEXT,
                employee_name TEXT,
                missing_ppe TEXT NOT NULL,
                location TEXT NOT NULL,
                notified INTEGER NOT NULL DEFAULT 0,
                notified_at TEXT,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_violations_timestamp ON violations(timestamp);

            CREATE TABLE IF NOT EXISTS employees (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                employee_id TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                department TEXT NOT NULL,
                position TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
        "#)?;

        Ok(())
    }

    /// Store a violation
    pub fn insert_violation(&self, record: &ViolationRecord) -> rusqlite::Result<()> {
        let conn = self.conn.lock();
        let missing = serde_json::to_string(&record.missing_ppe)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

        conn.execute(
            r#"INSERT INTO violations
               (id, timestamp, employee_id, employee_name, missing_ppe, location, notified, notified_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                record.id.to_string(),
                record.timestamp.to_rfc3339(),
                record.employee_id,
                record.employee_name,
                missing,
                record.location,
                record.notified,
                record.notified_at.map(|t| t.to_rfc3339()),
            ],
        )?;

        debug!(id = %record.id, "violation persisted");
        Ok(())
    }

    /// Flag a violation as notified; rows already notified are left untouched
    pub fn mark_violation_notified(&self, id: &ViolationId, at: DateTime<Utc>) -> rusqlite::Result<usize> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE violations SET notified = 1, notified_at = ?2 WHERE id = ?1 AND notified = 0",
            params![id.to_string(), at.to_rfc3339()],
        )
    }

    /// Delete every violation
    pub fn clear_violations(&self) -> rusqlite::Result<usize> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM violations", [])
    }

    /// Load the ledger in insertion order
    pub fn load_violations(&self) -> Result<Vec<ViolationRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, employee_id, employee_name, missing_ppe, location, notified, notified_at
             FROM violations ORDER BY seq ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(StoredViolation {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                employee_id: row.get(2)?,
                employee_name: row.get(3)?,
                missing_ppe: row.get(4)?,
                location: row.get(5)?,
                notified: row.get(6)?,
                notified_at: row.get(7)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    /// Store an employee
    pub fn insert_employee(&self, employee: &EmployeeRecord) -> rusqlite::Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO employees (employee_id, name, department, position, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                employee.employee_id,
                employee.name,
                employee.department,
                employee.position,
                employee.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Delete an employee, returning the number of rows removed
    pub fn delete_employee(&self, employee_id: &str) -> rusqlite::Result<usize> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM employees WHERE employee_id = ?1", params![employee_id])
    }

    /// Load the directory in insertion order
    pub fn load_employees(&self) -> Result<Vec<EmployeeRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT employee_id, name, department, position, created_at FROM employees ORDER BY seq ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut employees = Vec::new();
        for row in rows {
            let (employee_id, name, department, position, created_at) = row?;
            employees.push(EmployeeRecord {
                employee_id,
                name,
                department,
                position,
                created_at: parse_time(&created_at)?,
            });
        }
        Ok(employees)
    }

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let conn = self.conn.lock();

        let violation_count: i64 = conn.query_row("SELECT COUNT(*) FROM violations", [], |row| row.get(0))?;
        let employee_count: i64 = conn.query_row("SELECT COUNT(*) FROM employees", [], |row| row.get(0))?;

        let size_bytes: i64 = conn
            .query_row(
                "SELECT page_count * page_size as size FROM pragma_page_count(), pragma_page_size()",
                [],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(0);

        Ok(DatabaseStats {
            violation_count: violation_count as usize,
            employee_count: employee_count as usize,
            size_bytes: size_bytes as u64,
        })
    }
}

/// Raw violation row as stored on disk
#[derive(Debug, Clone)]
struct StoredViolation {
    id: String,
    timestamp: String,
    employee_id: Option<String>,
    employee_name: Option<String>,
    missing_ppe: String,
    location: String,
    notified: bool,
    notified_at: Option<String>,
}

impl StoredViolation {
    fn into_record(self) -> Result<ViolationRecord> {
        let id: ViolationId = self
            .id
            .parse()
            .map_err(|e| anyhow!("corrupt violation id {:?}: {}", self.id, e))?;
        let missing_ppe: Vec<String> = serde_json::from_str(&self.missing_ppe)?;

        let mut record = ViolationRecord::new(
            id,
            NewViolation {
                employee_id: self.employee_id,
                employee_name: self.employee_name,
                missing_ppe,
                timestamp: parse_time(&self.timestamp)?,
                location: self.location,
                annotated_image: None,
            },
        )
        .map_err(|e| anyhow!("corrupt violation {}: {}", id, e))?;

        if self.notified {
            record.notified = true;
            record.notified_at = self.notified_at.as_deref().map(parse_time).transpose()?;
        }
        Ok(record)
    }
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("invalid timestamp {:?}", value))?
        .with_timezone(&Utc))
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub violation_count: usize,
    pub employee_count: usize,
    pub size_bytes: u64,
}
