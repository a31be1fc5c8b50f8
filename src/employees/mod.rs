// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Employee directory

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::Database;
use crate::error::{ServiceError, ServiceResult};

/// Registered employee
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub employee_id: String,
    pub name: String,
    pub department: String,
    pub position: String,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when registering an employee
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewEmployee {
    #[serde(default)]
    pub employee_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub position: String,
}

impl NewEmployee {
    fn validated(self) -> ServiceResult<Self> {
        let trimmed = Self {
            employee_id: self.employee_id.trim().to_string(),
            name: self.name.trim().to_string(),
            department: self.department.trim().to_string(),
            position: self.position.trim().to_string(),
        };
        if trimmed.employee_id.is_empty()
            || trimmed.name.is_empty()
            || trimmed.department.is_empty()
            || trimmed.position.is_empty()
        {
            return Err(ServiceError::Validation("All fields are required".to_string()));
        }
        Ok(trimmed)
    }
}

#[derive(Default)]
struct Roster {
    employees: Vec<EmployeeRecord>,
    index: HashMap<String, usize>,
}

impl Roster {
    fn push(&mut self, employee: EmployeeRecord) {
        self.index.insert(employee.employee_id.clone(), self.employees.len());
        self.employees.push(employee);
    }

    fn reindex(&mut self) {
        self.index = self
            .employees
            .iter()
            .enumerate()
            .map(|(pos, e)| (e.employee_id.clone(), pos))
            .collect();
    }
}

/// Keyed employee registry; lists in insertion order.
///
/// Independent of the violation ledger: removing an employee leaves recorded
/// violations untouched.
pub struct EmployeeDirectory {
    roster: RwLock<Roster>,
    backend: Option<Arc<Database>>,
}

impl EmployeeDirectory {
    pub fn in_memory() -> Self {
        Self {
            roster: RwLock::new(Roster::default()),
            backend: None,
        }
    }

    pub fn with_database(db: Arc<Database>) -> Result<Self> {
        let mut roster = Roster::default();
        for employee in db.load_employees()? {
            roster.push(employee);
        }
        info!("Loaded {} employees from database", roster.employees.len());

        Ok(Self {
            roster: RwLock::new(roster),
            backend: Some(db),
        })
    }

    pub fn add(&self, employee: NewEmployee) -> ServiceResult<EmployeeRecord> {
        let employee = employee.validated()?;

        let mut roster = self.roster.write();
        if roster.index.contains_key(&employee.employee_id) {
            return Err(ServiceError::DuplicateEmployee(employee.employee_id));
        }

        let record = EmployeeRecord {
            employee_id: employee.employee_id,
            name: employee.name,
            department: employee.department,
            position: employee.position,
            created_at: Utc::now(),
        };
        if let Some(db) = &self.backend {
            db.insert_employee(&record)?;
        }

        roster.push(record.clone());
        info!(employee_id = %record.employee_id, "Employee added");
        Ok(record)
    }

    pub fn remove(&self, employee_id: &str) -> ServiceResult<EmployeeRecord> {
        let employee_id = employee_id.trim();
        if employee_id.is_empty() {
            return Err(ServiceError::Validation("Employee ID is required".to_string()));
        }

        let mut roster = self.roster.write();
        let pos = *roster
            .index
            .get(employee_id)
            .ok_or_else(|| ServiceError::EmployeeNotFound(employee_id.to_string()))?;

        if let Some(db) = &self.backend {
            db.delete_employee(employee_id)?;
        }

        let removed = roster.employees.remove(pos);
        roster.reindex();
        info!(employee_id = %removed.employee_id, "Employee removed");
        Ok(removed)
    }

    pub fn find(&self, employee_id: &str) -> ServiceResult<EmployeeRecord> {
        let roster = self.roster.read();
        roster
            .index
            .get(employee_id.trim())
            .map(|&pos| roster.employees[pos].clone())
            .ok_or_else(|| ServiceError::EmployeeNotFound(employee_id.to_string()))
    }

    pub fn list(&self) -> Vec<EmployeeRecord> {
        self.roster.read().employees.clone()
    }

    pub fn len(&self) -> usize {
        self.roster.read().employees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
