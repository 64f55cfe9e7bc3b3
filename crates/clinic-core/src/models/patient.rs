//! Patient models.

use serde::{Deserialize, Serialize};

/// A patient, keyed by national identity-card number (CIN).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// CIN - external reference used by invoices and documents
    pub cin: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// ISO date (YYYY-MM-DD)
    pub date_of_birth: Option<String>,
    pub notes: Option<String>,
    /// Creation timestamp
    pub created_at: String,
}

impl Patient {
    /// Create a new patient with required fields.
    pub fn new(cin: String, first_name: String, last_name: String) -> Self {
        Self {
            cin,
            first_name,
            last_name,
            phone: None,
            email: None,
            date_of_birth: None,
            notes: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Display name as printed on invoices.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Case-insensitive match on CIN or either name part.
    pub fn matches(&self, query: &str) -> bool {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return true;
        }
        self.cin.to_lowercase().contains(&q)
            || self.first_name.to_lowercase().contains(&q)
            || self.last_name.to_lowercase().contains(&q)
    }
}
