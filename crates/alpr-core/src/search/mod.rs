//! History search over the local outbox
//!
//! A [`ViolationQuery`] is a conjunction of optional filters. It is turned
//! into a parameterized `WHERE` clause by the repository; this module only
//! owns the predicate and its SQL rendering.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::models::{normalize_plate, SyncState};

/// Default number of rows returned by a search
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Filters for user-facing history lookups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationQuery {
    /// Substring of the plate text, case-insensitive
    pub plate_contains: Option<String>,
    /// Exact violation category
    pub violation_type: Option<String>,
    /// Inclusive lower bound on capture time
    pub captured_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on capture time
    pub captured_to: Option<DateTime<Utc>>,
    /// Restrict to one sync state
    pub state: Option<SyncState>,
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

impl Default for ViolationQuery {
    fn default() -> Self {
        Self {
            plate_contains: None,
            violation_type: None,
            captured_from: None,
            captured_to: None,
            state: None,
            limit: DEFAULT_SEARCH_LIMIT,
            offset: 0,
        }
    }
}

impl ViolationQuery {
    #[must_use]
    pub fn plate(mut self, fragment: impl AsRef<str>) -> Self {
        let normalized = normalize_plate(fragment.as_ref());
        self.plate_contains = (!normalized.is_empty()).then_some(normalized);
        self
    }

    #[must_use]
    pub fn violation_type(mut self, violation_type: impl Into<String>) -> Self {
        self.violation_type = crate::util::normalize_text_option(Some(violation_type.into()));
        self
    }

    #[must_use]
    pub const fn between(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.captured_from = from;
        self.captured_to = to;
        self
    }

    #[must_use]
    pub const fn state(mut self, state: SyncState) -> Self {
        self.state = Some(state);
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub const fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Render the `WHERE` clause and its bound values.
    ///
    /// Returns `"1 = 1"` when no filter is set.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let mut clauses = Vec::new();
        let mut values = Vec::new();

        if let Some(fragment) = &self.plate_contains {
            clauses.push("UPPER(plate_number) LIKE ? ESCAPE '\\'");
            values.push(Value::Text(format!("%{}%", escape_like(fragment))));
        }
        if let Some(violation_type) = &self.violation_type {
            clauses.push("violation_type = ?");
            values.push(Value::Text(violation_type.clone()));
        }
        if let Some(from) = self.captured_from {
            clauses.push("timestamp >= ?");
            values.push(Value::Integer(from.timestamp_millis()));
        }
        if let Some(to) = self.captured_to {
            clauses.push("timestamp < ?");
            values.push(Value::Integer(to.timestamp_millis()));
        }
        if let Some(state) = self.state {
            clauses.push("state = ?");
            values.push(Value::Text(state.as_str().to_string()));
        }

        if clauses.is_empty() {
            ("1 = 1".to_string(), values)
        } else {
            (clauses.join(" AND "), values)
        }
    }
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
