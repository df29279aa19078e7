use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage-assigned row id. Irrelevant to deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct JobId(pub i32);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A job posting as stored in the `jobs` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobRecord {
    pub id: JobId,
    pub title: String,
    pub company: String,
    /// Comma-joined location labels
    pub location: Option<String>,
    /// Only ever set by the admin API
    pub job_type: Option<String>,
    pub tags: Option<String>,
    /// Free text exactly as the site shows it
    pub date_posted: Option<String>,
    pub link: Option<String>,
    pub logo: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn key(&self) -> DedupKey {
        DedupKey::new(&self.title, &self.company)
    }
}

/// A posting extracted from a listing card, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJob {
    pub title: String,
    pub company: String,
    pub location: String,
    pub tags: String,
    pub date_posted: String,
    pub link: String,
    pub logo: String,
}

impl NewJob {
    pub fn key(&self) -> DedupKey {
        DedupKey::new(&self.title, &self.company)
    }
}

/// Natural identity of a posting: `(title, company)`, compared exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DedupKey {
    pub title: String,
    pub company: String,
}

impl DedupKey {
    pub fn new(title: impl Into<String>, company: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            company: company.into(),
        }
    }
}

impl std::fmt::Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}", self.title, self.company)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_case_sensitive() {
        assert_ne!(DedupKey::new("Actuary I", "Acme"), DedupKey::new("actuary i", "Acme"));
        assert_eq!(DedupKey::new("Actuary I", "Acme"), DedupKey::new("Actuary I", "Acme"));
    }

    #[test]
    fn test_key_display() {
        assert_eq!(DedupKey::new("Actuary I", "Acme").to_string(), "Actuary I at Acme");
    }
}
