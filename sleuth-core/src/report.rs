//! Probe results and the aggregate report
//!
//! A [`ProbeResult`] is produced once per site and never changed; the
//! [`OsintReport`] partitions them into found/not-found lists sorted by site
//! name and is what gets printed and saved.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::LazyLock;

/// Characters kept from a non-JSON response body
pub const SNIPPET_LEN: usize = 200;

static EMAIL_TARGET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@]+@[^@]+\.[^@]+$").unwrap());

/// Kind of target being investigated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Username,
    Email,
}

impl TargetKind {
    /// Detect whether a target looks like an email address
    pub fn detect(target: &str) -> Self {
        if EMAIL_TARGET_REGEX.is_match(target) {
            TargetKind::Email
        } else {
            TargetKind::Username
        }
    }
}

/// Outcome of probing a single site
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub site: String,
    pub url: String,
    pub exists: bool,
    #[serde(rename = "status_code", skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "response_snippet", skip_serializing_if = "Option::is_none")]
    pub snippet: Option<Value>,
}

impl ProbeResult {
    pub fn answered(site: &str, url: &str, exists: bool, status: u16) -> Self {
        Self {
            site: site.to_string(),
            url: url.to_string(),
            exists,
            status: Some(status),
            error: None,
            snippet: None,
        }
    }

    /// A probe that could not be completed; never counts as found
    pub fn failed(site: &str, url: &str, error: impl ToString) -> Self {
        Self {
            site: site.to_string(),
            url: url.to_string(),
            exists: false,
            status: None,
            error: Some(error.to_string()),
            snippet: None,
        }
    }

    pub fn with_snippet(mut self, snippet: Value) -> Self {
        self.snippet = Some(snippet);
        self
    }
}

/// First [`SNIPPET_LEN`] characters of a body
pub fn text_snippet(body: &str) -> String {
    body.chars().take(SNIPPET_LEN).collect()
}

/// Email reputation fields, passed through as the lookup service sent them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reputation {
    pub reputation: Value,
    pub suspicious: Value,
    pub references: Value,
    pub known_profiles: Value,
    pub blacklisted: Value,
    pub data_breach: Value,
    pub credentials_leaked: Value,
    pub summary: Value,
}

impl Reputation {
    /// Pick the reported fields out of an emailrep.io style payload
    pub fn from_payload(payload: &Value) -> Self {
        let field = |name: &str| payload.get(name).cloned().unwrap_or(Value::Null);
        let detail = |name: &str| {
            payload
                .get("details")
                .and_then(|d| d.get(name))
                .cloned()
                .unwrap_or(Value::Null)
        };

        let known_profiles = match detail("profiles") {
            Value::Null => Value::Array(Vec::new()),
            profiles => profiles,
        };
        let summary = match field("summary") {
            Value::Null => Value::String(String::new()),
            summary => summary,
        };

        Self {
            reputation: field("reputation"),
            suspicious: field("suspicious"),
            references: field("references"),
            known_profiles,
            blacklisted: detail("blacklisted"),
            data_breach: detail("data_breach"),
            credentials_leaked: detail("credentials_leaked"),
            summary,
        }
    }
}

/// Result of the reputation lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReputationOutcome {
    Report(Reputation),
    Failed { error: String },
}

impl ReputationOutcome {
    pub fn failed(error: impl ToString) -> Self {
        ReputationOutcome::Failed {
            error: error.to_string(),
        }
    }
}

/// Per-kind findings of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Findings {
    Username {
        username_profiles_found: Vec<ProbeResult>,
        username_profiles_not_found: Vec<ProbeResult>,
    },
    Email {
        email_registration: Vec<ProbeResult>,
        email_not_registered: Vec<ProbeResult>,
        email_reputation: ReputationOutcome,
    },
}

/// Aggregate report for one target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OsintReport {
    pub target: String,
    #[serde(rename = "type")]
    pub kind: TargetKind,
    pub generated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub findings: Findings,
}

impl OsintReport {
    pub fn username(target: &str, results: Vec<ProbeResult>) -> Self {
        let (found, not_found) = partition_sorted(results);
        Self {
            target: target.to_string(),
            kind: TargetKind::Username,
            generated_at: Utc::now(),
            findings: Findings::Username {
                username_profiles_found: found,
                username_profiles_not_found: not_found,
            },
        }
    }

    pub fn email(target: &str, results: Vec<ProbeResult>, reputation: ReputationOutcome) -> Self {
        let (registered, not_registered) = partition_sorted(results);
        Self {
            target: target.to_string(),
            kind: TargetKind::Email,
            generated_at: Utc::now(),
            findings: Findings::Email {
                email_registration: registered,
                email_not_registered: not_registered,
                email_reputation: reputation,
            },
        }
    }

    /// Results whose account was found/registered
    pub fn found(&self) -> &[ProbeResult] {
        match &self.findings {
            Findings::Username {
                username_profiles_found,
                ..
            } => username_profiles_found,
            Findings::Email {
                email_registration, ..
            } => email_registration,
        }
    }

    pub fn not_found(&self) -> &[ProbeResult] {
        match &self.findings {
            Findings::Username {
                username_profiles_not_found,
                ..
            } => username_profiles_not_found,
            Findings::Email {
                email_not_registered,
                ..
            } => email_not_registered,
        }
    }

    /// Output filename for this report
    pub fn filename(&self) -> String {
        report_filename(&self.target)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// `<target>_osint_report.json`, with `@` spelled out and path separators flattened
pub fn report_filename(target: &str) -> String {
    let stem = target.replace('@', "_at_").replace(['/', '\\'], "_");
    format!("{}_osint_report.json", stem)
}

fn partition_sorted(results: Vec<ProbeResult>) -> (Vec<ProbeResult>, Vec<ProbeResult>) {
    let (mut found, mut not_found): (Vec<_>, Vec<_>) =
        results.into_iter().partition(|r| r.exists);
    found.sort_by(|a, b| a.site.cmp(&b.site));
    not_found.sort_by(|a, b| a.site.cmp(&b.site));
    (found, not_found)
}
