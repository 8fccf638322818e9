//! Existence classification heuristics
//!
//! Turns a fetched page into a best-effort "does this account exist" verdict.
//! The rules are approximate: they catch the common soft-404 patterns
//! (redirects to login pages, "not found" copy, near-empty stub pages) and
//! nothing more.

use serde::Serialize;

/// URL fragments that mark a redirect to a generic landing page
pub const TRAP_SEGMENTS: &[&str] = &["login", "search", "error", "notfound", "signup"];

/// Bodies shorter than this are treated as stubs unless they mention a profile
pub const STUB_MIN_LEN: usize = 500;

/// Word that rescues a short body from the stub rule
const PROFILE_MARKER: &str = "profile";

/// A fetched page, reduced to what the heuristics look at
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// HTTP status of the final response
    pub status: u16,
    /// URL that was requested
    pub requested_url: String,
    /// URL after following redirects
    pub final_url: String,
    /// Raw response body
    pub body: String,
    /// Visible text extracted from the body
    pub text: String,
}

/// Which rules a caller applies on top of the status check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heuristics {
    pub redirect_traps: bool,
    pub deny_list: bool,
    pub stub_pages: bool,
}

impl Heuristics {
    /// Every rule, used by the sequential prober
    pub const fn full() -> Self {
        Self {
            redirect_traps: true,
            deny_list: true,
            stub_pages: true,
        }
    }

    /// Status and deny-list only, used by the concurrent prober
    pub const fn deny_list_only() -> Self {
        Self {
            redirect_traps: false,
            deny_list: true,
            stub_pages: false,
        }
    }
}

/// Why a page was judged not to belong to an existing account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Rejection {
    Status { status: u16 },
    RedirectTrap { final_url: String },
    DenyListed { phrase: String },
    StubPage { length: usize },
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Status { status } => write!(f, "non-200 status {}", status),
            Rejection::RedirectTrap { final_url } => write!(f, "redirect trap -> {}", final_url),
            Rejection::DenyListed { phrase } => write!(f, "not-found phrase '{}' detected", phrase),
            Rejection::StubPage { length } => {
                write!(f, "stub page ({} chars, no {})", length, PROFILE_MARKER)
            }
        }
    }
}

/// Outcome of classifying a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Exists,
    Missing(Rejection),
}

impl Verdict {
    pub fn exists(&self) -> bool {
        matches!(self, Verdict::Exists)
    }
}

/// Classify a fetched profile page
///
/// An empty deny-list means the site only reports existence through its
/// status code, so a 200 is accepted without looking any further.
pub fn classify(page: &FetchedPage, deny_list: &[String], heuristics: Heuristics) -> Verdict {
    if page.status != 200 {
        return Verdict::Missing(Rejection::Status {
            status: page.status,
        });
    }

    if deny_list.is_empty() {
        return Verdict::Exists;
    }

    if heuristics.redirect_traps && is_redirect_trap(&page.requested_url, &page.final_url) {
        return Verdict::Missing(Rejection::RedirectTrap {
            final_url: page.final_url.clone(),
        });
    }

    if heuristics.deny_list {
        if let Some(phrase) = find_phrase(&page.text, deny_list) {
            return Verdict::Missing(Rejection::DenyListed {
                phrase: phrase.to_string(),
            });
        }
    }

    if heuristics.stub_pages {
        let length = page.body.chars().count();
        if length < STUB_MIN_LEN && !page.body.to_lowercase().contains(PROFILE_MARKER) {
            return Verdict::Missing(Rejection::StubPage { length });
        }
    }

    Verdict::Exists
}

/// Whether a redirect landed on a generic login/search/error page
pub fn is_redirect_trap(requested_url: &str, final_url: &str) -> bool {
    let requested = requested_url.trim_end_matches('/');
    let landed = final_url.trim_end_matches('/');
    if landed == requested {
        return false;
    }
    let landed = landed.to_lowercase();
    TRAP_SEGMENTS.iter().any(|segment| landed.contains(segment))
}

/// First phrase found in `haystack`, compared case-insensitively
pub fn find_phrase<'a>(haystack: &str, phrases: &'a [String]) -> Option<&'a str> {
    let haystack = haystack.to_lowercase();
    phrases
        .iter()
        .filter(|p| !p.is_empty())
        .find(|p| haystack.contains(&p.to_lowercase()))
        .map(String::as_str)
}

/// Decide email registration from a reset-endpoint response
///
/// Not-exists indicators win over exists indicators. With neither matching,
/// the account counts as registered only when the site configures no
/// positive indicator at all.
pub fn classify_registration(haystack: &str, exists: &[String], not_exists: &[String]) -> bool {
    if find_phrase(haystack, not_exists).is_some() {
        return false;
    }
    if find_phrase(haystack, exists).is_some() {
        return true;
    }
    exists.iter().all(|p| p.is_empty())
}
