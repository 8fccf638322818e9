//! Site descriptor registry
//!
//! Declarative list of platforms probed for a username or email, with their
//! URL templates and response indicators. Lists are validated once when a
//! [`SiteRegistry`] is built and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;

/// Placeholder substituted with the target username
pub const USERNAME_PLACEHOLDER: &str = "{username}";

/// Placeholder substituted with the target email
pub const EMAIL_PLACEHOLDER: &str = "{email}";

/// Phrases that mark a profile page as "not found" on most platforms
pub const DEFAULT_NOT_FOUND_PHRASES: &[&str] = &[
    "not found",
    "doesn't exist",
    "page isn't available",
    "sorry, this page",
    "this content isn't available",
    "user not found",
    "profile not found",
    "account doesn't exist",
    "oops",
    "error",
    "unavailable",
    "404",
    "gone",
    "no results",
    "invalid username",
    "this channel does not exist",
    "unless you’ve got a time machine",
    "sorry. unless",
    "page not found",
];

/// Errors from site configuration
#[derive(Debug, Error)]
pub enum SiteError {
    #[error("site name must not be empty")]
    EmptyName,

    #[error("duplicate site name: {0}")]
    DuplicateName(String),

    #[error("invalid template for {site}: {reason}")]
    InvalidTemplate { site: String, reason: String },

    #[error("invalid header {header:?} for {site}")]
    InvalidHeader { site: String, header: String },

    #[error("failed to read site file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse site file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// What kind of target a site list probes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteKind {
    Username,
    Email,
}

impl SiteKind {
    fn placeholder(self) -> &'static str {
        match self {
            SiteKind::Username => USERNAME_PLACEHOLDER,
            SiteKind::Email => EMAIL_PLACEHOLDER,
        }
    }
}

/// HTTP method used for a probe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// Request body template; values may contain `{email}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestBody {
    /// `application/x-www-form-urlencoded` fields
    Form(BTreeMap<String, String>),
    /// JSON object fields; a JSON response is expected back
    Json(BTreeMap<String, String>),
}

impl RequestBody {
    fn fields(&self) -> &BTreeMap<String, String> {
        match self {
            RequestBody::Form(fields) | RequestBody::Json(fields) => fields,
        }
    }

    /// Substitute the target into every field value
    pub fn render(&self, target: &str) -> RequestBody {
        let render = |fields: &BTreeMap<String, String>| {
            fields
                .iter()
                .map(|(k, v)| (k.clone(), v.replace(EMAIL_PLACEHOLDER, target)))
                .collect()
        };
        match self {
            RequestBody::Form(fields) => RequestBody::Form(render(fields)),
            RequestBody::Json(fields) => RequestBody::Json(render(fields)),
        }
    }

    pub fn expects_json(&self) -> bool {
        matches!(self, RequestBody::Json(_))
    }
}

/// A platform probed for account existence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteDescriptor {
    /// Human-readable name
    pub name: String,
    /// URL template with `{username}` or `{email}` placeholder
    pub url_template: String,
    /// Phrases indicating the account does not exist
    #[serde(default)]
    pub not_found: Vec<String>,
    /// Phrases indicating the account exists (email sites)
    #[serde(default)]
    pub exists: Vec<String>,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub body: Option<RequestBody>,
    /// Extra request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl SiteDescriptor {
    pub fn new(name: &str, url_template: &str) -> Self {
        Self {
            name: name.to_string(),
            url_template: url_template.to_string(),
            not_found: Vec::new(),
            exists: Vec::new(),
            method: HttpMethod::Get,
            body: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_not_found(mut self, phrases: &[&str]) -> Self {
        self.not_found = phrases.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_exists(mut self, phrases: &[&str]) -> Self {
        self.exists = phrases.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn post_form(mut self, fields: &[(&str, &str)]) -> Self {
        self.method = HttpMethod::Post;
        self.body = Some(RequestBody::Form(to_map(fields)));
        self
    }

    pub fn post_json(mut self, fields: &[(&str, &str)]) -> Self {
        self.method = HttpMethod::Post;
        self.body = Some(RequestBody::Json(to_map(fields)));
        self
    }

    /// Build the probe URL for a username target
    pub fn profile_url(&self, username: &str) -> String {
        self.url_template.replace(USERNAME_PLACEHOLDER, username)
    }

    /// Build the probe URL for an email target
    pub fn email_url(&self, email: &str) -> String {
        self.url_template.replace(EMAIL_PLACEHOLDER, email)
    }

    fn validate(&self, kind: SiteKind) -> Result<(), SiteError> {
        if self.name.trim().is_empty() {
            return Err(SiteError::EmptyName);
        }

        let invalid = |reason: &str| SiteError::InvalidTemplate {
            site: self.name.clone(),
            reason: reason.to_string(),
        };

        if !(self.url_template.starts_with("http://") || self.url_template.starts_with("https://")) {
            return Err(invalid("URL must start with http:// or https://"));
        }

        let placeholder = kind.placeholder();
        let in_body = self
            .body
            .as_ref()
            .is_some_and(|b| b.fields().values().any(|v| v.contains(placeholder)));
        if !self.url_template.contains(placeholder) && !in_body {
            return Err(invalid(&format!("no {} placeholder in URL or body", placeholder)));
        }

        if self.body.is_some() && self.method == HttpMethod::Get {
            return Err(invalid("GET requests cannot carry a body"));
        }

        if let Some((name, _)) = self
            .headers
            .iter()
            .find(|(name, value)| !is_header_name(name) || !is_header_value(value))
        {
            return Err(SiteError::InvalidHeader {
                site: self.name.clone(),
                header: name.clone(),
            });
        }

        Ok(())
    }
}

/// RFC 9110 token characters
fn is_header_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

/// Visible ASCII, spaces and tabs; no line breaks
fn is_header_value(value: &str) -> bool {
    value
        .bytes()
        .all(|b| b == b'\t' || (0x20..0x7f).contains(&b) || b >= 0x80)
}

fn to_map(fields: &[(&str, &str)]) -> BTreeMap<String, String> {
    fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// A validated, immutable list of sites of one kind
#[derive(Debug, Clone)]
pub struct SiteRegistry {
    kind: SiteKind,
    sites: Vec<SiteDescriptor>,
}

impl SiteRegistry {
    pub fn new(kind: SiteKind, sites: Vec<SiteDescriptor>) -> Result<Self, SiteError> {
        let mut seen = HashSet::new();
        for site in &sites {
            site.validate(kind)?;
            if !seen.insert(site.name.to_lowercase()) {
                return Err(SiteError::DuplicateName(site.name.clone()));
            }
        }
        Ok(Self { kind, sites })
    }

    pub fn kind(&self) -> SiteKind {
        self.kind
    }

    pub fn sites(&self) -> &[SiteDescriptor] {
        &self.sites
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SiteDescriptor> {
        self.sites.iter()
    }
}

/// Site lists loaded from a TOML file
///
/// ```toml
/// [[username]]
/// name = "GitHub"
/// url_template = "https://github.com/{username}"
/// not_found = ["Not Found"]
///
/// [[email]]
/// name = "Spotify"
/// url_template = "https://www.spotify.com/api/account/v1/password-reset/initiate"
/// method = "POST"
/// body = { json = { email = "{email}" } }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SiteFile {
    #[serde(default)]
    pub username: Vec<SiteDescriptor>,
    #[serde(default)]
    pub email: Vec<SiteDescriptor>,
}

impl SiteFile {
    pub fn parse(text: &str) -> Result<Self, SiteError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, SiteError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Build registries, falling back to the defaults for an empty section
    pub fn into_registries(self) -> Result<(SiteRegistry, SiteRegistry), SiteError> {
        let username = if self.username.is_empty() {
            default_username_sites()
        } else {
            self.username
        };
        let email = if self.email.is_empty() {
            default_email_sites()
        } else {
            self.email
        };
        Ok((
            SiteRegistry::new(SiteKind::Username, username)?,
            SiteRegistry::new(SiteKind::Email, email)?,
        ))
    }
}

/// Username sites for the concurrent prober
pub fn default_username_sites() -> Vec<SiteDescriptor> {
    vec![
        SiteDescriptor::new("GitHub", "https://github.com/{username}")
            .with_not_found(&["Not Found", "404"]),
        SiteDescriptor::new("Twitter/X", "https://x.com/{username}")
            .with_not_found(&["This account doesn’t exist", "Something went wrong"]),
        SiteDescriptor::new("Reddit", "https://www.reddit.com/user/{username}").with_not_found(&[
            "page not found",
            "sorry, nobody on Reddit goes by that name",
        ]),
        SiteDescriptor::new("Instagram", "https://www.instagram.com/{username}/").with_not_found(&[
            "Sorry, this page isn't available",
            "The link you followed may be broken",
        ]),
        SiteDescriptor::new("LinkedIn", "https://www.linkedin.com/in/{username}")
            .with_not_found(&["Page not found", "profile not found"]),
        SiteDescriptor::new("YouTube", "https://www.youtube.com/@{username}")
            .with_not_found(&["404 Not Found", "This channel does not exist"]),
    ]
}

/// Email registration sites (password-reset style checks)
pub fn default_email_sites() -> Vec<SiteDescriptor> {
    vec![
        SiteDescriptor::new("Twitter/X", "https://x.com/account/begin_password_reset")
            .post_form(&[("account_identifier", EMAIL_PLACEHOLDER)])
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_exists(&["We'll send you an email"])
            .with_not_found(&["We couldn't find your account"]),
        SiteDescriptor::new("Instagram", "https://www.instagram.com/accounts/password/reset/")
            .post_form(&[("enc_password", ""), ("email_or_username", EMAIL_PLACEHOLDER)])
            .with_exists(&["we'll send you an email"])
            .with_not_found(&["Can't find this account"]),
        SiteDescriptor::new(
            "Spotify",
            "https://www.spotify.com/api/account/v1/password-reset/initiate",
        )
        .post_json(&[("email", EMAIL_PLACEHOLDER)])
        .with_exists(&["true"])
        .with_not_found(&["false"]),
    ]
}

/// Sites walked by the sequential prober, all sharing the default deny-list
pub fn default_hunt_sites() -> Vec<SiteDescriptor> {
    const HUNT_SITES: &[(&str, &str)] = &[
        ("Twitter/X", "https://x.com/{username}"),
        ("Instagram", "https://www.instagram.com/{username}/"),
        ("GitHub", "https://github.com/{username}"),
        ("TikTok", "https://www.tiktok.com/@{username}"),
        ("Reddit", "https://www.reddit.com/user/{username}/"),
        ("YouTube", "https://www.youtube.com/@{username}"),
        ("Facebook", "https://www.facebook.com/{username}"),
        ("LinkedIn", "https://www.linkedin.com/in/{username}"),
        ("Pinterest", "https://www.pinterest.com/{username}/"),
        ("Snapchat", "https://www.snapchat.com/add/{username}"),
        ("Twitch", "https://www.twitch.tv/{username}"),
        ("Threads", "https://www.threads.net/@{username}"),
        ("Bluesky", "https://bsky.app/profile/{username}.bsky.social"),
    ];

    HUNT_SITES
        .iter()
        .map(|(name, template)| {
            SiteDescriptor::new(name, template).with_not_found(DEFAULT_NOT_FOUND_PHRASES)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_url() {
        let sites = default_username_sites();
        assert_eq!(sites[0].profile_url("alice"), "https://github.com/alice");
        assert_eq!(sites[5].profile_url("alice"), "https://www.youtube.com/@alice");
    }

    #[test]
    fn test_default_registries_validate() {
        let username = SiteRegistry::new(SiteKind::Username, default_username_sites()).unwrap();
        assert_eq!(username.len(), 6);

        let email = SiteRegistry::new(SiteKind::Email, default_email_sites()).unwrap();
        assert_eq!(email.len(), 3);

        let hunt = SiteRegistry::new(SiteKind::Username, default_hunt_sites()).unwrap();
        assert_eq!(hunt.len(), 13);
        assert!(hunt.iter().all(|s| s.not_found.len() == DEFAULT_NOT_FOUND_PHRASES.len()));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let sites = vec![
            SiteDescriptor::new("GitHub", "https://github.com/{username}"),
            SiteDescriptor::new("github", "https://github.com/{username}/"),
        ];
        let err = SiteRegistry::new(SiteKind::Username, sites).unwrap_err();
        assert!(matches!(err, SiteError::DuplicateName(_)));
    }

    #[test]
    fn test_missing_placeholder_rejected() {
        let sites = vec![SiteDescriptor::new("Static", "https://example.com/profile")];
        let err = SiteRegistry::new(SiteKind::Username, sites).unwrap_err();
        assert!(matches!(err, SiteError::InvalidTemplate { .. }));
    }

    #[test]
    fn test_bad_headers_rejected_at_load() {
        let bad_name = vec![SiteDescriptor::new("Spaced", "https://example.com/{username}")
            .with_header("X Bad Name", "1")];
        let err = SiteRegistry::new(SiteKind::Username, bad_name).unwrap_err();
        assert!(matches!(err, SiteError::InvalidHeader { ref header, .. } if header == "X Bad Name"));

        let bad_value = vec![SiteDescriptor::new("Split", "https://example.com/{username}")
            .with_header("X-Token", "a\r\nInjected: yes")];
        assert!(matches!(
            SiteRegistry::new(SiteKind::Username, bad_value),
            Err(SiteError::InvalidHeader { .. })
        ));

        let good = vec![SiteDescriptor::new("Ok", "https://example.com/{username}")
            .with_header("X-Requested-With", "XMLHttpRequest")];
        assert!(SiteRegistry::new(SiteKind::Username, good).is_ok());
    }

    #[test]
    fn test_email_placeholder_in_body_is_enough() {
        let sites = vec![SiteDescriptor::new("Reset", "https://example.com/reset")
            .post_form(&[("email", EMAIL_PLACEHOLDER)])];
        assert!(SiteRegistry::new(SiteKind::Email, sites).is_ok());
    }

    #[test]
    fn test_render_body() {
        let body = RequestBody::Json(to_map(&[("email", "{email}"), ("flag", "1")]));
        let rendered = body.render("bob@example.com");
        assert_eq!(
            rendered.fields().get("email").map(String::as_str),
            Some("bob@example.com")
        );
        assert_eq!(rendered.fields().get("flag").map(String::as_str), Some("1"));
        assert!(rendered.expects_json());
    }

    #[test]
    fn test_site_file_parse() {
        let text = r#"
            [[username]]
            name = "Example"
            url_template = "https://example.com/u/{username}"
            not_found = ["no such user"]

            [[email]]
            name = "Reset"
            url_template = "https://example.com/reset"
            method = "POST"
            body = { json = { email = "{email}" } }
            exists = ["sent"]
        "#;

        let file = SiteFile::parse(text).unwrap();
        assert_eq!(file.username.len(), 1);
        assert_eq!(file.email[0].method, HttpMethod::Post);
        assert!(matches!(file.email[0].body, Some(RequestBody::Json(_))));

        let (username, email) = file.into_registries().unwrap();
        assert_eq!(username.len(), 1);
        assert_eq!(email.len(), 1);
    }

    #[test]
    fn test_site_file_empty_sections_use_defaults() {
        let (username, email) = SiteFile::default().into_registries().unwrap();
        assert_eq!(username.len(), default_username_sites().len());
        assert_eq!(email.len(), default_email_sites().len());
    }

    #[test]
    fn test_site_file_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sites.toml");
        std::fs::write(
            &path,
            "[[username]]\nname = \"A\"\nurl_template = \"https://a.example/{username}\"\n",
        )
        .unwrap();

        let file = SiteFile::load(&path).unwrap();
        assert_eq!(file.username[0].name, "A");
        assert!(SiteFile::load(&dir.path().join("missing.toml")).is_err());
    }
}
