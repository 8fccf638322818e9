//! Concurrent existence prober
//!
//! Fans out one probe per configured site, bounded by a maximum number of
//! requests in flight. Each probe owns its result; one probe failing never
//! affects another. The batch as a whole is capped by a single deadline, and
//! probes still pending when it passes are reported as timed out.

use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use sleuth_core::{
    classify, classify_registration, text_snippet, FetchedPage, Heuristics, HttpMethod,
    OsintReport, ProbeResult, Reputation, ReputationOutcome, RequestBody, SiteDescriptor,
    SiteRegistry, TargetKind, EMAIL_PLACEHOLDER,
};

use crate::{header_map, visible_text, NetError};

/// Default reputation lookup endpoint
pub const DEFAULT_REPUTATION_URL: &str = "https://emailrep.io/{email}";

/// Concurrent prober configuration
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Maximum probes in flight
    pub max_concurrent: usize,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Wall-clock cap on the whole batch in seconds
    pub batch_timeout_secs: u64,
    /// Reputation endpoint with `{email}` placeholder
    pub reputation_url: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 30,
            request_timeout_secs: 15,
            batch_timeout_secs: 40,
            reputation_url: DEFAULT_REPUTATION_URL.to_string(),
        }
    }
}

/// Runs username and email probes against site registries
pub struct Prober {
    client: Client,
    config: ProbeConfig,
}

impl Prober {
    pub fn new(client: Client, config: ProbeConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Investigate a target, choosing username or email probes by its shape
    pub async fn run(
        &self,
        target: &str,
        usernames: &SiteRegistry,
        emails: &SiteRegistry,
    ) -> OsintReport {
        match TargetKind::detect(target) {
            TargetKind::Username => {
                info!("Probing {} sites for username {}", usernames.len(), target);
                let results = self.probe_usernames(target, usernames).await;
                OsintReport::username(target, results)
            }
            TargetKind::Email => {
                info!("Probing {} sites for email {}", emails.len(), target);
                let (results, reputation) = tokio::join!(
                    self.probe_emails(target, emails),
                    self.email_reputation(target)
                );
                OsintReport::email(target, results, reputation)
            }
        }
    }

    fn deadline(&self) -> Instant {
        Instant::now() + Duration::from_secs(self.config.batch_timeout_secs)
    }

    /// Probe every username site; one result per site, in completion order
    pub async fn probe_usernames(&self, username: &str, registry: &SiteRegistry) -> Vec<ProbeResult> {
        let deadline = self.deadline();

        stream::iter(registry.iter())
            .map(|site| async move {
                let url = site.profile_url(username);
                let outcome = timeout_at(deadline, self.check_username_site(site, &url)).await;
                self.settle(site, &url, outcome)
            })
            .buffer_unordered(self.config.max_concurrent.max(1))
            .collect()
            .await
    }

    /// Probe every email site; one result per site, in completion order
    pub async fn probe_emails(&self, email: &str, registry: &SiteRegistry) -> Vec<ProbeResult> {
        let deadline = self.deadline();

        stream::iter(registry.iter())
            .map(|site| async move {
                let url = site.email_url(email);
                let outcome = timeout_at(deadline, self.check_email_site(site, &url, email)).await;
                self.settle(site, &url, outcome)
            })
            .buffer_unordered(self.config.max_concurrent.max(1))
            .collect()
            .await
    }

    fn settle(
        &self,
        site: &SiteDescriptor,
        url: &str,
        outcome: Result<Result<ProbeResult, NetError>, tokio::time::error::Elapsed>,
    ) -> ProbeResult {
        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!("{} probe failed: {}", site.name, e);
                ProbeResult::failed(&site.name, url, e)
            }
            Err(_) => {
                warn!("{} probe missed the batch deadline", site.name);
                ProbeResult::failed(
                    &site.name,
                    url,
                    NetError::Timeout(self.config.batch_timeout_secs),
                )
            }
        }
    }

    /// Fetch a profile page and classify it by status and deny-list
    pub async fn check_username_site(
        &self,
        site: &SiteDescriptor,
        url: &str,
    ) -> Result<ProbeResult, NetError> {
        let resp = self
            .client
            .get(url)
            .headers(site_headers(site)?)
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            debug!("{} returned status {}", site.name, status);
            return Ok(ProbeResult::answered(&site.name, url, false, status));
        }

        let final_url = resp.url().to_string();
        let body = resp.text().await?;
        let page = FetchedPage {
            status,
            requested_url: url.to_string(),
            final_url,
            text: visible_text(&body),
            body,
        };

        let verdict = classify(&page, &site.not_found, Heuristics::deny_list_only());
        debug!("{} verdict: {:?}", site.name, verdict);
        Ok(ProbeResult::answered(&site.name, url, verdict.exists(), status))
    }

    /// Send a registration check and classify the reply
    pub async fn check_email_site(
        &self,
        site: &SiteDescriptor,
        url: &str,
        email: &str,
    ) -> Result<ProbeResult, NetError> {
        let mut request = match site.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
        }
        .headers(site_headers(site)?)
        .timeout(Duration::from_secs(self.config.request_timeout_secs));

        let body = site.body.as_ref().map(|b| b.render(email));
        request = match &body {
            Some(RequestBody::Form(fields)) => request.form(fields),
            Some(RequestBody::Json(fields)) => request.json(fields),
            None => request,
        };

        let resp = request.send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;

        let payload = serde_json::from_str::<Value>(&text)
            .ok()
            .filter(|v| !v.is_null());
        if payload.is_none() && body.as_ref().is_some_and(RequestBody::expects_json) {
            return Err(NetError::InvalidJson(format!(
                "{} answered with a non-JSON body",
                site.name
            )));
        }

        let haystack = match &payload {
            Some(json) => json.to_string(),
            None => visible_text(&text),
        };
        let exists = classify_registration(&haystack, &site.exists, &site.not_found);
        debug!("{} registration for {}: {}", site.name, email, exists);

        let snippet = payload.unwrap_or_else(|| Value::String(text_snippet(&text)));
        Ok(ProbeResult::answered(&site.name, url, exists, status).with_snippet(snippet))
    }

    /// Look up the email's reputation; failures become an error object
    pub async fn email_reputation(&self, email: &str) -> ReputationOutcome {
        let url = self.config.reputation_url.replace(EMAIL_PLACEHOLDER, email);

        match timeout_at(self.deadline(), self.fetch_reputation(&url)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!("Reputation lookup failed: {}", e);
                ReputationOutcome::failed(e)
            }
            Err(_) => ReputationOutcome::failed(NetError::Timeout(self.config.batch_timeout_secs)),
        }
    }

    async fn fetch_reputation(&self, url: &str) -> Result<ReputationOutcome, NetError> {
        let resp = self
            .client
            .get(url)
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            return Ok(ReputationOutcome::failed(format!("Status {}", status)));
        }

        let payload: Value = resp.json().await?;
        Ok(ReputationOutcome::Report(Reputation::from_payload(&payload)))
    }
}

fn site_headers(site: &SiteDescriptor) -> Result<reqwest::header::HeaderMap, NetError> {
    header_map(site.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build_client, ClientConfig};
    use serde_json::json;
    use sleuth_core::{SiteKind, DEFAULT_NOT_FOUND_PHRASES};
    use wiremock::matchers::{body_json, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NONE: &[&str] = &[];

    fn prober(server: &MockServer) -> Prober {
        let client = build_client(&ClientConfig::default()).unwrap();
        Prober::new(
            client,
            ProbeConfig {
                reputation_url: format!("{}/rep/{{email}}", server.uri()),
                ..ProbeConfig::default()
            },
        )
    }

    fn username_registry(server: &MockServer, sites: &[(&str, &[&str])]) -> SiteRegistry {
        let sites = sites
            .iter()
            .map(|(name, deny)| {
                SiteDescriptor::new(
                    name,
                    &format!("{}/{}/{{username}}", server.uri(), name.to_lowercase()),
                )
                .with_not_found(deny)
            })
            .collect();
        SiteRegistry::new(SiteKind::Username, sites).unwrap()
    }

    #[tokio::test]
    async fn test_username_probe_classifies_each_site() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alpha/alice"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>Alice</p>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/beta/alice"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Page not found</h1>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gamma/alice"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Alice's Profile"))
            .mount(&server)
            .await;

        let registry = username_registry(
            &server,
            &[
                ("Alpha", NONE),
                ("Beta", DEFAULT_NOT_FOUND_PHRASES),
                ("Gamma", NONE),
            ],
        );
        let report = prober(&server).run("alice", &registry, &registry).await;

        let found: Vec<_> = report.found().iter().map(|r| r.site.as_str()).collect();
        let missing: Vec<_> = report.not_found().iter().map(|r| r.site.as_str()).collect();
        assert_eq!(found, ["Alpha"]);
        assert_eq!(missing, ["Beta", "Gamma"]);
        assert_eq!(report.not_found()[1].status, Some(404));
    }

    #[tokio::test]
    async fn test_unreachable_site_becomes_error_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alpha/alice"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Alice's Profile"))
            .mount(&server)
            .await;

        let sites = vec![
            SiteDescriptor::new("Alpha", &format!("{}/alpha/{{username}}", server.uri())),
            SiteDescriptor::new("Dead", "http://127.0.0.1:1/{username}"),
        ];
        let registry = SiteRegistry::new(SiteKind::Username, sites).unwrap();
        let results = prober(&server).probe_usernames("alice", &registry).await;

        assert_eq!(results.len(), 2);
        let dead = results.iter().find(|r| r.site == "Dead").unwrap();
        assert!(!dead.exists);
        assert!(dead.error.is_some());
        assert!(results.iter().any(|r| r.site == "Alpha" && r.exists));
    }

    #[tokio::test]
    async fn test_batch_deadline_fails_slow_probes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("Alice's Profile")
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = build_client(&ClientConfig::default()).unwrap();
        let prober = Prober::new(
            client,
            ProbeConfig {
                batch_timeout_secs: 1,
                ..ProbeConfig::default()
            },
        );
        let registry = username_registry(&server, &[("Slow", NONE)]);
        let results = prober.probe_usernames("alice", &registry).await;

        assert_eq!(results.len(), 1);
        assert!(!results[0].exists);
        assert_eq!(results[0].error.as_deref(), Some("Timeout after 1 seconds"));
    }

    #[tokio::test]
    async fn test_email_form_probe() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/reset"))
            .and(body_string_contains("account_identifier=bob%40example.com"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<p>We'll send you an email</p>"),
            )
            .mount(&server)
            .await;

        let site = SiteDescriptor::new("Form", &format!("{}/reset", server.uri()))
            .post_form(&[("account_identifier", "{email}")])
            .with_exists(&["We'll send you an email"])
            .with_not_found(&["We couldn't find your account"]);
        let url = site.email_url("bob@example.com");

        let result = prober(&server)
            .check_email_site(&site, &url, "bob@example.com")
            .await
            .unwrap();
        assert!(result.exists);
        assert_eq!(result.status, Some(200));
        assert_eq!(
            result.snippet,
            Some(json!("<p>We'll send you an email</p>"))
        );
    }

    #[tokio::test]
    async fn test_email_json_probe_not_exists_wins() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/json-reset"))
            .and(body_json(json!({"email": "bob@example.com"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"sent": true, "found": false})),
            )
            .mount(&server)
            .await;

        let site = SiteDescriptor::new("Json", &format!("{}/json-reset", server.uri()))
            .post_json(&[("email", "{email}")])
            .with_exists(&["true"])
            .with_not_found(&["false"]);
        let url = site.email_url("bob@example.com");

        let result = prober(&server)
            .check_email_site(&site, &url, "bob@example.com")
            .await
            .unwrap();
        assert!(!result.exists);
        assert_eq!(result.snippet, Some(json!({"sent": true, "found": false})));
    }

    #[tokio::test]
    async fn test_email_json_probe_rejects_html() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>blocked</html>"))
            .mount(&server)
            .await;

        let site = SiteDescriptor::new("Json", &format!("{}/json-reset", server.uri()))
            .post_json(&[("email", "{email}")]);
        let url = site.email_url("bob@example.com");

        let err = prober(&server)
            .check_email_site(&site, &url, "bob@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, NetError::InvalidJson(_)));
    }

    #[tokio::test]
    async fn test_reputation_passthrough() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rep/bob@example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "reputation": "medium",
                "suspicious": true,
                "references": 3,
                "details": {"profiles": ["github"], "data_breach": true}
            })))
            .mount(&server)
            .await;

        let outcome = prober(&server).email_reputation("bob@example.com").await;
        let ReputationOutcome::Report(rep) = outcome else {
            panic!("expected a reputation report, got {:?}", outcome);
        };
        assert_eq!(rep.reputation, json!("medium"));
        assert_eq!(rep.suspicious, json!(true));
        assert_eq!(rep.known_profiles, json!(["github"]));
        assert_eq!(rep.credentials_leaked, Value::Null);
    }

    #[tokio::test]
    async fn test_reputation_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let outcome = prober(&server).email_reputation("bob@example.com").await;
        assert_eq!(outcome, ReputationOutcome::failed("Status 429"));
    }
}
