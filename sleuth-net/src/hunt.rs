//! Sequential username hunter
//!
//! Walks a fixed list of sites one at a time: a HEAD request gates each site,
//! and only a 200 leads to a GET that goes through the full heuristic
//! (redirect traps, deny-list, stub pages). A fixed delay between sites keeps
//! the request rate low, and lower still over Tor.

use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use sleuth_core::{
    classify, FetchedPage, Heuristics, ProbeResult, Rejection, SiteDescriptor, SiteRegistry,
    Verdict,
};

use crate::{visible_text, NetError, RetryPolicy};

/// Characters of the GET body shown in debug output
const DEBUG_SNIPPET_LEN: usize = 200;

/// Sequential hunter configuration
#[derive(Debug, Clone)]
pub struct HuntConfig {
    /// Pause between sites
    pub delay: Duration,
    /// HEAD request timeout in seconds
    pub head_timeout_secs: u64,
    /// GET request timeout in seconds
    pub get_timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for HuntConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(300),
            head_timeout_secs: 12,
            get_timeout_secs: 15,
            retry: RetryPolicy::default(),
        }
    }
}

impl HuntConfig {
    /// Slow down when verbose or routed through Tor
    pub fn for_mode(verbose: bool, tor: bool) -> Self {
        let delay = if verbose || tor {
            Duration::from_millis(800)
        } else {
            Duration::from_millis(300)
        };
        Self {
            delay,
            ..Self::default()
        }
    }
}

/// Status and verdict for one profile URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    pub status: u16,
    pub verdict: Verdict,
}

/// Checks profile URLs one by one
pub struct Hunter {
    client: Client,
    config: HuntConfig,
}

impl Hunter {
    pub fn new(client: Client, config: HuntConfig) -> Self {
        Self { client, config }
    }

    /// HEAD-gate a profile URL, then GET and classify it
    pub async fn check_profile(
        &self,
        url: &str,
        deny_list: &[String],
    ) -> Result<Assessment, NetError> {
        let head_timeout = Duration::from_secs(self.config.head_timeout_secs);
        let head = self
            .config
            .retry
            .send(|| self.client.head(url).timeout(head_timeout))
            .await?;
        let head_status = head.status().as_u16();
        let final_url = head.url().as_str().trim_end_matches('/').to_string();

        debug!("HEAD → {} | Final: {}", head_status, final_url);

        if head_status != 200 {
            debug!("Rejected: Non-200");
            return Ok(Assessment {
                status: head_status,
                verdict: Verdict::Missing(Rejection::Status {
                    status: head_status,
                }),
            });
        }

        let get_timeout = Duration::from_secs(self.config.get_timeout_secs);
        let resp = self
            .config
            .retry
            .send(|| self.client.get(&final_url).timeout(get_timeout))
            .await?;
        let status = resp.status().as_u16();
        let landed = resp.url().to_string();
        let body = resp.text().await?;

        let snippet: String = body
            .chars()
            .take(DEBUG_SNIPPET_LEN)
            .collect::<String>()
            .replace('\n', " ");
        debug!(
            "GET → {} | Len: {} | Snippet: {}...",
            status,
            body.chars().count(),
            snippet.trim()
        );

        let page = FetchedPage {
            status,
            requested_url: url.to_string(),
            final_url: landed,
            text: visible_text(&body),
            body,
        };
        let verdict = classify(&page, deny_list, Heuristics::full());
        match &verdict {
            Verdict::Exists => debug!("PASSED → Valid profile"),
            Verdict::Missing(reason) => debug!("Rejected: {}", reason),
        }

        Ok(Assessment { status, verdict })
    }

    /// Check every site in order, reporting each result as soon as it is known
    pub async fn hunt<F>(
        &self,
        username: &str,
        registry: &SiteRegistry,
        mut on_result: F,
    ) -> Vec<ProbeResult>
    where
        F: FnMut(&ProbeResult),
    {
        let mut results = Vec::with_capacity(registry.len());

        for (idx, site) in registry.iter().enumerate() {
            if idx > 0 && !self.config.delay.is_zero() {
                tokio::time::sleep(self.config.delay).await;
            }

            let result = self.hunt_site(username, site).await;
            on_result(&result);
            results.push(result);
        }

        results
    }

    async fn hunt_site(&self, username: &str, site: &SiteDescriptor) -> ProbeResult {
        let url = site.profile_url(username);
        debug!("--- {} ---", site.name);

        match self.check_profile(&url, &site.not_found).await {
            Ok(assessment) => ProbeResult::answered(
                &site.name,
                &url,
                assessment.verdict.exists(),
                assessment.status,
            ),
            Err(e) => {
                debug!("Error: {}", e);
                ProbeResult::failed(&site.name, &url, e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build_client, ClientConfig};
    use sleuth_core::{SiteKind, DEFAULT_NOT_FOUND_PHRASES};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn hunter() -> Hunter {
        let client = build_client(&ClientConfig::default()).unwrap();
        Hunter::new(
            client,
            HuntConfig {
                delay: Duration::ZERO,
                retry: RetryPolicy {
                    backoff_factor: 0.0,
                    ..RetryPolicy::default()
                },
                ..HuntConfig::default()
            },
        )
    }

    fn deny_list() -> Vec<String> {
        DEFAULT_NOT_FOUND_PHRASES.iter().map(|s| s.to_string()).collect()
    }

    fn profile_page() -> String {
        format!(
            "<html><body><h1>Alice</h1><p>{}</p></body></html>",
            "Posts and photos shared by alice. ".repeat(20)
        )
    }

    #[test]
    fn test_delay_by_mode() {
        assert_eq!(HuntConfig::for_mode(false, false).delay, Duration::from_millis(300));
        assert_eq!(HuntConfig::for_mode(true, false).delay, Duration::from_millis(800));
        assert_eq!(HuntConfig::for_mode(false, true).delay, Duration::from_millis(800));
    }

    #[tokio::test]
    async fn test_head_gate_skips_get() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/ghost"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(profile_page()))
            .expect(0)
            .mount(&server)
            .await;

        let url = format!("{}/ghost", server.uri());
        let assessment = hunter().check_profile(&url, &deny_list()).await.unwrap();
        assert_eq!(assessment.status, 404);
        assert!(!assessment.verdict.exists());
    }

    #[tokio::test]
    async fn test_full_profile_passes() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/alice"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/alice"))
            .respond_with(ResponseTemplate::new(200).set_body_string(profile_page()))
            .mount(&server)
            .await;

        let url = format!("{}/alice", server.uri());
        let assessment = hunter().check_profile(&url, &deny_list()).await.unwrap();
        assert_eq!(assessment.verdict, Verdict::Exists);
    }

    #[tokio::test]
    async fn test_redirect_to_login_is_trap() {
        let server = MockServer::start().await;
        let login = format!("{}/login", server.uri());
        Mock::given(path("/alice"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", login.as_str()))
            .mount(&server)
            .await;
        Mock::given(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string(profile_page()))
            .mount(&server)
            .await;

        let url = format!("{}/alice", server.uri());
        let assessment = hunter().check_profile(&url, &deny_list()).await.unwrap();
        assert!(matches!(
            assessment.verdict,
            Verdict::Missing(Rejection::RedirectTrap { .. })
        ));
    }

    #[tokio::test]
    async fn test_stub_page_rejected() {
        let server = MockServer::start().await;
        Mock::given(path("/alice"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>Welcome</p>"))
            .mount(&server)
            .await;

        let url = format!("{}/alice", server.uri());
        let assessment = hunter().check_profile(&url, &deny_list()).await.unwrap();
        assert!(matches!(
            assessment.verdict,
            Verdict::Missing(Rejection::StubPage { .. })
        ));
    }

    #[tokio::test]
    async fn test_hunt_reports_in_order() {
        let server = MockServer::start().await;
        Mock::given(path("/a/alice"))
            .respond_with(ResponseTemplate::new(200).set_body_string(profile_page()))
            .mount(&server)
            .await;
        Mock::given(path("/b/alice"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Sorry, this page isn't available."))
            .mount(&server)
            .await;

        let sites = ["a", "b", "c"]
            .iter()
            .map(|name| {
                SiteDescriptor::new(name, &format!("{}/{}/{{username}}", server.uri(), name))
                    .with_not_found(DEFAULT_NOT_FOUND_PHRASES)
            })
            .collect();
        let registry = SiteRegistry::new(SiteKind::Username, sites).unwrap();

        let mut seen = Vec::new();
        let results = hunter()
            .hunt("alice", &registry, |r| seen.push(r.site.clone()))
            .await;

        assert_eq!(seen, ["a", "b", "c"]);
        let verdicts: Vec<_> = results.iter().map(|r| r.exists).collect();
        assert_eq!(verdicts, [true, false, false]);
        assert_eq!(results[2].status, Some(404));
    }
}
