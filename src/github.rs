use crate::error::FetchError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

const DIFF_MEDIA_TYPE: &str = "application/vnd.github.v3.diff";
const USER_AGENT: &str = "pr-review-server";

/// Source of unified diffs for pull requests.
#[async_trait]
pub trait DiffSource: Send + Sync {
    async fn fetch_pr_diff(
        &self,
        repo_url: &str,
        pr_number: u64,
        token: Option<&SecretString>,
    ) -> Result<String, FetchError>;
}

/// Reduces a repository URL to `(owner, repo)`.
///
/// Anything that does not parse as an absolute URL is treated as a bare path,
/// so `owner/repo` is accepted too. Segments past the second are ignored.
pub fn parse_repo_url(repo_url: &str) -> Result<(String, String), FetchError> {
    let invalid = || FetchError::InvalidRepoUrl(repo_url.to_string());

    let path = match Url::parse(repo_url) {
        Ok(url) => url.path().to_string(),
        Err(_) => repo_url.to_string(),
    };

    let mut segments = path.trim_matches('/').split('/');
    let owner = segments.next().ok_or_else(invalid)?;
    let repo = segments.next().ok_or_else(invalid)?;
    let repo = repo.strip_suffix(".git").unwrap_or(repo);

    if owner.is_empty() || repo.is_empty() {
        return Err(invalid());
    }

    Ok((owner.to_string(), repo.to_string()))
}

pub struct GitHubFetcher {
    client: Client,
    api_url: String,
    default_token: Option<SecretString>,
}

impl GitHubFetcher {
    pub fn new(
        api_url: impl Into<String>,
        default_token: Option<SecretString>,
        timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            default_token,
        })
    }

    fn diff_url(&self, owner: &str, repo: &str, pr_number: u64) -> String {
        format!("{}/repos/{}/{}/pulls/{}", self.api_url, owner, repo, pr_number)
    }
}

#[async_trait]
impl DiffSource for GitHubFetcher {
    async fn fetch_pr_diff(
        &self,
        repo_url: &str,
        pr_number: u64,
        token: Option<&SecretString>,
    ) -> Result<String, FetchError> {
        let (owner, repo) = parse_repo_url(repo_url).inspect_err(|e| {
            tracing::warn!("URL parsing failed: {}", e);
        })?;
        let repo_path = format!("{}/{}", owner, repo);
        let api_url = self.diff_url(&owner, &repo, pr_number);

        tracing::info!("Fetching diff from: {}", api_url);

        let mut request = self
            .client
            .get(&api_url)
            .header("Accept", DIFF_MEDIA_TYPE)
            .header("User-Agent", USER_AGENT);

        if let Some(token) = token.or(self.default_token.as_ref()) {
            request = request.header("Authorization", format!("token {}", token.expose_secret()));
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!("HTTP request to GitHub failed: {}", e);
            FetchError::Network(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return response.text().await.map_err(FetchError::Network);
        }

        match status {
            StatusCode::NOT_FOUND => Err(FetchError::PullRequestNotFound {
                repo: repo_path,
                pr_number,
            }),
            StatusCode::FORBIDDEN => {
                tracing::warn!("GitHub API rate limit exceeded or forbidden.");
                let body = response.text().await.unwrap_or_default();
                Err(FetchError::RateLimitedOrForbidden(upstream_message(&body)))
            }
            _ => Err(FetchError::UpstreamError {
                status: status.as_u16(),
                repo: repo_path,
            }),
        }
    }
}

fn upstream_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{web, App, HttpRequest, HttpResponse};

    #[test]
    fn test_parse_repo_url_https() {
        let result = parse_repo_url("https://github.com/acme/widget").unwrap();
        assert_eq!(result, ("acme".to_string(), "widget".to_string()));
    }

    #[test]
    fn test_parse_repo_url_with_git_suffix() {
        let result = parse_repo_url("https://github.com/junhoyeo/tokscale.git").unwrap();
        assert_eq!(result, ("junhoyeo".to_string(), "tokscale".to_string()));
    }

    #[test]
    fn test_parse_repo_url_ignores_trailing_path() {
        let result = parse_repo_url("https://github.com/junhoyeo/junho.io-v2/pull/7/").unwrap();
        assert_eq!(result, ("junhoyeo".to_string(), "junho.io-v2".to_string()));
    }

    #[test]
    fn test_parse_repo_url_bare_path() {
        let result = parse_repo_url("acme/widget").unwrap();
        assert_eq!(result, ("acme".to_string(), "widget".to_string()));
    }

    #[test]
    fn test_parse_repo_url_invalid() {
        for url in [
            "",
            "https://github.com",
            "https://github.com/",
            "https://github.com/acme",
            "https://github.com/acme/.git",
            "https://github.com//widget",
        ] {
            assert!(
                matches!(parse_repo_url(url), Err(FetchError::InvalidRepoUrl(_))),
                "expected {url:?} to be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_invalid_url_makes_no_request() {
        // Nothing listens on port 1; reaching the network would yield `Network`.
        let fetcher = GitHubFetcher::new("http://127.0.0.1:1", None, 5).unwrap();
        let result = fetcher.fetch_pr_diff("https://github.com/acme", 1, None).await;
        assert!(matches!(result, Err(FetchError::InvalidRepoUrl(_))));
    }

    async fn fake_pulls(req: HttpRequest, path: web::Path<(String, String, u64)>) -> HttpResponse {
        let (_owner, repo, number) = path.into_inner();
        let auth = req
            .headers()
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none")
            .to_string();
        let accept = req
            .headers()
            .get("Accept")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        match (repo.as_str(), number) {
            ("widget", 42) => HttpResponse::Ok().body(format!("auth={}\naccept={}\n", auth, accept)),
            ("widget", 7) => HttpResponse::Ok().body(""),
            ("locked", _) => HttpResponse::Forbidden()
                .json(serde_json::json!({"message": "API rate limit exceeded"})),
            ("broken", _) => HttpResponse::BadGateway().finish(),
            _ => HttpResponse::NotFound().json(serde_json::json!({"message": "Not Found"})),
        }
    }

    fn fake_github() -> actix_test::TestServer {
        actix_test::start(|| {
            App::new().route("/repos/{owner}/{repo}/pulls/{number}", web::get().to(fake_pulls))
        })
    }

    #[actix_rt::test]
    async fn test_fetch_diff_success_without_token() {
        let srv = fake_github();
        let fetcher = GitHubFetcher::new(format!("http://{}", srv.addr()), None, 5).unwrap();

        let diff = fetcher
            .fetch_pr_diff("https://github.com/acme/widget", 42, None)
            .await
            .unwrap();
        assert!(diff.contains("auth=none"));
        assert!(diff.contains("accept=application/vnd.github.v3.diff"));
    }

    #[actix_rt::test]
    async fn test_fetch_diff_token_precedence() {
        let srv = fake_github();
        let fetcher = GitHubFetcher::new(
            format!("http://{}/", srv.addr()),
            Some(SecretString::from("server-token".to_string())),
            5,
        )
        .unwrap();

        let diff = fetcher
            .fetch_pr_diff("https://github.com/acme/widget", 42, None)
            .await
            .unwrap();
        assert!(diff.contains("auth=token server-token"));

        let override_token = SecretString::from("caller-token".to_string());
        let diff = fetcher
            .fetch_pr_diff("https://github.com/acme/widget", 42, Some(&override_token))
            .await
            .unwrap();
        assert!(diff.contains("auth=token caller-token"));
    }

    #[actix_rt::test]
    async fn test_fetch_diff_empty_body() {
        let srv = fake_github();
        let fetcher = GitHubFetcher::new(format!("http://{}", srv.addr()), None, 5).unwrap();
        let diff = fetcher
            .fetch_pr_diff("https://github.com/acme/widget", 7, None)
            .await
            .unwrap();
        assert!(diff.is_empty());
    }

    #[actix_rt::test]
    async fn test_fetch_diff_status_mapping() {
        let srv = fake_github();
        let fetcher = GitHubFetcher::new(format!("http://{}", srv.addr()), None, 5).unwrap();

        let not_found = fetcher
            .fetch_pr_diff("https://github.com/acme/missing", 1, None)
            .await;
        assert!(matches!(
            not_found,
            Err(FetchError::PullRequestNotFound { ref repo, pr_number: 1 }) if repo == "acme/missing"
        ));

        let forbidden = fetcher
            .fetch_pr_diff("https://github.com/acme/locked", 1, None)
            .await;
        assert!(matches!(
            forbidden,
            Err(FetchError::RateLimitedOrForbidden(ref msg)) if msg == "API rate limit exceeded"
        ));

        let upstream = fetcher
            .fetch_pr_diff("https://github.com/acme/broken", 1, None)
            .await;
        assert!(matches!(upstream, Err(FetchError::UpstreamError { status: 502, .. })));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let fetcher = GitHubFetcher::new(format!("http://127.0.0.1:{}", port), None, 5).unwrap();
        let result = fetcher
            .fetch_pr_diff("https://github.com/acme/widget", 42, None)
            .await;
        assert!(matches!(result, Err(FetchError::Network(_))));
    }

    #[test]
    fn test_upstream_message_fallback() {
        assert_eq!(upstream_message(r#"{"message": "Bad credentials"}"#), "Bad credentials");
        assert_eq!(upstream_message("plain text\n"), "plain text");
    }
}
