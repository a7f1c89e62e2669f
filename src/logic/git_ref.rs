use std::time::Duration;

use reqwest::Url;

use crate::config::{GitConfig, GitProvider};
use crate::error::{NifiError, Result};

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// True for a 7 to 40 character hexadecimal string, i.e. something that
/// already looks like a (possibly abbreviated) commit SHA.
pub fn is_commit_sha(reference: &str) -> bool {
    (7..=40).contains(&reference.len()) && reference.chars().all(|c| c.is_ascii_hexdigit())
}

/// Turns a branch or tag name into the commit SHA it currently points at.
#[async_trait::async_trait]
pub trait GitRefResolver: Send + Sync {
    async fn fetch_commit_sha(&self, reference: &str) -> Result<String>;
}

/// Resolve `reference` to a commit SHA. Anything that already looks like a
/// SHA is returned unchanged without contacting the provider.
pub async fn resolve_git_ref<R: GitRefResolver + ?Sized>(
    resolver: &R,
    reference: &str,
) -> Result<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(NifiError::input("git reference is empty"));
    }
    if is_commit_sha(reference) {
        return Ok(reference.to_string());
    }
    let sha = resolver.fetch_commit_sha(reference).await?;
    log::info!("Resolved git ref '{}' to {}", reference, sha);
    Ok(sha)
}

/// Resolves refs against the GitHub or GitLab REST API.
#[derive(Debug, Clone)]
pub struct GitProviderClient {
    http: reqwest::Client,
    provider: GitProvider,
    token: Option<String>,
    repo: Option<String>,
    api_url: String,
}

impl GitProviderClient {
    pub fn new(config: &GitConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(PROVIDER_TIMEOUT).build()?;
        Ok(Self {
            http,
            provider: config.provider,
            token: config.token.clone().filter(|t| !t.is_empty()),
            repo: config.repo.clone().filter(|r| !r.is_empty()),
            api_url: config.effective_api_url(),
        })
    }

    fn commit_url(&self, repo: &str, reference: &str) -> Result<Url> {
        let mut url = Url::parse(&self.api_url).map_err(|e| {
            NifiError::configuration(format!("invalid git API URL {}: {}", self.api_url, e))
        })?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| {
                    NifiError::configuration(format!("invalid git API URL {}", self.api_url))
                })?;
            segments.pop_if_empty();
            match self.provider {
                GitProvider::Github => {
                    segments.push("repos");
                    segments.extend(repo.split('/').filter(|s| !s.is_empty()));
                    segments.push("commits").push(reference);
                }
                GitProvider::Gitlab => {
                    // the project path is a single, encoded segment
                    segments
                        .push("projects")
                        .push(repo)
                        .push("repository")
                        .push("commits")
                        .push(reference);
                }
            }
        }
        Ok(url)
    }
}

#[async_trait::async_trait]
impl GitRefResolver for GitProviderClient {
    async fn fetch_commit_sha(&self, reference: &str) -> Result<String> {
        let token = self.token.as_deref().ok_or_else(|| {
            NifiError::input(format!(
                "cannot resolve '{}' without a git token (set GH_TOKEN or GL_TOKEN)",
                reference
            ))
        })?;
        let repo = self.repo.as_deref().ok_or_else(|| {
            NifiError::input(format!(
                "cannot resolve '{}' without a repository (set GH_REPO or GL_REPO)",
                reference
            ))
        })?;

        let url = self.commit_url(repo, reference)?;
        log::debug!("GET {}", url);
        let request = match self.provider {
            GitProvider::Github => self
                .http
                .get(url)
                .bearer_auth(token)
                .header(reqwest::header::ACCEPT, "application/vnd.github+json")
                .header(reqwest::header::USER_AGENT, "nifi-ci"),
            GitProvider::Gitlab => self.http.get(url).header("PRIVATE-TOKEN", token),
        };
        let response = request.send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(NifiError::not_found(format!(
                "git ref '{}' in {}",
                reference, repo
            )));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NifiError::Api {
                status: status.as_u16(),
                message: format!("resolving git ref '{}': {}", reference, message),
            });
        }

        let body: serde_json::Value = response.json().await?;
        let field = match self.provider {
            GitProvider::Github => "sha",
            GitProvider::Gitlab => "id",
        };
        body.get(field)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| NifiError::Api {
                status: status.as_u16(),
                message: format!("commit response for '{}' has no '{}' field", reference, field),
            })
    }
}
