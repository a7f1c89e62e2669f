use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{NifiError, Result};

/// Environment variable naming the profiles file.
pub const PROFILES_FILE_ENV: &str = "NIFI_PROFILES_FILE";
/// Environment variable selecting a profile when `--profile` is not given.
pub const PROFILE_ENV: &str = "NIFI_PROFILE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub nifi: NifiConfig,
    pub git: GitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NifiConfig {
    pub api_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub bearer_token: Option<String>,
    pub verify_ssl: bool,
    pub ca_cert: Option<PathBuf>,
    pub request_timeout_secs: u64,
    pub poll_interval_ms: u64,
    /// Upper bound for every blocking wait (update requests, drains)
    pub wait_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitProvider {
    #[default]
    Github,
    Gitlab,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitConfig {
    pub provider: GitProvider,
    pub token: Option<String>,
    /// `owner/name` on GitHub, the project path on GitLab
    pub repo: Option<String>,
    /// Override for GitHub Enterprise or self-hosted GitLab
    pub api_url: Option<String>,
}

impl Default for NifiConfig {
    fn default() -> Self {
        Self {
            api_url: "https://localhost:8443/nifi-api".to_string(),
            username: None,
            password: None,
            bearer_token: None,
            verify_ssl: true,
            ca_cert: None,
            request_timeout_secs: 30,
            poll_interval_ms: 500,
            wait_timeout_secs: 120,
        }
    }
}

impl GitProvider {
    /// Variables holding the token and repository for this provider.
    pub fn credential_env(&self) -> (&'static str, &'static str) {
        match self {
            GitProvider::Github => ("GH_TOKEN", "GH_REPO"),
            GitProvider::Gitlab => ("GL_TOKEN", "GL_REPO"),
        }
    }
}

impl GitConfig {
    pub fn default_api_url(&self) -> &'static str {
        match self.provider {
            GitProvider::Github => "https://api.github.com",
            GitProvider::Gitlab => "https://gitlab.com/api/v4",
        }
    }

    pub fn effective_api_url(&self) -> String {
        self.api_url
            .clone()
            .unwrap_or_else(|| self.default_api_url().to_string())
            .trim_end_matches('/')
            .to_string()
    }
}

/// Documented environment overrides, applied after the profile.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("nifi.api_url", "NIFI_API_ENDPOINT"),
    ("nifi.username", "NIFI_USERNAME"),
    ("nifi.password", "NIFI_PASSWORD"),
    ("nifi.bearer_token", "NIFI_BEARER_TOKEN"),
    ("nifi.verify_ssl", "NIFI_VERIFY_SSL"),
    ("nifi.ca_cert", "NIFI_CA_CERT"),
    ("nifi.request_timeout_secs", "NIFI_REQUEST_TIMEOUT"),
    ("nifi.poll_interval_ms", "NIFI_POLL_INTERVAL_MS"),
    ("nifi.wait_timeout_secs", "NIFI_WAIT_TIMEOUT"),
    ("git.provider", "NIFI_GIT_PROVIDER"),
    ("git.api_url", "NIFI_GIT_API_URL"),
];

impl AppConfig {
    /// Load configuration from defaults, the profiles file and environment
    /// variables, in that order of precedence
    pub fn load(profile: Option<&str>) -> Result<Self> {
        let profiles_file = std::env::var(PROFILES_FILE_ENV).ok();
        let env_profile = std::env::var(PROFILE_ENV).ok();
        let profile = profile.map(str::to_string).or(env_profile);
        Self::load_from(profiles_file.as_deref(), profile.as_deref(), |key| {
            std::env::var(key).ok()
        })
    }

    /// Same as [`AppConfig::load`] with the file and environment made explicit.
    pub fn load_from<F>(profiles_file: Option<&str>, profile: Option<&str>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?);

        if let Some(name) = profile {
            let section = Self::profile_section(profiles_file, name)?;
            builder = builder.add_source(config::File::from_str(
                &section.to_string(),
                config::FileFormat::Json,
            ));
        }

        for (key, var) in ENV_OVERRIDES {
            if let Some(value) = env(var).filter(|v| !v.is_empty()) {
                builder = builder.set_override(*key, value)?;
            }
        }

        let mut app_config: AppConfig = builder.build()?.try_deserialize()?;

        // credentials only come from the selected provider's variables
        let (token_var, repo_var) = app_config.git.provider.credential_env();
        if let Some(token) = env(token_var).filter(|v| !v.is_empty()) {
            app_config.git.token = Some(token);
        }
        if let Some(repo) = env(repo_var).filter(|v| !v.is_empty()) {
            app_config.git.repo = Some(repo);
        }

        app_config.validate()?;
        Ok(app_config)
    }

    fn profile_section(profiles_file: Option<&str>, name: &str) -> Result<serde_json::Value> {
        let file = match profiles_file {
            Some(path) => config::File::from(PathBuf::from(path)).required(true),
            None => config::File::with_name("nifi-profiles").required(false),
        };
        let profiles = config::Config::builder().add_source(file).build()?;

        profiles
            .get::<serde_json::Value>(name)
            .map_err(|_| NifiError::configuration(format!("unknown profile '{}'", name)))
    }

    fn validate(&self) -> Result<()> {
        if self.nifi.api_url.trim().is_empty() {
            return Err(NifiError::configuration("NiFi API URL is empty"));
        }
        if self.nifi.username.is_some() != self.nifi.password.is_some() {
            return Err(NifiError::configuration(
                "username and password must be provided together",
            ));
        }
        Ok(())
    }
}
