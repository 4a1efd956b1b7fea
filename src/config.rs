use crate::error::ConfigError;
use secrecy::SecretString;

pub const DEFAULT_MODEL: &str = "meta-llama/Meta-Llama-3-8B-Instruct";
pub const DEFAULT_LLM_URL: &str = "https://router.huggingface.co/v1/chat/completions";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_MAX_DIFF_CHARS: usize = 15000;

#[derive(Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub providers: ProvidersConfig,
    pub github: GithubConfig,
    pub queue: QueueConfig,
    pub review: ReviewConfig,
}

#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Clone)]
pub struct ProvidersConfig {
    pub huggingface_api_token: SecretString,
    pub model: String,
    pub base_url: String,
    pub default_timeout_secs: u64,
}

#[derive(Clone)]
pub struct GithubConfig {
    pub token: Option<SecretString>,
    pub api_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone)]
pub struct QueueConfig {
    /// Result-store connection URL; `None` keeps task records in process.
    pub mongodb_url: Option<String>,
    pub mongodb_database: String,
    pub max_concurrent_tasks: usize,
    pub task_ttl_secs: u64,
}

#[derive(Clone)]
pub struct ReviewConfig {
    pub max_diff_chars: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source; `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let huggingface_api_token = lookup("HUGGINGFACE_API_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingRequired("HUGGINGFACE_API_TOKEN".into()))?;

        Ok(Self {
            server: ServerConfig {
                host: var("HOST", "0.0.0.0"),
                port: var("PORT", "8080")
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".into()))?,
                cors_origins: var("CORS_ORIGINS", "*")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            providers: ProvidersConfig {
                huggingface_api_token,
                model: var("LLM_MODEL", DEFAULT_MODEL),
                base_url: var("LLM_BASE_URL", DEFAULT_LLM_URL),
                default_timeout_secs: var("LLM_TIMEOUT_SECS", "120").parse().unwrap_or(120),
            },
            github: GithubConfig {
                token: lookup("GITHUB_TOKEN")
                    .filter(|token| !token.trim().is_empty())
                    .map(SecretString::from),
                api_url: var("GITHUB_API_URL", DEFAULT_GITHUB_API_URL),
                timeout_secs: var("GITHUB_TIMEOUT_SECS", "30").parse().unwrap_or(30),
            },
            queue: QueueConfig {
                mongodb_url: lookup("MONGODB_URL").filter(|url| !url.trim().is_empty()),
                mongodb_database: var("MONGODB_DATABASE", "code_reviewer"),
                max_concurrent_tasks: var("MAX_CONCURRENT_TASKS", "4")
                    .parse()
                    .ok()
                    .filter(|n: &usize| *n > 0)
                    .unwrap_or(4),
                task_ttl_secs: var("TASK_TTL_SECS", "3600").parse().unwrap_or(3600),
            },
            review: ReviewConfig {
                max_diff_chars: var("MAX_DIFF_CHARS", "15000")
                    .parse()
                    .unwrap_or(DEFAULT_MAX_DIFF_CHARS),
            },
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            mongodb_url: None,
            mongodb_database: "code_reviewer".to_string(),
            max_concurrent_tasks: 4,
            task_ttl_secs: 3600,
        }
    }
}
