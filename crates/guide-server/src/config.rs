use guide_core::completion::CompletionClientConfig;
use guide_core::prompt::DEFAULT_LANGUAGE;

use crate::error::AppError;

/// Server configuration loaded from environment variables.
///
/// The completion API key is mandatory; everything else has a default.
#[derive(Debug, Clone)]
pub struct Config {
    pub completion: CompletionClientConfig,
    /// Interface to bind, e.g. "0.0.0.0".
    pub host: String,
    pub port: u16,
    /// Language the generated guides are written in.
    pub language: String,
    /// Requests per second allowed on guide generation. `None` disables limiting.
    pub rate_limit_rps: Option<u32>,
}

impl Config {
    /// Required:
    /// - `PERPLEXITY_API_KEY`
    ///
    /// Optional:
    /// - `PORT` (default: 3000)
    /// - `BIND_HOST` (default: "0.0.0.0")
    /// - `GUIDE_LANGUAGE` (default: "Polish")
    /// - `RATE_LIMIT_RPS` (unset or 0 disables limiting)
    /// - completion client settings, see `CompletionClientConfig::from_env`
    pub fn from_env() -> Result<Self, AppError> {
        let completion = CompletionClientConfig::from_env()?;

        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| AppError::Config(format!("PORT must be a valid port number, got '{raw}'")))?,
            Err(_) => 3000,
        };

        let host = std::env::var("BIND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let language = std::env::var("GUIDE_LANGUAGE")
            .ok()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        let rate_limit_rps = std::env::var("RATE_LIMIT_RPS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|&n| n > 0);

        Ok(Self {
            completion,
            host,
            port,
            language,
            rate_limit_rps,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guide_core::error::CommonError;

    // Environment variables are process-wide, so all cases share one test.
    #[test]
    fn from_env_validates_key_and_port() {
        std::env::remove_var("PERPLEXITY_API_KEY");
        std::env::remove_var("PORT");
        assert!(matches!(
            Config::from_env(),
            Err(AppError::Common(CommonError::Config(_)))
        ));

        std::env::set_var("PERPLEXITY_API_KEY", "YOUR_API_KEY_HERE");
        assert!(matches!(
            Config::from_env(),
            Err(AppError::Common(CommonError::Config(_)))
        ));

        std::env::set_var("PERPLEXITY_API_KEY", "pplx-test");
        std::env::set_var("PORT", "not-a-port");
        assert!(matches!(Config::from_env(), Err(AppError::Config(_))));

        std::env::set_var("PORT", "70000");
        assert!(matches!(Config::from_env(), Err(AppError::Config(_))));

        std::env::set_var("PORT", "8080");
        std::env::set_var("BIND_HOST", "127.0.0.1");
        std::env::set_var("RATE_LIMIT_RPS", "0");
        let config = Config::from_env().unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.rate_limit_rps, None);

        for key in ["PERPLEXITY_API_KEY", "PORT", "BIND_HOST", "RATE_LIMIT_RPS"] {
            std::env::remove_var(key);
        }
    }
}
