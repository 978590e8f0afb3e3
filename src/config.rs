use anyhow::{bail, Context, Result};
use homedir::my_home;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::metadata::types::{
    CookieSet, RequestProfile, COOKIE_DEFAULT, FETCH_MODE_DEFAULT, MAX_REDIRECTS_DEFAULT,
    RENDER_USER_AGENT_DEFAULT, USER_AGENT_DEFAULT,
};
use crate::scrape::headless::ChromeOptions;

const CONFIG_FILE: &str = "config.yaml";
const LISTEN_ADDR_DEFAULT: &str = "0.0.0.0:8080";
const TIMEOUT_SECS_DEFAULT: u64 = 30;
const MAX_SESSIONS_DEFAULT: usize = 2;
const MAX_REDIRECTS_CEILING: usize = 100;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HeadlessConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Browser binary; `$CHROME_PATH` is used when unset.
    #[serde(default)]
    pub chrome_path: Option<String>,

    #[serde(default = "default_render_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Upper bound on concurrently running browser sessions.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    #[serde(default)]
    pub sandbox: bool,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chrome_path: None,
            user_agent: default_render_user_agent(),
            timeout_secs: TIMEOUT_SECS_DEFAULT,
            max_sessions: MAX_SESSIONS_DEFAULT,
            sandbox: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Sent with every page fetch and used to seed headless sessions.
    #[serde(default = "default_cookie")]
    pub cookie: String,

    /// Additional cookies per host, e.g. `example.com: "session=abc"`.
    #[serde(default)]
    pub host_cookies: HashMap<String, String>,

    #[serde(default = "default_fetch_mode")]
    pub fetch_mode: String,

    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub accept_invalid_certs: bool,

    #[serde(default)]
    pub headless: HeadlessConfig,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            cookie: default_cookie(),
            host_cookies: HashMap::new(),
            fetch_mode: default_fetch_mode(),
            max_redirects: MAX_REDIRECTS_DEFAULT,
            timeout_secs: TIMEOUT_SECS_DEFAULT,
            accept_invalid_certs: false,
            headless: HeadlessConfig::default(),
        }
    }
}

impl ScrapeConfig {
    pub fn request_profile(&self) -> RequestProfile {
        RequestProfile {
            user_agent: self.user_agent.clone(),
            cookies: CookieSet::from_header(&self.cookie),
            host_cookies: self
                .host_cookies
                .iter()
                .map(|(host, cookie)| (host.to_lowercase(), CookieSet::from_header(cookie)))
                .collect(),
            fetch_mode: self.fetch_mode.clone(),
            max_redirects: self.max_redirects,
            timeout: Duration::from_secs(self.timeout_secs),
            accept_invalid_certs: self.accept_invalid_certs,
        }
    }

    pub fn chrome_options(&self) -> ChromeOptions {
        let defaults = ChromeOptions::default();
        ChromeOptions {
            chrome_path: self
                .headless
                .chrome_path
                .as_ref()
                .map(PathBuf::from)
                .or(defaults.chrome_path),
            user_agent: self.headless.user_agent.clone(),
            timeout: Duration::from_secs(self.headless.timeout_secs),
            max_sessions: self.headless.max_sessions,
            sandbox: self.headless.sandbox,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    USER_AGENT_DEFAULT.to_string()
}

fn default_render_user_agent() -> String {
    RENDER_USER_AGENT_DEFAULT.to_string()
}

fn default_cookie() -> String {
    COOKIE_DEFAULT.to_string()
}

fn default_fetch_mode() -> String {
    FETCH_MODE_DEFAULT.to_string()
}

fn default_max_redirects() -> usize {
    MAX_REDIRECTS_DEFAULT
}

fn default_timeout_secs() -> u64 {
    TIMEOUT_SECS_DEFAULT
}

fn default_max_sessions() -> usize {
    MAX_SESSIONS_DEFAULT
}

fn default_listen_addr() -> String {
    LISTEN_ADDR_DEFAULT.to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default)]
    pub scrape: ScrapeConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            scrape: ScrapeConfig::default(),
            base_path: PathBuf::new(),
        }
    }
}

impl Config {
    /// `$SHELFMARK_BASE_PATH`, else `~/.local/share/shelfmark`.
    pub fn base_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("SHELFMARK_BASE_PATH") {
            return Ok(PathBuf::from(path));
        }
        let home = my_home()
            .context("could not determine home directory")?
            .context("home directory path is empty")?;
        Ok(home.join(".local/share/shelfmark"))
    }

    pub fn load() -> Result<Self> {
        Self::load_with(Self::base_path()?)
    }

    pub fn load_with(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref();
        let path = base_path.join(CONFIG_FILE);

        if !path.exists() {
            std::fs::create_dir_all(base_path)
                .with_context(|| format!("creating {}", base_path.display()))?;
            std::fs::write(&path, serde_yml::to_string(&Self::default())?)
                .with_context(|| format!("writing {}", path.display()))?;
        }

        let config_str = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let mut config: Self = serde_yml::from_str(&config_str)
            .with_context(|| format!("{} is malformed", path.display()))?;
        config.base_path = base_path.to_path_buf();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = self.base_path.join(CONFIG_FILE);
        std::fs::write(&path, serde_yml::to_string(&self)?)
            .with_context(|| format!("writing {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        let scrape = &self.scrape;
        if scrape.timeout_secs == 0 {
            bail!("scrape.timeout_secs must be greater than 0");
        }
        if scrape.max_redirects > MAX_REDIRECTS_CEILING {
            bail!(
                "scrape.max_redirects cannot exceed {MAX_REDIRECTS_CEILING}, got {}",
                scrape.max_redirects
            );
        }
        if scrape.headless.timeout_secs == 0 {
            bail!("scrape.headless.timeout_secs must be greater than 0");
        }
        if scrape.headless.max_sessions == 0 {
            bail!("scrape.headless.max_sessions must be greater than 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_creates_default_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load_with(tmp.path()).unwrap();

        assert!(tmp.path().join(CONFIG_FILE).exists());
        assert_eq!(config.listen_addr, LISTEN_ADDR_DEFAULT);
        assert_eq!(config.scrape.max_redirects, 20);
        assert!(config.scrape.headless.enabled);
    }

    #[test]
    fn test_partial_file_filled_with_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "scrape:\n  max_redirects: 5\n  host_cookies:\n    Example.com: \"session=abc\"\n",
        )
        .unwrap();

        let config = Config::load_with(tmp.path()).unwrap();
        assert_eq!(config.scrape.max_redirects, 5);
        assert_eq!(config.scrape.timeout_secs, 30);

        let profile = config.scrape.request_profile();
        assert_eq!(profile.max_redirects, 5);
        assert_eq!(profile.timeout, Duration::from_secs(30));
        assert_eq!(profile.cookies_for("example.com").get("session"), Some("abc"));

        // upgraded file now spells out every key
        let saved = std::fs::read_to_string(tmp.path().join(CONFIG_FILE)).unwrap();
        assert!(saved.contains("listen_addr"));
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "scrape:\n  timeout_secs: 0\n",
        )
        .unwrap();
        assert!(Config::load_with(tmp.path()).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_sessions() {
        let mut config = Config::default();
        config.scrape.headless.max_sessions = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "scrape: [not, a, map").unwrap();
        assert!(Config::load_with(tmp.path()).is_err());
    }

    #[test]
    fn test_chrome_options_from_config() {
        let mut scrape = ScrapeConfig::default();
        scrape.headless.chrome_path = Some("/opt/chromium".into());
        scrape.headless.timeout_secs = 12;
        let opts = scrape.chrome_options();
        assert_eq!(opts.chrome_path, Some(PathBuf::from("/opt/chromium")));
        assert_eq!(opts.timeout, Duration::from_secs(12));
    }
}
