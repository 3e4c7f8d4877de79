//! Run configuration.
//!
//! Values come from the process environment first and from properties files
//! second. Configuration keys map to environment variables by uppercasing and
//! replacing `.` with `_` (`implicit_wait` → `IMPLICIT_WAIT`); credential keys
//! are only uppercased (`user_email` → `USER_EMAIL`).

use crate::result::{ProbeError, ProbeResult};
use crate::session::{BrowserKind, SessionConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// General settings file
pub const CONFIG_FILE: &str = "config.properties";

/// Credentials file
pub const CREDENTIALS_FILE: &str = "credentials.properties";

/// Key/value pairs read from a `.properties` file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyStore {
    values: HashMap<String, String>,
}

impl PropertyStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse properties text.
    ///
    /// Blank lines and lines starting with `#` or `!` are ignored. Keys are
    /// separated from values by the first `=`, `:` or whitespace; a trailing
    /// backslash continues the value on the next line.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut values = HashMap::new();
        let mut pending = String::new();
        for raw in text.lines() {
            let line = raw.trim_start();
            if pending.is_empty()
                && (line.is_empty() || line.starts_with('#') || line.starts_with('!'))
            {
                continue;
            }
            if let Some(head) = line.strip_suffix('\\') {
                pending.push_str(head);
                continue;
            }
            pending.push_str(line);
            let logical = std::mem::take(&mut pending);
            if let Some((key, value)) = split_property(&logical) {
                values.insert(key, value);
            }
        }
        if let Some((key, value)) = split_property(&pending) {
            values.insert(key, value);
        }
        Self { values }
    }

    /// Load a properties file; a missing file yields `None`
    pub fn load(path: &Path) -> ProbeResult<Option<Self>> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                info!(file = %path.display(), "loaded properties");
                Ok(Some(Self::parse(&text)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    file = %path.display(),
                    "properties file not found, falling back to environment variables"
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Value for `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Set a value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Number of keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn split_property(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let split = line
        .char_indices()
        .find(|(_, c)| *c == '=' || *c == ':' || c.is_whitespace());
    Some(match split {
        Some((at, sep)) => {
            let key = line[..at].trim_end().to_string();
            let mut rest = line[at + sep.len_utf8()..].trim_start();
            if sep.is_whitespace() {
                if let Some(stripped) = rest.strip_prefix(&['=', ':'][..]) {
                    rest = stripped.trim_start();
                }
            }
            (key, rest.to_string())
        }
        None => (line.to_string(), String::new()),
    })
}

/// Source of environment variables
pub trait Environment: fmt::Debug {
    /// Value of variable `key`
    fn var(&self, key: &str) -> Option<String>;
}

/// The process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Environment-first lookup over the two properties files
#[derive(Debug)]
pub struct ConfigSource {
    env: Box<dyn Environment>,
    config: PropertyStore,
    credentials: PropertyStore,
}

impl ConfigSource {
    /// Combine an environment with already-loaded stores
    #[must_use]
    pub fn new(
        env: impl Environment + 'static,
        config: PropertyStore,
        credentials: PropertyStore,
    ) -> Self {
        Self {
            env: Box::new(env),
            config,
            credentials,
        }
    }

    /// Process environment plus the properties files in `dir`
    pub fn from_dir(dir: &Path) -> ProbeResult<Self> {
        Self::from_dir_with_env(dir, ProcessEnv)
    }

    /// Custom environment plus the properties files in `dir`
    pub fn from_dir_with_env(dir: &Path, env: impl Environment + 'static) -> ProbeResult<Self> {
        let config = PropertyStore::load(&dir.join(CONFIG_FILE))?.unwrap_or_default();
        let credentials = PropertyStore::load(&dir.join(CREDENTIALS_FILE))?.unwrap_or_default();
        Ok(Self::new(env, config, credentials))
    }

    /// Environment variable name for a configuration key
    #[must_use]
    pub fn config_env_key(key: &str) -> String {
        key.to_uppercase().replace('.', "_")
    }

    /// Configuration value: environment, then `config.properties`
    #[must_use]
    pub fn config(&self, key: &str) -> Option<String> {
        self.env
            .var(&Self::config_env_key(key))
            .or_else(|| self.config.get(key).map(str::to_string))
    }

    /// Credential value: environment, then `credentials.properties`
    #[must_use]
    pub fn credential(&self, key: &str) -> Option<String> {
        self.env
            .var(&key.to_uppercase())
            .or_else(|| self.credentials.get(key).map(str::to_string))
    }
}

/// Login credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Login email
    pub email: String,
    /// Password
    pub password: String,
    /// Organization name
    pub org: String,
}

impl Credentials {
    /// Create credentials
    #[must_use]
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        org: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            org: org.into(),
        }
    }

    /// Resolve `user_email`, `user_password` and `user_org`
    pub fn resolve(source: &ConfigSource) -> ProbeResult<Self> {
        let get = |key: &str| {
            source.credential(key).ok_or_else(|| {
                ProbeError::config(format!(
                    "{key} is not defined in {CREDENTIALS_FILE} or environment variables."
                ))
            })
        };
        Ok(Self::new(get("user_email")?, get("user_password")?, get("user_org")?))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"********")
            .field("org", &self.org)
            .finish()
    }
}

/// `true` only for a case-insensitive `"true"`
#[must_use]
pub fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// Everything needed to start a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Landing URL
    pub base_url: String,
    /// Browser session settings
    pub session: SessionConfig,
    /// Login credentials
    pub credentials: Credentials,
}

impl RunConfig {
    /// Resolve the run configuration.
    ///
    /// The browser is validated first, then `implicit_wait`, then
    /// `base_url`, then the credentials.
    pub fn resolve(source: &ConfigSource) -> ProbeResult<Self> {
        let browser =
            BrowserKind::parse(&source.config("browser").unwrap_or_else(|| "chrome".into()))?;
        let headless = source.config("headless").is_some_and(|v| parse_flag(&v));
        let implicit_wait = match source.config("implicit_wait") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                ProbeError::config(format!("implicit_wait must be whole seconds, got {raw:?}: {e}"))
            })?,
            None => 2,
        };
        let base_url = source.config("base_url").ok_or_else(|| {
            ProbeError::config(format!(
                "base_url is not defined in {CONFIG_FILE} or environment variables."
            ))
        })?;
        let credentials = Credentials::resolve(source)?;

        let mut session = SessionConfig::new()
            .with_headless(headless)
            .with_implicit_wait(Duration::from_secs(implicit_wait));
        session.browser = browser;
        if let Some(path) = source.config("chrome.executable") {
            session = session.with_executable(path);
        }
        debug!(%browser, headless, implicit_wait, %base_url, "resolved run configuration");
        Ok(Self {
            base_url,
            session,
            credentials,
        })
    }

    /// Resolve from the process environment and the files in `dir`
    pub fn from_dir(dir: impl Into<PathBuf>) -> ProbeResult<Self> {
        Self::resolve(&ConfigSource::from_dir(&dir.into())?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn full_credentials() -> PropertyStore {
        PropertyStore::parse("user_email=a@b.test\nuser_password=pw\nuser_org=acme\n")
    }

    mod properties_tests {
        use super::*;

        #[test]
        fn test_parse_separators_and_comments() {
            let store = PropertyStore::parse(
                "# comment\n! also\nbase_url=https://app.test/\nbrowser : chrome\nheadless true\n\n",
            );
            assert_eq!(store.get("base_url"), Some("https://app.test/"));
            assert_eq!(store.get("browser"), Some("chrome"));
            assert_eq!(store.get("headless"), Some("true"));
            assert_eq!(store.len(), 3);
        }

        #[test]
        fn test_continuation_and_empty_value() {
            let store = PropertyStore::parse("greeting=hello \\\n   world\nempty=\nbare\n");
            assert_eq!(store.get("greeting"), Some("hello world"));
            assert_eq!(store.get("empty"), Some(""));
            assert_eq!(store.get("bare"), Some(""));
        }

        #[test]
        fn test_value_may_contain_separators() {
            let store = PropertyStore::parse("base_url=https://app.test/?a=b");
            assert_eq!(store.get("base_url"), Some("https://app.test/?a=b"));
        }

        #[test]
        fn test_missing_file_is_none() {
            let dir = tempfile::tempdir().unwrap();
            assert!(PropertyStore::load(&dir.path().join(CONFIG_FILE)).unwrap().is_none());
        }
    }

    mod source_tests {
        use super::*;

        #[test]
        fn test_env_key_mapping() {
            assert_eq!(ConfigSource::config_env_key("implicit_wait"), "IMPLICIT_WAIT");
            assert_eq!(ConfigSource::config_env_key("chrome.executable"), "CHROME_EXECUTABLE");
        }

        #[test]
        fn test_environment_wins_over_file() {
            let mut config = PropertyStore::new();
            config.insert("base_url", "https://file.test/");
            let source = ConfigSource::new(
                env(&[("BASE_URL", "https://env.test/")]),
                config,
                PropertyStore::new(),
            );
            assert_eq!(source.config("base_url").as_deref(), Some("https://env.test/"));
        }

        #[test]
        fn test_credential_keys_only_uppercase() {
            let source = ConfigSource::new(
                env(&[("USER_ORG", "env-org")]),
                PropertyStore::new(),
                full_credentials(),
            );
            assert_eq!(source.credential("user_org").as_deref(), Some("env-org"));
            assert_eq!(source.credential("user_email").as_deref(), Some("a@b.test"));
        }

        #[test]
        fn test_from_dir_reads_both_files() {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join(CONFIG_FILE), "base_url=https://app.test/\n").unwrap();
            std::fs::write(
                dir.path().join(CREDENTIALS_FILE),
                "user_email=a@b.test\nuser_password=pw\nuser_org=acme\n",
            )
            .unwrap();
            let source = ConfigSource::from_dir_with_env(dir.path(), env(&[])).unwrap();
            let run = RunConfig::resolve(&source).unwrap();
            assert_eq!(run.base_url, "https://app.test/");
            assert_eq!(run.credentials.org, "acme");
        }
    }

    mod run_config_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let source = ConfigSource::new(
                env(&[("BASE_URL", "https://app.test/")]),
                PropertyStore::new(),
                full_credentials(),
            );
            let run = RunConfig::resolve(&source).unwrap();
            assert_eq!(run.session.browser, BrowserKind::Chrome);
            assert!(!run.session.headless);
            assert_eq!(run.session.implicit_wait, Duration::from_secs(2));
            assert_eq!(run.session.page_load_timeout, Duration::from_secs(60));
        }

        #[test]
        fn test_headless_parse_is_strict() {
            for (raw, expected) in [("TRUE", true), ("true", true), ("yes", false), ("1", false)] {
                let source = ConfigSource::new(
                    env(&[("BASE_URL", "https://app.test/"), ("HEADLESS", raw)]),
                    PropertyStore::new(),
                    full_credentials(),
                );
                let resolved = RunConfig::resolve(&source).unwrap();
                assert_eq!(resolved.session.headless, expected, "{raw}");
            }
        }

        #[test]
        fn test_missing_base_url() {
            let source = ConfigSource::new(env(&[]), PropertyStore::new(), full_credentials());
            let err = RunConfig::resolve(&source).unwrap_err();
            assert!(
                matches!(err, ProbeError::Config { ref message } if message.contains("base_url"))
            );
            assert!(err.is_setup());
        }

        #[test]
        fn test_unsupported_browser_checked_first() {
            let source = ConfigSource::new(
                env(&[("BROWSER", "firefox")]),
                PropertyStore::new(),
                PropertyStore::new(),
            );
            assert!(matches!(
                RunConfig::resolve(&source).unwrap_err(),
                ProbeError::UnsupportedBrowser { .. }
            ));
        }

        #[test]
        fn test_bad_implicit_wait() {
            let source = ConfigSource::new(
                env(&[("BASE_URL", "https://app.test/"), ("IMPLICIT_WAIT", "soon")]),
                PropertyStore::new(),
                full_credentials(),
            );
            assert!(matches!(
                RunConfig::resolve(&source).unwrap_err(),
                ProbeError::Config { .. }
            ));
        }

        #[test]
        fn test_missing_credential() {
            let source = ConfigSource::new(
                env(&[("BASE_URL", "https://app.test/")]),
                PropertyStore::new(),
                PropertyStore::parse("user_email=a@b.test\n"),
            );
            let err = RunConfig::resolve(&source).unwrap_err();
            assert!(err.to_string().contains("user_password"));
        }

        #[test]
        fn test_password_masked_in_debug() {
            let creds = Credentials::new("a@b.test", "hunter2", "acme");
            let shown = format!("{creds:?}");
            assert!(!shown.contains("hunter2"));
            assert!(shown.contains("acme"));
        }
    }
}
