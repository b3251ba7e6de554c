//! Client configuration for bard-client.
//!
//! Everything has a default, so an empty YAML document (or no file at all)
//! yields a client that talks to the public Bard web endpoints directly.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors from loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Top-level configuration, passed once to the client at construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub service: ServiceConfig,
    pub http: HttpConfig,
    /// Translation detour. `None` disables the bridge.
    pub translator: Option<TranslatorConfig>,
}

impl ClientConfig {
    /// Parse a configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // serde_yaml rejects a fully empty document; treat it as all-defaults.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a configuration file from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}

/// Endpoints and browser identity of the web service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub root_url: String,
    pub host: String,
    pub stream_generate_path: String,
    /// Value of the `bl` query parameter.
    pub backend_version: String,
    /// Name of the session cookie carrying the auth token.
    pub cookie_name: String,
    pub user_agent: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            root_url: "https://bard.google.com".into(),
            host: "bard.google.com".into(),
            stream_generate_path:
                "/_/BardChatUi/data/assistant.lamda.BardFrontendService/StreamGenerate".into(),
            backend_version: "boq_assistant-bard-web-server_20230419.00_p1".into(),
            cookie_name: "__Secure-1PSID".into(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; WOW64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/91.0.4472.114 Safari/537.36"
                .into(),
        }
    }
}

impl ServiceConfig {
    /// Full URL of the answer-fetch endpoint, without query string.
    pub fn stream_generate_url(&self) -> String {
        format!(
            "{}{}",
            self.root_url.trim_end_matches('/'),
            self.stream_generate_path
        )
    }
}

/// Connection knobs for the HTTP transport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Whole-request timeout. `None` leaves the transport default.
    pub timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub proxy: Option<ProxyConfig>,
    /// Extra headers sent after the browser header set.
    pub headers: BTreeMap<String, String>,
}

/// Outbound proxy. `url` may be `http://`, `https://` or `socks5://`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Settings for the translation bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Language questions are translated into when the detected one is unsupported.
    pub pivot_language: String,
    pub endpoint: String,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            pivot_language: "en".into(),
            endpoint: "https://translate.googleapis.com/translate_a/single".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_yaml_is_default() {
        let config = ClientConfig::from_yaml("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert!(config.translator.is_none());
        assert_eq!(config.service.cookie_name, "__Secure-1PSID");
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = r#"
service:
  backend_version: boq_assistant-bard-web-server_20230601.00_p0
http:
  timeout_secs: 50
  headers:
    X-Test: value
translator:
  pivot_language: ja
"#;
        let config = ClientConfig::from_yaml(yaml).unwrap();
        assert_eq!(
            config.service.backend_version,
            "boq_assistant-bard-web-server_20230601.00_p0"
        );
        assert_eq!(config.service.host, "bard.google.com");
        assert_eq!(config.http.timeout_secs, Some(50));
        assert_eq!(config.http.headers.get("X-Test").map(String::as_str), Some("value"));

        let translator = config.translator.unwrap();
        assert_eq!(translator.pivot_language, "ja");
        assert!(translator.endpoint.starts_with("https://translate.googleapis.com"));
    }

    #[test]
    fn proxy_credentials_optional() {
        let yaml = "http:\n  proxy:\n    url: socks5://192.168.31.1:7890\n";
        let config = ClientConfig::from_yaml(yaml).unwrap();
        let proxy = config.http.proxy.unwrap();
        assert_eq!(proxy.url, "socks5://192.168.31.1:7890");
        assert!(proxy.username.is_none());
        assert!(proxy.password.is_none());
    }

    #[test]
    fn invalid_yaml_is_error() {
        let err = ClientConfig::from_yaml("http: [unterminated").unwrap_err();
        assert!(err.to_string().contains("invalid config YAML"));
    }

    #[test]
    fn stream_generate_url_joins_root() {
        let mut service = ServiceConfig::default();
        assert_eq!(
            service.stream_generate_url(),
            "https://bard.google.com/_/BardChatUi/data/assistant.lamda.BardFrontendService/StreamGenerate"
        );
        service.root_url = "http://localhost:8080/".into();
        assert!(service
            .stream_generate_url()
            .starts_with("http://localhost:8080/_/BardChatUi"));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "service:\n  cookie_name: SID").unwrap();
        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.service.cookie_name, "SID");
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = ClientConfig::load(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
