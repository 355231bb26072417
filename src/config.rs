use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use url::Url;

use crate::api::state::DEFAULT_MAX_BODY_BYTES;
use crate::providers::types::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::providers::LlmSettings;
use crate::services::summary::DEFAULT_SUMMARY_MAX_TOKENS;
use crate::services::translation::DEFAULT_TRANSLATE_MAX_TOKENS;

pub const APP_NAME: &str = "medbridge";

#[derive(Parser, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // --- Server ---
    /// Address the HTTP API listens on.
    #[arg(long, env = "MEDBRIDGE_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// SQLite database file. Defaults to $XDG_DATA_HOME/medbridge/medbridge.db.
    #[arg(long, env = "MEDBRIDGE_DATABASE_PATH")]
    pub database_path: Option<PathBuf>,

    /// Largest accepted request body in bytes (audio is sent inline).
    #[arg(long, env = "MEDBRIDGE_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    // --- Language model ---
    /// API key for the chat-completions provider. Translation and summaries
    /// fail until one is set.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API.
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub openai_base_url: Url,

    /// Model used for translation and summaries.
    #[arg(long, env = "MEDBRIDGE_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    #[arg(long, env = "MEDBRIDGE_TRANSLATE_MAX_TOKENS", default_value_t = DEFAULT_TRANSLATE_MAX_TOKENS)]
    pub translate_max_tokens: u32,

    #[arg(long, env = "MEDBRIDGE_SUMMARY_MAX_TOKENS", default_value_t = DEFAULT_SUMMARY_MAX_TOKENS)]
    pub summary_max_tokens: u32,

    /// Source language assumed when a translate request names none.
    #[arg(long, env = "MEDBRIDGE_DEFAULT_SOURCE_LANG", default_value = "en")]
    pub default_source_lang: String,
}

impl Config {
    pub fn llm_settings(&self) -> LlmSettings {
        LlmSettings {
            api_key: self.openai_api_key.clone(),
            base_url: self.openai_base_url.clone(),
            model: self.model.clone(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind", &self.bind)
            .field("database_path", &self.database_path)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "***"))
            .field("openai_base_url", &self.openai_base_url.as_str())
            .field("model", &self.model)
            .field("translate_max_tokens", &self.translate_max_tokens)
            .field("summary_max_tokens", &self.summary_max_tokens)
            .field("default_source_lang", &self.default_source_lang)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    /// Declared default and env var of an argument, read from the command
    /// definition so the caller's environment does not leak in.
    fn declared(id: &str) -> (Option<String>, Option<String>) {
        let cmd = Config::command();
        let arg = cmd
            .get_arguments()
            .find(|a| a.get_id() == id)
            .unwrap_or_else(|| panic!("no argument {id}"));
        let default = arg
            .get_default_values()
            .first()
            .map(|v| v.to_string_lossy().into_owned());
        let env = arg.get_env().map(|v| v.to_string_lossy().into_owned());
        (default, env)
    }

    #[test]
    fn test_defaults() {
        let expected = [
            ("bind", Some("127.0.0.1:3000"), "MEDBRIDGE_BIND"),
            ("database_path", None, "MEDBRIDGE_DATABASE_PATH"),
            ("openai_api_key", None, "OPENAI_API_KEY"),
            ("openai_base_url", Some("https://api.openai.com"), "OPENAI_BASE_URL"),
            ("model", Some("gpt-4o-mini"), "MEDBRIDGE_MODEL"),
            ("translate_max_tokens", Some("500"), "MEDBRIDGE_TRANSLATE_MAX_TOKENS"),
            ("summary_max_tokens", Some("800"), "MEDBRIDGE_SUMMARY_MAX_TOKENS"),
            ("default_source_lang", Some("en"), "MEDBRIDGE_DEFAULT_SOURCE_LANG"),
            ("max_body_bytes", Some("26214400"), "MEDBRIDGE_MAX_BODY_BYTES"),
        ];
        for (id, default, env) in expected {
            let (actual_default, actual_env) = declared(id);
            assert_eq!(actual_default.as_deref(), default, "default of {id}");
            assert_eq!(actual_env.as_deref(), Some(env), "env of {id}");
        }
    }

    #[test]
    fn test_flags_override() {
        let config = Config::try_parse_from([
            APP_NAME,
            "--bind",
            "0.0.0.0:8080",
            "--openai-api-key",
            "sk-test",
            "--openai-base-url",
            "http://localhost:11434",
            "--model",
            "llama3",
        ])
        .unwrap();
        let settings = config.llm_settings();
        assert_eq!(settings.api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.model, "llama3");
        assert!(!format!("{:?}", config).contains("sk-test"));
        assert!(!format!("{:?}", settings).contains("sk-test"));
    }

    #[test]
    fn test_rejects_bad_url() {
        assert!(Config::try_parse_from([APP_NAME, "--openai-base-url", "not a url"]).is_err());
    }
}
