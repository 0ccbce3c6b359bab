use dialoguer::{theme::ColorfulTheme, Password};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use crate::error::{DocGenError, Result};

lazy_static! {
    static ref ANTHROPIC_KEY_PATTERN: Regex =
        Regex::new(r"^sk-ant-api03-[a-zA-Z0-9_-]{95}$").expect("static regex");
}

/// Stores the API key for the generation endpoint
///
/// The key is read from the config file or the environment but never
/// written back out when the configuration is printed or saved.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ApiKeys {
    /// Anthropic API key used for the Messages API
    #[serde(default, skip_serializing)]
    pub anthropic_api_key: Option<String>,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeys")
            .field("anthropic_api_key", &self.anthropic_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ApiKeys {
    /// Loads the key from `ANTHROPIC_API_KEY`, falling back to the configured one
    pub fn from_env_or(configured: &ApiKeys) -> Self {
        let anthropic_api_key = get_env_value("ANTHROPIC_API_KEY")
            .or_else(|| configured.anthropic_api_key.clone());
        Self { anthropic_api_key }
    }

    /// Returns the key after resolving demo mode and checking its format
    pub fn resolve(&self) -> Result<String> {
        self.resolve_key().map(|resolved| resolved.key)
    }

    /// Like [`ApiKeys::resolve`], also telling whether the demo key was selected
    pub fn resolve_key(&self) -> Result<ResolvedKey> {
        let raw = self
            .anthropic_api_key
            .as_deref()
            .ok_or_else(|| DocGenError::Config("Anthropic API key not configured".into()))?;
        resolve_api_key(raw)
    }

    /// Prompts the user for the key when none is available
    pub fn prompt_missing_keys(&mut self) -> Result<()> {
        if self.anthropic_api_key.is_none() {
            let key = Password::with_theme(&ColorfulTheme::default())
                .with_prompt("Enter your Anthropic API key")
                .interact()
                .map_err(|e| DocGenError::Config(e.to_string()))?;
            self.anthropic_api_key = Some(key);
        }
        Ok(())
    }
}

/// Checks the shape of an Anthropic key
pub fn is_valid_api_key(key: &str) -> bool {
    ANTHROPIC_KEY_PATTERN.is_match(key.trim())
}

/// A usable key and how it was obtained
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    /// Key sent to the Messages API
    pub key: String,
    /// Selected through the demo password; demo limits apply
    pub demo: bool,
}

impl std::fmt::Debug for ResolvedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedKey")
            .field("key", &"<redacted>")
            .field("demo", &self.demo)
            .finish()
    }
}

/// Turns user input into a usable key.
///
/// Input equal to `DEMO_PW` selects the key stored in `DEMO_KEY`, provided
/// that key is itself well formed.
pub fn resolve_api_key(input: &str) -> Result<ResolvedKey> {
    let demo_pw = get_env_value("DEMO_PW");
    let demo_key = get_env_value("DEMO_KEY");
    let demo = demo_pw.as_deref().zip(demo_key.as_deref());
    resolve_with_demo(input, demo)
}

fn resolve_with_demo(input: &str, demo: Option<(&str, &str)>) -> Result<ResolvedKey> {
    let input = input.trim();
    if input.is_empty() {
        return Err(DocGenError::Config("Anthropic API key is empty".into()));
    }

    if let Some((demo_pw, demo_key)) = demo {
        if input.eq_ignore_ascii_case(demo_pw) {
            if is_valid_api_key(demo_key) {
                return Ok(ResolvedKey {
                    key: demo_key.trim().to_string(),
                    demo: true,
                });
            }
            return Err(DocGenError::Config("Demo key is not a valid Anthropic key".into()));
        }
    }

    if is_valid_api_key(input) {
        Ok(ResolvedKey {
            key: input.to_string(),
            demo: false,
        })
    } else {
        Err(DocGenError::Config("Invalid API key. Please check your key.".into()))
    }
}

/// Reads a non-empty environment variable
pub fn get_env_value(key: &str) -> Option<String> {
    let value = std::env::var(key).ok()?;
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn well_formed_key() -> String {
        format!("sk-ant-api03-{}", "a".repeat(95))
    }

    #[test]
    fn test_key_format() {
        assert!(is_valid_api_key(&well_formed_key()));
        assert!(is_valid_api_key(&format!(" {} ", well_formed_key())));
        assert!(!is_valid_api_key("sk-ant-api03-short"));
        assert!(!is_valid_api_key(""));
    }

    #[test]
    fn test_resolve_rejects_missing_key() {
        let keys = ApiKeys::default();
        assert!(keys.resolve().is_err());
    }

    #[test]
    fn test_resolve_accepts_configured_key() {
        let keys = ApiKeys {
            anthropic_api_key: Some(well_formed_key()),
        };
        assert_eq!(keys.resolve().unwrap(), well_formed_key());
    }

    #[test]
    fn test_demo_password_selects_demo_key() {
        let demo_key = format!("sk-ant-api03-{}", "d".repeat(95));
        let demo = Some(("letmein", demo_key.as_str()));

        let resolved = resolve_with_demo(" LetMeIn ", demo).unwrap();
        assert_eq!(resolved.key, demo_key);
        assert!(resolved.demo);

        let own = resolve_with_demo(&well_formed_key(), demo).unwrap();
        assert!(!own.demo);
        assert!(resolve_with_demo("letmein", None).is_err());
        assert!(resolve_with_demo("letmein", Some(("letmein", "sk-bad"))).is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let keys = ApiKeys {
            anthropic_api_key: Some(well_formed_key()),
        };
        let printed = format!("{:?}", keys);
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains("sk-ant"));
    }
}
