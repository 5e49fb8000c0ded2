//! Credential lookup.
//!
//! Each secret is read from the secrets TOML file first, then from the
//! process environment. The dotenv file named in `[secrets] env_file` is
//! loaded into the environment beforehand (existing variables win).
//! Only the secrets needed by the configured backends are required, and a
//! missing one is fatal.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::Path;

use crate::config::Config;

pub const SUPABASE_URL: &str = "SUPABASE_URL";
pub const SUPABASE_KEY: &str = "SUPABASE_KEY";
pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";

const KNOWN: [&str; 3] = [SUPABASE_URL, SUPABASE_KEY, GOOGLE_API_KEY];

#[derive(Debug, Clone, Default)]
pub struct Secrets {
    values: HashMap<String, String>,
    origin: String,
}

impl Secrets {
    /// Resolve secrets for `config`, reading the secrets file and environment.
    pub fn load(config: &Config) -> Result<Self> {
        if config.secrets.env_file.exists() {
            dotenvy::from_path(&config.secrets.env_file).with_context(|| {
                format!(
                    "Failed to load env file: {}",
                    config.secrets.env_file.display()
                )
            })?;
        }
        let file_values = read_secrets_file(&config.secrets.file)?;
        Ok(Self::resolve(
            file_values,
            |name| std::env::var(name).ok(),
            &config.secrets.file.display().to_string(),
        ))
    }

    /// Merge file values over an environment lookup. File values win.
    pub fn resolve(
        file_values: HashMap<String, String>,
        env: impl Fn(&str) -> Option<String>,
        origin: &str,
    ) -> Self {
        let mut values = HashMap::new();
        for name in KNOWN {
            let value = file_values
                .get(name)
                .cloned()
                .or_else(|| env(name))
                .filter(|v| !v.trim().is_empty());
            if let Some(v) = value {
                values.insert(name.to_string(), v);
            }
        }
        Self {
            values,
            origin: origin.to_string(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn require(&self, name: &str) -> Result<&str> {
        match self.get(name) {
            Some(v) => Ok(v),
            None => bail!(
                "Missing secret {}: set it in {} or in the environment",
                name,
                self.origin
            ),
        }
    }

    /// Fail early if any secret the configured backends need is absent.
    pub fn check_required(&self, config: &Config) -> Result<()> {
        for name in required_for(config) {
            self.require(name)?;
        }
        Ok(())
    }
}

/// Names of the secrets the configured backends need.
pub fn required_for(config: &Config) -> Vec<&'static str> {
    let mut names = Vec::new();
    if config.store.backend == "supabase" {
        names.push(SUPABASE_URL);
        names.push(SUPABASE_KEY);
    }
    if config.embedding.provider == "gemini" || config.generation.provider == "gemini" {
        names.push(GOOGLE_API_KEY);
    }
    names
}

fn read_secrets_file(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read secrets file: {}", path.display()))?;
    let table: toml::Table = toml::from_str(&content)
        .with_context(|| format!("Failed to parse secrets file: {}", path.display()))?;
    Ok(table
        .into_iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn env_of(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_file_values_take_precedence_over_env() {
        let mut file = HashMap::new();
        file.insert(GOOGLE_API_KEY.to_string(), "from-file".to_string());
        let secrets = Secrets::resolve(
            file,
            env_of(&[(GOOGLE_API_KEY, "from-env"), (SUPABASE_URL, "http://db")]),
            "secrets.toml",
        );
        assert_eq!(secrets.get(GOOGLE_API_KEY), Some("from-file"));
        assert_eq!(secrets.get(SUPABASE_URL), Some("http://db"));
        assert_eq!(secrets.get(SUPABASE_KEY), None);
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let secrets = Secrets::resolve(HashMap::new(), env_of(&[(SUPABASE_KEY, "  ")]), "x");
        let err = secrets.require(SUPABASE_KEY).unwrap_err();
        assert!(err.to_string().contains("Missing secret SUPABASE_KEY"));
    }

    #[test]
    fn test_required_depends_on_backends() {
        let mut config = Config::minimal();
        assert_eq!(
            required_for(&config),
            vec![SUPABASE_URL, SUPABASE_KEY, GOOGLE_API_KEY]
        );

        config.store.backend = "sqlite".to_string();
        config.embedding.provider = "disabled".to_string();
        config.generation.provider = "disabled".to_string();
        assert!(required_for(&config).is_empty());
        assert!(Secrets::default().check_required(&config).is_ok());
    }

    #[test]
    fn test_reads_secrets_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("secrets.toml");
        std::fs::write(
            &path,
            "SUPABASE_URL = \"https://x.supabase.co\"\nSUPABASE_KEY = \"k\"\nOTHER = 3\n",
        )
        .unwrap();
        let values = read_secrets_file(&path).unwrap();
        assert_eq!(values.get(SUPABASE_URL).unwrap(), "https://x.supabase.co");
        assert!(!values.contains_key("OTHER"));

        assert!(read_secrets_file(&tmp.path().join("missing.toml"))
            .unwrap()
            .is_empty());
    }
}
