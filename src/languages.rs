//! Language configuration for sandboxed execution

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Deserialize;

/// Configuration for a supported programming language
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    /// Default name of the source file (e.g., "main.py")
    pub source_file: String,
    /// Run command template (first element is the program)
    pub run_command: Vec<String>,
}

impl LanguageConfig {
    /// Build the run command for a concrete source file name.
    ///
    /// The entry point on a request may override the default source file;
    /// occurrences of the default name in the run command are rewritten to
    /// keep the command and the written file in sync.
    pub fn run_command_for(&self, source_file: &str) -> Vec<String> {
        self.run_command
            .iter()
            .map(|token| {
                if token == &self.source_file {
                    source_file.to_string()
                } else {
                    token.clone()
                }
            })
            .collect()
    }
}

/// Raw TOML configuration for a language
#[derive(Debug, Deserialize)]
struct RawLanguageConfig {
    source_file: String,
    run_command: String,
    #[serde(default)]
    aliases: Vec<String>,
}

/// Global language configurations
static LANGUAGES: OnceLock<HashMap<String, LanguageConfig>> = OnceLock::new();

/// Initialize language configurations from the embedded TOML file
pub fn init_languages() -> anyhow::Result<()> {
    let content = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/files/languages.toml"));
    let raw_configs: HashMap<String, RawLanguageConfig> = toml::from_str(content)?;

    let mut languages = HashMap::new();

    for (name, raw) in raw_configs {
        let config = LanguageConfig {
            source_file: raw.source_file,
            run_command: into_command(&raw.run_command),
        };

        // Add main language name
        languages.insert(name.to_lowercase(), config.clone());

        // Add aliases
        for alias in raw.aliases {
            languages.insert(alias.to_lowercase(), config.clone());
        }
    }

    LANGUAGES
        .set(languages)
        .map_err(|_| anyhow::anyhow!("Languages already initialized"))?;

    Ok(())
}

/// Get language configuration by language name
pub fn get_language_config(language: &str) -> Option<LanguageConfig> {
    LANGUAGES.get()?.get(&language.to_lowercase()).cloned()
}

/// Get all supported language names and aliases, sorted
pub fn get_supported_languages() -> Vec<String> {
    let mut names: Vec<String> = LANGUAGES
        .get()
        .map(|langs| langs.keys().cloned().collect())
        .unwrap_or_default();
    names.sort();
    names
}

/// Ensure the registry is loaded; used by tests that bypass main
#[cfg(test)]
pub fn ensure_loaded() {
    if LANGUAGES.get().is_none() {
        let _ = init_languages();
    }
}

fn into_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_registry_has_python() {
        ensure_loaded();

        let config = get_language_config("python").unwrap();
        assert_eq!(config.source_file, "main.py");
        assert_eq!(config.run_command[0], "python3");

        // Aliases resolve to the same config
        let alias = get_language_config("py").unwrap();
        assert_eq!(alias.source_file, config.source_file);
    }

    #[test]
    fn test_run_command_entry_point_override() {
        ensure_loaded();

        let config = get_language_config("python").unwrap();
        let cmd = config.run_command_for("solution.py");
        assert_eq!(cmd, vec!["python3".to_string(), "solution.py".to_string()]);
    }

    #[test]
    fn test_supported_languages_listed_sorted() {
        ensure_loaded();

        let names = get_supported_languages();
        assert!(names.iter().any(|n| n == "python"));
        assert!(names.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_unknown_language() {
        ensure_loaded();
        assert!(get_language_config("cobol").is_none());
    }
}
