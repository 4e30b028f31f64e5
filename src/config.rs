use std::path::Path;

use ::config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

const ENV_PREFIX: &str = "ROSTER";
const DEFAULT_CONFIG_FILE: &str = "roster.toml";

/// How a non-empty column 0 is read once a department is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PartPolicy {
    /// Any other column 0 text starts a new part.
    #[default]
    Permissive,
    /// Only column 0 text containing one of `part_keywords` starts a part.
    Keyword,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub part_policy: PartPolicy,
    pub part_keywords: Vec<String>,
    pub department_suffix: String,
    pub sheet: Option<String>,
    pub stamp_ingested_at: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            part_policy: PartPolicy::Permissive,
            part_keywords: ["파트", "센터", "클리닉", "본관", "수면건강센터", "뇌신경센터", "Center", "Clinic"]
                .into_iter()
                .map(String::from)
                .collect(),
            department_suffix: "과".to_string(),
            sheet: None,
            stamp_ingested_at: false,
        }
    }
}

impl Settings {
    /// Defaults, then `file` (or `roster.toml` if present), then `ROSTER_*`.
    pub fn load(file: Option<&Path>) -> Result<Settings, ConfigError> {
        let mut builder = Config::builder();
        builder = match file {
            Some(path) => builder.add_source(File::from(path).format(FileFormat::Toml).required(true)),
            None => builder.add_source(
                File::with_name(DEFAULT_CONFIG_FILE)
                    .format(FileFormat::Toml)
                    .required(false),
            ),
        };
        builder
            .add_source(env_source())
            .build()?
            .try_deserialize()
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("part_keywords")
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_permissive() {
        let s = Settings::default();
        assert_eq!(s.part_policy, PartPolicy::Permissive);
        assert_eq!(s.department_suffix, "과");
        assert!(s.part_keywords.iter().any(|k| k == "센터"));
        assert!(!s.stamp_ingested_at);
    }

    #[test]
    fn file_overrides_defaults() {
        let mut f = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(f, "part_policy = \"keyword\"").unwrap();
        writeln!(f, "part_keywords = [\"Unit\"]").unwrap();
        writeln!(f, "sheet = \"2025\"").unwrap();

        let s = Settings::load(Some(f.path())).unwrap();
        assert_eq!(s.part_policy, PartPolicy::Keyword);
        assert_eq!(s.part_keywords, vec!["Unit".to_string()]);
        assert_eq!(s.sheet.as_deref(), Some("2025"));
        // untouched keys keep their defaults
        assert_eq!(s.department_suffix, "과");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(Settings::load(Some(Path::new("/nonexistent/roster.toml"))).is_err());
    }
}
