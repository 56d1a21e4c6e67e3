use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
};
use serde::Serialize;
use std::path::Path;

use super::{ConflictPolicy, ExecutionMode, SortSettings};

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

/// Command-line values layered on top of every other source.
///
/// Only flags the user actually passed are serialized, so an absent flag never
/// masks a value coming from a config file or the environment.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ConfigOverrides {
    pub sort: SortOverrides,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct SortOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<ConflictPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<ExecutionMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_threads: Option<usize>,
}

pub struct FileSorterConfig {
    figment: Figment,
}

impl FileSorterConfig {
    pub fn load(
        custom_config: Option<&Path>,
        cli_overrides: Option<ConfigOverrides>,
    ) -> Result<Self> {
        tracing::trace!("CONFIG LOAD: Starting");

        let mut figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG)); // Embedded defaults

        // User config - support multiple formats
        let user_base = Self::user_config_base_path();
        figment = figment
            .merge(Toml::file(format!("{user_base}.toml")))
            .merge(Json::file(format!("{user_base}.json")))
            .merge(Yaml::file(format!("{user_base}.yaml")))
            .merge(Yaml::file(format!("{user_base}.yml")));

        if let Some(custom_path) = custom_config {
            if !custom_path.is_file() {
                anyhow::bail!("Config file not found: {}", custom_path.display());
            }
            tracing::trace!("CONFIG LOAD: Custom config {}", custom_path.display());
            figment = match custom_path.extension().and_then(|ext| ext.to_str()) {
                Some("json") => figment.merge(Json::file(custom_path)),
                Some("yaml") | Some("yml") => figment.merge(Yaml::file(custom_path)),
                _ => figment.merge(Toml::file(custom_path)),
            };
        } else {
            // Repository config in the working directory
            figment = figment
                .merge(Toml::file("filesorter.toml"))
                .merge(Json::file("filesorter.json"))
                .merge(Yaml::file("filesorter.yaml"))
                .merge(Yaml::file("filesorter.yml"));
        }

        // Environment variables, e.g. FILESORTER_SORT__CONFLICT=rename
        figment = figment.merge(Env::prefixed("FILESORTER_").split("__"));

        // CLI flags have the highest priority
        if let Some(overrides) = cli_overrides {
            tracing::trace!("CONFIG LOAD: Applying CLI overrides {:?}", overrides);
            figment = figment.merge(Serialized::defaults(overrides));
        }

        Ok(FileSorterConfig { figment })
    }

    /// Extract and validate the `[sort]` section
    pub fn sort_settings(&self) -> Result<SortSettings> {
        let settings: SortSettings = self
            .figment
            .extract_inner("sort")
            .context("Invalid [sort] configuration")?;
        settings.validate()?;
        tracing::trace!("CONFIG LOAD: Final sort settings = {:?}", settings);
        Ok(settings)
    }

    fn user_config_base_path() -> String {
        match std::env::var("HOME") {
            Ok(home) => format!("{home}/.config/filesorter/config"),
            Err(_) => "~/.config/filesorter/config".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_config_loads_defaults() {
        Jail::expect_with(|jail| {
            let home = jail.directory().to_path_buf();
            jail.set_env("HOME", home.display());
            let config = FileSorterConfig::load(None, None).expect("defaults should load");
            let settings = config.sort_settings().expect("defaults should be valid");
            assert_eq!(settings, SortSettings::default());
            Ok(())
        });
    }

    #[test]
    fn test_repository_config_overrides_defaults() {
        Jail::expect_with(|jail| {
            let home = jail.directory().to_path_buf();
            jail.set_env("HOME", home.display());
            jail.create_file(
                "filesorter.toml",
                r#"
                [sort]
                conflict = "rename"
                max_threads = 3
                "#,
            )?;

            let settings = FileSorterConfig::load(None, None)
                .unwrap()
                .sort_settings()
                .unwrap();
            assert_eq!(settings.conflict, ConflictPolicy::Rename);
            assert_eq!(settings.max_threads, 3);
            assert_eq!(settings.destination, "processed_files");
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file_and_cli_overrides_env() {
        Jail::expect_with(|jail| {
            let home = jail.directory().to_path_buf();
            jail.set_env("HOME", home.display());
            jail.create_file("filesorter.yaml", "sort:\n  mode: sequential\n")?;
            jail.set_env("FILESORTER_SORT__MODE", "auto");
            jail.set_env("FILESORTER_SORT__CONFLICT", "overwrite");

            let settings = FileSorterConfig::load(None, None)
                .unwrap()
                .sort_settings()
                .unwrap();
            assert_eq!(settings.mode, ExecutionMode::Auto);
            assert_eq!(settings.conflict, ConflictPolicy::Overwrite);

            let overrides = ConfigOverrides {
                sort: SortOverrides {
                    conflict: Some(ConflictPolicy::Skip),
                    ..SortOverrides::default()
                },
            };
            let settings = FileSorterConfig::load(None, Some(overrides))
                .unwrap()
                .sort_settings()
                .unwrap();
            assert_eq!(settings.mode, ExecutionMode::Auto);
            assert_eq!(settings.conflict, ConflictPolicy::Skip);
            Ok(())
        });
    }

    #[test]
    fn test_custom_config_replaces_repository_config() {
        Jail::expect_with(|jail| {
            let home = jail.directory().to_path_buf();
            jail.set_env("HOME", home.display());
            jail.create_file("filesorter.toml", "[sort]\nmax_threads = 7\n")?;
            jail.create_file("custom.json", r#"{ "sort": { "destination": "sorted" } }"#)?;

            let settings = FileSorterConfig::load(Some(Path::new("custom.json")), None)
                .unwrap()
                .sort_settings()
                .unwrap();
            assert_eq!(settings.destination, "sorted");
            assert_eq!(settings.max_threads, 0);
            Ok(())
        });
    }

    #[test]
    fn test_missing_custom_config_is_an_error() {
        Jail::expect_with(|jail| {
            let home = jail.directory().to_path_buf();
            jail.set_env("HOME", home.display());
            assert!(FileSorterConfig::load(Some(Path::new("nope.toml")), None).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_invalid_destination_is_rejected() {
        Jail::expect_with(|jail| {
            let home = jail.directory().to_path_buf();
            jail.set_env("HOME", home.display());
            jail.create_file("filesorter.toml", "[sort]\ndestination = \"../out\"\n")?;
            let config = FileSorterConfig::load(None, None).unwrap();
            assert!(config.sort_settings().is_err());
            Ok(())
        });
    }
}
