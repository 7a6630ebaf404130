use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{Error, Result, env_subst::substitute_env, schema::RelayConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["relay.toml", "relay.yaml", "relay.yml", "relay.json"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Format implied by the file extension. Paths without one are TOML.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()).unwrap_or("toml") {
            "toml" => Ok(Self::Toml),
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            other => Err(Error::UnsupportedFormat {
                extension: other.to_string(),
            }),
        }
    }

    /// Parse `raw` into any deserializable shape.
    pub fn parse<T: serde::de::DeserializeOwned>(self, raw: &str) -> Result<T> {
        Ok(match self {
            Self::Toml => toml::from_str(raw)?,
            Self::Yaml => serde_yaml::from_str(raw)?,
            Self::Json => serde_json::from_str(raw)?,
        })
    }
}

/// Read `path`, substitute env placeholders and parse it.
pub fn load_config(path: &Path) -> Result<RelayConfig> {
    let raw = read_substituted(path)?;
    ConfigFormat::from_path(path)?.parse(&raw)
}

pub(crate) fn read_substituted(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(substitute_env(&raw))
}

/// Load `explicit` when given, otherwise the first file in the standard
/// locations.
///
/// Search order:
/// 1. `./relay.{toml,yaml,yml,json}` (project-local)
/// 2. `<user config dir>/relay/relay.{toml,yaml,yml,json}` (user-global)
///
/// Returns the defaults and no path if nothing is found. A file that exists
/// but does not parse is an error.
pub fn discover_and_load(explicit: Option<&Path>) -> Result<(RelayConfig, Option<PathBuf>)> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => find_config_file(),
    };
    match path {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            let config = load_config(&path)?;
            Ok((config, Some(path)))
        },
        None => {
            debug!("no config file found, using defaults");
            Ok((RelayConfig::default(), None))
        },
    }
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let global = config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)));
    local.chain(global).find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/relay/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "relay").map(|d| d.config_dir().to_path_buf())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret};

    #[test]
    fn loads_each_format() {
        let dir = tempfile::tempdir().unwrap();
        let cases = [
            ("relay.toml", "[chat]\nchunk_size = 100\n"),
            ("relay.yaml", "chat:\n  chunk_size: 100\n"),
            ("relay.json", r#"{"chat": {"chunk_size": 100}}"#),
        ];
        for (name, body) in cases {
            let path = dir.path().join(name);
            std::fs::write(&path, body).unwrap();
            let cfg = load_config(&path).unwrap();
            assert_eq!(cfg.chat.chunk_size, 100, "{name}");
        }
    }

    #[test]
    fn substitutes_env_fallbacks_before_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(
            &path,
            "[agent]\naccess_token = \"${RELAY_TEST_UNSET_TOKEN:-fallback}\"\n",
        )
        .unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(
            cfg.agent.access_token.unwrap().expose_secret(),
            "fallback"
        );
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.ini");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(Error::UnsupportedFormat { extension }) if extension == "ini"
        ));
    }

    #[test]
    fn explicit_missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            discover_and_load(Some(&missing)),
            Err(Error::Read { .. })
        ));
    }

    #[test]
    fn explicit_file_is_returned_with_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[telegram]\nchunk_size = 2000\n").unwrap();
        let (cfg, found) = discover_and_load(Some(&path)).unwrap();
        assert_eq!(cfg.telegram.chunk_size, 2000);
        assert_eq!(found.as_deref(), Some(path.as_path()));
    }
}
