use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::RelayConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "wxrelay.toml",
    "wxrelay.yaml",
    "wxrelay.yml",
    "wxrelay.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<RelayConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./wxrelay.{toml,yaml,yml,json}`
/// 2. `~/.config/wxrelay/wxrelay.{toml,yaml,yml,json}`
///
/// Returns `RelayConfig::default()` if no config file is found or it fails to parse.
pub fn discover_and_load() -> RelayConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    RelayConfig::default()
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let global = config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)));
    local.chain(global).find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/wxrelay/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "wxrelay").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<RelayConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret};

    #[test]
    fn loads_toml_with_defaults_for_missing_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wxrelay.toml");
        std::fs::write(
            &path,
            r#"
[xmpp]
jid = "iembot@example.org"
conference_host = "conference.example.org"
nick = "iembot"
operator_jids = ["ops@example.org"]

[delivery]
max_attempts = 4
"#,
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.xmpp.nick, "iembot");
        assert_eq!(cfg.xmpp.firehose_room, "botstalk");
        assert_eq!(cfg.delivery.max_attempts, 4);
        assert_eq!(cfg.delivery.retry_delay_secs, 5);
        assert_eq!(cfg.supervisor.max_outstanding_pings, 5);
        assert_eq!(cfg.room_jid("dmxchat"), "dmxchat@conference.example.org");
    }

    #[test]
    fn loads_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();

        let yaml = dir.path().join("wxrelay.yaml");
        std::fs::write(&yaml, "xmpp:\n  firehose_room: allalerts\n").unwrap();
        assert_eq!(load_config(&yaml).unwrap().xmpp.firehose_room, "allalerts");

        let json = dir.path().join("wxrelay.json");
        std::fs::write(&json, r#"{"alerts": {"max_per_window": 3}}"#).unwrap();
        assert_eq!(load_config(&json).unwrap().alerts.max_per_window, 3);
    }

    #[test]
    fn substitutes_env_fallback_in_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wxrelay.toml");
        std::fs::write(
            &path,
            "[xmpp]\npassword = \"${WXRELAY_UNSET_PASSWORD_XYZ:-fallback}\"\n",
        )
        .unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.xmpp.password.expose_secret(), "fallback");
        assert!(!format!("{:?}", cfg.xmpp).contains("fallback"));
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wxrelay.ini");
        std::fs::write(&path, "x=1").unwrap();
        assert!(load_config(&path).is_err());
    }
}
