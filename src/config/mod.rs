//! Typed configuration for the curator.
//!
//! The whole file is deserialized and validated once at startup; pipeline
//! passes receive references to the already-validated pieces instead of
//! reaching into a dynamic map.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Playlists to process, one concurrent task each.
    #[serde(default)]
    pub playlists: Vec<PlaylistConfig>,

    /// Per-group rules: forced membership and begin/end pinning.
    #[serde(default)]
    pub groups: Vec<GroupRule>,

    /// Final ordering of groups in the emitted playlist.
    #[serde(default)]
    pub group_order: Vec<String>,

    /// Groups to split into a standard and an "HD" counterpart.
    #[serde(default)]
    pub hd_split: Vec<String>,

    /// Substring of a group name that marks its channels as censored in the
    /// emitted info lines.
    #[serde(default)]
    pub censored_marker: Option<String>,

    #[serde(default)]
    pub probe: ProbeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistConfig {
    pub url: String,
    #[serde(default)]
    pub epg_url: Option<String>,
    #[serde(default, rename = "output")]
    pub outputs: Vec<OutputConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub file: String,
    #[serde(default)]
    pub skip_groups: Vec<String>,
}

/// Channel-name lists attached to one named group.
///
/// `force` pulls matching channels out of every other group; `begin` and
/// `end` additionally pin them to the head or tail during the sort pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupRule {
    pub name: String,
    #[serde(default)]
    pub force: Vec<String>,
    #[serde(default)]
    pub begin: Vec<String>,
    #[serde(default)]
    pub end: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// ffprobe executable to invoke.
    pub ffprobe: String,
    /// Per-probe subprocess timeout.
    pub timeout_secs: u64,
    /// Concurrent channel enrichments per playlist task.
    pub concurrency: usize,
    /// How long a caller waits on a peer's in-flight resolution before
    /// giving up on this request.
    pub wait_timeout_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ffprobe: "ffprobe".to_string(),
            timeout_secs: 20,
            concurrency: 4,
            wait_timeout_secs: 30,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(Path::new(path))
            .with_context(|| format!("failed to read config file {path}"))?;
        let config: Config =
            toml::from_str(&contents).with_context(|| format!("failed to parse config {path}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (i, list) in self.playlists.iter().enumerate() {
            if list.url.is_empty() {
                bail!("playlist #{} has no url", i + 1);
            }
            if list.outputs.is_empty() {
                bail!("playlist {} has no outputs", list.url);
            }
            for out in &list.outputs {
                if out.file.is_empty() {
                    bail!("playlist {} has an output without a file path", list.url);
                }
            }
        }
        for rule in &self.groups {
            if rule.name.is_empty() {
                bail!("group rule without a name");
            }
        }
        if self.probe.concurrency == 0 {
            bail!("probe.concurrency must be at least 1");
        }
        Ok(())
    }

    /// Rule configured for the given group, if any.
    pub fn group_rule(&self, name: &str) -> Option<&GroupRule> {
        self.groups.iter().find(|rule| rule.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let raw = r#"
            censored_marker = "взрослые"
            group_order = ["Новости", "Кино"]
            hd_split = ["Кино"]

            [probe]
            ffprobe = "ffprobe"
            timeout_secs = 10
            concurrency = 2
            wait_timeout_secs = 15

            [[groups]]
            name = "Новости"
            force = ["Euronews"]
            begin = ["Первый"]

            [[playlists]]
            url = "http://provider.example/playlist.m3u8"
            epg_url = "http://guide.example/epg.xml.gz"

            [[playlists.output]]
            file = "output/main.m3u8"
            skip_groups = ["взрослые"]
        "#;

        let config: Config = toml::from_str(raw).unwrap();
        config.validate().unwrap();

        assert_eq!(config.playlists.len(), 1);
        assert_eq!(config.playlists[0].outputs[0].skip_groups, ["взрослые"]);
        assert_eq!(config.group_rule("Новости").unwrap().force, ["Euronews"]);
        assert!(config.group_rule("Кино").is_none());
        assert_eq!(config.probe.concurrency, 2);
    }

    #[test]
    fn test_validate_rejects_playlist_without_outputs() {
        let raw = r#"
            [[playlists]]
            url = "http://provider.example/playlist.m3u8"
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();
        config.validate().unwrap();
        assert_eq!(config.probe.ffprobe, "ffprobe");
        assert!(config.censored_marker.is_none());
        assert!(config.group_order.is_empty());
    }
}
