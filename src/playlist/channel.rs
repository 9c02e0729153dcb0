//! One playlist entry and everything derived from it at construction time:
//! display name, sorting name and the remote identity embedded in its URL.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;
use url::Url;

use crate::models::{Provider, StreamMeta};
use crate::utils::parse_variable;

/// Leading digits and separator characters ignored when sorting channels by
/// name.
static SORTING_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^[0-9]+)|(\.|\+|-|\s|,|_)").expect("invalid sorting-name regex"));

/// Identity of a channel in the upstream provider's system, derived from the
/// stream URL path shape `/<prefix>/<access-key>/<remote-id>/<file>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteIdentity {
    pub remote_id: String,
    pub access_key: String,
    pub provider: Provider,
}

impl RemoteIdentity {
    /// Derive the remote identity from a stream URL.
    ///
    /// URLs whose path carries fewer segments than the documented shape have
    /// no usable identity; the caller keeps zero-value stream metadata and
    /// the pipeline tolerates it.
    pub fn from_url(raw_url: &str) -> Option<RemoteIdentity> {
        let parsed = Url::parse(raw_url).ok()?;
        let host = parsed.host_str()?;

        // http://wkejhfk.provider.net/iptv/ABCD3HG7DW38ZD/205/index.m3u8
        let segments: Vec<&str> = parsed.path().split('/').collect();
        if segments.len() < 4 || segments[3].is_empty() {
            return None;
        }

        let labels: Vec<&str> = host.split('.').collect();
        let provider_host = if labels.len() > 1 {
            labels[1..].join(".")
        } else {
            host.to_string()
        };
        let provider_name = provider_host
            .split('.')
            .next()
            .unwrap_or_default()
            .to_string();

        Some(RemoteIdentity {
            remote_id: segments[3].to_string(),
            access_key: segments[2].to_string(),
            provider: Provider {
                name: provider_name,
                host: provider_host,
            },
        })
    }
}

/// One channel of a playlist. Owned by exactly one [`super::Group`] at any
/// time; movement between groups is extract-then-append, never copy.
#[derive(Debug, Clone)]
pub struct Channel {
    pub name: String,
    pub sorting_name: String,
    pub tvg_name: Option<String>,
    pub info_data: String,
    pub url: String,

    pub history_days: u32,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,

    pub identity: Option<RemoteIdentity>,
}

impl Channel {
    /// Build a channel from the info-line remainder and stream URL of a
    /// filled record.
    pub fn new(name_data: &str, url: &str) -> Channel {
        // #EXTINF:0 tvg-rec="5" catchup="shift",Первый HD
        let mut parts = name_data.splitn(2, ',');
        let info_data = parts.next().unwrap_or_default().to_string();
        let name = parts.next().unwrap_or_default().trim().to_string();

        let mut history_days = 0;
        for token in info_data.split(' ') {
            if let Some(("tvg-rec", value)) = parse_variable(token) {
                history_days = value.parse().unwrap_or(0);
            }
        }

        let sorting_name = SORTING_NAME_RE.replace_all(&name, "").to_lowercase();

        let identity = RemoteIdentity::from_url(url);
        if identity.is_none() {
            warn!("no remote identity in channel url: {url}");
        }

        Channel {
            name,
            sorting_name,
            tvg_name: None,
            info_data,
            url: url.to_string(),
            history_days,
            width: 0,
            height: 0,
            frame_rate: 0,
            identity,
        }
    }

    /// Adopt a resolved stream descriptor.
    pub fn apply_meta(&mut self, meta: StreamMeta) {
        self.width = meta.width;
        self.height = meta.height;
        self.frame_rate = meta.frame_rate;
    }

    /// Regenerate the info line for serialization. The raw ingested info
    /// line is never emitted verbatim.
    pub fn info_line(&self, censored: bool) -> String {
        let mut line = format!(
            "#EXTINF:0 tvg-rec=\"{}\" catchup=\"shift\" catchup-days=\"{}\"",
            self.history_days, self.history_days
        );
        if let Some(tvg_name) = &self.tvg_name {
            line.push_str(&format!(" tvg-name=\"{tvg_name}\""));
        }
        if censored {
            line.push_str(" censored=\"1\"");
        }
        line.push(',');
        line.push_str(&self.name);
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_splits_name_and_variables() {
        let channel = Channel::new(
            "0 tvg-rec=\"5\" catchup=\"default\", Disney Channel",
            "http://abc.provider.net/iptv/KEY123/205/index.m3u8",
        );
        assert_eq!(channel.name, "Disney Channel");
        assert_eq!(channel.history_days, 5);
        assert_eq!(channel.info_data, "0 tvg-rec=\"5\" catchup=\"default\"");
    }

    #[test]
    fn test_new_without_name_part() {
        let channel = Channel::new("10.000000", "http://host/a.m3u8");
        assert_eq!(channel.name, "");
        assert_eq!(channel.history_days, 0);
    }

    #[test]
    fn test_sorting_name_strips_leading_digits_and_separators() {
        let channel = Channel::new("0,12 Первый. Канал_HD", "http://host/x");
        // Leading digits go, separators go everywhere, digits inside stay.
        assert_eq!(channel.sorting_name, "первыйканалhd");

        let channel = Channel::new("0,Канал 24", "http://host/x");
        assert_eq!(channel.sorting_name, "канал24");
    }

    #[test]
    fn test_remote_identity_from_url() {
        let identity =
            RemoteIdentity::from_url("http://wkejhfk.rossteleccom.net/iptv/ABCD3HG7DW38ZD/205/index.m3u8")
                .unwrap();
        assert_eq!(identity.remote_id, "205");
        assert_eq!(identity.access_key, "ABCD3HG7DW38ZD");
        assert_eq!(identity.provider.host, "rossteleccom.net");
        assert_eq!(identity.provider.name, "rossteleccom");
    }

    #[test]
    fn test_remote_identity_rejects_short_paths() {
        assert!(RemoteIdentity::from_url("http://host.net/index.m3u8").is_none());
        assert!(RemoteIdentity::from_url("http://host.net/iptv/key").is_none());
        assert!(RemoteIdentity::from_url("not a url").is_none());
    }

    #[test]
    fn test_info_line() {
        let mut channel = Channel::new("0 tvg-rec=\"3\",Россия HD", "http://host/x");
        assert_eq!(
            channel.info_line(false),
            "#EXTINF:0 tvg-rec=\"3\" catchup=\"shift\" catchup-days=\"3\",Россия HD"
        );

        channel.tvg_name = Some("Rossiya HD".to_string());
        assert_eq!(
            channel.info_line(true),
            "#EXTINF:0 tvg-rec=\"3\" catchup=\"shift\" catchup-days=\"3\" tvg-name=\"Rossiya HD\" censored=\"1\",Россия HD"
        );
    }
}
