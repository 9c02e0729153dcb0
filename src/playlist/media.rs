//! Playlist container: line parser, record structuring, the transformation
//! pipeline and serialization back to playlist text.
//!
//! The pipeline passes run in a fixed order (forcing, sorting, HD
//! validation, group ordering) and each takes the relevant slice of the
//! validated configuration by reference.

use tracing::{debug, error, info};

use crate::config::{GroupRule, OutputConfig};
use crate::errors::{AppError, ParseError};
use crate::playlist::{Channel, Group};

const MARKER: &str = "#EXTM3U";
const TAG_VERSION: &str = "#EXT-X-VERSION:";
const TAG_MEDIA_SEQUENCE: &str = "#EXT-X-MEDIA-SEQUENCE:";
const TAG_TARGET_DURATION: &str = "#EXT-X-TARGETDURATION:";
const TAG_INFO: &str = "#EXTINF:";
const TAG_GROUP: &str = "#EXTGRP:";

/// Raw playlist entry under construction. Filled once it has both an info
/// line and a URL; consumed when channels are built.
#[derive(Debug, Default, Clone)]
pub struct Record {
    pub group_name: String,
    pub name_data: String,
    pub url: String,
}

impl Record {
    pub fn is_filled(&self) -> bool {
        !self.url.is_empty() && !self.name_data.is_empty()
    }
}

/// All records and groups of one playlist.
#[derive(Debug, Default)]
pub struct Media {
    valid_file_type: bool,

    pub version: Option<String>,
    pub media_sequence: Option<String>,
    pub target_duration: Option<String>,

    pub records: Vec<Record>,
    pub groups: Vec<Group>,
}

impl Media {
    /// Parse complete playlist text. Content before the playlist marker is
    /// fatal for the whole file: no partial result is returned.
    pub fn parse(content: &str) -> Result<Media, ParseError> {
        let mut media = Media::default();
        for raw_line in content.lines() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }
            media.add_line(line)?;
        }
        media.struct_records();
        Ok(media)
    }

    /// Feed one playlist line. Fails only when content precedes the
    /// mandatory file marker.
    pub fn add_line(&mut self, line: &str) -> Result<(), ParseError> {
        if line.starts_with(MARKER) {
            self.valid_file_type = true;
            return Ok(());
        }
        if !self.valid_file_type {
            return Err(ParseError::InvalidMarker {
                line: line.to_string(),
            });
        }

        if let Some(version) = line.strip_prefix(TAG_VERSION) {
            self.version = Some(version.to_string());
            return Ok(());
        }
        if let Some(sequence) = line.strip_prefix(TAG_MEDIA_SEQUENCE) {
            self.media_sequence = Some(sequence.to_string());
            return Ok(());
        }
        if let Some(duration) = line.strip_prefix(TAG_TARGET_DURATION) {
            self.target_duration = Some(duration.to_string());
            return Ok(());
        }

        if let Some(name_data) = line.strip_prefix(TAG_INFO) {
            // An info line without a following URL is overwritten here, not
            // kept as an empty record.
            self.current_record().name_data = name_data.to_string();
        } else if let Some(group_name) = line.strip_prefix(TAG_GROUP) {
            self.current_record().group_name = group_name.to_string();
        } else if line.starts_with('#') {
            debug!("unknown tag: {line}");
        } else {
            self.current_record().url = line.to_string();
        }

        Ok(())
    }

    /// The last record if it is still being assembled, otherwise a fresh
    /// one.
    fn current_record(&mut self) -> &mut Record {
        let needs_new = self.records.last().map_or(true, Record::is_filled);
        if needs_new {
            self.records.push(Record::default());
        }
        self.records.last_mut().expect("records cannot be empty here")
    }

    /// Turn every filled record carrying a group name into a channel inside
    /// its group. Records without a group name are dropped.
    fn struct_records(&mut self) {
        let records = std::mem::take(&mut self.records);
        for record in &records {
            if record.is_filled() && !record.group_name.is_empty() {
                let index = self.ensure_group(&record.group_name);
                let channel = Channel::new(&record.name_data, &record.url);
                self.groups[index].channels.push(channel);
            }
        }
        self.records = records;
    }

    pub fn find_group(&self, name: &str) -> Option<(usize, &Group)> {
        self.groups
            .iter()
            .enumerate()
            .find(|(_, group)| group.name == name)
    }

    /// Index of the named group, creating it at the end when absent.
    fn ensure_group(&mut self, name: &str) -> usize {
        match self.find_group(name) {
            Some((index, _)) => index,
            None => {
                self.groups.push(Group::new(name));
                self.groups.len() - 1
            }
        }
    }

    /// Pipeline pass 1: pull every channel named by a rule (force ++ begin
    /// ++ end) out of every other group into the rule's group, in
    /// extraction order.
    pub fn apply_groups_forcing(&mut self, rules: &[GroupRule]) {
        for rule in rules {
            if rule.name.is_empty() {
                continue;
            }
            let names: Vec<&str> = rule
                .force
                .iter()
                .chain(rule.begin.iter())
                .chain(rule.end.iter())
                .map(String::as_str)
                .collect();
            if names.is_empty() {
                continue;
            }
            self.force_channels(&rule.name, &names);
        }
    }

    fn force_channels(&mut self, group_name: &str, channel_names: &[&str]) {
        let target = self.ensure_group(group_name);

        let mut extracted = Vec::new();
        for name in channel_names {
            let wanted = name.to_lowercase();
            for group_index in 0..self.groups.len() {
                if group_index == target {
                    continue;
                }
                let group = &mut self.groups[group_index];
                // Reverse scan: swap-remove only ever moves an
                // already-visited channel into the probed slot. There can be
                // multiple channels with the same name, take them all.
                for channel_index in (0..group.channels.len()).rev() {
                    if group.channels[channel_index].name.to_lowercase() == wanted {
                        if let Some(channel) = group.extract_channel(channel_index) {
                            extracted.push(channel);
                        }
                    }
                }
            }
        }
        self.groups[target].channels.extend(extracted);
    }

    /// Pipeline pass 2: apply each group's configured sort rule.
    pub fn sort_groups(&mut self, rules: &[GroupRule]) {
        for group in &mut self.groups {
            let rule = rules.iter().find(|rule| rule.name == group.name);
            group.sort_channels(rule);
        }
    }

    /// Pipeline pass 3: split every configured group into itself and an
    /// "<name> HD" counterpart by the resolution threshold.
    pub fn validate_high_res(&mut self, hd_split: &[String]) {
        let mut validation_list = Vec::new();
        for name in hd_split {
            if let Some((_, group)) = self.find_group(name) {
                if !group.name.contains("HD") && !group.name.contains("4K") {
                    validation_list.push(group.name.clone());
                }
            }
        }
        for name in &validation_list {
            self.check_high_res(name, true);
        }
    }

    /// Partition one group against its HD counterpart. With `full_search`
    /// the counterpart is first merged back into the source so the whole
    /// set is re-validated; without it the counterpart's existing channels
    /// are kept as high-res unchecked.
    pub fn check_high_res(&mut self, group_name: &str, full_search: bool) {
        let source = match self.find_group(group_name) {
            Some((index, _)) => index,
            None => return,
        };
        let hd_name = format!("{group_name} HD");
        let hd = self.ensure_group(&hd_name);

        let mut high = Vec::new();
        let mut low = Vec::new();

        if full_search {
            let (source_group, hd_group) = two_groups_mut(&mut self.groups, source, hd);
            source_group.merge_channels(hd_group);
        } else {
            high.append(&mut self.groups[hd].channels);
        }

        for channel in std::mem::take(&mut self.groups[source].channels) {
            if channel.width >= 1920 || channel.height >= 1080 {
                high.push(channel);
            } else {
                low.push(channel);
            }
        }

        self.groups[source].channels = low;
        self.groups[hd].channels = high;
    }

    /// Pipeline pass 4: rebuild the group sequence following the configured
    /// order; groups not named keep their relative order at the tail,
    /// configured names without a group are skipped.
    pub fn order_groups(&mut self, order: &[String]) {
        if order.is_empty() {
            return;
        }

        let mut slots: Vec<Option<Group>> =
            std::mem::take(&mut self.groups).into_iter().map(Some).collect();
        let mut ordered = Vec::with_capacity(slots.len());

        for name in order {
            let found = slots
                .iter_mut()
                .find(|slot| matches!(slot, Some(group) if &group.name == name));
            if let Some(slot) = found {
                if let Some(group) = slot.take() {
                    ordered.push(group);
                }
            }
        }
        ordered.extend(slots.into_iter().flatten());
        self.groups = ordered;
    }

    /// Serialize the current groups to playlist text. Info lines are
    /// regenerated from channel fields, never replayed from the input.
    pub fn to_m3u(
        &self,
        epg_url: Option<&str>,
        skip_groups: &[String],
        censored_marker: Option<&str>,
    ) -> String {
        let mut out = String::new();
        match epg_url {
            Some(epg) if !epg.is_empty() => {
                out.push_str(&format!("{MARKER} x-tvg-url=\"{epg}\"\n"));
            }
            _ => {
                out.push_str(MARKER);
                out.push('\n');
            }
        }

        for group in &self.groups {
            if skip_groups.iter().any(|skip| skip == &group.name) {
                continue;
            }
            let censored = censored_marker.map_or(false, |marker| group.name.contains(marker));

            for channel in &group.channels {
                out.push_str(&channel.info_line(censored));
                out.push('\n');
                out.push_str(TAG_GROUP);
                out.push_str(&group.name);
                out.push('\n');
                out.push_str(&channel.url);
                out.push('\n');
            }
        }
        out
    }

    pub fn write_file(
        &self,
        path: &str,
        epg_url: Option<&str>,
        skip_groups: &[String],
        censored_marker: Option<&str>,
    ) -> Result<(), AppError> {
        std::fs::write(path, self.to_m3u(epg_url, skip_groups, censored_marker))?;
        info!("Wrote {path}");
        Ok(())
    }

    /// Write every configured output; failures are logged per output and do
    /// not stop the remaining ones.
    pub fn write_files(
        &self,
        outputs: &[OutputConfig],
        epg_url: Option<&str>,
        censored_marker: Option<&str>,
    ) {
        for output in outputs {
            if let Err(err) = self.write_file(
                &output.file,
                epg_url,
                &output.skip_groups,
                censored_marker,
            ) {
                error!("failed to write {}: {err}", output.file);
            }
        }
    }
}

/// Mutable access to two distinct groups at once.
fn two_groups_mut(groups: &mut [Group], first: usize, second: usize) -> (&mut Group, &mut Group) {
    debug_assert_ne!(first, second);
    if first < second {
        let (left, right) = groups.split_at_mut(second);
        (&mut left[first], &mut right[0])
    } else {
        let (left, right) = groups.split_at_mut(first);
        (&mut right[0], &mut left[second])
    }
}
