//! Named ordered collection of channels with the reordering and extraction
//! primitives the pipeline passes are built on.

use crate::config::GroupRule;
use crate::playlist::Channel;

#[derive(Debug, Default)]
pub struct Group {
    pub name: String,
    pub channels: Vec<Channel>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Group {
        Group {
            name: name.into(),
            channels: Vec::new(),
        }
    }

    /// First channel whose name matches case-insensitively.
    pub fn find_channel(&self, channel_name: &str) -> Option<(usize, &Channel)> {
        let wanted = channel_name.to_lowercase();
        self.channels
            .iter()
            .enumerate()
            .find(|(_, channel)| channel.name.to_lowercase() == wanted)
    }

    /// Remove the channel at `index` in O(1) by swapping the last element
    /// into its place. Does NOT preserve the order of the remaining
    /// channels; passes that need an order rebuild it at the destination.
    pub fn extract_channel(&mut self, index: usize) -> Option<Channel> {
        if index >= self.channels.len() {
            return None;
        }
        Some(self.channels.swap_remove(index))
    }

    /// Append all of `other`'s channels to this group, leaving `other`
    /// empty.
    pub fn merge_channels(&mut self, other: &mut Group) {
        self.channels.append(&mut other.channels);
    }

    /// Reorder this group's channels under its configured rule.
    ///
    /// Every channel matching a `begin` name is pulled to the head (all
    /// occurrences, in the order the begin list specifies); for each `end`
    /// name only the first match is pulled to the tail. The remainder is
    /// sorted ascending by sorting name. The begin/end all-vs-first
    /// asymmetry is deliberate and load-bearing.
    pub fn sort_channels(&mut self, rule: Option<&GroupRule>) {
        let empty = Vec::new();
        let (begin, end) = match rule {
            Some(rule) => (&rule.begin, &rule.end),
            None => (&empty, &empty),
        };

        let mut begin_channels = Vec::new();
        for name in begin {
            while let Some((index, _)) = self.find_channel(name) {
                if let Some(channel) = self.extract_channel(index) {
                    begin_channels.push(channel);
                }
            }
        }

        let mut end_channels = Vec::new();
        for name in end {
            if let Some((index, _)) = self.find_channel(name) {
                if let Some(channel) = self.extract_channel(index) {
                    end_channels.push(channel);
                }
            }
        }

        self.channels
            .sort_by(|a, b| a.sorting_name.cmp(&b.sorting_name));

        let sorted = std::mem::take(&mut self.channels);
        begin_channels.extend(sorted);
        begin_channels.extend(end_channels);
        self.channels = begin_channels;
    }
}
