//! Library crate for the M3U curator.
//!
//! The curator ingests raw IPTV playlists, restructures their channels into
//! configured groups (forced membership, custom ordering, HD splitting),
//! enriches channels with probed stream metadata and re-emits cleaned
//! playlist files.

pub mod config;
pub mod errors;
pub mod models;
pub mod playlist;
pub mod probe;
pub mod repositories;
pub mod services;
pub mod utils;
