//! Playlist data model and transformation pipeline.

pub mod channel;
pub mod group;
pub mod media;

pub use channel::{Channel, RemoteIdentity};
pub use group::Group;
pub use media::{Media, Record};
