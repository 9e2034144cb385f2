//! Physical gamepad capture feeding the link.

pub mod pad_source;

pub use pad_source::{spawn_pad_source, SourceSettings};
