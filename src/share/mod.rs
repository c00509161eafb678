//! Public share links: what a token reveals.

pub mod redact;

pub use redact::redact;
