// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Sign-in, published content and share-link reads.
// Inputs here come from anonymous callers and are validated before use.

pub mod auth;
pub mod content;
pub mod share;
