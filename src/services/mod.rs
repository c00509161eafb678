//! Application services. Handlers call these; these call the store.

pub mod access;
pub mod admin;
pub mod content;
pub mod projects;
pub mod shares;
pub mod sign_in;
pub mod tools;
pub mod transfer;

pub use access::{authorize, capability, Capability};
pub use projects::ProjectService;
