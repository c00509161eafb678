pub mod auth;
pub mod projects;
pub mod share;
pub mod tool;
