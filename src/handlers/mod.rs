// handlers/mod.rs - Three-tier handler layout
//
// Public (no auth) → Protected (session JWT + loaded user) → Elevated (staff or admin role)
//
// Handlers stay thin: extract, call a service, wrap the result in ApiResponse.

pub mod elevated;
pub mod protected;
pub mod public;
