// handlers/elevated/mod.rs - Back-office handlers
//
// Staff (EDITOR or ADMIN): content, taxonomy, feedback, import/export.
// Admin only: site settings, allowlist, user roles.
// Middleware: authenticate → load_user → require_staff / require_admin.

pub mod content;
pub mod feedback;
pub mod settings;
pub mod taxonomy;
pub mod transfer;
pub mod users;
