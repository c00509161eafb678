pub mod auth;
pub mod response;
pub mod roles;
pub mod validate_user;

pub use auth::{authenticate, AuthUser};
pub use response::{ApiResponse, ApiResult};
pub use roles::{require_admin, require_staff};
pub use validate_user::{load_user, CurrentUser};
