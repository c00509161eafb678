pub mod content;
pub mod project;
pub mod settings;
pub mod share;
pub mod tool;
pub mod user;

pub use content::{Collection, Content, ContentFilter, Feedback, IdeaPack, Tag};
pub use project::{Project, ProjectInvite, ProjectMember, ProjectUpdate, ToolAccess};
pub use settings::{AllowListEntry, SiteSettings};
pub use share::{ShareSettings, ShareToken};
pub use tool::ToolInstance;
pub use user::{NewUser, User, UserSummary};
