/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Site-wide role of a signed-in user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    User,
    Editor,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "USER",
            UserRole::Editor => "EDITOR",
            UserRole::Admin => "ADMIN",
        }
    }

    /// Editors and admins can manage content
    pub fn is_staff(&self) -> bool {
        matches!(self, UserRole::Editor | UserRole::Admin)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

/// Role of a user inside one project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberRole {
    Owner,
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Owner => "OWNER",
            MemberRole::Member => "MEMBER",
        }
    }
}

/// Per-tool access granted to a project member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessLevel {
    View,
    Edit,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::View => "VIEW",
            AccessLevel::Edit => "EDIT",
        }
    }
}

/// The renovation-planning tools a project can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKey {
    MoodBoards,
    FinishDecisions,
    PunchList,
    BidChecklist,
}

impl ToolKey {
    pub const ALL: [ToolKey; 4] = [
        ToolKey::MoodBoards,
        ToolKey::FinishDecisions,
        ToolKey::PunchList,
        ToolKey::BidChecklist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKey::MoodBoards => "mood_boards",
            ToolKey::FinishDecisions => "finish_decisions",
            ToolKey::PunchList => "punch_list",
            ToolKey::BidChecklist => "bid_checklist",
        }
    }
}

/// Project lifecycle state. Archived projects are read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    Active,
    Archived,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "ACTIVE",
            ProjectStatus::Archived => "ARCHIVED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentKind {
    Article,
    Guide,
    Story,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Article => "ARTICLE",
            ContentKind::Guide => "GUIDE",
            ContentKind::Story => "STORY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentStatus {
    Draft,
    Published,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Draft => "DRAFT",
            ContentStatus::Published => "PUBLISHED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! impl_str_enum {
    ($ty:ty, $kind:literal, [$($variant:expr),+ $(,)?]) => {
        impl FromStr for $ty {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                [$($variant),+]
                    .into_iter()
                    .find(|v: &$ty| v.as_str().eq_ignore_ascii_case(s.trim()))
                    .ok_or_else(|| ParseEnumError { kind: $kind, value: s.to_string() })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

impl_str_enum!(UserRole, "user role", [UserRole::User, UserRole::Editor, UserRole::Admin]);
impl_str_enum!(MemberRole, "member role", [MemberRole::Owner, MemberRole::Member]);
impl_str_enum!(AccessLevel, "access level", [AccessLevel::View, AccessLevel::Edit]);
impl_str_enum!(
    ToolKey,
    "tool",
    [ToolKey::MoodBoards, ToolKey::FinishDecisions, ToolKey::PunchList, ToolKey::BidChecklist]
);
impl_str_enum!(ProjectStatus, "project status", [ProjectStatus::Active, ProjectStatus::Archived]);
impl_str_enum!(ContentKind, "content kind", [ContentKind::Article, ContentKind::Guide, ContentKind::Story]);
impl_str_enum!(ContentStatus, "content status", [ContentStatus::Draft, ContentStatus::Published]);

/// Lowercase and trim an email address for storage and comparison
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Minimal structural email check: one '@', non-empty local part, dotted domain
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_keys_round_trip_through_strings() {
        for tool in ToolKey::ALL {
            assert_eq!(tool.as_str().parse::<ToolKey>().unwrap(), tool);
        }
        assert!("kitchen_sink".parse::<ToolKey>().is_err());
    }

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!(" Member ".parse::<MemberRole>().unwrap(), MemberRole::Member);
    }

    #[test]
    fn email_checks() {
        assert_eq!(normalize_email("  Kai@Example.COM "), "kai@example.com");
        assert!(is_valid_email("kai@example.com"));
        assert!(!is_valid_email("kai@localhost"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("kai@@example.com"));
        assert!(!is_valid_email("kai @example.com"));
    }
}
