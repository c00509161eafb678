//! Sign-in gate: who may sign in given maintenance mode and the allowlist.

use crate::database::models::SiteSettings;
use crate::types::UserRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Maintenance,
    NotAllowlisted,
}

/// Everything the gate looks at, gathered by the caller
#[derive(Debug, Clone, Copy)]
pub struct GateInput<'a> {
    pub is_admin_email: bool,
    pub existing_role: Option<UserRole>,
    pub settings: &'a SiteSettings,
    pub allowlisted: bool,
}

pub fn evaluate(input: GateInput<'_>) -> GateDecision {
    let is_admin = input.is_admin_email || input.existing_role.map_or(false, |r| r.is_admin());
    if is_admin {
        return GateDecision::Allow;
    }
    if input.settings.maintenance_mode {
        return GateDecision::Maintenance;
    }
    if input.settings.allowlist_enabled && !input.allowlisted {
        return GateDecision::NotAllowlisted;
    }
    GateDecision::Allow
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(maintenance_mode: bool, allowlist_enabled: bool) -> SiteSettings {
        SiteSettings {
            maintenance_mode,
            allowlist_enabled,
            updated_at: None,
        }
    }

    fn input(settings: &SiteSettings) -> GateInput<'_> {
        GateInput {
            is_admin_email: false,
            existing_role: None,
            settings,
            allowlisted: false,
        }
    }

    #[test]
    fn open_site_allows_everyone() {
        let s = settings(false, false);
        assert_eq!(evaluate(input(&s)), GateDecision::Allow);
    }

    #[test]
    fn admins_pass_maintenance_and_allowlist() {
        let s = settings(true, true);
        let by_email = GateInput { is_admin_email: true, ..input(&s) };
        assert_eq!(evaluate(by_email), GateDecision::Allow);

        let by_role = GateInput { existing_role: Some(UserRole::Admin), ..input(&s) };
        assert_eq!(evaluate(by_role), GateDecision::Allow);

        let editor = GateInput { existing_role: Some(UserRole::Editor), allowlisted: true, ..input(&s) };
        assert_eq!(evaluate(editor), GateDecision::Maintenance);
    }

    #[test]
    fn maintenance_is_checked_before_allowlist() {
        let s = settings(true, true);
        assert_eq!(evaluate(input(&s)), GateDecision::Maintenance);
    }

    #[test]
    fn allowlist_only_applies_when_enabled() {
        let enabled = settings(false, true);
        assert_eq!(evaluate(input(&enabled)), GateDecision::NotAllowlisted);
        assert_eq!(
            evaluate(GateInput { allowlisted: true, ..input(&enabled) }),
            GateDecision::Allow
        );
    }
}
