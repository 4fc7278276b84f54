//! Role-based access decisions shared by route guards, navigation and the API.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown role {0}")]
pub struct UnknownRole(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Guest,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Guest => "guest",
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            "guest" => Ok(Role::Guest),
            _ => Err(UnknownRole(value.to_string())),
        }
    }
}

/// What a page or operation demands from the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Access {
    pub allows_guests: bool,
    pub requires_admin: bool,
}

impl Access {
    pub const PUBLIC: Access = Access {
        allows_guests: true,
        requires_admin: false,
    };
    pub const SIGNED_IN: Access = Access {
        allows_guests: false,
        requires_admin: false,
    };
    pub const ADMIN: Access = Access {
        allows_guests: false,
        requires_admin: true,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Render,
    RedirectLogin,
    RedirectHome,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Render)
    }

    /// Where the caller should be sent instead, if anywhere.
    pub fn redirect_target(self) -> Option<&'static str> {
        match self {
            Decision::Render => None,
            Decision::RedirectLogin => Some(LOGIN_PATH),
            Decision::RedirectHome => Some(HOME_PATH),
        }
    }
}

pub const LOGIN_PATH: &str = "/auth";
pub const HOME_PATH: &str = "/";

/// Decide whether `identity` may see something guarded by `access`.
///
/// `identity` is `None` for an unauthenticated caller. Rules apply in order:
/// guest-allowed always renders, anonymous callers go to login, non-admins
/// asking for admin pages go home, everything else renders.
pub fn decide(identity: Option<Role>, access: Access) -> Decision {
    if access.allows_guests {
        return Decision::Render;
    }
    let Some(role) = identity else {
        return Decision::RedirectLogin;
    };
    if access.requires_admin && !role.is_admin() {
        return Decision::RedirectHome;
    }
    Decision::Render
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Page {
    OvertimeInput,
    EmployeeRegistration,
    Reports,
    Export,
    Settings,
    UserManagement,
}

impl Page {
    pub const ALL: [Page; 6] = [
        Page::OvertimeInput,
        Page::EmployeeRegistration,
        Page::Reports,
        Page::Export,
        Page::Settings,
        Page::UserManagement,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Page::OvertimeInput => "/",
            Page::EmployeeRegistration => "/employee-registration",
            Page::Reports => "/reports",
            Page::Export => "/export",
            Page::Settings => "/settings",
            Page::UserManagement => "/users",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Page::OvertimeInput => "Input Overtime",
            Page::EmployeeRegistration => "Employee Registration",
            Page::Reports => "Reports",
            Page::Export => "Export",
            Page::Settings => "Settings",
            Page::UserManagement => "User Management",
        }
    }

    pub fn access(self) -> Access {
        match self {
            Page::OvertimeInput | Page::EmployeeRegistration => Access::PUBLIC,
            Page::Reports | Page::Export | Page::Settings | Page::UserManagement => Access::ADMIN,
        }
    }

    pub fn from_path(path: &str) -> Option<Page> {
        let trimmed = path.trim();
        let normalized = if trimmed.len() > 1 {
            trimmed.trim_end_matches('/')
        } else {
            trimmed
        };
        Page::ALL.into_iter().find(|page| page.path() == normalized)
    }
}

/// Pages a caller would see in the navigation bar.
pub fn navigation(identity: Option<Role>) -> Vec<Page> {
    Page::ALL
        .into_iter()
        .filter(|page| decide(identity, page.access()).is_allowed())
        .collect()
}

/// Guard decision for a route, `None` when the path is not a known page.
pub fn resolve(path: &str, identity: Option<Role>) -> Option<(Page, Decision)> {
    let page = Page::from_path(path)?;
    Some((page, decide(identity, page.access())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guest_pages_render_without_identity() {
        assert_eq!(decide(None, Page::OvertimeInput.access()), Decision::Render);
        assert_eq!(
            decide(None, Page::EmployeeRegistration.access()),
            Decision::Render
        );
    }

    #[test]
    fn anonymous_callers_are_sent_to_login() {
        assert_eq!(decide(None, Access::SIGNED_IN), Decision::RedirectLogin);
        assert_eq!(decide(None, Page::Reports.access()), Decision::RedirectLogin);
    }

    #[test]
    fn admin_pages_redirect_non_admins_home() {
        assert_eq!(
            decide(Some(Role::User), Page::Reports.access()),
            Decision::RedirectHome
        );
        assert_eq!(
            decide(Some(Role::Guest), Page::Settings.access()),
            Decision::RedirectHome
        );
        assert_eq!(decide(Some(Role::Admin), Page::Export.access()), Decision::Render);
    }

    #[test]
    fn guest_allowed_wins_over_admin_requirement() {
        let access = Access {
            allows_guests: true,
            requires_admin: true,
        };
        assert_eq!(decide(None, access), Decision::Render);
    }

    #[test]
    fn navigation_is_filtered_by_role() {
        assert_eq!(
            navigation(Some(Role::User)),
            vec![Page::OvertimeInput, Page::EmployeeRegistration]
        );
        assert_eq!(navigation(Some(Role::Admin)).len(), Page::ALL.len());
        assert_eq!(navigation(None), navigation(Some(Role::Guest)));
    }

    #[test]
    fn resolve_normalizes_trailing_slash() {
        let (page, decision) = resolve("/reports/", Some(Role::User)).unwrap();
        assert_eq!(page, Page::Reports);
        assert_eq!(decision.redirect_target(), Some(HOME_PATH));
        assert!(resolve("/nope", None).is_none());
        assert_eq!(resolve("/", None).map(|(p, _)| p), Some(Page::OvertimeInput));
    }

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!("ADMIN".parse::<Role>(), Ok(Role::Admin));
        assert_eq!(" user ".parse::<Role>(), Ok(Role::User));
        assert!("owner".parse::<Role>().is_err());
    }
}
