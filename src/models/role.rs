use super::ids::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    ProjectLead,
    Assembler,
}

impl Role {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            Role::ProjectLead => "project_lead",
            Role::Assembler => "assembler",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "project_lead" => Some(Role::ProjectLead),
            "assembler" => Some(Role::Assembler),
            _ => None,
        }
    }

    /// Where a user of this role lands after signing in.
    pub fn home_route(&self) -> Route {
        match self {
            Role::ProjectLead => Route::Dashboard,
            Role::Assembler => Route::AssemblerConsole,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

/// Protected views of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Dashboard,
    Projects,
    AssemblerConsole,
    WorkHistory,
}

impl Route {
    /// `None` means any signed-in user may open the view.
    pub fn required_role(&self) -> Option<Role> {
        match self {
            Route::Dashboard | Route::Projects => Some(Role::ProjectLead),
            Route::AssemblerConsole => Some(Role::Assembler),
            Route::WorkHistory => None,
        }
    }

    pub fn permits(&self, role: Role) -> bool {
        self.required_role().is_none_or(|required| required == role)
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Dashboard => "/dashboard",
            Route::Projects => "/projects",
            Route::AssemblerConsole => "/assembler",
            Route::WorkHistory => "/work-history",
        }
    }
}

/// The signed-in actor, as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: UserId,
    pub role: Role,
}
