//! Authentication and role resolution
//!
//! Provides:
//! - Identity extraction from the SSO reverse-proxy headers
//! - The typed [`Role`] computed once per request
//! - The [`Actor`] extractor handlers receive

use crate::config::{AppConfig, AuthConfig};
use crate::db::models::User;
use crate::db::{DbPool, Repository};
use crate::errors::{AppError, Result};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Identity asserted by the SSO proxy for the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub groups: Vec<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub language: Option<String>,
}

impl Identity {
    /// Read the identity headers. Returns `None` when no uid is present.
    pub fn from_headers(headers: &HeaderMap, config: &AuthConfig) -> Option<Self> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        };

        let uid = header(&config.uid_header)?;

        let groups = header(&config.groups_header)
            .map(|raw| {
                raw.split(config.group_separator.as_str())
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            uid,
            groups,
            email: header(&config.email_header),
            first_name: header(&config.first_name_header),
            last_name: header(&config.last_name_header),
            language: header(&config.language_header),
        })
    }
}

/// What a caller may do with theses, resolved once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Unrestricted
    Admin,
    /// Manages the listed programs (and may also supervise theses)
    ProgramManager(BTreeSet<String>),
    /// Employee without management rights: acts on the theses they supervise
    Supervisor,
    /// No thesis-viewing role at all
    Anonymous,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Admins, managers and supervising teachers
    pub fn is_employee(&self) -> bool {
        !matches!(self, Role::Anonymous)
    }

    pub fn managed_program_ids(&self) -> Option<&BTreeSet<String>> {
        match self {
            Role::ProgramManager(ids) => Some(ids),
            _ => None,
        }
    }

    pub fn manages(&self, program_id: &str) -> bool {
        self.managed_program_ids()
            .map(|ids| ids.contains(program_id))
            .unwrap_or(false)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::ProgramManager(_) => "program_manager",
            Role::Supervisor => "supervisor",
            Role::Anonymous => "anonymous",
        }
    }
}

/// Compute the caller's role. Admin short-circuits everything else.
pub fn resolve_role(
    is_admin: bool,
    groups: &[String],
    managed_program_ids: BTreeSet<String>,
    config: &AuthConfig,
) -> Role {
    let in_any = |wanted: &[String]| groups.iter().any(|g| wanted.contains(g));

    if is_admin || in_any(&config.admin_groups) {
        Role::Admin
    } else if !managed_program_ids.is_empty() {
        Role::ProgramManager(managed_program_ids)
    } else if in_any(&config.employee_groups) {
        Role::Supervisor
    } else {
        Role::Anonymous
    }
}

/// The authenticated caller: their user row plus the resolved role
#[derive(Debug, Clone)]
pub struct Actor {
    pub user: User,
    pub role: Role,
}

impl Actor {
    pub fn new(user: User, role: Role) -> Self {
        Self { user, role }
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Whether the caller holds authority over every status of theses in `program_id`
    pub fn has_program_authority(&self, program_id: &str) -> bool {
        self.role.is_admin() || self.role.manages(program_id)
    }

    /// Reject callers with no thesis-viewing role
    pub fn require_employee(&self) -> Result<()> {
        if self.role.is_employee() {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.user.id, "Caller has no thesis-viewing role");
            crate::metrics::record_authorization_denial("not_employee");
            Err(AppError::NotAuthenticated {
                message: "User does not have access to theses".to_string(),
            })
        }
    }
}

/// Axum extractor for Actor.
///
/// Upserts the caller's user row from the identity headers, then resolves the
/// role from the admin flag, group memberships and program managements.
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
    Arc<AppConfig>: FromRef<S>,
    DbPool: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let config = Arc::<AppConfig>::from_ref(state);

        let identity = Identity::from_headers(&parts.headers, &config.auth)
            .ok_or_else(|| AppError::NotAuthenticated {
                message: "Missing identity".to_string(),
            })?;

        let repo = Repository::new(DbPool::from_ref(state));
        let user = repo.upsert_sso_user(&identity).await?;
        let managed = repo.managed_program_ids(&user.id).await?;

        let role = resolve_role(user.is_admin, &identity.groups, managed, &config.auth);

        tracing::debug!(
            user_id = %user.id,
            role = role.as_str(),
            "Resolved request actor"
        );

        Ok(Actor::new(user, role))
    }
}
