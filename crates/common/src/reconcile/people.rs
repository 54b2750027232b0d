//! Person references shared by supervisions, graders and authors

use crate::db::models::User;
use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;
use validator::Validate;

/// A person as submitted by the client.
///
/// Internal users are referenced by `id`; external persons carry their
/// name and email and are matched by email.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PersonInput {
    pub id: Option<String>,

    pub username: Option<String>,

    pub first_name: Option<String>,

    pub last_name: Option<String>,

    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
}

impl PersonInput {
    pub fn internal(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn external(first_name: &str, last_name: &str, email: &str) -> Self {
        Self {
            first_name: Some(first_name.to_string()),
            last_name: Some(last_name.to_string()),
            email: Some(email.to_string()),
            ..Default::default()
        }
    }

    fn trimmed_email(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }
}

/// An external person that has no user row yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExternalUser {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Ids and emails a submission refers to, for a single lookup query
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PeopleQuery {
    pub ids: BTreeSet<String>,
    pub emails: BTreeSet<String>,
}

impl PeopleQuery {
    pub fn collect<'a>(people: impl IntoIterator<Item = &'a PersonInput>) -> Self {
        let mut query = Self::default();
        for person in people {
            if let Some(id) = &person.id {
                query.ids.insert(id.clone());
            }
            if let Some(email) = person.trimmed_email() {
                query.emails.insert(email.to_string());
            }
        }
        query
    }
}

/// Users already in the database that a submission may refer to
#[derive(Debug, Default)]
pub struct KnownUsers {
    external_by_id: HashMap<String, bool>,
    id_by_email: HashMap<String, String>,
}

impl KnownUsers {
    pub fn new<'a>(users: impl IntoIterator<Item = &'a User>) -> Self {
        let mut known = Self::default();
        for user in users {
            known.insert(&user.id, user.email.as_deref(), user.is_external);
        }
        known
    }

    pub fn insert(&mut self, id: &str, email: Option<&str>, is_external: bool) {
        self.external_by_id.insert(id.to_string(), is_external);
        if let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) {
            self.id_by_email
                .entry(email.to_string())
                .or_insert_with(|| id.to_string());
        }
    }

    /// Make users planned by an earlier reconciliation visible to a later one
    pub fn register_new(&mut self, created: &[NewExternalUser]) {
        for user in created {
            self.insert(&user.id, Some(&user.email), true);
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.external_by_id.contains_key(id)
    }
}

/// A submitted person mapped onto a user id
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedPerson {
    pub user_id: String,
    pub is_external: bool,
}

/// Maps person references to user ids, planning new external users on the way
pub(crate) struct Resolver<'a> {
    known: &'a KnownUsers,
    new_users: Vec<NewExternalUser>,
}

impl<'a> Resolver<'a> {
    pub fn new(known: &'a KnownUsers) -> Self {
        Self {
            known,
            new_users: Vec::new(),
        }
    }

    /// Resolve one entry. `external` is the submitted isExternal flag.
    pub fn resolve(
        &mut self,
        field: &str,
        person: Option<&PersonInput>,
        external: bool,
    ) -> Result<ResolvedPerson> {
        let person = person.ok_or_else(|| AppError::validation(field, "User is required"))?;

        if let Some(id) = person.id.as_deref() {
            if let Some(&is_external) = self.known.external_by_id.get(id) {
                return Ok(ResolvedPerson {
                    user_id: id.to_string(),
                    is_external,
                });
            }
            if !external {
                return Err(AppError::validation(field, format!("Unknown user {}", id)));
            }
        } else if !external {
            return Err(AppError::validation(field, "User is required"));
        }

        let email = person
            .trimmed_email()
            .ok_or_else(|| AppError::validation(field, "External person requires an email"))?;

        if let Some(id) = self.known.id_by_email.get(email) {
            let is_external = self.known.external_by_id.get(id).copied().unwrap_or(true);
            return Ok(ResolvedPerson {
                user_id: id.clone(),
                is_external,
            });
        }

        if let Some(pending) = self.new_users.iter().find(|u| u.email == email) {
            return Ok(ResolvedPerson {
                user_id: pending.id.clone(),
                is_external: true,
            });
        }

        let created = NewExternalUser {
            id: Uuid::new_v4().to_string(),
            first_name: person.first_name.clone().unwrap_or_default(),
            last_name: person.last_name.clone().unwrap_or_default(),
            email: email.to_string(),
        };
        let resolved = ResolvedPerson {
            user_id: created.id.clone(),
            is_external: true,
        };
        self.new_users.push(created);

        Ok(resolved)
    }

    pub fn into_new_users(self) -> Vec<NewExternalUser> {
        self.new_users
    }
}
