//! Mirrors identity-provider users into the local `users` table.

use chrono::Utc;
use diesel::dsl::exists;
use diesel::prelude::*;

use murmur_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{IdentityPatch, NewUser, User};
use crate::schema::users;

/// Width of `users.username`.
const MAX_USERNAME_CHARS: usize = 64;
/// Width of `users.display_name`.
const MAX_DISPLAY_NAME_CHARS: usize = 100;
/// Longest generated base, leaving room for a numeric suffix in the column.
const MAX_USERNAME_BASE_CHARS: usize = 56;
/// Suffixes tried before giving up on a base.
const MAX_USERNAME_CANDIDATES: usize = 1000;
/// Inserts retried after losing a username race.
const MAX_INSERT_ATTEMPTS: usize = 3;

/// Provider-agnostic view of an identity record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityProfile {
    pub external_id: String,
    pub email: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image_url: Option<String>,
}

impl IdentityProfile {
    pub fn email_local_part(&self) -> &str {
        self.email.split('@').next().unwrap_or_default()
    }

    /// "First Last", else whichever part exists, else the email local part.
    /// Clipped to the column width.
    pub fn display_name(&self) -> String {
        let full = match (non_blank(&self.first_name), non_blank(&self.last_name)) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(only), None) | (None, Some(only)) => only.to_string(),
            (None, None) => self.email_local_part().to_string(),
        };
        clip(&full, MAX_DISPLAY_NAME_CHARS).trim_end().to_string()
    }

    /// The handle chosen at the provider, if any, clipped to the column width.
    pub fn handle(&self) -> Option<&str> {
        non_blank(&self.username).map(|handle| clip(handle, MAX_USERNAME_CHARS))
    }

    pub fn avatar(&self) -> Option<&str> {
        non_blank(&self.image_url)
    }

    fn username_base(&self) -> String {
        let base = self.handle().unwrap_or_else(|| self.email_local_part());
        clip(base, MAX_USERNAME_BASE_CHARS).to_string()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// First `max` characters of `value`.
fn clip(value: &str, max: usize) -> &str {
    match value.char_indices().nth(max) {
        Some((end, _)) => &value[..end],
        None => value,
    }
}

/// First free name in `base`, `base1`, `base2`, ...
pub fn derive_username(
    base: &str,
    mut is_taken: impl FnMut(&str) -> AppResult<bool>,
) -> AppResult<String> {
    for n in 0..MAX_USERNAME_CANDIDATES {
        let candidate = if n == 0 { base.to_string() } else { format!("{base}{n}") };
        if !is_taken(&candidate)? {
            return Ok(candidate);
        }
    }
    Err(AppError::new(
        ErrorCode::UsernameTaken,
        format!("no free username derived from '{base}'"),
    ))
}

fn username_taken(conn: &mut PgConnection, username: &str) -> AppResult<bool> {
    Ok(diesel::select(exists(users::table.filter(users::username.eq(username)))).get_result(conn)?)
}

#[derive(Debug, Clone)]
pub enum CreateOutcome {
    Created(User),
    AlreadyExists,
}

/// Handles `user.created`. Redelivery of the same event is a no-op.
pub fn sync_created(conn: &mut PgConnection, profile: &IdentityProfile) -> AppResult<CreateOutcome> {
    let base = profile.username_base();
    let display_name = profile.display_name();

    for attempt in 1..=MAX_INSERT_ATTEMPTS {
        let username = derive_username(&base, |candidate| username_taken(conn, candidate))?;

        let new_user = NewUser {
            external_id: &profile.external_id,
            email: &profile.email,
            username: &username,
            display_name: &display_name,
            profile_image_url: profile.avatar(),
        };

        let inserted = diesel::insert_into(users::table)
            .values(&new_user)
            .on_conflict(users::external_id)
            .do_nothing()
            .returning(User::as_returning())
            .get_result::<User>(conn)
            .optional()
            .map_err(AppError::from);

        match inserted {
            Ok(Some(user)) => {
                tracing::info!(user_id = %user.id, username = %user.username, "user created from identity provider");
                return Ok(CreateOutcome::Created(user));
            }
            Ok(None) => {
                tracing::info!(external_id = %profile.external_id, "user already exists");
                return Ok(CreateOutcome::AlreadyExists);
            }
            Err(e) if e.is_unique_violation() => {
                tracing::warn!(username = %username, attempt, "username claimed concurrently, retrying");
            }
            Err(e) => return Err(e),
        }
    }

    Err(AppError::new(ErrorCode::UsernameTaken, "could not claim a unique username"))
}

#[derive(Debug, Clone)]
pub struct UpdatedIdentity {
    pub user: User,
    pub previous_username: String,
}

/// Handles `user.updated`. The username and avatar only change when the
/// provider sends them.
pub fn sync_updated(conn: &mut PgConnection, profile: &IdentityProfile) -> AppResult<UpdatedIdentity> {
    let display_name = profile.display_name();

    conn.transaction::<_, AppError, _>(|conn| {
        let previous_username = users::table
            .filter(users::external_id.eq(&profile.external_id))
            .select(users::username)
            .for_update()
            .first::<String>(conn)
            .optional()?
            .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))?;

        let patch = IdentityPatch {
            email: &profile.email,
            display_name: &display_name,
            username: profile.handle(),
            profile_image_url: profile.avatar(),
            updated_at: Utc::now(),
        };

        let user = diesel::update(users::table.filter(users::external_id.eq(&profile.external_id)))
            .set(&patch)
            .returning(User::as_returning())
            .get_result::<User>(conn)
            .map_err(|e| {
                let e = AppError::from(e);
                if e.is_unique_violation() {
                    AppError::new(ErrorCode::UsernameTaken, "username is already taken")
                } else {
                    e
                }
            })?;

        tracing::info!(user_id = %user.id, "user updated from identity provider");
        Ok(UpdatedIdentity { user, previous_username })
    })
}

/// Handles `user.deleted`. `None` when there was nothing to delete.
pub fn sync_deleted(conn: &mut PgConnection, external_id: &str) -> AppResult<Option<User>> {
    let deleted = diesel::delete(users::table.filter(users::external_id.eq(external_id)))
        .returning(User::as_returning())
        .get_result::<User>(conn)
        .optional()?;

    match &deleted {
        Some(user) => tracing::info!(user_id = %user.id, "user deleted from identity provider"),
        None => tracing::info!(external_id = %external_id, "user already deleted"),
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(first: Option<&str>, last: Option<&str>, username: Option<&str>) -> IdentityProfile {
        IdentityProfile {
            external_id: "user_2abc".into(),
            email: "alice@example.com".into(),
            username: username.map(Into::into),
            first_name: first.map(Into::into),
            last_name: last.map(Into::into),
            image_url: None,
        }
    }

    #[test]
    fn display_name_fallbacks() {
        assert_eq!(profile(Some("Alice"), Some("Liddell"), None).display_name(), "Alice Liddell");
        assert_eq!(profile(Some("Alice"), None, None).display_name(), "Alice");
        assert_eq!(profile(None, Some("Liddell"), None).display_name(), "Liddell");
        assert_eq!(profile(None, None, None).display_name(), "alice");
        assert_eq!(profile(Some("  "), Some(""), None).display_name(), "alice");
    }

    #[test]
    fn handle_wins_over_email() {
        assert_eq!(profile(None, None, Some("wonder")).username_base(), "wonder");
        assert_eq!(profile(None, None, Some(" ")).username_base(), "alice");
    }

    #[test]
    fn long_bases_are_truncated() {
        let mut p = profile(None, None, None);
        p.email = format!("{}@example.com", "a".repeat(80));
        assert_eq!(p.username_base().chars().count(), MAX_USERNAME_BASE_CHARS);
    }

    #[test]
    fn long_names_fit_their_columns() {
        let first = "F".repeat(60);
        let last = "L".repeat(60);
        let name = profile(Some(&first), Some(&last), None).display_name();
        assert_eq!(name.chars().count(), MAX_DISPLAY_NAME_CHARS);
        assert!(name.starts_with(&first));

        let handle = "h".repeat(90);
        let p = profile(None, None, Some(&handle));
        assert_eq!(p.handle().map(|h| h.chars().count()), Some(MAX_USERNAME_CHARS));
    }

    #[test]
    fn clipping_counts_characters() {
        assert_eq!(clip("ééééé", 3), "ééé");
        assert_eq!(clip("abc", 10), "abc");
        // Cut right after the space: the trailing blank is trimmed.
        let mut p = profile(Some(&"a".repeat(99)), Some("Liddell"), None);
        assert_eq!(p.display_name(), "a".repeat(99));
        p.first_name = Some("ü".repeat(150));
        assert_eq!(p.display_name(), "ü".repeat(100));
    }

    #[test]
    fn derive_username_appends_suffix() {
        let taken = ["alice", "alice1"];
        let name = derive_username("alice", |c| Ok(taken.contains(&c))).unwrap();
        assert_eq!(name, "alice2");

        let free = derive_username("bob", |_| Ok(false)).unwrap();
        assert_eq!(free, "bob");
    }

    #[test]
    fn derive_username_is_bounded() {
        let err = derive_username("crowded", |_| Ok(true)).unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::UsernameTaken));
    }

    #[test]
    fn derive_username_propagates_lookup_errors() {
        let err = derive_username("alice", |_| Err(AppError::internal("db down"))).unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::InternalError));
    }
}
