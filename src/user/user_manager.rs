use super::{
    auth::PasswordHasherKind, AuthToken, AuthTokenValue, PasswordResetToken, UserStore,
    UsernamePasswordCredentials,
};
use crate::discovery::GenreTaxonomy;
use crate::interactions::GenreId;
use anyhow::{bail, Context, Result};
use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};
use tracing::{debug, info};

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub const PASSWORD_RESET_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

pub struct UserManager {
    user_store: Arc<dyn UserStore>,
    taxonomy: GenreTaxonomy,
    password_reset_ttl: Duration,
}

fn check_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        bail!(
            "The password must be at least {} characters long.",
            MIN_PASSWORD_LENGTH
        );
    }
    Ok(())
}

impl UserManager {
    pub fn new(user_store: Arc<dyn UserStore>, taxonomy: GenreTaxonomy) -> Self {
        Self {
            user_store,
            taxonomy,
            password_reset_ttl: PASSWORD_RESET_TOKEN_TTL,
        }
    }

    pub fn with_password_reset_ttl(mut self, ttl: Duration) -> Self {
        self.password_reset_ttl = ttl;
        self
    }

    /// Creates a user with password credentials, returns the new user id.
    pub fn register(&self, user_handle: &str, password: &str) -> Result<usize> {
        let user_handle = user_handle.trim();
        if user_handle.is_empty() {
            bail!("The user handle cannot be empty.");
        }
        check_password(password)?;
        if self.user_store.get_user_id(user_handle)?.is_some() {
            bail!("User handle already exists.");
        }

        let user_id = self.user_store.create_user(user_handle)?;
        let credentials = Self::create_hashed_password(user_id, password)?;
        self.user_store.set_password_credentials(&credentials)?;
        info!("Registered user {} with id {}", user_handle, user_id);
        Ok(user_id)
    }

    fn create_hashed_password(user_id: usize, password: &str) -> Result<UsernamePasswordCredentials> {
        let hasher = PasswordHasherKind::Argon2;
        let salt = hasher.generate_b64_salt();
        let hash = hasher.hash(password.as_bytes(), &salt)?;
        Ok(UsernamePasswordCredentials {
            user_id,
            salt,
            hash,
            hasher,
            created: SystemTime::now(),
            last_tried: None,
            last_used: None,
        })
    }

    /// Verifies the password and issues a new auth token.
    /// Returns Ok(None) when the handle is unknown or the password is wrong.
    pub fn login(&self, user_handle: &str, password: &str) -> Result<Option<AuthToken>> {
        let user_id = match self.user_store.get_user_id(user_handle.trim())? {
            Some(user_id) => user_id,
            None => {
                debug!("Login attempt for unknown handle {}", user_handle);
                return Ok(None);
            }
        };
        let credentials = match self.user_store.get_password_credentials(user_id)? {
            Some(credentials) => credentials,
            None => return Ok(None),
        };

        let verified = credentials.verify(password)?;
        self.user_store
            .touch_password_credentials(user_id, verified)?;
        if !verified {
            debug!("Wrong password for user {}", user_id);
            return Ok(None);
        }

        let token = AuthToken {
            user_id,
            value: AuthTokenValue::generate(),
            created: SystemTime::now(),
            last_used: None,
        };
        self.user_store.add_user_auth_token(token.clone())?;
        Ok(Some(token))
    }

    pub fn logout(&self, user_id: usize, token: &AuthTokenValue) -> Result<()> {
        let stored = self
            .user_store
            .get_user_auth_token(token)?
            .context("Auth token not found.")?;
        if stored.user_id != user_id {
            bail!("Auth token does not belong to user {}.", user_id);
        }
        self.user_store.delete_user_auth_token(token)?;
        Ok(())
    }

    /// Issues a reset token for the handle, replacing any pending one.
    /// Returns Ok(None) when no user has the handle.
    pub fn request_password_reset(&self, user_handle: &str) -> Result<Option<PasswordResetToken>> {
        let user_id = match self.user_store.get_user_id(user_handle.trim())? {
            Some(user_id) => user_id,
            None => {
                debug!("Password reset requested for unknown handle {}", user_handle);
                return Ok(None);
            }
        };
        let token = PasswordResetToken::generate(user_id, self.password_reset_ttl);
        self.user_store.set_password_reset_token(&token)?;
        info!("Issued password reset token for user {}", user_id);
        Ok(Some(token))
    }

    /// Sets a new password through a pending reset token, consuming it.
    /// Returns Ok(false) when the token is unknown, already used or expired.
    pub fn reset_password(&self, token: &str, new_password: &str) -> Result<bool> {
        check_password(new_password)?;
        let reset_token = match self.user_store.take_password_reset_token(token.trim())? {
            Some(reset_token) => reset_token,
            None => return Ok(false),
        };
        if reset_token.is_expired() {
            debug!("Expired password reset token of user {}", reset_token.user_id);
            return Ok(false);
        }

        let credentials = Self::create_hashed_password(reset_token.user_id, new_password)?;
        self.user_store.set_password_credentials(&credentials)?;
        info!("Reset password of user {}", reset_token.user_id);
        Ok(true)
    }

    pub fn get_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        self.user_store.get_user_auth_token(value)
    }

    pub fn update_auth_token_last_used(&self, value: &AuthTokenValue) -> Result<()> {
        self.user_store
            .update_user_auth_token_last_used_timestamp(value)
    }

    pub fn prune_unused_auth_tokens(&self, unused_for_days: u64) -> Result<usize> {
        self.user_store.prune_unused_auth_tokens(unused_for_days)
    }

    pub fn get_user_handle(&self, user_id: usize) -> Result<Option<String>> {
        self.user_store.get_user_handle(user_id)
    }

    pub fn get_preferred_genres(&self, user_id: usize) -> Result<Vec<GenreId>> {
        self.user_store.get_preferred_genres(user_id)
    }

    /// Stores the genres the user picked, dropping unknown and repeated ids.
    /// Returns what was actually stored.
    pub fn set_preferred_genres(&self, user_id: usize, genres: &[GenreId]) -> Result<Vec<GenreId>> {
        let mut accepted: Vec<GenreId> = Vec::with_capacity(genres.len());
        for genre_id in genres {
            if self.taxonomy.contains(*genre_id) && !accepted.contains(genre_id) {
                accepted.push(*genre_id);
            }
        }
        self.user_store.set_preferred_genres(user_id, &accepted)?;
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::SqliteUserStore;
    use tempfile::TempDir;

    fn create_manager_with_reset_ttl(ttl: Duration) -> (UserManager, TempDir) {
        let (manager, temp_dir) = create_manager();
        (manager.with_password_reset_ttl(ttl), temp_dir)
    }

    fn create_manager() -> (UserManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteUserStore::new(temp_dir.path().join("test.db")).unwrap();
        (
            UserManager::new(Arc::new(store), GenreTaxonomy::default()),
            temp_dir,
        )
    }

    #[test]
    fn registers_and_logs_in() {
        let (manager, _temp_dir) = create_manager();

        let user_id = manager.register("alice", "correct horse").unwrap();
        assert_eq!(
            manager.get_user_handle(user_id).unwrap().as_deref(),
            Some("alice")
        );

        let token = manager.login("alice", "correct horse").unwrap().unwrap();
        assert_eq!(token.user_id, user_id);
        assert!(manager.get_auth_token(&token.value).unwrap().is_some());

        assert!(manager.login("alice", "wrong password").unwrap().is_none());
        assert!(manager.login("bob", "correct horse").unwrap().is_none());
    }

    #[test]
    fn rejects_invalid_registrations() {
        let (manager, _temp_dir) = create_manager();

        assert!(manager.register("  ", "long enough").is_err());
        assert!(manager.register("alice", "short").is_err());
        manager.register("alice", "long enough").unwrap();
        let err = manager.register("alice", "long enough").unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn logout_deletes_token() {
        let (manager, _temp_dir) = create_manager();
        let user_id = manager.register("alice", "long enough").unwrap();
        let other_id = manager.register("bob", "long enough").unwrap();
        let token = manager.login("alice", "long enough").unwrap().unwrap();

        assert!(manager.logout(other_id, &token.value).is_err());
        manager.logout(user_id, &token.value).unwrap();
        assert!(manager.get_auth_token(&token.value).unwrap().is_none());
        assert!(manager.logout(user_id, &token.value).is_err());
    }

    #[test]
    fn filters_preferred_genres() {
        let (manager, _temp_dir) = create_manager();
        let user_id = manager.register("alice", "long enough").unwrap();

        let stored = manager
            .set_preferred_genres(user_id, &[152, 0, 9999, 152, 132])
            .unwrap();
        assert_eq!(stored, vec![152, 132]);
        assert_eq!(manager.get_preferred_genres(user_id).unwrap(), vec![152, 132]);
    }

    #[test]
    fn resets_password_with_token() {
        let (manager, _temp_dir) = create_manager();
        let user_id = manager.register("alice", "old password").unwrap();

        assert!(manager.request_password_reset("bob").unwrap().is_none());
        let token = manager.request_password_reset(" alice ").unwrap().unwrap();
        assert_eq!(token.user_id, user_id);

        assert!(manager.reset_password(&token.value, "new password").unwrap());
        assert!(manager.login("alice", "old password").unwrap().is_none());
        assert!(manager.login("alice", "new password").unwrap().is_some());
    }

    #[test]
    fn reset_token_is_single_use() {
        let (manager, _temp_dir) = create_manager();
        manager.register("alice", "old password").unwrap();
        let token = manager.request_password_reset("alice").unwrap().unwrap();

        assert!(manager.reset_password(&token.value, "new password").unwrap());
        assert!(!manager.reset_password(&token.value, "other password").unwrap());
        assert!(manager.login("alice", "new password").unwrap().is_some());
        assert!(!manager.reset_password("not a token", "other password").unwrap());
    }

    #[test]
    fn expired_reset_token_is_refused() {
        let (manager, _temp_dir) = create_manager_with_reset_ttl(Duration::ZERO);
        manager.register("alice", "old password").unwrap();
        let token = manager.request_password_reset("alice").unwrap().unwrap();

        assert!(!manager.reset_password(&token.value, "new password").unwrap());
        assert!(manager.login("alice", "old password").unwrap().is_some());
    }

    #[test]
    fn short_reset_password_keeps_the_token() {
        let (manager, _temp_dir) = create_manager();
        manager.register("alice", "old password").unwrap();
        let token = manager.request_password_reset("alice").unwrap().unwrap();

        assert!(manager.reset_password(&token.value, "short").is_err());
        assert!(manager.reset_password(&token.value, "long enough").unwrap());
    }

    #[test]
    fn newer_reset_request_invalidates_older_token() {
        let (manager, _temp_dir) = create_manager();
        manager.register("alice", "old password").unwrap();
        let first = manager.request_password_reset("alice").unwrap().unwrap();
        let second = manager.request_password_reset("alice").unwrap().unwrap();

        assert!(!manager.reset_password(&first.value, "new password").unwrap());
        assert!(manager.reset_password(&second.value, "new password").unwrap());
    }
}
