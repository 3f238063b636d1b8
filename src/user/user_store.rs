use super::auth::{AuthToken, AuthTokenValue, PasswordResetToken, UsernamePasswordCredentials};
use crate::interactions::{GenreId, InteractionStore};
use anyhow::Result;

pub trait UserAuthCredentialsStore: Send + Sync {
    /// Returns the password credentials of a user.
    /// Returns Ok(None) if the user does not exist or has no password.
    /// Returns Err if there is a database error.
    fn get_password_credentials(
        &self,
        user_id: usize,
    ) -> Result<Option<UsernamePasswordCredentials>>;

    /// Creates or replaces the password credentials of a user.
    fn set_password_credentials(&self, credentials: &UsernamePasswordCredentials) -> Result<()>;

    /// Marks a login attempt, `succeeded` also bumps last_used.
    fn touch_password_credentials(&self, user_id: usize, succeeded: bool) -> Result<()>;
}

pub trait UserAuthTokenStore: Send + Sync {
    /// Returns a user's authentication token given an AuthTokenValue.
    /// Returns Ok(None) if the token does not exist.
    /// Returns Err if there is a database error.
    fn get_user_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>>;

    /// Deletes an auth token given the token value.
    /// Returns Ok(None) if the token does not exist.
    fn delete_user_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>>;

    /// Updates an auth token with the latest timestamp.
    fn update_user_auth_token_last_used_timestamp(&self, token: &AuthTokenValue) -> Result<()>;

    /// Adds a new auth token.
    fn add_user_auth_token(&self, token: AuthToken) -> Result<()>;

    /// Deletes tokens that haven't been used (or created, if never used)
    /// in the given number of days. Returns the number of deleted tokens.
    fn prune_unused_auth_tokens(&self, unused_for_days: u64) -> Result<usize>;
}

pub trait UserPasswordResetStore: Send + Sync {
    /// Stores a reset token, replacing the pending one of the same user.
    fn set_password_reset_token(&self, token: &PasswordResetToken) -> Result<()>;

    /// Removes and returns the reset token with the given value.
    /// Returns Ok(None) if no such token is pending.
    fn take_password_reset_token(&self, value: &str) -> Result<Option<PasswordResetToken>>;
}

pub trait UserStore:
    UserAuthTokenStore + UserAuthCredentialsStore + UserPasswordResetStore + Send + Sync
{
    /// Creates a new user and returns the user id.
    fn create_user(&self, user_handle: &str) -> Result<usize>;

    /// Returns Ok(None) if the user does not exist.
    fn get_user_handle(&self, user_id: usize) -> Result<Option<String>>;

    /// Returns Ok(None) if no user has the given handle.
    fn get_user_id(&self, user_handle: &str) -> Result<Option<usize>>;

    /// Returns the user's preferred genres, in insertion order.
    fn get_preferred_genres(&self, user_id: usize) -> Result<Vec<GenreId>>;

    /// Replaces the user's preferred genres.
    fn set_preferred_genres(&self, user_id: usize, genres: &[GenreId]) -> Result<()>;
}

/// Everything the server needs from its single database.
pub trait FullUserStore: UserStore + InteractionStore {}

impl<T: UserStore + InteractionStore> FullUserStore for T {}
