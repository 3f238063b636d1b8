pub mod auth;
mod sqlite_user_store;
mod user_manager;
mod user_store;

pub use auth::{AuthToken, AuthTokenValue, PasswordResetToken, UsernamePasswordCredentials};
pub use sqlite_user_store::SqliteUserStore;
pub use user_manager::{UserManager, MIN_PASSWORD_LENGTH, PASSWORD_RESET_TOKEN_TTL};
pub use user_store::{
    FullUserStore, UserAuthCredentialsStore, UserAuthTokenStore, UserPasswordResetStore,
    UserStore,
};
