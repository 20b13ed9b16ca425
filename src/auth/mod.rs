//! Login-token authentication
//!
//! Provides:
//! - Login token hashing and generation
//! - Token lifetime policy
//! - The [UserStore] collaborator trait
//! - [AuthResolver], turning an `Authorization` value into an identity

mod resolver;
mod store;
mod token;

pub use resolver::{AuthResolver, AuthenticatedIdentity};
pub use store::{LoginToken, LoginTokenMatch, UserRecord, UserStore};
pub use token::{
    DEFAULT_LOGIN_EXPIRATION_DAYS, TokenPolicy, generate_login_token, hash_login_token,
};
