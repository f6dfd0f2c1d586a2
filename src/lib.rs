//! # Postboard
//!
//! `postboard` is a small multi-user publishing service. Anyone can read the
//! posts; registered users log in with a username and password and may only
//! edit or delete the posts they wrote.
//!
//! ## Components
//!
//! - **Credential store** ([`store::CredentialStore`]): registers users and
//!   keeps Argon2id password hashes ([`password::Hasher`]).
//! - **Session authenticator** ([`api::identity::Authenticator`]): verifies
//!   credentials and binds a signed, client-side [`api::session::Session`] to
//!   the logged-in user. The current user is resolved once per request.
//! - **Authorization gate** ([`api::identity::login_required`]): middleware
//!   that redirects anonymous requests to `/auth/login`.
//! - **Post repository** ([`store::PostRepository`]): every mutation checks
//!   ownership through a single [`store::OwnershipCheck`] before writing.
//! - **Handlers** ([`api::handlers`]): the only place a domain [`Error`]
//!   becomes an HTTP status.
//!
//! ## Storage
//!
//! SQLite through `sqlx`. Each mutation runs in its own transaction and is
//! committed before the handler responds.

pub mod api;
pub mod cli;
pub mod error;
pub mod model;
pub mod password;
pub mod store;

pub use error::{Error, Result};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
