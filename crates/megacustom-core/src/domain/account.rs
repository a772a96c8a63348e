//! Account domain entity
//!
//! An [`Account`] pairs a stable identity with the authenticated
//! [`CloudClient`](crate::ports::cloud_client::CloudClient) handle that
//! serves it. Accounts are created on login or session import and destroyed
//! on logout; the session token is held only transiently here, its encrypted
//! persistence belongs to the credential vault.

use std::fmt;
use std::sync::Arc;

use super::newtypes::{AccountId, SessionToken};
use crate::ports::cloud_client::CloudClient;

/// A logged-in cloud account
#[derive(Clone)]
pub struct Account {
    /// Stable identifier for the account's lifetime
    id: AccountId,
    /// Remote account email, stable while the remote identity is unchanged
    email: String,
    /// Display name shown in UIs
    display_name: String,
    /// Authenticated client handle serving this account
    client: Arc<dyn CloudClient>,
    /// Most recent session token, if one was issued or imported
    session: Option<SessionToken>,
}

impl Account {
    pub fn new(
        email: impl Into<String>,
        display_name: impl Into<String>,
        client: Arc<dyn CloudClient>,
    ) -> Self {
        Self {
            id: AccountId::new(),
            email: email.into(),
            display_name: display_name.into(),
            client,
            session: None,
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn client(&self) -> Arc<dyn CloudClient> {
        Arc::clone(&self.client)
    }

    pub fn session(&self) -> Option<&SessionToken> {
        self.session.as_ref()
    }

    pub fn set_session(&mut self, token: SessionToken) {
        self.session = Some(token);
    }

    pub fn clear_session(&mut self) {
        self.session = None;
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field("has_session", &self.session.is_some())
            .finish()
    }
}
