//! Account registry
//!
//! Holds every logged-in [`Account`] and designates one of them as *active*.
//! New operations are routed to the active account by default; switching
//! emits [`Event::ActiveAccountChanged`] so subsystems rebind their views to
//! the new account's client.
//!
//! Invariant: exactly one account is active whenever the set is non-empty.

use std::sync::Arc;

use tracing::info;

use crate::domain::account::Account;
use crate::domain::newtypes::{AccountId, SessionToken};
use crate::error::{Error, Result};
use crate::events::{Event, EventBus};
use crate::ports::cloud_client::CloudClient;

/// Registry of logged-in accounts with a single active selection
pub struct AccountRegistry {
    accounts: Vec<Account>,
    active_id: Option<AccountId>,
    events: EventBus,
}

impl AccountRegistry {
    pub fn new(events: EventBus) -> Self {
        Self {
            accounts: Vec::new(),
            active_id: None,
            events,
        }
    }

    /// Register an already-authenticated client as a new account
    ///
    /// The first registered account becomes active.
    pub fn register_existing(
        &mut self,
        email: impl Into<String>,
        display_name: impl Into<String>,
        client: Arc<dyn CloudClient>,
    ) -> AccountId {
        let account = Account::new(email, display_name, client);
        let id = account.id();
        info!(account = %id, email = account.email(), "Registering account");
        self.accounts.push(account);

        if self.active_id.is_none() {
            self.active_id = Some(id);
            self.events.publish(Event::ActiveAccountChanged { account_id: id });
        }
        id
    }

    /// Make the given account the active one
    pub fn switch(&mut self, id: AccountId) -> Result<()> {
        if !self.accounts.iter().any(|a| a.id() == id) {
            return Err(Error::not_found(format!("account {id}")));
        }
        if self.active_id != Some(id) {
            self.active_id = Some(id);
            info!(account = %id, "Switched active account");
            self.events.publish(Event::ActiveAccountChanged { account_id: id });
        }
        Ok(())
    }

    /// All registered accounts
    pub fn all(&self) -> &[Account] {
        &self.accounts
    }

    /// The active account, `None` only when the registry is empty
    pub fn active(&self) -> Option<&Account> {
        let id = self.active_id?;
        self.accounts.iter().find(|a| a.id() == id)
    }

    /// Look up an account by id
    pub fn get(&self, id: AccountId) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id() == id)
    }

    /// Store a fresh session token on an account
    pub fn update_session(&mut self, id: AccountId, token: SessionToken) -> Result<()> {
        let account = self
            .accounts
            .iter_mut()
            .find(|a| a.id() == id)
            .ok_or_else(|| Error::not_found(format!("account {id}")))?;
        account.set_session(token);
        Ok(())
    }

    /// Remove an account from the registry
    ///
    /// If the removed account was active, the first remaining account (if
    /// any) becomes active and a change event is emitted.
    pub fn remove(&mut self, id: AccountId) -> Result<()> {
        let idx = self
            .accounts
            .iter()
            .position(|a| a.id() == id)
            .ok_or_else(|| Error::not_found(format!("account {id}")))?;
        self.accounts.remove(idx);
        info!(account = %id, "Removed account");

        if self.active_id == Some(id) {
            self.active_id = self.accounts.first().map(|a| a.id());
            if let Some(next) = self.active_id {
                self.events
                    .publish(Event::ActiveAccountChanged { account_id: next });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::memory::MemoryCloudClient;

    fn client() -> Arc<dyn CloudClient> {
        Arc::new(MemoryCloudClient::new())
    }

    #[test]
    fn test_first_account_becomes_active() {
        let mut registry = AccountRegistry::new(EventBus::new());
        assert!(registry.active().is_none());

        let id = registry.register_existing("a@example.com", "A", client());
        assert_eq!(registry.active().unwrap().id(), id);
    }

    #[test]
    fn test_switch_routes_to_other_account() {
        let mut registry = AccountRegistry::new(EventBus::new());
        let a = registry.register_existing("a@example.com", "A", client());
        let b = registry.register_existing("b@example.com", "B", client());
        assert_eq!(registry.active().unwrap().id(), a);

        registry.switch(b).unwrap();
        assert_eq!(registry.active().unwrap().id(), b);
        assert_eq!(registry.active().unwrap().email(), "b@example.com");
    }

    #[test]
    fn test_switch_unknown_fails() {
        let mut registry = AccountRegistry::new(EventBus::new());
        registry.register_existing("a@example.com", "A", client());

        let err = registry.switch(AccountId::new()).unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::NotFound);
    }

    #[test]
    fn test_remove_active_promotes_next() {
        let mut registry = AccountRegistry::new(EventBus::new());
        let a = registry.register_existing("a@example.com", "A", client());
        let b = registry.register_existing("b@example.com", "B", client());

        registry.remove(a).unwrap();
        assert_eq!(registry.active().unwrap().id(), b);

        registry.remove(b).unwrap();
        assert!(registry.active().is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_switch_emits_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let mut registry = AccountRegistry::new(bus);

        let a = registry.register_existing("a@example.com", "A", client());
        let b = registry.register_existing("b@example.com", "B", client());
        registry.switch(b).unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let Event::ActiveAccountChanged { account_id } = event {
                seen.push(account_id);
            }
        }
        assert_eq!(seen, vec![a, b]);
    }

    #[test]
    fn test_update_session() {
        let mut registry = AccountRegistry::new(EventBus::new());
        let id = registry.register_existing("a@example.com", "A", client());
        assert!(registry.get(id).unwrap().session().is_none());

        registry
            .update_session(id, SessionToken::new(b"tok".to_vec()))
            .unwrap();
        assert!(registry.get(id).unwrap().session().is_some());
    }
}
