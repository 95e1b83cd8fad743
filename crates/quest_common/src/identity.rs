//! Authenticated identity seam.
//!
//! The engine trusts whatever the provider says and performs no credential
//! checks of its own.

use quest_shared::AccountId;
use std::collections::HashMap;

/// What the caller presented with a request
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub token: Option<String>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }
}

/// Outcome of identifying a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    Authenticated { account_id: AccountId },
}

impl Identity {
    pub fn account_id(&self) -> Option<AccountId> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated { account_id } => Some(*account_id),
        }
    }
}

pub trait IdentityProvider: Send + Sync {
    fn identify(&self, request: &RequestContext) -> Identity;
}

/// Same identity for every request (CLI, tests)
#[derive(Debug, Clone, Copy)]
pub struct StaticIdentity(pub Identity);

impl StaticIdentity {
    pub fn account(account_id: AccountId) -> Self {
        Self(Identity::Authenticated { account_id })
    }

    pub fn anonymous() -> Self {
        Self(Identity::Anonymous)
    }
}

impl IdentityProvider for StaticIdentity {
    fn identify(&self, _request: &RequestContext) -> Identity {
        self.0
    }
}

/// Looks bearer tokens up in a fixed table
#[derive(Debug, Clone, Default)]
pub struct TokenTable {
    tokens: HashMap<String, AccountId>,
}

impl TokenTable {
    pub fn insert(&mut self, token: impl Into<String>, account_id: AccountId) {
        self.tokens.insert(token.into(), account_id);
    }
}

impl IdentityProvider for TokenTable {
    fn identify(&self, request: &RequestContext) -> Identity {
        request
            .token
            .as_deref()
            .and_then(|t| self.tokens.get(t))
            .map(|&account_id| Identity::Authenticated { account_id })
            .unwrap_or(Identity::Anonymous)
    }
}
