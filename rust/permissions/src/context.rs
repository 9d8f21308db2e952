//! Cache-context resolution.
//!
//! A cache context names an axis the calculated permissions vary by
//! (`user`, `user.roles`). The chain resolves each persistent context to a
//! concrete value for the requested account and folds it into the cache key.
//!
//! Resolution takes the account explicitly. Hosts whose context values can
//! only be read from an ambient "current account" plug in through
//! [`AmbientContextResolver`], which binds the requested account for the
//! duration of the lookup and always restores the previous one.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::{PermissionError, Result};
use crate::types::Account;

/// Varies by account identity.
pub const USER_CONTEXT: &str = "user";

/// Varies by the account's global role set.
pub const USER_ROLES_CONTEXT: &str = "user.roles";

pub trait CacheContextResolver: Send + Sync {
    /// Value of `context` for `account`.
    fn resolve(&self, context: &str, account: &Account) -> Result<String>;

    /// Resolve every context, in order.
    fn resolve_all(
        &self,
        contexts: &BTreeSet<String>,
        account: &Account,
    ) -> Result<Vec<(String, String)>> {
        contexts
            .iter()
            .map(|context| Ok((context.clone(), self.resolve(context, account)?)))
            .collect()
    }
}

/// Value of one of the account-derived contexts.
fn account_context_value(context: &str, account: &Account) -> Result<String> {
    match context {
        USER_CONTEXT => Ok(account.id.to_string()),
        // JSON array of the sorted roles: {"a","b"} and {"a,b"} must differ.
        USER_ROLES_CONTEXT => Ok(serde_json::to_string(&account.roles)?),
        other => Err(PermissionError::UnknownCacheContext(other.to_string())),
    }
}

/// Resolves `user` and `user.roles` straight from the account argument.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountContextResolver;

impl CacheContextResolver for AccountContextResolver {
    fn resolve(&self, context: &str, account: &Account) -> Result<String> {
        account_context_value(context, account)
    }
}

// ============================================================================
// Ambient current-account adapter
// ============================================================================

/// Host-provided "current account" slot.
///
/// Must be request-local in a multi-threaded host: one slot per request,
/// never a process-wide global.
pub trait CurrentAccount: Send + Sync {
    fn current(&self) -> Account;
    fn set_current(&self, account: Account);
}

/// A request-local current-account slot.
#[derive(Debug)]
pub struct RequestAccount {
    slot: Mutex<Account>,
}

impl RequestAccount {
    pub fn new(account: Account) -> Self {
        Self {
            slot: Mutex::new(account),
        }
    }
}

impl CurrentAccount for RequestAccount {
    fn current(&self) -> Account {
        self.slot.lock().clone()
    }

    fn set_current(&self, account: Account) {
        *self.slot.lock() = account;
    }
}

/// Binds an account as current until dropped, then restores the previous one.
///
/// Restoration runs in `Drop`, so it happens on every exit path: early
/// returns, `?` errors and unwinding panics.
pub struct AccountSwitch<'a> {
    current: &'a dyn CurrentAccount,
    previous: Option<Account>,
}

impl<'a> AccountSwitch<'a> {
    pub fn switch_to(current: &'a dyn CurrentAccount, account: Account) -> Self {
        let previous = current.current();
        current.set_current(account);
        Self {
            current,
            previous: Some(previous),
        }
    }
}

impl Drop for AccountSwitch<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.current.set_current(previous);
        }
    }
}

/// Context values a host can only compute from its ambient current account.
pub trait AmbientCacheContexts: Send + Sync {
    fn value(&self, context: &str) -> Result<String>;
}

/// Reads `user` / `user.roles` from a [`CurrentAccount`] slot.
pub struct CurrentAccountContexts {
    current: Arc<dyn CurrentAccount>,
}

impl CurrentAccountContexts {
    pub fn new(current: Arc<dyn CurrentAccount>) -> Self {
        Self { current }
    }
}

impl AmbientCacheContexts for CurrentAccountContexts {
    fn value(&self, context: &str) -> Result<String> {
        account_context_value(context, &self.current.current())
    }
}

/// Adapts ambient context values to explicit-account resolution.
pub struct AmbientContextResolver {
    current: Arc<dyn CurrentAccount>,
    contexts: Arc<dyn AmbientCacheContexts>,
}

impl AmbientContextResolver {
    pub fn new(current: Arc<dyn CurrentAccount>, contexts: Arc<dyn AmbientCacheContexts>) -> Self {
        Self { current, contexts }
    }
}

impl CacheContextResolver for AmbientContextResolver {
    fn resolve(&self, context: &str, account: &Account) -> Result<String> {
        let _switch = AccountSwitch::switch_to(self.current.as_ref(), account.clone());
        self.contexts.value(context)
    }

    fn resolve_all(
        &self,
        contexts: &BTreeSet<String>,
        account: &Account,
    ) -> Result<Vec<(String, String)>> {
        // One switch for the whole key.
        let _switch = AccountSwitch::switch_to(self.current.as_ref(), account.clone());
        contexts
            .iter()
            .map(|context| Ok((context.clone(), self.contexts.value(context)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contexts(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn account_resolver_values() {
        let account = Account::authenticated(9u64, ["editor"]);
        let resolver = AccountContextResolver;
        assert_eq!(resolver.resolve(USER_CONTEXT, &account).unwrap(), "9");
        assert_eq!(
            resolver.resolve(USER_ROLES_CONTEXT, &account).unwrap(),
            r#"["authenticated","editor"]"#
        );
        assert!(matches!(
            resolver.resolve("url.path", &account),
            Err(PermissionError::UnknownCacheContext(_))
        ));
    }

    #[test]
    fn role_values_keep_role_boundaries() {
        let resolver = AccountContextResolver;
        let two_roles = Account::new(1u64, ["a", "b"]);
        let one_role = Account::new(2u64, ["a,b"]);
        let empty_role = Account::new(3u64, [""]);
        let no_roles = Account::new(4u64, Vec::<String>::new());

        let values: Vec<String> = [&two_roles, &one_role, &empty_role, &no_roles]
            .iter()
            .map(|account| resolver.resolve(USER_ROLES_CONTEXT, account).unwrap())
            .collect();
        assert_eq!(values[0], r#"["a","b"]"#);
        assert_eq!(values[1], r#"["a,b"]"#);
        assert_eq!(values[2], r#"[""]"#);
        assert_eq!(values[3], "[]");
    }

    #[test]
    fn ambient_resolver_uses_requested_account_and_restores() {
        let current: Arc<dyn CurrentAccount> = Arc::new(RequestAccount::new(Account::anonymous()));
        let resolver = AmbientContextResolver::new(
            Arc::clone(&current),
            Arc::new(CurrentAccountContexts::new(Arc::clone(&current))),
        );

        let other = Account::authenticated(12u64, ["member"]);
        let values = resolver
            .resolve_all(&contexts(&[USER_CONTEXT, USER_ROLES_CONTEXT]), &other)
            .unwrap();
        assert_eq!(values[0], (USER_CONTEXT.to_string(), "12".to_string()));
        assert_eq!(
            values[1],
            (USER_ROLES_CONTEXT.to_string(), r#"["authenticated","member"]"#.to_string())
        );
        assert_eq!(current.current(), Account::anonymous());
    }

    #[test]
    fn ambient_resolver_restores_on_error() {
        let current: Arc<dyn CurrentAccount> = Arc::new(RequestAccount::new(Account::anonymous()));
        let resolver = AmbientContextResolver::new(
            Arc::clone(&current),
            Arc::new(CurrentAccountContexts::new(Arc::clone(&current))),
        );

        let other = Account::authenticated(12u64, ["member"]);
        let result = resolver.resolve_all(&contexts(&["bogus"]), &other);
        assert!(result.is_err());
        assert_eq!(current.current(), Account::anonymous());
    }

    #[test]
    fn switch_restores_on_panic() {
        let current = RequestAccount::new(Account::anonymous());
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _switch = AccountSwitch::switch_to(&current, Account::authenticated(3u64, ["x"]));
            assert_eq!(current.current().id, crate::types::Identifier::int(3));
            panic!("calculation blew up");
        }));
        assert!(outcome.is_err());
        assert_eq!(current.current(), Account::anonymous());
    }
}
