//! Yes/no permission queries on top of the calculator chain.

use std::sync::Arc;

use crate::chain::CalculatorChain;
use crate::error::Result;
use crate::types::{Account, Identifier};

/// Answers "does `account` have `permission` in (`scope`, `identifier`)?".
#[derive(Clone)]
pub struct PermissionChecker {
    chain: Arc<CalculatorChain>,
}

impl PermissionChecker {
    pub fn new(chain: Arc<CalculatorChain>) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &Arc<CalculatorChain> {
        &self.chain
    }

    /// A missing item means no permission. Errors propagate; callers must
    /// treat `Err` as denied.
    pub fn has_permission(
        &self,
        permission: &str,
        scope: &str,
        identifier: &Identifier,
        account: &Account,
    ) -> Result<bool> {
        let set = self.chain.calculate(account, scope)?;
        Ok(set
            .item(scope, identifier)
            .is_some_and(|item| item.has_permission(permission)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::PermissionCalculator;
    use crate::item::PermissionItem;
    use crate::set::RefinablePermissionSet;

    struct Editors;

    impl PermissionCalculator for Editors {
        fn name(&self) -> &str {
            "editors"
        }

        fn calculate(&self, account: &Account, scope: &str) -> Result<RefinablePermissionSet> {
            let mut set = self.empty_for(scope);
            if scope == "s" && account.has_role("editor") {
                set.add_item(PermissionItem::new("s", "article", ["edit"], false), false)?;
                set.add_item(PermissionItem::admin("s", "page"), false)?;
            }
            Ok(set)
        }
    }

    fn checker() -> PermissionChecker {
        let chain = CalculatorChain::builder()
            .calculator(Arc::new(Editors))
            .build();
        PermissionChecker::new(Arc::new(chain))
    }

    #[test]
    fn missing_item_is_denied() {
        let checker = checker();
        let editor = Account::authenticated(1u64, ["editor"]);
        assert!(!checker
            .has_permission("edit", "s", &Identifier::from("foo"), &editor)
            .unwrap());
    }

    #[test]
    fn enumerated_and_admin_grants() {
        let checker = checker();
        let editor = Account::authenticated(1u64, ["editor"]);
        let article = Identifier::from("article");
        let page = Identifier::from("page");

        assert!(checker.has_permission("edit", "s", &article, &editor).unwrap());
        assert!(!checker.has_permission("delete", "s", &article, &editor).unwrap());
        assert!(checker.has_permission("delete", "s", &page, &editor).unwrap());

        let anonymous = Account::anonymous();
        assert!(!checker.has_permission("edit", "s", &article, &anonymous).unwrap());
    }
}
