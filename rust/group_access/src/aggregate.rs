//! Per-scope and full group permission sets.

use permissions::{Account, CalculatorChain, CalculatorChainBuilder, PermissionSet, Result};
use std::sync::Arc;

use crate::calculator::{IndividualMembershipCalculator, SynchronizedRoleCalculator};
use crate::scope::GroupScope;
use crate::source::{MembershipLoader, SynchronizedRoleSource};

/// Chain builder with the group calculators registered: synchronized roles
/// first, then individual memberships.
///
/// Cache tiers and the context resolver can still be set on the returned
/// builder.
pub fn group_calculator_chain(
    roles: Arc<dyn SynchronizedRoleSource>,
    memberships: Arc<dyn MembershipLoader>,
) -> CalculatorChainBuilder {
    CalculatorChain::builder()
        .calculator(Arc::new(SynchronizedRoleCalculator::new(roles)))
        .calculator(Arc::new(IndividualMembershipCalculator::new(memberships)))
}

/// Runs the chain once per group scope.
#[derive(Clone)]
pub struct GroupPermissionCalculator {
    chain: Arc<CalculatorChain>,
}

impl GroupPermissionCalculator {
    pub fn new(chain: Arc<CalculatorChain>) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &Arc<CalculatorChain> {
        &self.chain
    }

    pub fn calculate_outsider_permissions(&self, account: &Account) -> Result<Arc<PermissionSet>> {
        self.chain.calculate(account, GroupScope::Outsider.as_str())
    }

    pub fn calculate_insider_permissions(&self, account: &Account) -> Result<Arc<PermissionSet>> {
        self.chain.calculate(account, GroupScope::Insider.as_str())
    }

    pub fn calculate_individual_permissions(
        &self,
        account: &Account,
    ) -> Result<Arc<PermissionSet>> {
        self.chain.calculate(account, GroupScope::Individual.as_str())
    }

    /// Outsider, insider and individual sets merged into one.
    ///
    /// Tags are unioned and the most restrictive max-age wins.
    pub fn calculate_full_permissions(&self, account: &Account) -> Result<PermissionSet> {
        let outsider = self.calculate_outsider_permissions(account)?;
        let insider = self.calculate_insider_permissions(account)?;
        let individual = self.calculate_individual_permissions(account)?;
        outsider.merge(&insider)?.merge(&individual)
    }
}
