//! Provider network hierarchy and registration authorization
//!
//! Providers own stores, stores own cashboxes. A `UserAssignment` grants a
//! user registration rights at one of three granularities: a whole provider,
//! one store, or one cashbox. When several assignments cover the same sale
//! point, the narrowest one wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{AssignmentId, CashboxId, ProviderId, Rate, StoreId, UserId};

use crate::error::LedgerError;

/// A provider (merchant) participating in the program
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,
    pub name: String,
    /// Percentage of each consumption retained by the platform
    pub commission_percent: Rate,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// A physical or logical store under a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub provider_id: ProviderId,
    pub name: String,
    pub active: bool,
}

/// A cash register under a store; the narrowest sale point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cashbox {
    pub id: CashboxId,
    pub store_id: StoreId,
    pub name: String,
    pub active: bool,
}

/// A registration grant for a user at provider, store or cashbox granularity
///
/// `store_id == None` grants the whole provider; `cashbox_id == None` with a
/// store grants the whole store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAssignment {
    pub id: AssignmentId,
    pub user_id: UserId,
    pub provider_id: ProviderId,
    pub store_id: Option<StoreId>,
    pub cashbox_id: Option<CashboxId>,
    pub active: bool,
}

/// Granularity at which an assignment matched, narrowest last
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssignmentScope {
    Provider,
    Store,
    Cashbox,
}

/// The fully resolved cashbox → store → provider chain for a sale
#[derive(Debug, Clone)]
pub struct SaleContext {
    pub provider: Provider,
    pub store: Store,
    pub cashbox: Cashbox,
}

impl SaleContext {
    /// Verifies that the chain matches the ids named in the request
    ///
    /// The caller sends provider, store and cashbox ids explicitly; all
    /// three must agree with the stored hierarchy, otherwise the request is
    /// rejected before any balance check.
    pub fn validate_against(
        &self,
        provider_id: ProviderId,
        store_id: StoreId,
        cashbox_id: CashboxId,
    ) -> Result<(), LedgerError> {
        if self.cashbox.id != cashbox_id || self.cashbox.store_id != store_id {
            return Err(LedgerError::InvalidHierarchy(format!(
                "cashbox {} does not belong to store {}",
                cashbox_id, store_id
            )));
        }
        if self.store.id != store_id || self.store.provider_id != provider_id {
            return Err(LedgerError::InvalidHierarchy(format!(
                "store {} does not belong to provider {}",
                store_id, provider_id
            )));
        }
        if !self.provider.active || !self.store.active || !self.cashbox.active {
            return Err(LedgerError::InvalidHierarchy(
                "provider, store or cashbox is inactive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolves the narrowest active assignment covering a sale point
///
/// An assignment covers the sale point when its provider matches and its
/// optional store/cashbox either are absent or match. Among covering
/// assignments the narrowest granularity wins.
pub fn resolve_assignment(
    assignments: &[UserAssignment],
    provider_id: ProviderId,
    store_id: StoreId,
    cashbox_id: CashboxId,
) -> Option<AssignmentScope> {
    assignments
        .iter()
        .filter(|a| a.active && a.provider_id == provider_id)
        .filter_map(|a| match (a.store_id, a.cashbox_id) {
            (None, _) => Some(AssignmentScope::Provider),
            (Some(s), None) if s == store_id => Some(AssignmentScope::Store),
            (Some(s), Some(c)) if s == store_id && c == cashbox_id => {
                Some(AssignmentScope::Cashbox)
            }
            _ => None,
        })
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn context() -> SaleContext {
        let provider = Provider {
            id: ProviderId::new(),
            name: "SuperMart".to_string(),
            commission_percent: Rate::from_percentage(dec!(5)),
            active: true,
            created_at: Utc::now(),
        };
        let store = Store {
            id: StoreId::new(),
            provider_id: provider.id,
            name: "Centro".to_string(),
            active: true,
        };
        let cashbox = Cashbox {
            id: CashboxId::new(),
            store_id: store.id,
            name: "Caja 1".to_string(),
            active: true,
        };
        SaleContext {
            provider,
            store,
            cashbox,
        }
    }

    fn assignment(
        user_id: UserId,
        provider_id: ProviderId,
        store_id: Option<StoreId>,
        cashbox_id: Option<CashboxId>,
    ) -> UserAssignment {
        UserAssignment {
            id: AssignmentId::new(),
            user_id,
            provider_id,
            store_id,
            cashbox_id,
            active: true,
        }
    }

    #[test]
    fn test_hierarchy_validation_accepts_matching_chain() {
        let ctx = context();
        assert!(ctx
            .validate_against(ctx.provider.id, ctx.store.id, ctx.cashbox.id)
            .is_ok());
    }

    #[test]
    fn test_hierarchy_validation_rejects_foreign_store() {
        let ctx = context();
        let result = ctx.validate_against(ctx.provider.id, StoreId::new(), ctx.cashbox.id);
        assert!(matches!(result, Err(LedgerError::InvalidHierarchy(_))));
    }

    #[test]
    fn test_hierarchy_validation_rejects_inactive_cashbox() {
        let mut ctx = context();
        ctx.cashbox.active = false;
        let result = ctx.validate_against(ctx.provider.id, ctx.store.id, ctx.cashbox.id);
        assert!(matches!(result, Err(LedgerError::InvalidHierarchy(_))));
    }

    #[test]
    fn test_narrowest_assignment_wins() {
        let ctx = context();
        let user = UserId::new();
        let assignments = vec![
            assignment(user, ctx.provider.id, None, None),
            assignment(user, ctx.provider.id, Some(ctx.store.id), Some(ctx.cashbox.id)),
            assignment(user, ctx.provider.id, Some(ctx.store.id), None),
        ];

        let scope =
            resolve_assignment(&assignments, ctx.provider.id, ctx.store.id, ctx.cashbox.id);
        assert_eq!(scope, Some(AssignmentScope::Cashbox));
    }

    #[test]
    fn test_assignment_for_other_cashbox_does_not_cover() {
        let ctx = context();
        let user = UserId::new();
        let assignments = vec![assignment(
            user,
            ctx.provider.id,
            Some(ctx.store.id),
            Some(CashboxId::new()),
        )];

        let scope =
            resolve_assignment(&assignments, ctx.provider.id, ctx.store.id, ctx.cashbox.id);
        assert_eq!(scope, None);
    }

    #[test]
    fn test_inactive_assignment_is_ignored() {
        let ctx = context();
        let user = UserId::new();
        let mut a = assignment(user, ctx.provider.id, None, None);
        a.active = false;

        let scope = resolve_assignment(&[a], ctx.provider.id, ctx.store.id, ctx.cashbox.id);
        assert_eq!(scope, None);
    }
}
