//! Service layer API for the payment workflow.
//!
//! This is the boundary the rendering/CLI layer calls into. Session and
//! cookie state never reach this crate: callers pass the authenticated user
//! and their role explicitly.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{DecisionError, ListError, ReconcileError, RegisterError, SubmitError};
use crate::grants::AccessGrantCascade;
use crate::identity::IdentityResolver;
use crate::ledger::TransactionLedger;
use crate::phone;
use crate::record::{Role, Status, Target, Transaction, User};
use crate::store::Store;

/// Views whose cached renderings go stale when the ledger changes.
pub const ADMIN_DASHBOARD_VIEW: &str = "/admin";
pub const PROFILE_VIEW: &str = "/profile";

/// Cache/view-invalidation hook, called after writes that change what the
/// admin dashboard or a user profile shows. Rendering is an external
/// collaborator; the default implementation does nothing.
pub trait ViewInvalidator: Send + Sync {
    fn invalidate(&self, view: &str);
}

pub struct NoopInvalidator;

impl ViewInvalidator for NoopInvalidator {
    fn invalidate(&self, _view: &str) {}
}

/// A buyer's payment claim as the submission form delivers it: the raw
/// phone string plus the pair of optional target ids, of which exactly one
/// must be set.
#[derive(Debug, Clone)]
pub struct PaymentClaim {
    pub reference: String,
    pub phone: String,
    pub course_id: Option<String>,
    pub book_id: Option<String>,
}

/// One row of the admin transaction listing, joined with the owner's
/// display name and the target's catalog title.
#[derive(Debug, Clone)]
pub struct TransactionView {
    pub transaction: Transaction,
    pub user_name: Option<String>,
    pub item_title: Option<String>,
}

#[derive(Debug)]
pub struct TransactionPage {
    pub items: Vec<TransactionView>,
    pub total: usize,
    pub page: usize,
    pub total_pages: usize,
}

pub struct PaymentService {
    store: Store,
    resolver: IdentityResolver,
    ledger: TransactionLedger,
    cascade: AccessGrantCascade,
    views: Arc<dyn ViewInvalidator>,
}

impl PaymentService {
    pub fn new(db: Arc<sled::Db>) -> Self {
        Self::with_invalidator(db, Arc::new(NoopInvalidator))
    }

    pub fn with_invalidator(db: Arc<sled::Db>, views: Arc<dyn ViewInvalidator>) -> Self {
        let store = Store::new(db);
        Self {
            resolver: IdentityResolver::new(store.clone()),
            ledger: TransactionLedger::new(store.clone()),
            cascade: AccessGrantCascade::new(store.clone()),
            store,
            views,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Accept a payment claim: validate the phone number and target, resolve
    /// the claim to a user if possible, record a `Pending` transaction, and
    /// derive a `Pending` grant when an owner is known.
    pub fn submit_transaction(
        &self,
        claim: PaymentClaim,
        session_user: Option<&User>,
    ) -> Result<Transaction, SubmitError> {
        let digits = phone::validate(&claim.phone)?;

        if claim.reference.trim().is_empty() {
            return Err(SubmitError::MissingReference);
        }
        let target =
            Target::from_ids(claim.course_id, claim.book_id).ok_or(SubmitError::NoTarget)?;

        let user = self.resolver.resolve(session_user, &digits)?;
        let txn = self
            .ledger
            .submit(&claim.reference, &digits, target, user.as_ref())?;

        info!(
            transaction = %txn.id,
            reference = %txn.reference,
            owner_resolved = txn.user_id.is_some(),
            "payment claim accepted"
        );

        self.views.invalidate(PROFILE_VIEW);
        self.views.invalidate(ADMIN_DASHBOARD_VIEW);

        Ok(txn)
    }

    /// Approve or reject a transaction and cascade the decision to its
    /// derived grants. Admin only.
    ///
    /// `Pending` is representable but not a decision; it is rejected with
    /// [`DecisionError::InvalidStatus`]. Re-deciding an already decided
    /// transaction is permitted and re-runs the idempotent cascade.
    pub fn decide_transaction(
        &self,
        caller_role: Role,
        transaction_id: &str,
        decision: Status,
    ) -> Result<Transaction, DecisionError> {
        if !caller_role.is_admin() {
            warn!(transaction = %transaction_id, "decision denied: caller is not an admin");
            return Err(DecisionError::Unauthorized);
        }
        if !matches!(decision, Status::Approved | Status::Rejected) {
            return Err(DecisionError::InvalidStatus(decision));
        }

        let txn = self.cascade.apply_decision(transaction_id, decision)?;

        info!(
            transaction = %txn.id,
            decision = ?decision,
            owner_resolved = txn.user_id.is_some(),
            "transaction decided"
        );

        self.views.invalidate(ADMIN_DASHBOARD_VIEW);
        self.views.invalidate(PROFILE_VIEW);

        Ok(txn)
    }

    /// Paginated admin listing, newest first, joined with user names and
    /// catalog titles. `search` matches the reference case-insensitively or
    /// the canonical phone number by digit substring.
    pub fn list_transactions(
        &self,
        caller_role: Role,
        page: usize,
        page_size: usize,
        search: Option<&str>,
    ) -> Result<TransactionPage, ListError> {
        if !caller_role.is_admin() {
            return Err(ListError::Unauthorized);
        }

        let mut all = self.store.transactions()?;
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        if let Some(term) = search {
            let needle = term.to_lowercase();
            let digit_needle: String = term.chars().filter(|c| c.is_ascii_digit()).collect();
            all.retain(|txn| {
                txn.reference.to_lowercase().contains(&needle)
                    || (!digit_needle.is_empty() && txn.phone.contains(&digit_needle))
            });
        }

        let total = all.len();
        let page_size = page_size.max(1);
        let page = page.max(1);
        let total_pages = total.div_ceil(page_size);

        let mut items = Vec::new();
        for txn in all.into_iter().skip((page - 1) * page_size).take(page_size) {
            let user_name = match &txn.user_id {
                Some(id) => self.store.user(id)?.map(|u| u.name),
                None => None,
            };
            let item_title = match &txn.target {
                Target::Course(id) => self.store.course_title(id)?,
                Target::Book(id) => self.store.book_title(id)?,
            };
            items.push(TransactionView {
                transaction: txn,
                user_name,
                item_title,
            });
        }

        Ok(TransactionPage {
            items,
            total,
            page,
            total_pages,
        })
    }

    /// Find-or-create signup: an existing canonical phone number logs the
    /// user in (updating a changed display name), an unknown one creates the
    /// account.
    pub fn register_user(
        &self,
        name: &str,
        phone_raw: &str,
        role: Role,
    ) -> Result<User, RegisterError> {
        if name.trim().is_empty() {
            return Err(RegisterError::MissingName);
        }
        let digits = phone::validate(phone_raw)?;

        let user = self.store.find_or_create_user(name, &digits, role)?;
        info!(user = %user.id, "user signed in or registered");
        Ok(user)
    }

    /// Operator repair for ownerless transactions: once a user exists for
    /// the claim's phone number, attach them and create the missing grant.
    /// Nothing runs this automatically; it is an explicit admin action.
    pub fn reconcile_transaction(
        &self,
        caller_role: Role,
        transaction_id: &str,
    ) -> Result<Transaction, ReconcileError> {
        if !caller_role.is_admin() {
            return Err(ReconcileError::Unauthorized);
        }

        let txn = self
            .store
            .transaction(transaction_id)?
            .ok_or(ReconcileError::NotFound)?;
        if txn.user_id.is_some() {
            return Ok(txn);
        }

        let user = self
            .store
            .user_by_phone(&txn.phone)?
            .ok_or(ReconcileError::NoMatchingUser)?;
        let txn = self.cascade.attach_owner(transaction_id, &user)?;

        info!(transaction = %txn.id, user = %user.id, "ownerless transaction reconciled");

        self.views.invalidate(PROFILE_VIEW);
        self.views.invalidate(ADMIN_DASHBOARD_VIEW);

        Ok(txn)
    }
}
