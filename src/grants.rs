//! Derivation of access grants from transactions, and propagation of admin
//! decisions onto them.
//!
//! Grants are deliberately not overwritten on resubmission: a payment
//! resubmitted for a previously rejected item does not re-open the grant,
//! it waits for an operator to act on the new transaction instead.

use sled::transaction::{ConflictableTransactionError, TransactionError};

use crate::error::{DecisionError, ReconcileError, StoreError};
use crate::record::{Enrollment, Purchase, Status, Target, Transaction, User};
use crate::store::{
    Store, decode_record, encode_record, enrollment_key, map_store_txn, purchase_key,
    transaction_key,
};

/// The pending grant row a resolved submission derives: storage key plus
/// encoded record. Inserted only if the key is absent.
pub(crate) fn pending_grant_row(
    user: &User,
    target: &Target,
) -> Result<(Vec<u8>, Vec<u8>), StoreError> {
    match target {
        Target::Course(course_id) => {
            let row = Enrollment {
                user_id: user.id.clone(),
                course_id: course_id.clone(),
                status: Status::Pending,
            };
            Ok((enrollment_key(&user.id, course_id), encode_record(&row)?))
        }
        Target::Book(book_id) => {
            let row = Purchase {
                user_id: user.id.clone(),
                book_id: book_id.clone(),
                status: Status::Pending,
            };
            Ok((purchase_key(&user.id, book_id), encode_record(&row)?))
        }
    }
}

enum DecisionAbort {
    NotFound,
    Store(StoreError),
}

pub struct AccessGrantCascade {
    store: Store,
}

impl AccessGrantCascade {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Insert-if-absent a `Pending` grant for a resolved submission. No-op
    /// when no user is known; an existing row is left completely untouched,
    /// whatever its status.
    pub fn grant_on_submit(
        &self,
        user: Option<&User>,
        target: &Target,
    ) -> Result<(), StoreError> {
        let Some(user) = user else { return Ok(()) };
        let (key, row) = pending_grant_row(user, target)?;

        let outcome = self.store.db.transaction(|tx| {
            if tx.get(&key)?.is_none() {
                tx.insert(key.clone(), row.clone())?;
            }
            Ok(())
        });

        map_store_txn(outcome)
    }

    /// Set the transaction's status and propagate the same decision to every
    /// grant row matching its (user, target) pair, as one storage
    /// transaction: the ledger entry and its derived grant are never
    /// observably inconsistent from outside this call.
    pub fn apply_decision(
        &self,
        transaction_id: &str,
        decision: Status,
    ) -> Result<Transaction, DecisionError> {
        let key = transaction_key(transaction_id);

        let outcome = self.store.db.transaction(|tx| {
            let raw = tx
                .get(&key)?
                .ok_or(ConflictableTransactionError::Abort(DecisionAbort::NotFound))?;
            let mut txn: Transaction = decode_record(&raw)
                .map_err(|e| ConflictableTransactionError::Abort(DecisionAbort::Store(e)))?;

            txn.status = decision;
            let encoded = encode_record(&txn)
                .map_err(|e| ConflictableTransactionError::Abort(DecisionAbort::Store(e)))?;
            tx.insert(key.clone(), encoded)?;

            // An ownerless transaction has no grant to cascade to; the
            // decision then touches the ledger entry alone.
            if let Some(user_id) = txn.user_id.clone() {
                match &txn.target {
                    Target::Course(course_id) => {
                        let grant_key = enrollment_key(&user_id, course_id);
                        if let Some(raw_grant) = tx.get(&grant_key)? {
                            let mut grant: Enrollment = decode_record(&raw_grant).map_err(|e| {
                                ConflictableTransactionError::Abort(DecisionAbort::Store(e))
                            })?;
                            grant.status = decision;
                            let encoded = encode_record(&grant).map_err(|e| {
                                ConflictableTransactionError::Abort(DecisionAbort::Store(e))
                            })?;
                            tx.insert(grant_key, encoded)?;
                        }
                    }
                    Target::Book(book_id) => {
                        let grant_key = purchase_key(&user_id, book_id);
                        if let Some(raw_grant) = tx.get(&grant_key)? {
                            let mut grant: Purchase = decode_record(&raw_grant).map_err(|e| {
                                ConflictableTransactionError::Abort(DecisionAbort::Store(e))
                            })?;
                            grant.status = decision;
                            let encoded = encode_record(&grant).map_err(|e| {
                                ConflictableTransactionError::Abort(DecisionAbort::Store(e))
                            })?;
                            tx.insert(grant_key, encoded)?;
                        }
                    }
                }
            }

            Ok(txn)
        });

        match outcome {
            Ok(txn) => Ok(txn),
            Err(TransactionError::Abort(DecisionAbort::NotFound)) => Err(DecisionError::NotFound),
            Err(TransactionError::Abort(DecisionAbort::Store(e))) => Err(DecisionError::Store(e)),
            Err(TransactionError::Storage(e)) => Err(DecisionError::Store(StoreError::Sled(e))),
        }
    }

    /// Attach a user to an ownerless transaction and create the missing
    /// grant, carrying the transaction's current status onto it. Idempotent:
    /// a transaction that already has an owner is returned unchanged.
    pub fn attach_owner(
        &self,
        transaction_id: &str,
        user: &User,
    ) -> Result<Transaction, ReconcileError> {
        let key = transaction_key(transaction_id);

        let outcome = self.store.db.transaction(|tx| {
            let raw = tx
                .get(&key)?
                .ok_or(ConflictableTransactionError::Abort(DecisionAbort::NotFound))?;
            let mut txn: Transaction = decode_record(&raw)
                .map_err(|e| ConflictableTransactionError::Abort(DecisionAbort::Store(e)))?;

            if txn.user_id.is_some() {
                return Ok(txn);
            }

            txn.user_id = Some(user.id.clone());
            let encoded = encode_record(&txn)
                .map_err(|e| ConflictableTransactionError::Abort(DecisionAbort::Store(e)))?;
            tx.insert(key.clone(), encoded)?;

            let (grant_key, pending_row) = pending_grant_row(user, &txn.target)
                .map_err(|e| ConflictableTransactionError::Abort(DecisionAbort::Store(e)))?;
            if tx.get(&grant_key)?.is_none() {
                // carry an already-made decision onto the fresh grant
                let row = match (&txn.target, txn.status) {
                    (_, Status::Pending) => pending_row,
                    (Target::Course(course_id), status) => {
                        let grant = Enrollment {
                            user_id: user.id.clone(),
                            course_id: course_id.clone(),
                            status,
                        };
                        encode_record(&grant).map_err(|e| {
                            ConflictableTransactionError::Abort(DecisionAbort::Store(e))
                        })?
                    }
                    (Target::Book(book_id), status) => {
                        let grant = Purchase {
                            user_id: user.id.clone(),
                            book_id: book_id.clone(),
                            status,
                        };
                        encode_record(&grant).map_err(|e| {
                            ConflictableTransactionError::Abort(DecisionAbort::Store(e))
                        })?
                    }
                };
                tx.insert(grant_key, row)?;
            }

            Ok(txn)
        });

        match outcome {
            Ok(txn) => Ok(txn),
            Err(TransactionError::Abort(DecisionAbort::NotFound)) => Err(ReconcileError::NotFound),
            Err(TransactionError::Abort(DecisionAbort::Store(e))) => Err(ReconcileError::Store(e)),
            Err(TransactionError::Storage(e)) => Err(ReconcileError::Store(StoreError::Sled(e))),
        }
    }
}
