//! Creation and deduplication of transaction records.

use sled::transaction::{ConflictableTransactionError, TransactionError};

use crate::error::{StoreError, SubmitError};
use crate::grants::pending_grant_row;
use crate::record::{Target, Transaction, User};
use crate::store::{Store, encode_record, reference_key, transaction_key};

enum SubmitAbort {
    Duplicate,
}

pub struct TransactionLedger {
    store: Store,
}

impl TransactionLedger {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Record a claimed payment with status `Pending`, rejecting duplicate
    /// references outright.
    ///
    /// Acceptance is strictly at-most-once per reference: a resubmission
    /// never mutates the transaction stored by the first call. The duplicate
    /// check, the ledger insert, and the derived pending grant (when a user
    /// was resolved) run in one storage transaction keyed on the unique
    /// `ref/{reference}` index entry, so a race between two submissions with
    /// the same reference also surfaces as [`SubmitError::DuplicateReference`].
    pub fn submit(
        &self,
        reference: &str,
        normalized_phone: &str,
        target: Target,
        user: Option<&User>,
    ) -> Result<Transaction, SubmitError> {
        if reference.trim().is_empty() {
            return Err(SubmitError::MissingReference);
        }

        let txn = Transaction::new(
            reference,
            normalized_phone,
            user.map(|u| u.id.clone()),
            target,
        );
        let encoded_txn = encode_record(&txn)?;
        let grant = match user {
            Some(user) => Some(pending_grant_row(user, &txn.target)?),
            None => None,
        };

        let outcome = self.store.db.transaction(|tx| {
            if tx.get(reference_key(reference))?.is_some() {
                return Err(ConflictableTransactionError::Abort(SubmitAbort::Duplicate));
            }

            tx.insert(transaction_key(&txn.id), encoded_txn.clone())?;
            tx.insert(reference_key(reference), txn.id.as_bytes())?;

            // insert-if-absent: an existing grant row is left untouched,
            // whatever its status
            if let Some((grant_key, grant_row)) = &grant {
                if tx.get(grant_key)?.is_none() {
                    tx.insert(grant_key.clone(), grant_row.clone())?;
                }
            }

            Ok(())
        });

        match outcome {
            Ok(()) => Ok(txn),
            Err(TransactionError::Abort(SubmitAbort::Duplicate)) => {
                Err(SubmitError::DuplicateReference)
            }
            Err(TransactionError::Storage(e)) => Err(StoreError::Sled(e).into()),
        }
    }
}
