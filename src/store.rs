//! Sled-backed persistence.
//!
//! All records live in the default tree under namespaced keys. Uniqueness of
//! a transaction reference, of a canonical phone number, and of a
//! (user, course)/(user, book) grant row is enforced at the storage level:
//! each is the key of its row or index entry, and every multi-record write
//! runs inside a single sled transaction.
//!
//! Key layout:
//! - `user/{id}` -> [`User`]
//! - `phone/{digits}` -> user id (unique-phone index)
//! - `txn/{id}` -> [`Transaction`]
//! - `ref/{reference}` -> transaction id (unique-reference index)
//! - `enrollment/{user_id}/{course_id}` -> [`Enrollment`]
//! - `purchase/{user_id}/{book_id}` -> [`Purchase`]
//! - `course/{id}` / `book/{id}` -> catalog title

use std::path::Path;
use std::sync::Arc;

use sled::transaction::{ConflictableTransactionError, TransactionError};

use crate::error::StoreError;
use crate::record::{Enrollment, Purchase, Role, Transaction, User};

const USER_PREFIX: &str = "user/";
const PHONE_PREFIX: &str = "phone/";
const TXN_PREFIX: &str = "txn/";
const REF_PREFIX: &str = "ref/";
const ENROLLMENT_PREFIX: &str = "enrollment/";
const PURCHASE_PREFIX: &str = "purchase/";
const COURSE_PREFIX: &str = "course/";
const BOOK_PREFIX: &str = "book/";

pub(crate) fn user_key(id: &str) -> Vec<u8> {
    format!("{USER_PREFIX}{id}").into_bytes()
}
pub(crate) fn phone_key(digits: &str) -> Vec<u8> {
    format!("{PHONE_PREFIX}{digits}").into_bytes()
}
pub(crate) fn transaction_key(id: &str) -> Vec<u8> {
    format!("{TXN_PREFIX}{id}").into_bytes()
}
pub(crate) fn reference_key(reference: &str) -> Vec<u8> {
    format!("{REF_PREFIX}{reference}").into_bytes()
}
pub(crate) fn enrollment_key(user_id: &str, course_id: &str) -> Vec<u8> {
    format!("{ENROLLMENT_PREFIX}{user_id}/{course_id}").into_bytes()
}
pub(crate) fn purchase_key(user_id: &str, book_id: &str) -> Vec<u8> {
    format!("{PURCHASE_PREFIX}{user_id}/{book_id}").into_bytes()
}
fn course_key(id: &str) -> Vec<u8> {
    format!("{COURSE_PREFIX}{id}").into_bytes()
}
fn book_key(id: &str) -> Vec<u8> {
    format!("{BOOK_PREFIX}{id}").into_bytes()
}

pub(crate) fn encode_record<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, StoreError> {
    minicbor::to_vec(value).map_err(|e| StoreError::Codec(e.to_string()))
}

pub(crate) fn decode_record<T: for<'b> minicbor::Decode<'b, ()>>(
    bytes: &[u8],
) -> Result<T, StoreError> {
    minicbor::decode(bytes).map_err(|e| StoreError::Codec(e.to_string()))
}

fn id_from_index(bytes: &[u8]) -> Result<String, StoreError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| StoreError::Codec("index entry is not valid utf-8".into()))
}

/// Collapse the outcome of a sled transaction whose closure aborts with a
/// [`StoreError`].
pub(crate) fn map_store_txn<T>(
    outcome: Result<T, TransactionError<StoreError>>,
) -> Result<T, StoreError> {
    match outcome {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(e)) => Err(e),
        Err(TransactionError::Storage(e)) => Err(StoreError::Sled(e)),
    }
}

#[derive(Clone)]
pub struct Store {
    pub(crate) db: Arc<sled::Db>,
}

impl Store {
    pub fn new(db: Arc<sled::Db>) -> Self {
        Self { db }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(Self {
            db: Arc::new(sled::open(path)?),
        })
    }

    fn get_decoded<T: for<'b> minicbor::Decode<'b, ()>>(
        &self,
        key: &[u8],
    ) -> Result<Option<T>, StoreError> {
        match self.db.get(key)? {
            Some(raw) => Ok(Some(decode_record(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn user(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.get_decoded(&user_key(id))
    }

    /// Look up a user by canonical phone number through the unique index.
    pub fn user_by_phone(&self, digits: &str) -> Result<Option<User>, StoreError> {
        match self.db.get(phone_key(digits))? {
            Some(raw) => self.user(&id_from_index(&raw)?),
            None => Ok(None),
        }
    }

    /// Find a user by canonical phone, creating one if absent. A differing
    /// display name on an existing user is updated in place. Runs as one
    /// storage transaction so two concurrent signups with the same phone
    /// cannot both insert.
    pub fn find_or_create_user(
        &self,
        name: &str,
        digits: &str,
        role: Role,
    ) -> Result<User, StoreError> {
        let outcome = self.db.transaction(|tx| {
            if let Some(raw_id) = tx.get(phone_key(digits))? {
                let id = id_from_index(&raw_id).map_err(ConflictableTransactionError::Abort)?;
                let raw_user = tx.get(user_key(&id))?.ok_or_else(|| {
                    ConflictableTransactionError::Abort(StoreError::Codec(format!(
                        "phone index points at missing user {id}"
                    )))
                })?;
                let mut user: User =
                    decode_record(&raw_user).map_err(ConflictableTransactionError::Abort)?;

                if user.name != name {
                    user.name = name.to_string();
                    let encoded =
                        encode_record(&user).map_err(ConflictableTransactionError::Abort)?;
                    tx.insert(user_key(&id), encoded)?;
                }

                return Ok(user);
            }

            let user = User::new(name, digits, role);
            let encoded = encode_record(&user).map_err(ConflictableTransactionError::Abort)?;
            tx.insert(user_key(&user.id), encoded)?;
            tx.insert(phone_key(digits), user.id.as_bytes())?;

            Ok(user)
        });

        map_store_txn(outcome)
    }

    pub fn transaction(&self, id: &str) -> Result<Option<Transaction>, StoreError> {
        self.get_decoded(&transaction_key(id))
    }

    /// Look up a transaction by its external reference through the unique
    /// index.
    pub fn transaction_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Transaction>, StoreError> {
        match self.db.get(reference_key(reference))? {
            Some(raw) => self.transaction(&id_from_index(&raw)?),
            None => Ok(None),
        }
    }

    /// Every transaction in the ledger, in key order.
    pub fn transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        let mut out = Vec::new();
        for entry in self.db.scan_prefix(TXN_PREFIX) {
            let (_, raw) = entry?;
            out.push(decode_record(&raw)?);
        }
        Ok(out)
    }

    pub fn enrollment(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Option<Enrollment>, StoreError> {
        self.get_decoded(&enrollment_key(user_id, course_id))
    }

    pub fn purchase(&self, user_id: &str, book_id: &str) -> Result<Option<Purchase>, StoreError> {
        self.get_decoded(&purchase_key(user_id, book_id))
    }

    // Catalog titles, kept only so transaction listings can join them.
    // Course and book management proper lives outside this crate.

    pub fn put_course_title(&self, id: &str, title: &str) -> Result<(), StoreError> {
        self.db.insert(course_key(id), encode_record(&title)?)?;
        Ok(())
    }

    pub fn course_title(&self, id: &str) -> Result<Option<String>, StoreError> {
        self.get_decoded(&course_key(id))
    }

    pub fn put_book_title(&self, id: &str, title: &str) -> Result<(), StoreError> {
        self.db.insert(book_key(id), encode_record(&title)?)?;
        Ok(())
    }

    pub fn book_title(&self, id: &str) -> Result<Option<String>, StoreError> {
        self.get_decoded(&book_key(id))
    }
}
