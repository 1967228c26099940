//! Resolution of a payment claim to a user identity.

use crate::error::StoreError;
use crate::record::User;
use crate::store::Store;

pub struct IdentityResolver {
    store: Store,
}

impl IdentityResolver {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Determine which user a claim belongs to, if any. Read-only.
    ///
    /// A signed-in user wins unconditionally, even when the supplied phone
    /// number belongs to a different stored account. Otherwise the canonical
    /// phone number is matched against the unique phone index. Otherwise the
    /// claim stays ownerless until an operator reconciles it.
    pub fn resolve(
        &self,
        session_user: Option<&User>,
        normalized_phone: &str,
    ) -> Result<Option<User>, StoreError> {
        if let Some(user) = session_user {
            return Ok(Some(user.clone()));
        }

        self.store.user_by_phone(normalized_phone)
    }
}
