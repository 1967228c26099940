//! Smoke Screen Unit tests for the payment ledger components
//!
//! These test are unit tests that span the codebase, testing behavior in
//! isolation from integration scenarios. These are intended as smoke-screen
//! and generally test the happy-path plus each typed failure.

use academy_ledger::error::PhoneError;
use academy_ledger::identity::IdentityResolver;
use academy_ledger::phone;
use academy_ledger::record::{Enrollment, Role, Status, User, mint_id};
use academy_ledger::store::Store;
use tempfile::tempdir;

// PHONE MODULE TESTS
#[cfg(test)]
mod phone_tests {
    use super::*;

    #[test]
    fn normalize_keeps_plain_digits() {
        assert_eq!(phone::normalize("01712345678"), "01712345678");
    }

    #[test]
    fn normalize_rewrites_country_plus() {
        assert_eq!(phone::normalize("+8801712345678"), "8801712345678");
    }

    #[test]
    fn normalize_drops_bare_plus_and_interior_pluses() {
        assert_eq!(phone::normalize("+44 20+7946+0958"), "442079460958");
    }

    #[test]
    fn normalize_strips_letters_and_punctuation() {
        assert_eq!(phone::normalize("(880) 1712-345 678 ext."), "8801712345678");
    }

    #[test]
    fn validate_rejects_empty_input() {
        assert_eq!(phone::validate(""), Err(PhoneError::Empty));
        assert_eq!(phone::validate("call me"), Err(PhoneError::Empty));
    }

    #[test]
    fn validate_rejects_too_short() {
        // nine digits after normalization
        assert_eq!(phone::validate("017-123-456"), Err(PhoneError::TooShort));
    }

    #[test]
    fn validate_rejects_too_long() {
        assert_eq!(
            phone::validate("1234567890123456"),
            Err(PhoneError::TooLong)
        );
    }

    #[test]
    fn validate_enforces_bangladesh_length() {
        assert_eq!(
            phone::validate("8801712345"),
            Err(PhoneError::BadCountryLength)
        );
        assert_eq!(phone::validate("+8801712345678"), Ok("8801712345678".into()));
    }

    #[test]
    fn validate_accepts_ten_digit_domestic_format() {
        assert_eq!(phone::validate("0171234567"), Ok("0171234567".into()));
    }

    #[test]
    fn validate_accepts_international_numbers() {
        assert_eq!(phone::validate("+44 20 7946 0958"), Ok("442079460958".into()));
    }
}

// RECORD MODULE TESTS
#[cfg(test)]
mod record_tests {
    use super::*;

    /// mint_id produces bech32 strings carrying the requested prefix,
    /// unique per call
    #[test]
    fn mint_id_prefixes_and_is_unique() {
        let a = mint_id("txn_");
        let b = mint_id("txn_");

        assert!(a.starts_with("txn_1"));
        assert!(b.starts_with("txn_1"));
        assert_ne!(a, b);
    }

    #[test]
    fn status_cbor_roundtrip() {
        for status in [Status::Pending, Status::Approved, Status::Rejected] {
            let encoded = minicbor::to_vec(status).unwrap();
            let decoded: Status = minicbor::decode(&encoded).unwrap();
            assert_eq!(status, decoded);
        }
    }

    #[test]
    fn user_cbor_roundtrip() {
        let original = User::new("Rahim", "8801712345678", Role::User);

        let encoded = minicbor::to_vec(original.clone()).unwrap();
        let decoded: User = minicbor::decode(&encoded).unwrap();

        assert_eq!(original, decoded);
    }

    #[test]
    fn enrollment_cbor_roundtrip() {
        let original = Enrollment {
            user_id: mint_id("user_"),
            course_id: "c1".into(),
            status: Status::Pending,
        };

        let encoded = minicbor::to_vec(original.clone()).unwrap();
        let decoded: Enrollment = minicbor::decode(&encoded).unwrap();

        assert_eq!(original, decoded);
    }

    #[test]
    fn role_knows_who_is_admin() {
        assert!(Role::Admin.is_admin());
        assert!(!Role::User.is_admin());
    }
}

// IDENTITY MODULE TESTS
#[cfg(test)]
mod identity_tests {
    use super::*;

    #[test]
    fn session_user_always_wins() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let store = Store::open(temp_dir.path().join("identity_session.db"))?;

        let stored = store.find_or_create_user("Karim", "8801812345678", Role::User)?;
        let session = User::new("Rahim", "8801712345678", Role::User);

        // the supplied phone belongs to the stored account, the session
        // identity is used anyway
        let resolver = IdentityResolver::new(store);
        let resolved = resolver.resolve(Some(&session), &stored.phone)?;

        assert_eq!(resolved, Some(session));
        Ok(())
    }

    #[test]
    fn falls_back_to_phone_lookup() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let store = Store::open(temp_dir.path().join("identity_phone.db"))?;

        let stored = store.find_or_create_user("Karim", "8801812345678", Role::User)?;

        let resolver = IdentityResolver::new(store);
        let resolved = resolver.resolve(None, "8801812345678")?;

        assert_eq!(resolved, Some(stored));
        Ok(())
    }

    #[test]
    fn unknown_phone_resolves_to_none() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let store = Store::open(temp_dir.path().join("identity_none.db"))?;

        let resolver = IdentityResolver::new(store);
        assert_eq!(resolver.resolve(None, "8801912345678")?, None);
        Ok(())
    }

    /// All raw spellings of one phone number resolve to the same user.
    #[test]
    fn spelling_variants_resolve_identically() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let store = Store::open(temp_dir.path().join("identity_variants.db"))?;

        let stored = store.find_or_create_user("Karim", "8801712345678", Role::User)?;
        let resolver = IdentityResolver::new(store);

        for raw in ["+880 1712-345678", "8801712345678", "+8801712345678"] {
            let digits = phone::validate(raw)?;
            assert_eq!(resolver.resolve(None, &digits)?, Some(stored.clone()));
        }
        Ok(())
    }
}

// GRANTS MODULE TESTS
#[cfg(test)]
mod grants_tests {
    use super::*;
    use academy_ledger::grants::AccessGrantCascade;
    use academy_ledger::record::Target;

    #[test]
    fn grant_on_submit_without_user_is_a_noop() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let store = Store::open(temp_dir.path().join("grants_noop.db"))?;

        let user = store.find_or_create_user("Karim", "8801712345678", Role::User)?;
        let cascade = AccessGrantCascade::new(store.clone());
        cascade.grant_on_submit(None, &Target::Course("c1".into()))?;

        // grants cannot exist without an owner
        assert!(store.enrollment(&user.id, "c1")?.is_none());
        Ok(())
    }

    #[test]
    fn grant_on_submit_inserts_once_and_never_overwrites() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let store = Store::open(temp_dir.path().join("grants_upsert.db"))?;

        let user = store.find_or_create_user("Karim", "8801712345678", Role::User)?;
        let cascade = AccessGrantCascade::new(store.clone());
        let target = Target::Book("b1".into());

        cascade.grant_on_submit(Some(&user), &target)?;
        let first = store.purchase(&user.id, "b1")?.unwrap();
        assert_eq!(first.status, Status::Pending);

        // a second submission leaves the existing row completely untouched
        cascade.grant_on_submit(Some(&user), &target)?;
        let second = store.purchase(&user.id, "b1")?.unwrap();
        assert_eq!(first, second);
        Ok(())
    }
}

// STORE MODULE TESTS
#[cfg(test)]
mod store_tests {
    use super::*;

    #[test]
    fn missing_lookups_return_none() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let store = Store::open(temp_dir.path().join("store_missing.db"))?;

        assert!(store.transaction("txn_missing")?.is_none());
        assert!(store.transaction_by_reference("TXN-404")?.is_none());
        assert!(store.user_by_phone("8801712345678")?.is_none());
        assert!(store.enrollment("user_x", "c1")?.is_none());
        assert!(store.purchase("user_x", "b1")?.is_none());
        Ok(())
    }

    #[test]
    fn catalog_titles_roundtrip() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let store = Store::open(temp_dir.path().join("store_catalog.db"))?;

        store.put_course_title("c1", "Algebra Basics")?;
        store.put_book_title("b1", "Geometry Workbook")?;

        assert_eq!(store.course_title("c1")?.as_deref(), Some("Algebra Basics"));
        assert_eq!(
            store.book_title("b1")?.as_deref(),
            Some("Geometry Workbook")
        );
        assert_eq!(store.course_title("c2")?, None);
        Ok(())
    }

    #[test]
    fn find_or_create_keeps_one_record_per_phone() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let store = Store::open(temp_dir.path().join("store_unique_phone.db"))?;

        let first = store.find_or_create_user("Rahim", "8801712345678", Role::User)?;
        let second = store.find_or_create_user("Rahim Uddin", "8801712345678", Role::User)?;

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Rahim Uddin");
        Ok(())
    }
}
