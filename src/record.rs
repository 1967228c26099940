//! Domain records and their CBOR encodings.

use bech32::Bech32m;
use chrono::{DateTime, TimeZone, Utc};
use uuid7::uuid7;

/// Mint a time-ordered id rendered as bech32 with a human-readable prefix,
/// e.g. `user_1...` or `txn_1...`.
pub fn mint_id(prefix: &str) -> String {
    let hrp = bech32::Hrp::parse_unchecked(prefix);

    bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())
        .expect("failed to serialise uuid to bech32 encoding.")
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    #[n(0)]
    User,
    #[n(1)]
    Admin,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// Lifecycle of a transaction and of its derived grants.
///
/// `Pending -> Approved` and `Pending -> Rejected`; re-deciding an already
/// decided transaction rewrites the same terminal state.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
}

/// What a payment claim buys: exactly one course or one book.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub enum Target {
    #[n(0)]
    Course(#[n(0)] String),
    #[n(1)]
    Book(#[n(0)] String),
}

impl Target {
    /// Build a target from the pair of optional ids the submission form
    /// carries. Returns `None` unless exactly one id is supplied.
    pub fn from_ids(course_id: Option<String>, book_id: Option<String>) -> Option<Self> {
        match (course_id, book_id) {
            (Some(course), None) => Some(Target::Course(course)),
            (None, Some(book)) => Some(Target::Book(book)),
            _ => None,
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct User {
    #[n(0)]
    pub id: String, // bech32-encoded uuid7
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub phone: String, // canonical digit string, unique
    #[n(3)]
    pub password_hash: Option<String>,
    #[n(4)]
    pub role: Role,
    #[n(5)]
    pub created_at: TimeStamp<Utc>,
}

impl User {
    pub fn new(name: &str, phone: &str, role: Role) -> Self {
        Self {
            id: mint_id("user_"),
            name: name.to_string(),
            phone: phone.to_string(),
            password_hash: None,
            role,
            created_at: TimeStamp::new(),
        }
    }
}

/// A claimed manual payment, the source-of-truth ledger entry.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub reference: String, // externally supplied, globally unique
    #[n(2)]
    pub phone: String, // canonical digit string
    #[n(3)]
    pub user_id: Option<String>, // a claim may arrive before any matching user exists
    #[n(4)]
    pub target: Target,
    #[n(5)]
    pub status: Status,
    #[n(6)]
    pub created_at: TimeStamp<Utc>,
}

impl Transaction {
    pub fn new(reference: &str, phone: &str, user_id: Option<String>, target: Target) -> Self {
        Self {
            id: mint_id("txn_"),
            reference: reference.to_string(),
            phone: phone.to_string(),
            user_id,
            target,
            status: Status::Pending,
            created_at: TimeStamp::new(),
        }
    }
}

/// Derived course-access grant, unique per (user, course).
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Enrollment {
    #[n(0)]
    pub user_id: String,
    #[n(1)]
    pub course_id: String,
    #[n(2)]
    pub status: Status,
}

/// Derived book-access grant, unique per (user, book).
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    #[n(0)]
    pub user_id: String,
    #[n(1)]
    pub book_id: String,
    #[n(2)]
    pub status: Status,
}

#[derive(Debug, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl<T: TimeZone> PartialEq for TimeStamp<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T: TimeZone> Eq for TimeStamp<T> {}

impl<T: TimeZone> PartialOrd for TimeStamp<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: TimeZone> Ord for TimeStamp<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}
