//! Payment reconciliation and access-grant engine for an academy storefront.
//!
//! Buyers submit manual mobile-banking payment references; administrators
//! approve or reject them, and an approval cascades to the derived course
//! enrollment or book purchase record.

pub mod error;
pub mod grants;
pub mod identity;
pub mod ledger;
pub mod phone;
pub mod record;
pub mod service;
pub mod store;
