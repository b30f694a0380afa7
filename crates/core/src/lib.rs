//! Rapport contact import domain logic.
//!
//! Pure pipeline code with no HTTP or SQL:
//!
//! - [`formats`] decodes delimited text and vCard files into raw records.
//! - [`field_mapper`] proposes header -> canonical field mappings.
//! - [`row_validation`] normalizes resolved values and reports problems.
//! - [`duplicate_detection`] matches rows against existing contacts.
//! - [`import_session`] holds per-attempt state behind a per-session lock.
//! - [`importer`] runs the upload / preview / confirm protocol.
//!
//! Storage is reached only through the [`contact_store::ContactStore`] trait.

pub mod clock;
pub mod contact;
pub mod contact_store;
pub mod duplicate_detection;
pub mod error;
pub mod field_mapper;
pub mod formats;
pub mod import_session;
pub mod importer;
pub mod row_validation;
pub mod types;

pub use contact_store::{ContactStore, InMemoryContactStore};
pub use error::{ImportError, StoreError};
pub use importer::{ContactImporter, ImportConfig};
