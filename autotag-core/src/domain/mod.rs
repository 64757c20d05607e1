//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod company;
pub mod result;
mod rule;
mod tag;
mod transaction;

pub use company::Company;
pub use rule::{RuleType, TaggingRule};
pub use tag::TransactionTag;
pub use transaction::{ExternalMetadata, Transaction};
