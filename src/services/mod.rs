//! Business logic shared by handlers. Everything that writes takes a
//! `&mut SqliteConnection` so callers decide the transaction scope.

pub mod invoice_math;
pub mod ledger;
pub mod numbering;
pub mod pdf;
pub mod words;
