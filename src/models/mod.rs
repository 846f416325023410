//! Row types shared across handlers. Timestamps are stored as TEXT in the
//! formats from utils::date; amounts are REAL.

pub mod billing;
pub mod party;

pub use billing::{
    DepositRow, ItemRow, LedgerEntry, LedgerStatus, LedgerTransaction, MakingChargeType,
    PurchaseRow, SaleRow, Setting,
};
pub use party::Party;
