//! Bill, line item and ledger rows. Enums are stored as their `as_str` form;
//! must stay in sync with values already persisted in live databases.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MakingChargeType {
    #[default]
    Fixed,
    PerGram,
    Percent,
}

impl MakingChargeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MakingChargeType::Fixed => "fixed",
            MakingChargeType::PerGram => "per_gram",
            MakingChargeType::Percent => "percent",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fixed" => Some(MakingChargeType::Fixed),
            "per_gram" => Some(MakingChargeType::PerGram),
            "percent" => Some(MakingChargeType::Percent),
            _ => None,
        }
    }
}

impl std::fmt::Display for MakingChargeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    Pending,
    PartiallyPaid,
    Paid,
}

impl LedgerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerStatus::Pending => "pending",
            LedgerStatus::PartiallyPaid => "partially_paid",
            LedgerStatus::Paid => "paid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(LedgerStatus::Pending),
            "partially_paid" => Some(LedgerStatus::PartiallyPaid),
            "paid" => Some(LedgerStatus::Paid),
            _ => None,
        }
    }
}

impl std::fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SaleRow {
    pub invoice_no: String,
    pub sale_date: String,
    pub party_id: i64,
    pub total_amount: f64,
    pub cheque_amount: f64,
    pub online_amount: f64,
    pub upi_amount: f64,
    pub cash_amount: f64,
    pub old_gold_amount: f64,
    pub balance_amount: f64,
    pub payment_mode: Option<String>,
    pub payment_note: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PurchaseRow {
    pub invoice_no: String,
    pub purchase_date: String,
    pub party_id: i64,
    pub total_amount: f64,
    pub cheque_amount: f64,
    pub online_amount: f64,
    pub upi_amount: f64,
    pub cash_amount: f64,
    pub balance_amount: f64,
    pub payment_mode: Option<String>,
    pub payment_note: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One priced line. sale_items and purchase_items share this layout.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ItemRow {
    pub item_id: i64,
    pub invoice_no: String,
    pub metal: String,
    pub description: Option<String>,
    pub qty: i64,
    pub gross_weight: f64,
    pub loss_weight: f64,
    pub net_weight: f64,
    pub purity: Option<String>,
    pub metal_rate: f64,
    pub base_amount: f64,
    pub making_charge_type: String,
    pub making_charge_rate: f64,
    pub making_charge: f64,
    pub stone_weight: f64,
    pub stone_amount: f64,
    pub wastage_percent: f64,
    pub wastage_amount: f64,
    pub hsn_code: Option<String>,
    pub cgst_percent: f64,
    pub sgst_percent: f64,
    pub cgst_amount: f64,
    pub sgst_amount: f64,
    pub line_total: f64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LedgerEntry {
    pub entry_id: i64,
    pub invoice_no: String,
    pub party_id: i64,
    pub initial_balance: f64,
    pub current_balance: f64,
    pub last_payment_date: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LedgerTransaction {
    pub txn_id: i64,
    pub entry_id: i64,
    pub payment_date: String,
    pub amount: f64,
    pub payment_mode: Option<String>,
    pub note: Option<String>,
    pub reference_no: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DepositRow {
    pub deposit_no: String,
    pub deposit_date: String,
    pub party_id: i64,
    pub sale_invoice_no: Option<String>,
    pub purchase_invoice_no: Option<String>,
    pub amount: f64,
    pub payment_mode: Option<String>,
    pub payment_note: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Setting {
    pub setting_key: String,
    pub setting_value: String,
    pub description: Option<String>,
    pub updated_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn making_charge_type_round_trips_through_strings() {
        for t in [
            MakingChargeType::Fixed,
            MakingChargeType::PerGram,
            MakingChargeType::Percent,
        ] {
            assert_eq!(MakingChargeType::from_str(t.as_str()), Some(t));
        }
        assert_eq!(MakingChargeType::from_str("PER_GRAM"), Some(MakingChargeType::PerGram));
        assert_eq!(MakingChargeType::from_str("hourly"), None);
    }

    #[test]
    fn ledger_status_round_trips_through_strings() {
        for s in [
            LedgerStatus::Pending,
            LedgerStatus::PartiallyPaid,
            LedgerStatus::Paid,
        ] {
            assert_eq!(LedgerStatus::from_str(s.as_str()), Some(s));
        }
        assert_eq!(LedgerStatus::from_str("overdue"), None);
    }
}
