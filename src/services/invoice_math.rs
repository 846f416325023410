//! Line pricing and invoice totals.
//!
//! A line is priced from weights and rates unless the caller supplies a
//! manual base amount. Making charge, wastage and split GST stack on top of
//! the base; the invoice total is the plain sum of line totals and stays
//! unrounded in storage. Rounding only exists as the display-time round-off.

use serde::Deserialize;

use crate::models::MakingChargeType;

/// Amounts closer to zero than half a paisa are treated as zero when
/// comparing balances.
pub const MONEY_EPS: f64 = 0.005;

fn default_qty() -> i64 {
    1
}

/// Wire format for one item on a sale or purchase payload.
#[derive(Debug, Clone, Deserialize)]
pub struct LineInput {
    pub metal: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_qty")]
    pub qty: i64,
    #[serde(default)]
    pub gross_weight: f64,
    #[serde(default)]
    pub loss_weight: f64,
    #[serde(default)]
    pub purity: Option<String>,
    #[serde(default)]
    pub metal_rate: f64,
    /// Overrides the weight x rate base when present.
    #[serde(default)]
    pub base_override: Option<f64>,
    #[serde(default)]
    pub making_charge_type: MakingChargeType,
    #[serde(default)]
    pub making_charge_rate: f64,
    /// Carats, recorded on the bill; only the charge prices in.
    #[serde(default)]
    pub stone_weight: f64,
    #[serde(default)]
    pub stone_amount: f64,
    #[serde(default)]
    pub wastage_percent: f64,
    #[serde(default)]
    pub hsn_code: Option<String>,
    #[serde(default)]
    pub cgst_percent: f64,
    #[serde(default)]
    pub sgst_percent: f64,
}

impl LineInput {
    pub fn validate(&self) -> Result<(), String> {
        if self.metal.trim().is_empty() {
            return Err("Item metal is required".to_string());
        }
        if self.qty <= 0 {
            return Err("Item qty must be positive".to_string());
        }
        if self.gross_weight < 0.0 || self.loss_weight < 0.0 {
            return Err("Item weights cannot be negative".to_string());
        }
        if self.loss_weight > self.gross_weight {
            return Err("Loss weight cannot exceed gross weight".to_string());
        }
        if self.metal_rate < 0.0
            || self.making_charge_rate < 0.0
            || self.stone_weight < 0.0
            || self.stone_amount < 0.0
            || self.wastage_percent < 0.0
        {
            return Err("Item rates and charges cannot be negative".to_string());
        }
        // Every line must price to something positive: either a manual
        // amount, or a usable weight and rate.
        match self.base_override {
            Some(base) if base <= 0.0 => {
                return Err("Item amount must be positive".to_string());
            }
            None if self.gross_weight - self.loss_weight <= 0.0 || self.metal_rate <= 0.0 => {
                return Err(
                    "An item needs a net weight and metal rate, or a manual amount".to_string(),
                );
            }
            _ => {}
        }
        if self.cgst_percent < 0.0 || self.sgst_percent < 0.0 {
            return Err("GST percentages cannot be negative".to_string());
        }
        Ok(())
    }
}

/// Computed amounts for one line, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub net_weight: f64,
    pub base_amount: f64,
    pub making_charge: f64,
    pub wastage_amount: f64,
    pub cgst_amount: f64,
    pub sgst_amount: f64,
    pub line_total: f64,
}

pub fn price_line(input: &LineInput) -> PricedLine {
    let net_weight = input.gross_weight - input.loss_weight;
    let base_amount = match input.base_override {
        Some(base) => base,
        None => net_weight * input.metal_rate,
    };

    let making_charge = match input.making_charge_type {
        MakingChargeType::Fixed => input.making_charge_rate,
        MakingChargeType::PerGram => input.making_charge_rate * net_weight,
        MakingChargeType::Percent => input.making_charge_rate / 100.0 * base_amount,
    };

    let wastage_amount = input.wastage_percent / 100.0 * base_amount;
    let subtotal = base_amount + making_charge + input.stone_amount + wastage_amount;
    let cgst_amount = input.cgst_percent / 100.0 * subtotal;
    let sgst_amount = input.sgst_percent / 100.0 * subtotal;

    PricedLine {
        net_weight,
        base_amount,
        making_charge,
        wastage_amount,
        cgst_amount,
        sgst_amount,
        line_total: subtotal + cgst_amount + sgst_amount,
    }
}

pub fn invoice_total(lines: &[PricedLine]) -> f64 {
    lines.iter().map(|line| line.line_total).sum()
}

/// Display-only adjustment to the nearest rupee. Stored totals keep the
/// exact value.
pub fn round_off(total: f64) -> f64 {
    total.round() - total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_line() -> LineInput {
        LineInput {
            metal: "Gold".to_string(),
            description: None,
            qty: 1,
            gross_weight: 10.5,
            loss_weight: 0.5,
            purity: Some("22K".to_string()),
            metal_rate: 6000.0,
            base_override: None,
            making_charge_type: MakingChargeType::Fixed,
            making_charge_rate: 0.0,
            stone_weight: 0.0,
            stone_amount: 0.0,
            wastage_percent: 0.0,
            hsn_code: None,
            cgst_percent: 0.0,
            sgst_percent: 0.0,
        }
    }

    #[test]
    fn base_comes_from_net_weight_times_rate() {
        let priced = price_line(&plain_line());
        assert_eq!(priced.net_weight, 10.0);
        assert_eq!(priced.base_amount, 60000.0);
        assert_eq!(priced.line_total, 60000.0);
    }

    #[test]
    fn base_override_wins_over_weight_pricing() {
        let mut line = plain_line();
        line.base_override = Some(55000.0);
        let priced = price_line(&line);
        assert_eq!(priced.base_amount, 55000.0);
    }

    #[test]
    fn fixed_making_charge_is_the_rate_itself() {
        let mut line = plain_line();
        line.making_charge_rate = 1200.0;
        assert_eq!(price_line(&line).making_charge, 1200.0);
    }

    #[test]
    fn per_gram_making_charge_scales_with_net_weight() {
        let mut line = plain_line();
        line.making_charge_type = MakingChargeType::PerGram;
        line.making_charge_rate = 150.0;
        assert_eq!(price_line(&line).making_charge, 1500.0);
    }

    #[test]
    fn percent_making_charge_applies_to_base() {
        let mut line = plain_line();
        line.making_charge_type = MakingChargeType::Percent;
        line.making_charge_rate = 10.0;
        assert_eq!(price_line(&line).making_charge, 6000.0);
    }

    #[test]
    fn wastage_and_split_gst_stack_on_the_subtotal() {
        let mut line = plain_line();
        line.making_charge_rate = 1000.0;
        line.stone_amount = 500.0;
        line.wastage_percent = 2.0;
        line.cgst_percent = 1.5;
        line.sgst_percent = 1.5;

        let priced = price_line(&line);
        assert_eq!(priced.wastage_amount, 1200.0);
        let subtotal = 60000.0 + 1000.0 + 500.0 + 1200.0;
        assert!((priced.cgst_amount - subtotal * 0.015).abs() < 1e-9);
        assert!((priced.sgst_amount - subtotal * 0.015).abs() < 1e-9);
        assert!((priced.line_total - subtotal * 1.03).abs() < 1e-9);
    }

    #[test]
    fn invoice_total_sums_lines_and_round_off_bridges_to_the_nearest_rupee() {
        let mut a = plain_line();
        a.cgst_percent = 1.5;
        a.sgst_percent = 1.5;
        let mut b = plain_line();
        b.base_override = Some(1234.56);

        let lines = vec![price_line(&a), price_line(&b)];
        let total = invoice_total(&lines);
        assert!((total - (60000.0 * 1.03 + 1234.56)).abs() < 1e-9);

        let adjusted = total + round_off(total);
        assert!((adjusted - adjusted.round()).abs() < 1e-9);
    }

    #[test]
    fn validation_rejects_loss_above_gross_and_negative_rates() {
        let mut line = plain_line();
        line.loss_weight = 11.0;
        assert!(line.validate().is_err());

        let mut line = plain_line();
        line.metal_rate = -1.0;
        assert!(line.validate().is_err());

        let mut line = plain_line();
        line.qty = 0;
        assert!(line.validate().is_err());

        assert!(plain_line().validate().is_ok());
    }

    #[test]
    fn validation_requires_a_priceable_base() {
        // No weight and no manual amount prices to zero.
        let mut line = plain_line();
        line.gross_weight = 0.0;
        line.loss_weight = 0.0;
        assert!(line.validate().is_err());
        line.base_override = Some(2500.0);
        assert!(line.validate().is_ok());

        let mut line = plain_line();
        line.metal_rate = 0.0;
        assert!(line.validate().is_err());

        let mut line = plain_line();
        line.base_override = Some(0.0);
        assert!(line.validate().is_err());
    }
}
