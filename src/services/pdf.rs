//! Bill PDFs. A4 portrait, builtin Helvetica, one artifact per saved sale,
//! purchase and deposit, filed under `<bills_dir>/YYYY-MM-DD/`.

use std::io::BufWriter;
use std::path::{Path, PathBuf};

use printpdf::{BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Rgb};

use crate::error::{AppError, AppResult};
use crate::models::{DepositRow, ItemRow, Party, PurchaseRow, SaleRow};
use crate::services::{invoice_math, words};

/// Shop identity printed on every bill, sourced from the settings table.
#[derive(Debug, Clone, Default)]
pub struct ShopProfile {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub gstin: Option<String>,
}

const PAGE_TOP: f32 = 285.0;
const PAGE_BOTTOM: f32 = 20.0;
const LEFT: f32 = 15.0;
const RIGHT: f32 = 195.0;

/// Cursor over one document. `down` owns the page-break decision so the
/// render functions stay linear.
struct Sheet {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
}

impl Sheet {
    fn new(title: &str) -> AppResult<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(210.0), Mm(297.0), "Layer 1");
        let layer = doc.get_page(page).get_layer(layer);
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| AppError::Pdf(e.to_string()))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| AppError::Pdf(e.to_string()))?;
        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            y: PAGE_TOP,
        })
    }

    fn text(&self, text: &str, size: f32, x: f32) {
        self.layer.use_text(text, size, Mm(x), Mm(self.y), &self.regular);
    }

    fn text_bold(&self, text: &str, size: f32, x: f32) {
        self.layer.use_text(text, size, Mm(x), Mm(self.y), &self.bold);
    }

    fn text_red(&self, text: &str, size: f32, x: f32) {
        self.layer
            .set_fill_color(Color::Rgb(Rgb::new(0.7, 0.0, 0.0, None)));
        self.layer.use_text(text, size, Mm(x), Mm(self.y), &self.bold);
        self.layer
            .set_fill_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
    }

    fn rule(&self) {
        self.layer.add_line(printpdf::Line {
            points: vec![
                (printpdf::Point::new(Mm(LEFT), Mm(self.y)), false),
                (printpdf::Point::new(Mm(RIGHT), Mm(self.y)), false),
            ],
            is_closed: false,
        });
    }

    fn down(&mut self, dy: f32) {
        self.y -= dy;
        if self.y < PAGE_BOTTOM {
            let (page, layer) = self.doc.add_page(Mm(210.0), Mm(297.0), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_TOP;
        }
    }

    fn finish(self) -> AppResult<Vec<u8>> {
        let mut writer = BufWriter::new(Vec::<u8>::new());
        self.doc
            .save(&mut writer)
            .map_err(|e| AppError::Pdf(e.to_string()))?;
        writer
            .into_inner()
            .map_err(|e| AppError::Pdf(e.to_string()))
    }
}

fn fmt_amount(value: f64) -> String {
    format!("{:.2}", value)
}

fn clip(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Keep filenames filesystem-safe; whitespace collapses to underscores.
pub fn sanitize_filename(input: &str) -> String {
    let cleaned: String = input
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '.' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "bill".to_string()
    } else {
        cleaned
    }
}

pub fn sale_pdf_filename(party_name: &str, invoice_no: &str) -> String {
    format!("sale_{}_{}.pdf", sanitize_filename(party_name), sanitize_filename(invoice_no))
}

pub fn purchase_pdf_filename(party_name: &str, invoice_no: &str) -> String {
    format!("purchase_{}_{}.pdf", sanitize_filename(party_name), sanitize_filename(invoice_no))
}

pub fn deposit_pdf_filename(party_name: &str, deposit_no: &str) -> String {
    format!("deposit_{}_{}.pdf", sanitize_filename(party_name), sanitize_filename(deposit_no))
}

fn header(sheet: &mut Sheet, shop: &ShopProfile, title: &str) {
    sheet.text_bold(&shop.name, 16.0, LEFT);
    sheet.text_bold(title, 14.0, 140.0);
    sheet.down(6.0);
    if let Some(address) = &shop.address {
        sheet.text(address, 9.0, LEFT);
        sheet.down(4.5);
    }
    if let Some(phone) = &shop.phone {
        sheet.text(&format!("Phone: {}", phone), 9.0, LEFT);
        sheet.down(4.5);
    }
    if let Some(gstin) = &shop.gstin {
        sheet.text(&format!("GSTIN: {}", gstin), 9.0, LEFT);
        sheet.down(4.5);
    }
    sheet.down(2.0);
    sheet.rule();
    sheet.down(7.0);
}

fn party_block(sheet: &mut Sheet, party: &Party, number_label: &str, number: &str, date: &str) {
    sheet.text_bold("Bill To:", 10.0, LEFT);
    sheet.text(&format!("{}: {}", number_label, number), 10.0, 120.0);
    sheet.down(5.0);
    sheet.text(&party.name, 10.0, LEFT);
    sheet.text(&format!("Date: {}", clip(date, 10)), 10.0, 120.0);
    sheet.down(5.0);
    if let Some(address) = &party.address {
        sheet.text(address, 9.0, LEFT);
        sheet.down(4.5);
    }
    if let Some(phone) = &party.phone {
        sheet.text(&format!("Phone: {}", phone), 9.0, LEFT);
        sheet.down(4.5);
    }
    if let Some(pan) = &party.pan_number {
        sheet.text(&format!("PAN: {}", pan), 9.0, LEFT);
        sheet.down(4.5);
    }
    sheet.down(3.0);
}

const COLS: [(&str, f32); 12] = [
    ("Metal", LEFT),
    ("Description", 31.0),
    ("Qty", 62.0),
    ("Nt Wt", 70.0),
    ("Purity", 84.0),
    ("Rate", 96.0),
    ("HSN", 112.0),
    ("CGST %", 124.0),
    ("SGST %", 137.0),
    ("CGST", 150.0),
    ("SGST", 163.0),
    ("Total", 177.0),
];

fn items_table(sheet: &mut Sheet, items: &[ItemRow]) {
    for (label, x) in COLS {
        sheet.text_bold(label, 7.0, x);
    }
    sheet.down(2.5);
    sheet.rule();
    sheet.down(5.0);

    for item in items {
        let cells: [String; 12] = [
            clip(&item.metal, 9),
            clip(item.description.as_deref().unwrap_or("-"), 18),
            item.qty.to_string(),
            format!("{:.3}", item.net_weight),
            clip(item.purity.as_deref().unwrap_or("-"), 7),
            fmt_amount(item.metal_rate),
            clip(item.hsn_code.as_deref().unwrap_or("-"), 8),
            format!("{:.2}", item.cgst_percent),
            format!("{:.2}", item.sgst_percent),
            fmt_amount(item.cgst_amount),
            fmt_amount(item.sgst_amount),
            fmt_amount(item.line_total),
        ];
        for (cell, (_, x)) in cells.iter().zip(COLS) {
            sheet.text(cell, 7.0, x);
        }
        sheet.down(5.0);
    }

    sheet.down(1.0);
    sheet.rule();
    sheet.down(7.0);
}

fn totals_block(sheet: &mut Sheet, items: &[ItemRow], total: f64) {
    // A single-line bill already shows everything on the row itself.
    if items.len() <= 1 {
        return;
    }
    let total_cgst: f64 = items.iter().map(|i| i.cgst_amount).sum();
    let total_sgst: f64 = items.iter().map(|i| i.sgst_amount).sum();
    let round_off = invoice_math::round_off(total);

    sheet.text("Total CGST:", 10.0, 140.0);
    sheet.text(&fmt_amount(total_cgst), 10.0, 175.0);
    sheet.down(5.0);
    sheet.text("Total SGST:", 10.0, 140.0);
    sheet.text(&fmt_amount(total_sgst), 10.0, 175.0);
    sheet.down(5.0);
    sheet.text("Round Off:", 10.0, 140.0);
    sheet.text(&fmt_amount(round_off), 10.0, 175.0);
    sheet.down(5.0);
    sheet.text_bold("Grand Total:", 11.0, 140.0);
    sheet.text_bold(&fmt_amount(total + round_off), 11.0, 175.0);
    sheet.down(7.0);
}

fn payment_lines(sheet: &mut Sheet, payments: &[(&str, f64)]) {
    for (label, amount) in payments {
        if *amount > 0.0 {
            sheet.text(&format!("{}: {}", label, fmt_amount(*amount)), 10.0, LEFT);
            sheet.down(5.0);
        }
    }
}

fn words_lines(sheet: &mut Sheet, total: f64, balance: f64) {
    sheet.down(2.0);
    sheet.text_bold(
        &format!("Total Amount: Rupees {} Only /-", words::amount_in_words(total)),
        9.0,
        LEFT,
    );
    sheet.down(5.0);
    if balance > 0.0 {
        sheet.text_red(
            &format!("Balance Amount: Rupees {} Only /-", words::amount_in_words(balance)),
            9.0,
            LEFT,
        );
        sheet.down(5.0);
    }
}

fn footer(sheet: &mut Sheet) {
    sheet.down(8.0);
    sheet.text_bold("Authorised Signatory", 9.0, 150.0);
    sheet.down(8.0);
    sheet.text(
        "Total amount is inclusive of making and other charges.",
        8.0,
        LEFT,
    );
}

pub fn render_sale_pdf(
    shop: &ShopProfile,
    sale: &SaleRow,
    items: &[ItemRow],
    party: &Party,
) -> AppResult<Vec<u8>> {
    let mut sheet = Sheet::new("Tax Invoice")?;
    header(&mut sheet, shop, "TAX INVOICE");
    party_block(&mut sheet, party, "Invoice No", &sale.invoice_no, &sale.sale_date);
    items_table(&mut sheet, items);
    totals_block(&mut sheet, items, sale.total_amount);
    payment_lines(
        &mut sheet,
        &[
            ("Cheque", sale.cheque_amount),
            ("Online", sale.online_amount),
            ("UPI", sale.upi_amount),
            ("Cash", sale.cash_amount),
            ("Old Gold", sale.old_gold_amount),
        ],
    );
    words_lines(&mut sheet, sale.total_amount, sale.balance_amount);
    footer(&mut sheet);
    sheet.finish()
}

pub fn render_purchase_pdf(
    shop: &ShopProfile,
    purchase: &PurchaseRow,
    items: &[ItemRow],
    party: &Party,
) -> AppResult<Vec<u8>> {
    let mut sheet = Sheet::new("Purchase Invoice")?;
    header(&mut sheet, shop, "PURCHASE INVOICE");
    party_block(
        &mut sheet,
        party,
        "Invoice No",
        &purchase.invoice_no,
        &purchase.purchase_date,
    );
    items_table(&mut sheet, items);
    totals_block(&mut sheet, items, purchase.total_amount);
    payment_lines(
        &mut sheet,
        &[
            ("Cheque", purchase.cheque_amount),
            ("Online", purchase.online_amount),
            ("UPI", purchase.upi_amount),
            ("Cash", purchase.cash_amount),
        ],
    );
    words_lines(&mut sheet, purchase.total_amount, purchase.balance_amount);
    footer(&mut sheet);
    sheet.finish()
}

pub fn render_deposit_pdf(
    shop: &ShopProfile,
    deposit: &DepositRow,
    party: &Party,
) -> AppResult<Vec<u8>> {
    let mut sheet = Sheet::new("Deposit Receipt")?;
    header(&mut sheet, shop, "DEPOSIT RECEIPT");
    party_block(
        &mut sheet,
        party,
        "Receipt No",
        &deposit.deposit_no,
        &deposit.deposit_date,
    );

    sheet.text_bold(
        &format!("Deposit Amount: {}", fmt_amount(deposit.amount)),
        12.0,
        LEFT,
    );
    sheet.down(6.0);
    if let Some(mode) = &deposit.payment_mode {
        sheet.text(&format!("Payment Mode: {}", mode), 10.0, LEFT);
        sheet.down(5.0);
    }
    if let Some(note) = &deposit.payment_note {
        sheet.text(&format!("Reference: {}", note), 10.0, LEFT);
        sheet.down(5.0);
    }
    if let Some(invoice_no) = &deposit.sale_invoice_no {
        sheet.text(&format!("Against Sale Invoice: {}", invoice_no), 10.0, LEFT);
        sheet.down(5.0);
    }
    if let Some(invoice_no) = &deposit.purchase_invoice_no {
        sheet.text(
            &format!("Against Purchase Invoice: {}", invoice_no),
            10.0,
            LEFT,
        );
        sheet.down(5.0);
    }

    sheet.down(2.0);
    sheet.text_bold(
        &format!(
            "Received: Rupees {} Only /-",
            words::amount_in_words(deposit.amount)
        ),
        9.0,
        LEFT,
    );
    footer(&mut sheet);
    sheet.finish()
}

/// Writes the rendered bytes under `<bills_dir>/<YYYY-MM-DD>/` and returns
/// the path. `bill_date` may carry a time suffix; only the date prefix is
/// used for the folder.
pub async fn write_bill(
    bills_dir: &str,
    bill_date: &str,
    filename: &str,
    bytes: &[u8],
) -> AppResult<String> {
    let day = clip(bill_date, 10);
    let dir: PathBuf = Path::new(bills_dir).join(day);
    tokio::fs::create_dir_all(&dir).await?;
    let path = dir.join(filename);
    tokio::fs::write(&path, bytes).await?;
    Ok(path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(
            sale_pdf_filename("Asha & Sons", "SAL-2025-00001"),
            "sale_Asha___Sons_SAL-2025-00001.pdf"
        );
        assert_eq!(sanitize_filename("  "), "bill");
        assert_eq!(sanitize_filename("a/b\\c"), "a_b_c");
    }

    #[test]
    fn deposit_pdf_renders_bytes() {
        let shop = ShopProfile {
            name: "Test Jewellers".to_string(),
            address: Some("12 Market Road".to_string()),
            phone: Some("9876543210".to_string()),
            gstin: Some("22AAAAA0000A1Z5".to_string()),
        };
        let party = Party {
            party_id: 1,
            name: "Meena".to_string(),
            phone: None,
            alternate_phone: None,
            landline_phone: None,
            address: None,
            pan_number: None,
            aadhaar_number: None,
            created_at: String::new(),
            updated_at: String::new(),
        };
        let deposit = DepositRow {
            deposit_no: "UDH-2025-1-001".to_string(),
            deposit_date: "2025-04-01 10:00:00".to_string(),
            party_id: 1,
            sale_invoice_no: Some("SAL-2025-00001".to_string()),
            purchase_invoice_no: None,
            amount: 4000.0,
            payment_mode: Some("Cash".to_string()),
            payment_note: None,
            created_at: String::new(),
            updated_at: String::new(),
        };

        let bytes = render_deposit_pdf(&shop, &deposit, &party).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
