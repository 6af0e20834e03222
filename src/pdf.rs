//! Renders an invoice (or credit memo) as an A4 PDF.
//!
//! Plain cursor-driven layout with the builtin Helvetica faces: issuer and
//! customer blocks, an itemized task table, totals and payment instructions.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use log::info;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};

use crate::billing::Invoice;
use crate::error::FakturaError;
use crate::records::CompanyProfile;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const BOTTOM: f32 = 25.0;

// task table column offsets, in mm from the left edge
const COL_DATE: f32 = MARGIN;
const COL_TYPE: f32 = 45.0;
const COL_DESC: f32 = 75.0;
const COL_TIME: f32 = 145.0;
const COL_AMOUNT: f32 = 165.0;

struct Page {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
}

impl Page {
    fn new(invoice: &Invoice) -> Result<Self, FakturaError> {
        let title = format!("{} #{}", invoice.title(), invoice.number);
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let regular = doc.add_builtin_font(BuiltinFont::Helvetica)?;
        let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            y: PAGE_HEIGHT - MARGIN,
        })
    }

    fn break_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn advance(&mut self, step: f32) {
        self.y -= step;
        if self.y < BOTTOM {
            self.break_page();
        }
    }

    fn text(&self, value: &str, size: f32, x: f32) {
        self.layer
            .use_text(value, size, Mm(x), Mm(self.y), &self.regular);
    }

    fn text_bold(&self, value: &str, size: f32, x: f32) {
        self.layer
            .use_text(value, size, Mm(x), Mm(self.y), &self.bold);
    }

    fn line(&mut self, value: &str, size: f32) {
        self.text(value, size, MARGIN);
        self.advance(size * 0.55);
    }

    fn save(self, path: &Path) -> Result<(), FakturaError> {
        self.doc.save(&mut BufWriter::new(File::create(path)?))?;
        Ok(())
    }
}

pub fn render_invoice(
    invoice: &Invoice,
    company: &CompanyProfile,
    out_dir: &Path,
) -> Result<PathBuf, FakturaError> {
    fs::create_dir_all(out_dir)?;
    let total = invoice.calculate();
    let mut page = Page::new(invoice)?;

    // document header
    page.text_bold(invoice.title(), 20.0, MARGIN);
    page.advance(10.0);
    page.line(&format!("Fakturanummer: {}", invoice.number), 11.0);
    page.line(
        &format!("Fakturadato: {}", invoice.issue_date.format("%d.%m.%Y")),
        11.0,
    );
    page.line(
        &format!("Forfaldsdato: {}", invoice.due_date.format("%d.%m.%Y")),
        11.0,
    );
    page.advance(6.0);

    // issuer block
    page.text_bold(&company.company_name, 12.0, MARGIN);
    page.advance(6.0);
    let issuer_details = [
        company.company_address.clone(),
        format!("{} {}", company.company_zip, company.company_town),
        format!("CVR: {}", company.company_cvr),
        company.company_phone.clone(),
        company.company_email.clone(),
    ];
    for detail in &issuer_details {
        let detail = detail.trim();
        if !detail.is_empty() && detail != "CVR:" {
            page.line(detail, 10.0);
        }
    }
    page.advance(6.0);

    // customer block
    page.text_bold("Faktureres til:", 11.0, MARGIN);
    page.advance(6.0);
    page.line(&invoice.customer.name, 10.0);
    if !invoice.customer.address.is_empty() {
        page.line(&invoice.customer.address, 10.0);
    }
    let zip_town = format!("{} {}", invoice.customer.zip, invoice.customer.town);
    if !zip_town.trim().is_empty() {
        page.line(&zip_town, 10.0);
    }
    if !invoice.customer.cvr.is_empty() {
        page.line(&format!("CVR: {}", invoice.customer.cvr), 10.0);
    }
    page.advance(8.0);

    // task table
    page.text_bold("Dato", 10.0, COL_DATE);
    page.text_bold("Type", 10.0, COL_TYPE);
    page.text_bold("Beskrivelse", 10.0, COL_DESC);
    page.text_bold("Tid", 10.0, COL_TIME);
    page.text_bold("Beløb", 10.0, COL_AMOUNT);
    page.advance(6.0);
    for line in invoice.lines.iter() {
        page.text(&line.task.date.format("%d.%m.%Y").to_string(), 9.0, COL_DATE);
        page.text(&truncate(&line.task.task_type, 18), 9.0, COL_TYPE);
        page.text(&truncate(&line.task.description, 42), 9.0, COL_DESC);
        page.text(&format!("{} min", line.task.minutes), 9.0, COL_TIME);
        page.text(&line.amount.to_string(), 9.0, COL_AMOUNT);
        page.advance(5.5);
    }
    page.advance(6.0);

    // totals
    page.text("Subtotal:", 11.0, COL_TIME);
    page.text(&total.subtotal.to_string(), 11.0, COL_AMOUNT);
    page.advance(6.0);
    page.text("Moms (25%):", 11.0, COL_TIME);
    page.text(&total.vat.to_string(), 11.0, COL_AMOUNT);
    page.advance(6.0);
    page.text_bold("Total:", 12.0, COL_TIME);
    page.text_bold(&total.total.to_string(), 12.0, COL_AMOUNT);
    page.advance(12.0);

    // payment instructions
    page.text_bold("Betalingsoplysninger", 11.0, MARGIN);
    page.advance(6.0);
    if !company.bank_name.is_empty() || !company.bank_account.is_empty() {
        page.line(
            &format!("{} {}", company.bank_name, company.bank_account),
            10.0,
        );
    }
    if !company.iban.is_empty() {
        page.line(&format!("IBAN: {}", company.iban), 10.0);
    }
    if !company.swift.is_empty() {
        page.line(&format!("SWIFT: {}", company.swift), 10.0);
    }
    let terms = (invoice.due_date - invoice.issue_date).num_days();
    page.line(&format!("Betalingsbetingelser: netto {} dage", terms), 10.0);
    if !company.additional_info.is_empty() {
        page.advance(4.0);
        page.line(&company.additional_info, 9.0);
    }

    let path = out_dir.join(invoice.pdf_file_name());
    page.save(&path)?;
    info!("Invoice PDF written to {}", path.display());
    Ok(path)
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let kept: String = value.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::billing::Invoice;
    use crate::records::{Customer, PricingType, Task};

    fn sample_invoice() -> Invoice {
        let customer = Customer {
            id: "1".to_string(),
            name: "Innotech".to_string(),
            address: "Some Place 4".to_string(),
            cvr: "12345678".to_string(),
            zip: "8000".to_string(),
            town: "Aarhus".to_string(),
            phone: String::new(),
            email: "billing@innotech.example".to_string(),
            hourly_rate: dec!(500),
        };
        let task = Task {
            date: NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
            customer: "Innotech".to_string(),
            task_type: "Support".to_string(),
            pricing: PricingType::Hourly,
            description: "Mail server troubleshooting".to_string(),
            minutes: 90,
            price: Decimal::ZERO,
            discount_pct: Decimal::ZERO,
            line_sum: Decimal::ZERO,
        };
        Invoice::draft(
            785,
            customer,
            vec![task],
            NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
            8,
            false,
        )
    }

    #[test]
    fn renders_pdf_file() {
        let dir = tempfile::tempdir().unwrap();
        let company = CompanyProfile {
            company_name: "ST Digital".to_string(),
            ..CompanyProfile::default()
        };
        let path = render_invoice(&sample_invoice(), &company, dir.path()).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "faktura_785_2024-04-02.pdf"
        );
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn truncates_long_descriptions() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long description here", 10), "a very ...");
    }
}
