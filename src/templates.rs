use askama::Template;

use crate::billing::{Invoice, InvoiceTotal};
use crate::error::FakturaError;

#[derive(Template)]
#[template(path = "invoice_preview.txt")]
struct InvoicePreview<'a> {
    invoice: &'a Invoice,
    total: InvoiceTotal,
}

/// Prints a plain-text preview of the draft before anything is committed.
pub fn print_preview(invoice: &Invoice) -> Result<(), FakturaError> {
    let data = InvoicePreview {
        invoice,
        total: invoice.calculate(),
    };

    println!("{}", data.render()?);

    Ok(())
}
