//! Sends the rendered invoice PDF by email over SMTP with STARTTLS.

use std::fs;
use std::path::Path;

use askama::Template;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use log::info;

use crate::billing::Invoice;
use crate::config::Config;
use crate::error::FakturaError;
use crate::records::CompanyProfile;

#[derive(Template)]
#[template(path = "email_body.txt")]
struct EmailBody<'a> {
    customer_name: &'a str,
    kind: &'a str,
    number: u32,
    company_name: &'a str,
    credit_memo: bool,
    due_date: String,
    terms_days: i64,
}

/// Splits a comma-separated address list, dropping blanks, entries without
/// an '@', duplicates and the primary recipient.
pub fn clean_cc_list(raw: &str, primary: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for part in raw.split(',') {
        let address = part.trim();
        if address.is_empty() || !address.contains('@') {
            continue;
        }
        let lowered = address.to_lowercase();
        if lowered == primary.to_lowercase() {
            continue;
        }
        if seen.iter().any(|s| s.to_lowercase() == lowered) {
            continue;
        }
        seen.push(address.to_string());
    }
    seen
}

pub fn send_invoice(
    cfg: &Config,
    company: &CompanyProfile,
    invoice: &Invoice,
    pdf_path: &Path,
    to: &str,
    cc: &[String],
) -> Result<(), FakturaError> {
    let sender = cfg.sender_email.as_deref().ok_or(FakturaError::Config {
        message: "SENDER_EMAIL is not set".to_string(),
    })?;
    let password = cfg.sender_password.as_deref().ok_or(FakturaError::Config {
        message: "SENDER_PASSWORD is not set".to_string(),
    })?;

    let body = EmailBody {
        customer_name: &invoice.customer.name,
        kind: invoice.kind(),
        number: invoice.number,
        company_name: &company.company_name,
        credit_memo: invoice.credit_memo,
        due_date: invoice.due_date.format("%d.%m.%Y").to_string(),
        terms_days: (invoice.due_date - invoice.issue_date).num_days(),
    }
    .render()?;

    let subject = format!(
        "{} #{} - {}",
        capitalize(invoice.kind()),
        invoice.number,
        company.company_name
    );

    let mut builder = Message::builder().from(sender.parse()?).to(to.parse()?);
    for address in cc {
        builder = builder.cc(address.parse()?);
    }
    let attachment_name = format!("faktura_{}.pdf", invoice.number);
    let email = builder.subject(subject).multipart(
        MultiPart::mixed()
            .singlepart(SinglePart::plain(body))
            .singlepart(
                Attachment::new(attachment_name)
                    .body(fs::read(pdf_path)?, ContentType::parse("application/pdf")?),
            ),
    )?;

    let mailer = SmtpTransport::starttls_relay(&cfg.smtp_server)?
        .port(cfg.smtp_port)
        .credentials(Credentials::new(sender.to_string(), password.to_string()))
        .build();
    mailer.send(&email)?;
    info!("Sent {} #{} to {}", invoice.kind(), invoice.number, to);
    Ok(())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cc_list_drops_blanks_and_invalid() {
        let cc = clean_cc_list("a@b.dk, , not-an-address, c@d.dk", "x@y.dk");
        assert_eq!(cc, vec!["a@b.dk", "c@d.dk"]);
    }

    #[test]
    fn cc_list_excludes_primary_case_insensitively() {
        let cc = clean_cc_list("Billing@Innotech.example, bogholder@st.dk", "billing@innotech.example");
        assert_eq!(cc, vec!["bogholder@st.dk"]);
    }

    #[test]
    fn cc_list_deduplicates() {
        let cc = clean_cc_list("a@b.dk, A@B.dk, a@b.dk", "x@y.dk");
        assert_eq!(cc, vec!["a@b.dk"]);
    }

    #[test]
    fn capitalizes_kind() {
        assert_eq!(capitalize("faktura"), "Faktura");
        assert_eq!(capitalize("kreditnota"), "Kreditnota");
    }
}
