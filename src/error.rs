use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FakturaError {
    #[error("IO Error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("HTTP Error: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },

    #[error("Error decoding data: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("Input Error: {source}")]
    Input {
        #[from]
        source: inquire::error::InquireError,
    },

    #[error("Template Error: {source}")]
    Template {
        #[from]
        source: askama::Error,
    },

    #[error("Could not sign credential assertion: {source}")]
    Jwt {
        #[from]
        source: jsonwebtoken::errors::Error,
    },

    #[error("PDF Error: {source}")]
    Pdf {
        #[from]
        source: printpdf::Error,
    },

    #[error("Invalid email address: {source}")]
    Address {
        #[from]
        source: lettre::address::AddressError,
    },

    #[error("Could not build email: {source}")]
    Mail {
        #[from]
        source: lettre::error::Error,
    },

    #[error("Invalid attachment content type: {source}")]
    ContentType {
        #[from]
        source: lettre::message::header::ContentTypeErr,
    },

    #[error("SMTP Error: {source}")]
    Smtp {
        #[from]
        source: lettre::transport::smtp::Error,
    },

    #[error(
        "Credential file '{path}' not found, \
         run the credential setup first"
    )]
    CredentialsMissing { path: PathBuf },

    #[error(
        "Permission denied by the spreadsheet service: {message} \
         (is the sheet shared with the service identity?)"
    )]
    PermissionDenied { message: String },

    #[error("Spreadsheet or range not found: {message}")]
    SheetNotFound { message: String },

    #[error("Sheets API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Authorization consent failed: {message}")]
    ConsentFailed { message: String },

    #[error("Configuration Error: {message}")]
    Config { message: String },

    #[error("Company profile has no company name, run 'faktura company edit' first")]
    CompanyIncomplete,

    #[error("No customers found, add one with 'faktura customer add'")]
    NoCustomers,

    #[error("No tasks found for '{customer}', add one with 'faktura task add'")]
    NoTasks { customer: String },
}
