use std::env;
use std::path::{Path, PathBuf};

use strum_macros::{Display, EnumString};

use crate::error::FakturaError;
use crate::sheets;

/// How the spreadsheet client authenticates. `service_account` is suited to
/// unattended runs; `oauth` walks the operator through a one-time consent
/// flow and caches the resulting token.
#[derive(Debug, Clone, Copy, PartialEq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AuthMethod {
    ServiceAccount,
    Oauth,
}

/// Settings sourced from the environment (a `.env` file is honored), with
/// file paths anchored at the configuration directory.
#[derive(Debug, Clone)]
pub struct Config {
    pub config_dir: PathBuf,
    pub spreadsheet_id: String,
    pub auth_method: AuthMethod,
    pub service_account_file: String,
    pub oauth_credentials_file: String,
    pub oauth_token_file: String,
    pub smtp_server: String,
    pub smtp_port: u16,
    pub sender_email: Option<String>,
    pub sender_password: Option<String>,
    pub bookkeeping_email: Option<String>,
    pub payment_terms_days: Option<u64>,
    pub invoice_dir_name: String,
}

fn var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env(config_dir: &Path) -> Result<Self, FakturaError> {
        let spreadsheet_id = var("SPREADSHEET_ID")
            .or_else(|| {
                var("SHEET_URL").map(|url| sheets::extract_spreadsheet_id(&url).to_string())
            })
            .ok_or_else(|| FakturaError::Config {
                message: "set SPREADSHEET_ID or SHEET_URL".to_string(),
            })?;

        let raw_method = var("AUTH_METHOD").unwrap_or_else(|| "service_account".to_string());
        let auth_method = raw_method
            .parse::<AuthMethod>()
            .map_err(|_| FakturaError::Config {
                message: format!(
                    "AUTH_METHOD must be 'service_account' or 'oauth', got '{}'",
                    raw_method
                ),
            })?;

        let smtp_port = match var("SMTP_PORT") {
            None => 587,
            Some(raw) => raw.parse().map_err(|_| FakturaError::Config {
                message: format!("SMTP_PORT is not a valid port number: '{}'", raw),
            })?,
        };

        Ok(Self {
            config_dir: config_dir.to_path_buf(),
            spreadsheet_id,
            auth_method,
            service_account_file: var("SERVICE_ACCOUNT_FILE")
                .unwrap_or_else(|| "service_account.json".to_string()),
            oauth_credentials_file: var("OAUTH_CREDENTIALS_FILE")
                .unwrap_or_else(|| "credentials.json".to_string()),
            oauth_token_file: var("OAUTH_TOKEN_FILE").unwrap_or_else(|| "token.json".to_string()),
            smtp_server: var("SMTP_SERVER").unwrap_or_else(|| "smtp.gmail.com".to_string()),
            smtp_port,
            sender_email: var("SENDER_EMAIL"),
            sender_password: var("SENDER_PASSWORD"),
            bookkeeping_email: var("BOOKKEEPING_EMAIL"),
            payment_terms_days: var("PAYMENT_TERMS_DAYS").and_then(|v| v.parse().ok()),
            invoice_dir_name: var("INVOICE_DIR").unwrap_or_else(|| "Fakturaer".to_string()),
        })
    }

    pub fn service_account_path(&self) -> PathBuf {
        self.config_dir.join(&self.service_account_file)
    }

    pub fn oauth_credentials_path(&self) -> PathBuf {
        self.config_dir.join(&self.oauth_credentials_file)
    }

    pub fn oauth_token_path(&self) -> PathBuf {
        self.config_dir.join(&self.oauth_token_file)
    }

    /// Local company profile, the base that sheet values override.
    pub fn company_file(&self) -> PathBuf {
        self.config_dir.join("faktura.json")
    }

    pub fn counter_file(&self) -> PathBuf {
        self.config_dir.join("invoice_number.json")
    }

    pub fn ledger_file(&self) -> PathBuf {
        self.config_dir.join("billed_tasks.json")
    }

    pub fn invoice_dir(&self) -> PathBuf {
        self.config_dir.join(&self.invoice_dir_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_method_from_str() {
        assert_eq!(
            "service_account".parse::<AuthMethod>().unwrap(),
            AuthMethod::ServiceAccount
        );
        assert_eq!("oauth".parse::<AuthMethod>().unwrap(), AuthMethod::Oauth);
        assert!("password".parse::<AuthMethod>().is_err());
    }

    #[test]
    fn auth_method_display() {
        assert_eq!(AuthMethod::ServiceAccount.to_string(), "service_account");
        assert_eq!(AuthMethod::Oauth.to_string(), "oauth");
    }
}
