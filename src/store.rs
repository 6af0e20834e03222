//! Sheet-backed data access for the three domain sheets plus the company
//! profile row.

use std::fs;
use std::path::Path;

use log::{info, warn};

use crate::error::FakturaError;
use crate::records::{CompanyProfile, Customer, Task};
use crate::sheets::{Rows, SheetsClient};

pub const CUSTOMERS_RANGE: &str = "Kunder!A:I";
pub const TASKS_RANGE: &str = "Opgave!A:I";
pub const TASK_TYPES_RANGE: &str = "Opgavetyper!A:A";
pub const COMPANY_RANGE: &str = "Company Details!A2:M2";

pub struct Store<'a> {
    client: &'a SheetsClient,
    spreadsheet_id: &'a str,
}

impl<'a> Store<'a> {
    pub fn new(client: &'a SheetsClient, spreadsheet_id: &'a str) -> Self {
        Self {
            client,
            spreadsheet_id,
        }
    }

    pub fn customers(&self) -> Result<Vec<Customer>, FakturaError> {
        let rows = self.client.read(self.spreadsheet_id, CUSTOMERS_RANGE)?;
        let customers = customers_from_rows(&rows);
        info!("Found {} customers", customers.len());
        Ok(customers)
    }

    pub fn append_customer(&self, customer: &Customer) -> Result<(), FakturaError> {
        self.client
            .append(self.spreadsheet_id, CUSTOMERS_RANGE, &vec![customer.to_row()])?;
        info!("Appended customer '{}'", customer.name);
        Ok(())
    }

    pub fn tasks_for(&self, customer_name: &str) -> Result<Vec<Task>, FakturaError> {
        let rows = self.client.read(self.spreadsheet_id, TASKS_RANGE)?;
        let tasks = tasks_from_rows(&rows, customer_name);
        info!("Found {} tasks for '{}'", tasks.len(), customer_name);
        Ok(tasks)
    }

    pub fn append_task(&self, task: &Task) -> Result<(), FakturaError> {
        self.client
            .append(self.spreadsheet_id, TASKS_RANGE, &vec![task.to_row()])?;
        info!("Appended task for '{}'", task.customer);
        Ok(())
    }

    pub fn task_types(&self) -> Result<Vec<String>, FakturaError> {
        let rows = self.client.read(self.spreadsheet_id, TASK_TYPES_RANGE)?;
        Ok(task_types_from_rows(&rows))
    }

    /// Company profile: local JSON is the base, non-empty sheet cells win.
    /// The sheet being unreadable only degrades to the local values.
    pub fn company_profile(&self, company_file: &Path) -> Result<CompanyProfile, FakturaError> {
        let mut profile = load_local_profile(company_file);
        match self.client.read(self.spreadsheet_id, COMPANY_RANGE) {
            Ok(rows) => {
                if let Some(row) = rows.first() {
                    profile.merge_row(row);
                    info!("Company details overridden with sheet values");
                }
            }
            Err(err) => warn!("Failed to read company details from sheet: {}", err),
        }
        Ok(profile)
    }

    /// As `company_profile`, but a missing company name is fatal since an
    /// invoice cannot be issued without one.
    pub fn company_profile_required(
        &self,
        company_file: &Path,
    ) -> Result<CompanyProfile, FakturaError> {
        let profile = self.company_profile(company_file)?;
        if profile.company_name.trim().is_empty() {
            return Err(FakturaError::CompanyIncomplete);
        }
        Ok(profile)
    }

    /// Persists the profile locally and mirrors it to the sheet row. A sheet
    /// write failure is non-fatal; the local file is the fallback source.
    pub fn save_company_profile(
        &self,
        company_file: &Path,
        profile: &CompanyProfile,
    ) -> Result<(), FakturaError> {
        fs::write(company_file, serde_json::to_string_pretty(profile)?)?;
        info!("Company profile written to {}", company_file.display());
        if let Err(err) = self
            .client
            .write(self.spreadsheet_id, COMPANY_RANGE, &vec![profile.to_row()])
        {
            warn!("Could not mirror company profile to the sheet: {}", err);
            println!("Note: profile saved locally but the sheet update failed: {}", err);
        }
        Ok(())
    }
}

fn load_local_profile(company_file: &Path) -> CompanyProfile {
    if !company_file.exists() {
        info!("No local company profile at {}", company_file.display());
        return CompanyProfile::default();
    }
    match fs::read_to_string(company_file)
        .map_err(FakturaError::from)
        .and_then(|raw| Ok(serde_json::from_str(&raw)?))
    {
        Ok(profile) => profile,
        Err(err) => {
            warn!("Failed reading local company profile: {}", err);
            CompanyProfile::default()
        }
    }
}

/// Skips the header row; rows without id and name are ignored.
pub fn customers_from_rows(rows: &Rows) -> Vec<Customer> {
    rows.iter()
        .skip(1)
        .filter_map(|row| Customer::from_row(row))
        .collect()
}

/// Skips the header row and keeps only the named customer's tasks.
pub fn tasks_from_rows(rows: &Rows, customer_name: &str) -> Vec<Task> {
    rows.iter()
        .skip(1)
        .filter_map(|row| Task::from_row(row))
        .filter(|task| task.customer == customer_name)
        .collect()
}

fn task_types_from_rows(rows: &Rows) -> Vec<String> {
    rows.iter()
        .skip(1)
        .filter_map(|row| row.first())
        .map(|label| label.trim().to_string())
        .filter(|label| !label.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rows(raw: &[&[&str]]) -> Rows {
        raw.iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn customers_skip_header_and_blank_rows() {
        let data = rows(&[
            &["ID", "Navn", "Adresse"],
            &["1", "Innotech", "Some Place 4", "", "", "", "", "x@y.dk", "650"],
            &["", ""],
            &["2", "Initech"],
        ]);
        let customers = customers_from_rows(&data);
        assert_eq!(customers.len(), 2);
        assert_eq!(customers[0].name, "Innotech");
        assert_eq!(customers[0].hourly_rate, dec!(650));
        assert_eq!(customers[1].hourly_rate, dec!(500));
    }

    #[test]
    fn tasks_filtered_by_customer() {
        let data = rows(&[
            &["Dato", "Kunde", "Type"],
            &["2024-03-14", "Innotech", "Support", "hourly", "mail fix", "90", "0", "0", "750"],
            &["2024-03-15", "Initech", "Support", "hourly", "other", "30", "0", "0", "250"],
            &["2024-03-16", "Innotech", "Dev", "fixed", "feature", "0", "1000", "0", "1000"],
        ]);
        let tasks = tasks_from_rows(&data, "Innotech");
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].minutes, 90);
        assert_eq!(tasks[1].price, dec!(1000));
    }

    #[test]
    fn task_types_drop_header_and_blanks() {
        let data = rows(&[&["Type"], &["Support"], &[""], &["Udvikling"]]);
        assert_eq!(task_types_from_rows(&data), vec!["Support", "Udvikling"]);
    }

    #[test]
    fn local_profile_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let profile = load_local_profile(&dir.path().join("faktura.json"));
        assert_eq!(profile, CompanyProfile::default());
    }

    #[test]
    fn local_profile_reads_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faktura.json");
        std::fs::write(
            &path,
            r#"{"company_name": "ST Digital", "payment_terms_days": "14"}"#,
        )
        .unwrap();
        let profile = load_local_profile(&path);
        assert_eq!(profile.company_name, "ST Digital");
        assert_eq!(profile.payment_terms(), Some(14));
    }
}
