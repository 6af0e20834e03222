//! Domain records and their mapping to spreadsheet rows.
//!
//! All mapping is positional against the fixed sheet layouts; short rows are
//! tolerated, missing trailing cells become empty strings or defaults.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, VariantNames};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn default_hourly_rate() -> Decimal {
    Decimal::new(500, 0)
}

fn cell(row: &[String], index: usize) -> String {
    row.get(index).map(|v| v.trim().to_string()).unwrap_or_default()
}

fn decimal_cell(row: &[String], index: usize) -> Option<Decimal> {
    row.get(index).and_then(|v| v.trim().parse().ok())
}

/// One row of the customer sheet (`Kunder!A:I`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub address: String,
    pub cvr: String,
    pub zip: String,
    pub town: String,
    pub phone: String,
    pub email: String,
    pub hourly_rate: Decimal,
}

impl Customer {
    /// A customer needs at least an id and a name, everything else defaults.
    pub fn from_row(row: &[String]) -> Option<Self> {
        if row.len() < 2 || row[1].trim().is_empty() {
            return None;
        }
        Some(Self {
            id: cell(row, 0),
            name: cell(row, 1),
            address: cell(row, 2),
            cvr: cell(row, 3),
            zip: cell(row, 4),
            town: cell(row, 5),
            phone: cell(row, 6),
            email: cell(row, 7),
            hourly_rate: decimal_cell(row, 8).unwrap_or_else(default_hourly_rate),
        })
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.name.clone(),
            self.address.clone(),
            self.cvr.clone(),
            self.zip.clone(),
            self.town.clone(),
            self.phone.clone(),
            self.email.clone(),
            self.hourly_rate.to_string(),
        ]
    }
}

impl fmt::Display for Customer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} (ID: {})", self.name, self.id)?;
        if !self.town.is_empty() || !self.email.is_empty() {
            write!(f, "\n     {} - {}", self.town, self.email)?;
        }
        Ok(())
    }
}

#[derive(
    Display,
    EnumString,
    VariantNames,
    Serialize,
    Deserialize,
    Debug,
    PartialEq,
    Clone,
    Copy,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PricingType {
    /// Billed as minutes against the customer's hourly rate.
    Hourly,
    /// Billed at the task's own price.
    Fixed,
}

/// One row of the task sheet (`Opgave!A:I`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub date: NaiveDate,
    pub customer: String,
    pub task_type: String,
    pub pricing: PricingType,
    pub description: String,
    pub minutes: u32,
    pub price: Decimal,
    pub discount_pct: Decimal,
    pub line_sum: Decimal,
}

impl Task {
    pub fn from_row(row: &[String]) -> Option<Self> {
        if row.len() < 6 {
            return None;
        }
        let date = NaiveDate::parse_from_str(row[0].trim(), DATE_FORMAT).ok()?;
        let customer = cell(row, 1);
        if customer.is_empty() {
            return None;
        }
        Some(Self {
            date,
            customer,
            task_type: cell(row, 2),
            pricing: row[3].trim().parse().unwrap_or(PricingType::Hourly),
            description: cell(row, 4),
            // the sheet may hold "180.0" style values
            minutes: decimal_cell(row, 5).and_then(|d| d.to_u32()).unwrap_or(0),
            price: decimal_cell(row, 6).unwrap_or_default(),
            discount_pct: decimal_cell(row, 7).unwrap_or_default(),
            line_sum: decimal_cell(row, 8).unwrap_or_default(),
        })
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.date.format(DATE_FORMAT).to_string(),
            self.customer.clone(),
            self.task_type.clone(),
            self.pricing.to_string(),
            self.description.clone(),
            self.minutes.to_string(),
            self.price.to_string(),
            self.discount_pct.to_string(),
            self.line_sum.to_string(),
        ]
    }

    /// Stable identity of a task across runs, used by the billed-task
    /// ledger. Matches on content since the sheet has no row ids.
    pub fn fingerprint(&self) -> String {
        let short_desc: String = self.description.chars().take(120).collect();
        format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.customer,
            self.date.format(DATE_FORMAT),
            self.task_type,
            self.pricing,
            short_desc,
            self.minutes,
            self.price,
            self.discount_pct,
            self.line_sum,
        )
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} - {} ({} min): {}",
            self.date.format(DATE_FORMAT),
            self.task_type,
            self.minutes,
            self.description
        )
    }
}

/// The issuer's business and banking details, one row of
/// `Company Details!A2:M2` merged over a local JSON base.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyProfile {
    pub company_name: String,
    pub company_address: String,
    pub company_cvr: String,
    pub company_zip: String,
    pub company_town: String,
    pub company_phone: String,
    pub company_email: String,
    pub bank_name: String,
    pub bank_account: String,
    pub iban: String,
    pub swift: String,
    pub additional_info: String,
    pub payment_terms_days: String,
}

impl CompanyProfile {
    /// Overrides fields with non-empty sheet cells; empty cells keep the
    /// local JSON value.
    pub fn merge_row(&mut self, row: &[String]) {
        let fields: [&mut String; 13] = [
            &mut self.company_name,
            &mut self.company_address,
            &mut self.company_cvr,
            &mut self.company_zip,
            &mut self.company_town,
            &mut self.company_phone,
            &mut self.company_email,
            &mut self.bank_name,
            &mut self.bank_account,
            &mut self.iban,
            &mut self.swift,
            &mut self.additional_info,
            &mut self.payment_terms_days,
        ];
        for (index, field) in fields.into_iter().enumerate() {
            if let Some(value) = row.get(index) {
                let value = value.trim();
                if !value.is_empty() {
                    *field = value.to_string();
                }
            }
        }
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.company_name.clone(),
            self.company_address.clone(),
            self.company_cvr.clone(),
            self.company_zip.clone(),
            self.company_town.clone(),
            self.company_phone.clone(),
            self.company_email.clone(),
            self.bank_name.clone(),
            self.bank_account.clone(),
            self.iban.clone(),
            self.swift.clone(),
            self.additional_info.clone(),
            self.payment_terms_days.clone(),
        ]
    }

    pub fn payment_terms(&self) -> Option<u64> {
        self.payment_terms_days.trim().parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn sample_customer() -> Customer {
        Customer {
            id: "7".to_string(),
            name: "Innotech".to_string(),
            address: "Some Place 4".to_string(),
            cvr: "12345678".to_string(),
            zip: "8000".to_string(),
            town: "Aarhus".to_string(),
            phone: "+45 11 22 33 44".to_string(),
            email: "billing@innotech.example".to_string(),
            hourly_rate: dec!(650),
        }
    }

    #[test]
    fn customer_row_round_trip() {
        let customer = sample_customer();
        let parsed = Customer::from_row(&customer.to_row()).unwrap();
        assert_eq!(parsed, customer);
    }

    #[test]
    fn customer_short_row_defaults() {
        let customer = Customer::from_row(&row(&["7", "Innotech"])).unwrap();
        assert_eq!(customer.name, "Innotech");
        assert_eq!(customer.email, "");
        assert_eq!(customer.hourly_rate, dec!(500));
    }

    #[test]
    fn customer_requires_name() {
        assert!(Customer::from_row(&row(&["7", ""])).is_none());
        assert!(Customer::from_row(&row(&["7"])).is_none());
    }

    fn sample_task() -> Task {
        Task {
            date: NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
            customer: "Innotech".to_string(),
            task_type: "Support".to_string(),
            pricing: PricingType::Hourly,
            description: "Mail server troubleshooting".to_string(),
            minutes: 90,
            price: Decimal::ZERO,
            discount_pct: Decimal::ZERO,
            line_sum: dec!(975.00),
        }
    }

    #[test]
    fn task_row_round_trip() {
        let task = sample_task();
        let parsed = Task::from_row(&task.to_row()).unwrap();
        assert_eq!(parsed, task);
    }

    #[test]
    fn task_minutes_accepts_decimal_strings() {
        let mut cells = sample_task().to_row();
        cells[5] = "180.0".to_string();
        assert_eq!(Task::from_row(&cells).unwrap().minutes, 180);
    }

    #[test]
    fn task_rejects_malformed_date() {
        let mut cells = sample_task().to_row();
        cells[0] = "14/03/2024".to_string();
        assert!(Task::from_row(&cells).is_none());
    }

    #[test]
    fn task_fingerprint_distinguishes_tasks() {
        let a = sample_task();
        let mut b = sample_task();
        b.minutes = 91;
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), sample_task().fingerprint());
    }

    #[test]
    fn pricing_type_strings() {
        assert_eq!(PricingType::Hourly.to_string(), "hourly");
        assert_eq!("fixed".parse::<PricingType>().unwrap(), PricingType::Fixed);
    }

    #[test]
    fn company_profile_sheet_overrides_base() {
        let mut profile = CompanyProfile {
            company_name: "Old Name".to_string(),
            company_email: "old@example.com".to_string(),
            ..CompanyProfile::default()
        };
        profile.merge_row(&row(&["ST Digital", "", "", "", "", "", ""]));
        assert_eq!(profile.company_name, "ST Digital");
        // empty sheet cell keeps the base value
        assert_eq!(profile.company_email, "old@example.com");
    }

    #[test]
    fn company_profile_row_round_trip() {
        let mut profile = CompanyProfile::default();
        profile.merge_row(&row(&[
            "ST Digital",
            "Hovedgaden 1",
            "87654321",
            "2100",
            "København",
            "+45 99 88 77 66",
            "kontakt@stdigital.example",
            "Danske Bank",
            "1234-567890",
            "DK5000400440116243",
            "DABADKKK",
            "Tak for handlen",
            "8",
        ]));
        let mut parsed = CompanyProfile::default();
        parsed.merge_row(&profile.to_row());
        assert_eq!(parsed, profile);
        assert_eq!(profile.payment_terms(), Some(8));
    }
}
