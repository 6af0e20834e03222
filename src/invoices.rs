//! Invoice numbering and the billed-task ledger.
//!
//! The number sequence is a JSON sidecar file holding the next consecutive
//! number; `peek` shows it without consuming it. The ledger records which
//! tasks were already billed so re-billing requires explicit confirmation.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::FakturaError;
use crate::records::Task;

/// First invoice number ever issued.
pub const NUMBER_SEED: u32 = 785;

#[derive(Debug, Serialize, Deserialize)]
struct CounterFile {
    next_number: u32,
}

pub struct NumberSequence {
    path: PathBuf,
}

impl NumberSequence {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The number the next invoice will get, without consuming it.
    pub fn peek(&self) -> Result<u32, FakturaError> {
        if !self.path.exists() {
            return Ok(NUMBER_SEED);
        }
        let counter: CounterFile = serde_json::from_str(&fs::read_to_string(&self.path)?)?;
        Ok(counter.next_number)
    }

    /// Consumes and returns the next number.
    pub fn allocate(&self) -> Result<u32, FakturaError> {
        let number = self.peek()?;
        let counter = CounterFile {
            next_number: number + 1,
        };
        fs::write(&self.path, serde_json::to_string_pretty(&counter)?)?;
        info!("Allocated invoice number {}", number);
        Ok(number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BilledEntry {
    pub invoice_number: u32,
    pub billed_on: String,
    pub customer: String,
    pub task_date: String,
    pub task_type: String,
    pub description: String,
}

#[derive(Debug, Default)]
pub struct BilledLedger {
    path: PathBuf,
    entries: BTreeMap<String, BilledEntry>,
}

impl BilledLedger {
    /// A missing or unreadable ledger degrades to empty; worst case the
    /// operator is not warned about a duplicate.
    pub fn load(path: &Path) -> Self {
        let entries = if path.exists() {
            match fs::read_to_string(path)
                .map_err(FakturaError::from)
                .and_then(|raw| Ok(serde_json::from_str(&raw)?))
            {
                Ok(entries) => entries,
                Err(err) => {
                    warn!("Failed to load billed-task ledger: {}", err);
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        Self {
            path: path.to_path_buf(),
            entries,
        }
    }

    pub fn already_billed(&self, task: &Task) -> Option<&BilledEntry> {
        self.entries.get(&task.fingerprint())
    }

    pub fn record(&mut self, tasks: &[Task], invoice_number: u32) -> Result<(), FakturaError> {
        let billed_on = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        for task in tasks {
            self.entries.insert(
                task.fingerprint(),
                BilledEntry {
                    invoice_number,
                    billed_on: billed_on.clone(),
                    customer: task.customer.clone(),
                    task_date: task.date.to_string(),
                    task_type: task.task_type.clone(),
                    description: task.description.clone(),
                },
            );
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.entries)?)?;
        info!(
            "Recorded {} tasks as billed on invoice #{}",
            tasks.len(),
            invoice_number
        );
        Ok(())
    }

    pub fn entries(&self) -> impl Iterator<Item = &BilledEntry> {
        self.entries.values()
    }
}

/// Case-insensitive free-text search across generated PDF filenames and the
/// billed-task ledger. Returns printable match lines.
pub fn search_invoices(invoice_dir: &Path, ledger: &BilledLedger, query: &str) -> Vec<String> {
    let needle = query.to_lowercase();
    let mut matches = Vec::new();

    if let Ok(dir) = fs::read_dir(invoice_dir) {
        let mut files: Vec<String> = dir
            .flatten()
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.to_lowercase().ends_with(".pdf"))
            .filter(|name| name.to_lowercase().contains(&needle))
            .collect();
        files.sort();
        for name in files {
            matches.push(invoice_dir.join(name).display().to_string());
        }
    }

    for entry in ledger.entries() {
        let haystack = format!(
            "{} {} {} {} {}",
            entry.invoice_number, entry.customer, entry.task_date, entry.task_type, entry.description
        );
        if haystack.to_lowercase().contains(&needle) {
            matches.push(format!(
                "faktura #{} ({}): {} | {} | {} | {}",
                entry.invoice_number,
                entry.billed_on,
                entry.customer,
                entry.task_date,
                entry.task_type,
                entry.description
            ));
        }
    }

    matches
}
