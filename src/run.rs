use std::path::Path;

use chrono::Local;

use crate::auth::Authenticator;
use crate::billing::{Invoice, DEFAULT_PAYMENT_TERMS_DAYS};
use crate::cli::{Command, CompanyCmd, CustomerCmd, InvoiceCmd, SheetCmd, TaskCmd};
use crate::config::{AuthMethod, Config};
use crate::error::FakturaError;
use crate::input;
use crate::invoices::{search_invoices, BilledLedger, NumberSequence};
use crate::mail;
use crate::pdf;
use crate::records::{CompanyProfile, Customer};
use crate::sheets::{Frame, SheetsClient};
use crate::store::Store;
use crate::templates;

pub fn run_cmd(cmd: Command, config_dir: &Path) -> Result<(), FakturaError> {
    let config = Config::from_env(config_dir)?;

    match cmd {
        Command::Customer { action } => with_store(&config, |_, store| match action {
            CustomerCmd::Add => add_customer(store),
            CustomerCmd::List => list_customers(store),
        }),
        Command::Task { action } => with_store(&config, |_, store| match action {
            TaskCmd::Add => add_task(store),
            TaskCmd::List { ref customer } => list_tasks(store, customer),
        }),
        Command::TaskTypes => with_store(&config, |_, store| list_task_types(store)),
        Command::Invoice { action } => match action {
            // searching never touches the spreadsheet
            InvoiceCmd::Search { query } => search(&config, &query),
            InvoiceCmd::Create {
                credit_memo,
                no_preview,
                yes,
            } => with_store(&config, |_, store| {
                create_invoice(&config, store, credit_memo, no_preview, yes)
            }),
        },
        Command::Company { action } => with_store(&config, |_, store| match action {
            CompanyCmd::Show => show_company(&config, store),
            CompanyCmd::Edit => edit_company(&config, store),
        }),
        Command::Sheet { action } => with_store(&config, |client, _| match action {
            SheetCmd::Info => sheet_info(&config, client),
            SheetCmd::Read {
                ref range,
                header_row,
            } => sheet_read(&config, client, range, header_row),
        }),
    }
}

fn with_store<F>(config: &Config, f: F) -> Result<(), FakturaError>
where
    F: FnOnce(&SheetsClient, &Store) -> Result<(), FakturaError>,
{
    let auth = match config.auth_method {
        AuthMethod::ServiceAccount => {
            Authenticator::service_account(&config.service_account_path())?
        }
        AuthMethod::Oauth => {
            Authenticator::oauth(&config.oauth_credentials_path(), &config.oauth_token_path())?
        }
    };
    let client = SheetsClient::new(auth);
    let store = Store::new(&client, &config.spreadsheet_id);
    f(&client, &store)
}

fn add_customer(store: &Store) -> Result<(), FakturaError> {
    let customers = store.customers()?;
    let customer = input::new_customer(next_customer_id(&customers))?;

    println!("\nAdding customer:\n\n{}\n", customer);
    if input::confirm("Add this customer?")? {
        store.append_customer(&customer)?;
        println!("Added {}", customer.name);
    }
    Ok(())
}

fn list_customers(store: &Store) -> Result<(), FakturaError> {
    for customer in store.customers()? {
        println!("{}", customer);
    }
    Ok(())
}

fn add_task(store: &Store) -> Result<(), FakturaError> {
    let customers = store.customers()?;
    if customers.is_empty() {
        return Err(FakturaError::NoCustomers);
    }
    let customer = input::select_customer(&customers)?;
    let task = input::new_task(customer, store.task_types()?)?;

    println!("\nAdding task:\n\n{}\n", task);
    if input::confirm("Add this task?")? {
        store.append_task(&task)?;
        println!("Added task for {}", task.customer);
    }
    Ok(())
}

fn list_tasks(store: &Store, customer: &str) -> Result<(), FakturaError> {
    let tasks = store.tasks_for(customer)?;
    let total_minutes: u32 = tasks.iter().map(|t| t.minutes).sum();
    for task in tasks {
        println!("{}", task);
    }
    println!(
        "\nTotal: {:.2} hours ({} minutes)",
        f64::from(total_minutes) / 60.0,
        total_minutes
    );
    Ok(())
}

fn list_task_types(store: &Store) -> Result<(), FakturaError> {
    for task_type in store.task_types()? {
        println!("{}", task_type);
    }
    Ok(())
}

fn create_invoice(
    config: &Config,
    store: &Store,
    credit_memo: bool,
    no_preview: bool,
    yes: bool,
) -> Result<(), FakturaError> {
    let company = store.company_profile_required(&config.company_file())?;

    let customers = store.customers()?;
    if customers.is_empty() {
        return Err(FakturaError::NoCustomers);
    }
    let customer = input::select_customer(&customers)?.clone();

    let tasks = store.tasks_for(&customer.name)?;
    if tasks.is_empty() {
        return Err(FakturaError::NoTasks {
            customer: customer.name,
        });
    }

    let mut ledger = BilledLedger::load(&config.ledger_file());
    let selected = loop {
        let selected = input::select_tasks(&tasks)?;
        if selected.is_empty() {
            println!("No tasks selected.");
            return Ok(());
        }

        let duplicates: Vec<_> = selected
            .iter()
            .filter_map(|task| ledger.already_billed(task).map(|entry| (task, entry)))
            .collect();
        if duplicates.is_empty() || yes {
            break selected;
        }

        println!("\nSome of these tasks were billed before:\n");
        for (task, entry) in &duplicates {
            println!("  {} (invoice #{}, {})", task, entry.invoice_number, entry.billed_on);
        }
        if input::confirm("Bill them again anyway?")? {
            break selected;
        }
        // back to task selection
    };

    let terms = payment_terms(&company, config);
    let sequence = NumberSequence::new(config.counter_file());
    let mut invoice = Invoice::draft(
        sequence.peek()?,
        customer,
        selected.clone(),
        Local::now().date_naive(),
        terms,
        credit_memo,
    );

    if !no_preview {
        templates::print_preview(&invoice)?;
    }
    if !yes && !input::confirm("Generate this invoice?")? {
        println!("Aborted.");
        return Ok(());
    }

    // the preview showed the prospective number; the allocated one is
    // authoritative in case the counter moved in between
    invoice.number = sequence.allocate()?;
    let pdf_path = pdf::render_invoice(&invoice, &company, &config.invoice_dir())?;
    ledger.record(&selected, invoice.number)?;
    println!("Wrote {}", pdf_path.display());

    let recipient = invoice.customer.email.clone();
    if recipient.is_empty() {
        println!("Customer has no email address, skipping send.");
        return Ok(());
    }
    let send = yes
        || input::confirm(&format!(
            "Email the {} to {}?",
            invoice.kind(),
            recipient
        ))?;
    if !send {
        return Ok(());
    }

    let raw_cc = if yes { String::new() } else { input::cc_addresses()? };
    let mut cc = mail::clean_cc_list(&raw_cc, &recipient);
    if let Some(bookkeeping) = config.bookkeeping_email.as_deref() {
        let already = bookkeeping.eq_ignore_ascii_case(&recipient)
            || cc.iter().any(|a| a.eq_ignore_ascii_case(bookkeeping));
        if !already
            && (yes || input::confirm(&format!("CC the bookkeeper at {}?", bookkeeping))?)
        {
            cc.push(bookkeeping.to_string());
        }
    }

    mail::send_invoice(config, &company, &invoice, &pdf_path, &recipient, &cc)?;
    println!("Sent {} #{} to {}", invoice.kind(), invoice.number, recipient);
    Ok(())
}

fn search(config: &Config, query: &str) -> Result<(), FakturaError> {
    let ledger = BilledLedger::load(&config.ledger_file());
    let matches = search_invoices(&config.invoice_dir(), &ledger, query);
    if matches.is_empty() {
        println!("No matches for '{}'", query);
        return Ok(());
    }
    for line in matches {
        println!("{}", line);
    }
    Ok(())
}

fn show_company(config: &Config, store: &Store) -> Result<(), FakturaError> {
    let profile = store.company_profile(&config.company_file())?;
    for (label, value) in [
        ("Company name", &profile.company_name),
        ("Address", &profile.company_address),
        ("CVR", &profile.company_cvr),
        ("Zip", &profile.company_zip),
        ("Town", &profile.company_town),
        ("Phone", &profile.company_phone),
        ("Email", &profile.company_email),
        ("Bank name", &profile.bank_name),
        ("Bank account", &profile.bank_account),
        ("IBAN", &profile.iban),
        ("SWIFT", &profile.swift),
        ("Additional info", &profile.additional_info),
        ("Payment terms (days)", &profile.payment_terms_days),
    ] {
        println!("{:<22} {}", format!("{}:", label), value);
    }
    Ok(())
}

fn edit_company(config: &Config, store: &Store) -> Result<(), FakturaError> {
    let profile = store.company_profile(&config.company_file())?;
    let edited = input::edit_company(&profile)?;
    store.save_company_profile(&config.company_file(), &edited)?;
    println!("Company details saved.");
    Ok(())
}

fn sheet_info(config: &Config, client: &SheetsClient) -> Result<(), FakturaError> {
    let info = client.describe(&config.spreadsheet_id)?;
    println!("Spreadsheet: {}", info.title);
    println!("Id:          {}", info.spreadsheet_id);
    println!("Sheets:");
    for sheet in info.sheets {
        println!("  {}", sheet);
    }
    Ok(())
}

fn sheet_read(
    config: &Config,
    client: &SheetsClient,
    range: &str,
    header_row: usize,
) -> Result<(), FakturaError> {
    let frame = client.read_frame(&config.spreadsheet_id, range, header_row)?;
    print_frame(&frame);
    Ok(())
}

fn print_frame(frame: &Frame) {
    if !frame.headers.is_empty() {
        println!("{}", frame.headers.join(" | "));
    }
    for row in &frame.rows {
        println!("{}", row.join(" | "));
    }
}

/// Next free numeric customer id; gaps are not reused.
fn next_customer_id(customers: &[Customer]) -> u32 {
    customers
        .iter()
        .filter_map(|c| c.id.parse::<u32>().ok())
        .max()
        .unwrap_or(0)
        + 1
}

/// Company profile wins over the environment, then the default applies.
fn payment_terms(company: &CompanyProfile, config: &Config) -> u64 {
    company
        .payment_terms()
        .or(config.payment_terms_days)
        .unwrap_or(DEFAULT_PAYMENT_TERMS_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use rust_decimal_macros::dec;

    fn customer(id: &str) -> Customer {
        Customer {
            id: id.to_string(),
            name: "Innotech".to_string(),
            address: String::new(),
            cvr: String::new(),
            zip: String::new(),
            town: String::new(),
            phone: String::new(),
            email: String::new(),
            hourly_rate: dec!(500),
        }
    }

    fn test_config(terms: Option<u64>) -> Config {
        Config {
            config_dir: PathBuf::from("."),
            spreadsheet_id: "abc".to_string(),
            auth_method: AuthMethod::ServiceAccount,
            service_account_file: "service_account.json".to_string(),
            oauth_credentials_file: "credentials.json".to_string(),
            oauth_token_file: "token.json".to_string(),
            smtp_server: "smtp.example.com".to_string(),
            smtp_port: 587,
            sender_email: None,
            sender_password: None,
            bookkeeping_email: None,
            payment_terms_days: terms,
            invoice_dir_name: "Fakturaer".to_string(),
        }
    }

    #[test]
    fn customer_ids_count_up_from_the_highest() {
        assert_eq!(next_customer_id(&[]), 1);
        assert_eq!(
            next_customer_id(&[customer("1"), customer("7"), customer("3")]),
            8
        );
        // non-numeric ids are ignored
        assert_eq!(next_customer_id(&[customer("x"), customer("2")]), 3);
    }

    #[test]
    fn payment_terms_precedence() {
        let mut profile = CompanyProfile::default();
        assert_eq!(payment_terms(&profile, &test_config(None)), 8);
        assert_eq!(payment_terms(&profile, &test_config(Some(30))), 30);

        profile.payment_terms_days = "14".to_string();
        assert_eq!(payment_terms(&profile, &test_config(Some(30))), 14);
    }
}
