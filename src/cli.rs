use clap::{Parser, ValueHint};
use std::path::PathBuf;

/* Argument Structure
 *
 * customer [add | list]
 * task [add | list <customer>]
 * task-types
 * invoice [create (--credit-memo) (--no-preview) (-y) | search <query>]
 * company [show | edit]
 * sheet [info | read <range>]
 */

#[derive(Parser)]
pub struct Opts {
    #[clap(short, long, default_value=".",
        value_hint=ValueHint::DirPath)]
    pub config_dir: PathBuf,

    #[clap(subcommand)]
    pub subcommand: Command,
}

#[derive(Parser)]
pub enum Command {
    /// Add and list customers
    Customer {
        #[clap(subcommand)]
        action: CustomerCmd,
    },

    /// Add and list billable tasks
    Task {
        #[clap(subcommand)]
        action: TaskCmd,
    },

    /// List the configured task types
    TaskTypes,

    /// Create and search invoices
    Invoice {
        #[clap(subcommand)]
        action: InvoiceCmd,
    },

    /// Show or edit the company details used on invoices
    Company {
        #[clap(subcommand)]
        action: CompanyCmd,
    },

    /// Inspect the backing spreadsheet
    Sheet {
        #[clap(subcommand)]
        action: SheetCmd,
    },
}

#[derive(Parser)]
pub enum CustomerCmd {
    /// Add a new customer
    Add,
    /// List all customers
    List,
}

#[derive(Parser)]
pub enum TaskCmd {
    /// Register a billable task
    Add,
    /// List open tasks for a customer
    List {
        /// Customer name as registered in the customer sheet
        customer: String,
    },
}

#[derive(Parser)]
pub enum InvoiceCmd {
    /// Generate an invoice PDF and optionally email it
    Create {
        /// Issue a credit memo, negating all amounts
        #[clap(long)]
        credit_memo: bool,

        /// Skip the plain-text preview
        #[clap(long)]
        no_preview: bool,

        /// Answer yes to confirmation prompts
        #[clap(short, long)]
        yes: bool,
    },
    /// Search generated invoices and billed tasks
    Search {
        /// Free text matched against filenames and billed-task entries
        query: String,
    },
}

#[derive(Parser)]
pub enum CompanyCmd {
    /// Show the current company details
    Show,
    /// Edit the company details field by field
    Edit,
}

#[derive(Parser)]
pub enum SheetCmd {
    /// Show spreadsheet title and sheet names
    Info,
    /// Read an arbitrary range and print it
    Read {
        /// A1-notation range, e.g. 'Kunder!A:I'
        range: String,

        /// Row index to treat as the header
        #[clap(long, default_value = "0")]
        header_row: usize,
    },
}
