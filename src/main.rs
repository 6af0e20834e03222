mod auth;
mod billing;
mod cli;
mod config;
mod error;
mod input;
mod invoices;
mod mail;
mod pdf;
mod records;
mod run;
mod sheets;
mod store;
mod templates;

use clap::Parser;

use crate::cli::Opts;

fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    let opts = Opts::parse();

    if let Err(error) = run::run_cmd(opts.subcommand, &opts.config_dir) {
        eprintln!("{}", error);
        std::process::exit(1);
    }
}
