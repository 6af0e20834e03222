use chrono::Local;
use inquire::{
    error::InquireError, Confirm, CustomType, DateSelect, MultiSelect, Select, Text,
};
use rust_decimal::Decimal;
use strum::VariantNames;

use crate::billing;
use crate::records::{default_hourly_rate, CompanyProfile, Customer, PricingType, Task};

type InputResult<T> = Result<T, InquireError>;

pub fn new_customer(next_id: u32) -> InputResult<Customer> {
    let name = Text::new("Name:").prompt()?;
    let address = Text::new("Address:").prompt()?;
    let cvr = Text::new("CVR:").prompt()?;
    let zip = Text::new("Zip:").prompt()?;
    let town = Text::new("Town:").prompt()?;
    let phone = Text::new("Phone:").prompt()?;
    let email = Text::new("Email:").prompt()?;
    let hourly_rate: Decimal = CustomType::new("Hourly rate (DKK):")
        .with_default(default_hourly_rate())
        .with_error_message("Please type a valid amount")
        .prompt()?;

    Ok(Customer {
        id: next_id.to_string(),
        name,
        address,
        cvr,
        zip,
        town,
        phone,
        email,
        hourly_rate,
    })
}

pub fn select_customer(customers: &[Customer]) -> InputResult<&Customer> {
    let labels: Vec<String> = customers.iter().map(|c| c.name.clone()).collect();
    let choice = Select::new("Customer:", labels).raw_prompt()?;
    Ok(&customers[choice.index])
}

pub fn new_task(customer: &Customer, task_types: Vec<String>) -> InputResult<Task> {
    let date = DateSelect::new("Date:")
        .with_default(Local::now().date_naive())
        .prompt()?;

    let task_type = if task_types.is_empty() {
        Text::new("Task type:").prompt()?
    } else {
        Select::new("Task type:", task_types).prompt()?
    };

    let pricing: PricingType = Select::new("Pricing:", PricingType::VARIANTS.to_vec())
        .prompt()?
        .parse()
        .unwrap_or(PricingType::Hourly);

    let description = Text::new("Description:").prompt()?;

    let minutes: u32 = match pricing {
        PricingType::Hourly => CustomType::new("Minutes spent:")
            .with_error_message("Please type a whole number of minutes")
            .prompt()?,
        PricingType::Fixed => CustomType::new("Minutes spent:")
            .with_default(0u32)
            .with_error_message("Please type a whole number of minutes")
            .prompt()?,
    };

    let price: Decimal = match pricing {
        PricingType::Hourly => Decimal::ZERO,
        PricingType::Fixed => CustomType::new("Fixed price (DKK):")
            .with_error_message("Please type a valid amount")
            .prompt()?,
    };

    let discount_pct: Decimal = CustomType::new("Discount (%):")
        .with_default(Decimal::ZERO)
        .with_error_message("Please type a valid percentage")
        .prompt()?;

    let mut task = Task {
        date,
        customer: customer.name.clone(),
        task_type,
        pricing,
        description,
        minutes,
        price,
        discount_pct,
        line_sum: Decimal::ZERO,
    };
    task.line_sum = billing::line_total(&task, customer.hourly_rate).amount();
    Ok(task)
}

pub fn select_tasks(tasks: &[Task]) -> InputResult<Vec<Task>> {
    let labels: Vec<String> = tasks.iter().map(|t| t.to_string()).collect();
    let chosen = MultiSelect::new("Tasks to bill:", labels)
        .with_formatter(&|selection| {
            let indices: Vec<usize> = selection.iter().map(|opt| opt.index).collect();
            selection_summary(tasks, &indices)
        })
        .raw_prompt()?;
    Ok(chosen.into_iter().map(|opt| tasks[opt.index].clone()).collect())
}

/// Selected-task count and time total, shown as the answer to the task
/// multi-select.
fn selection_summary(tasks: &[Task], indices: &[usize]) -> String {
    let minutes: u32 = indices.iter().map(|&i| tasks[i].minutes).sum();
    format!(
        "{} tasks, {:.2} hours ({} minutes)",
        indices.len(),
        f64::from(minutes) / 60.0,
        minutes
    )
}

pub fn cc_addresses() -> InputResult<String> {
    Text::new("CC addresses (comma separated):")
        .with_help_message("Hit <enter> to skip")
        .prompt()
}

pub fn confirm(message: &str) -> InputResult<bool> {
    Confirm::new(message).with_default(false).prompt()
}

pub fn edit_company(current: &CompanyProfile) -> InputResult<CompanyProfile> {
    let mut edited = current.clone();
    let fields: [(&str, &mut String); 13] = [
        ("Company name:", &mut edited.company_name),
        ("Address:", &mut edited.company_address),
        ("CVR:", &mut edited.company_cvr),
        ("Zip:", &mut edited.company_zip),
        ("Town:", &mut edited.company_town),
        ("Phone:", &mut edited.company_phone),
        ("Email:", &mut edited.company_email),
        ("Bank name:", &mut edited.bank_name),
        ("Bank account:", &mut edited.bank_account),
        ("IBAN:", &mut edited.iban),
        ("SWIFT:", &mut edited.swift),
        ("Additional info:", &mut edited.additional_info),
        ("Payment terms (days):", &mut edited.payment_terms_days),
    ];
    for (prompt, field) in fields {
        let initial = field.clone();
        *field = Text::new(prompt).with_initial_value(&initial).prompt()?;
    }
    Ok(edited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn task(minutes: u32) -> Task {
        Task {
            date: NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
            customer: "Innotech".to_string(),
            task_type: "Support".to_string(),
            pricing: PricingType::Hourly,
            description: "work".to_string(),
            minutes,
            price: Decimal::ZERO,
            discount_pct: Decimal::ZERO,
            line_sum: Decimal::ZERO,
        }
    }

    #[test]
    fn selection_summary_totals_minutes() {
        let tasks = vec![task(90), task(30), task(60)];
        assert_eq!(
            selection_summary(&tasks, &[0, 2]),
            "2 tasks, 2.50 hours (150 minutes)"
        );
        assert_eq!(selection_summary(&tasks, &[]), "0 tasks, 0.00 hours (0 minutes)");
    }
}
