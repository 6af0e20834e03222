use std::fmt;
use std::ops::{Add, Mul, Neg};

use chrono::{Days, NaiveDate};
use num_format::{Locale, ToFormattedString};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::records::{Customer, PricingType, Task};

pub const DEFAULT_PAYMENT_TERMS_DAYS: u64 = 8;

/// Danish VAT, applied to every invoice subtotal.
pub fn vat_rate() -> Decimal {
    Decimal::new(25, 2)
}

/// An amount in DKK, always held at two decimal places.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, PartialOrd, Clone, Copy)]
pub struct Money(Decimal);

impl Money {
    pub fn new(amount: Decimal) -> Self {
        Self(amount.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven))
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }
}

impl Add<Money> for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }
}

impl Mul<Decimal> for Money {
    type Output = Self;

    fn mul(self, other: Decimal) -> Self {
        Self::new(self.0 * other)
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let sign = if self.0.is_sign_negative() { "-" } else { "" };
        let total_cents = (self.0.abs() * Decimal::from(100)).to_i64().unwrap_or(0);
        let units = total_cents / 100;
        let cents = total_cents % 100;
        write!(
            f,
            "{}{},{:02} DKK",
            sign,
            units.to_formatted_string(&Locale::da),
            cents
        )
    }
}

/// What one task bills: minutes against the hourly rate, or the task's own
/// price, with the discount percentage taken off either way.
pub fn line_total(task: &Task, hourly_rate: Decimal) -> Money {
    let gross = match task.pricing {
        PricingType::Hourly => Decimal::from(task.minutes) / Decimal::from(60) * hourly_rate,
        PricingType::Fixed => task.price,
    };
    let factor = Decimal::ONE - task.discount_pct / Decimal::from(100);
    Money::new(gross * factor)
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct InvoiceLine {
    pub task: Task,
    pub amount: Money,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct InvoiceTotal {
    pub subtotal: Money,
    pub vat: Money,
    pub total: Money,
    pub total_minutes: u32,
}

impl fmt::Display for InvoiceTotal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "Total time:      {:.2} hours ({} minutes)",
            f64::from(self.total_minutes) / 60.0,
            self.total_minutes
        )?;
        writeln!(f, "Subtotal:        {}", self.subtotal)?;
        writeln!(f, "VAT (25%):       {}", self.vat)?;
        write!(f, "Total incl. VAT: {}", self.total)
    }
}

/// An invoice draft: derived at generation time and realized only as a PDF
/// plus a send confirmation, never persisted as a structured record.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct Invoice {
    pub number: u32,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub customer: Customer,
    pub lines: Vec<InvoiceLine>,
    pub credit_memo: bool,
}

impl Invoice {
    pub fn draft(
        number: u32,
        customer: Customer,
        tasks: Vec<Task>,
        issue_date: NaiveDate,
        payment_terms_days: u64,
        credit_memo: bool,
    ) -> Self {
        let due_date = issue_date
            .checked_add_days(Days::new(payment_terms_days))
            .unwrap_or(issue_date);
        let lines = tasks
            .into_iter()
            .map(|task| {
                let amount = line_total(&task, customer.hourly_rate);
                InvoiceLine {
                    amount: if credit_memo { -amount } else { amount },
                    task,
                }
            })
            .collect();
        Self {
            number,
            issue_date,
            due_date,
            customer,
            lines,
            credit_memo,
        }
    }

    pub fn calculate(&self) -> InvoiceTotal {
        let subtotal = self
            .lines
            .iter()
            .fold(Money::zero(), |acc, line| acc + line.amount);
        let vat = subtotal * vat_rate();
        InvoiceTotal {
            subtotal,
            vat,
            total: subtotal + vat,
            total_minutes: self.lines.iter().map(|line| line.task.minutes).sum(),
        }
    }

    pub fn title(&self) -> &'static str {
        if self.credit_memo {
            "KREDITNOTA"
        } else {
            "FAKTURA"
        }
    }

    /// Lowercase document kind for email subjects and bodies.
    pub fn kind(&self) -> &'static str {
        if self.credit_memo {
            "kreditnota"
        } else {
            "faktura"
        }
    }

    pub fn pdf_file_name(&self) -> String {
        format!(
            "faktura_{}_{}.pdf",
            self.number,
            self.issue_date.format("%Y-%m-%d")
        )
    }
}

impl fmt::Display for Invoice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} #{}\nDate: {}  Due: {}\n\n",
            self.title(),
            self.number,
            self.issue_date,
            self.due_date
        )?;
        for line in self.lines.iter() {
            writeln!(f, "{}: {}", line.task, line.amount)?;
        }
        write!(f, "\n{}", self.calculate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn customer(rate: Decimal) -> Customer {
        Customer {
            id: "1".to_string(),
            name: "Innotech".to_string(),
            address: String::new(),
            cvr: String::new(),
            zip: String::new(),
            town: String::new(),
            phone: String::new(),
            email: String::new(),
            hourly_rate: rate,
        }
    }

    fn hourly_task(minutes: u32) -> Task {
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

    fn issue_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 2).unwrap()
    }

    #[test]
    fn hourly_line_total() {
        assert_eq!(line_total(&hourly_task(90), dec!(500)), Money::new(dec!(750)));
        assert_eq!(line_total(&hourly_task(1), dec!(500)), Money::new(dec!(8.33)));
    }

    #[test]
    fn fixed_line_total_with_discount() {
        let mut task = hourly_task(0);
        task.pricing = PricingType::Fixed;
        task.price = dec!(1000);
        task.discount_pct = dec!(10);
        assert_eq!(line_total(&task, dec!(500)), Money::new(dec!(900)));
    }

    #[test]
    fn invoice_totals_for_fixed_task_set() {
        // 90 + 30 + 60 minutes at 500 DKK/h = 3h = 1500.00
        let tasks = vec![hourly_task(90), hourly_task(30), hourly_task(60)];
        let invoice = Invoice::draft(785, customer(dec!(500)), tasks, issue_date(), 8, false);
        let total = invoice.calculate();
        assert_eq!(total.total_minutes, 180);
        assert_eq!(total.subtotal, Money::new(dec!(1500)));
        assert_eq!(total.vat, Money::new(dec!(375)));
        assert_eq!(total.total, Money::new(dec!(1875)));
    }

    #[test]
    fn due_date_is_issue_plus_terms() {
        let invoice = Invoice::draft(
            785,
            customer(dec!(500)),
            vec![hourly_task(60)],
            issue_date(),
            8,
            false,
        );
        assert_eq!(invoice.due_date, NaiveDate::from_ymd_opt(2024, 4, 10).unwrap());
    }

    #[test]
    fn credit_memo_negates_amounts() {
        let tasks = vec![hourly_task(90), hourly_task(30)];
        let regular =
            Invoice::draft(785, customer(dec!(500)), tasks.clone(), issue_date(), 8, false);
        let memo = Invoice::draft(786, customer(dec!(500)), tasks, issue_date(), 8, true);
        assert_eq!(memo.calculate().total, -regular.calculate().total);
        assert_eq!(memo.title(), "KREDITNOTA");
    }

    #[test]
    fn money_display_danish_grouping() {
        assert_eq!(Money::new(dec!(1234.5)).to_string(), "1.234,50 DKK");
        assert_eq!(Money::new(dec!(-8.33)).to_string(), "-8,33 DKK");
        assert_eq!(Money::zero().to_string(), "0,00 DKK");
    }

    #[test]
    fn money_rounds_banker_style() {
        assert_eq!(Money::new(dec!(0.125)), Money::new(dec!(0.12)));
        assert_eq!(Money::new(dec!(0.135)), Money::new(dec!(0.14)));
    }

    proptest! {
        #[test]
        fn totals_are_consistent(minutes in prop::collection::vec(0u32..6000, 1..20)) {
            let tasks: Vec<Task> = minutes.iter().map(|&m| hourly_task(m)).collect();
            let invoice =
                Invoice::draft(785, customer(dec!(500)), tasks, issue_date(), 8, false);
            let total = invoice.calculate();

            prop_assert_eq!(total.total, total.subtotal + total.vat);
            prop_assert_eq!(total.vat, total.subtotal * vat_rate());
            prop_assert_eq!(total.total_minutes, minutes.iter().sum::<u32>());
        }

        #[test]
        fn credit_memo_mirrors_invoice(minutes in prop::collection::vec(1u32..6000, 1..10)) {
            let tasks: Vec<Task> = minutes.iter().map(|&m| hourly_task(m)).collect();
            let regular =
                Invoice::draft(785, customer(dec!(500)), tasks.clone(), issue_date(), 8, false);
            let memo = Invoice::draft(785, customer(dec!(500)), tasks, issue_date(), 8, true);

            prop_assert_eq!(memo.calculate().subtotal, -regular.calculate().subtotal);
            prop_assert_eq!(memo.calculate().total, -regular.calculate().total);
        }
    }
}
