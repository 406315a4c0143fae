//! Sales invoice listing with open and overdue amounts.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::SalesInvoiceName;

/// One submitted sales invoice as shown in the document archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub name: SalesInvoiceName,
    /// Posting date.
    pub date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub total: Decimal,
    /// Outstanding amount.
    pub open: Decimal,
    pub status: String,
    pub pdf_url: String,
    pub is_overdue: bool,
}

/// An invoice is overdue when money is still open and the due date is past.
///
/// Invoices without a due date are never overdue.
#[must_use]
pub fn is_overdue(open: Decimal, due_date: Option<NaiveDate>, today: NaiveDate) -> bool {
    open > Decimal::ZERO && due_date.is_some_and(|due| due < today)
}

/// Totals over an invoice list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSummary {
    pub open_total: Decimal,
    pub overdue_total: Decimal,
    pub overdue_count: usize,
}

impl InvoiceSummary {
    #[must_use]
    pub fn from_lines(lines: &[InvoiceLine]) -> Self {
        lines.iter().fold(Self::default(), |mut acc, line| {
            acc.open_total += line.open;
            if line.is_overdue {
                acc.overdue_total += line.open;
                acc.overdue_count += 1;
            }
            acc
        })
    }
}
