//! Sales orders and invoices of a customer.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use sudimport_core::{
    CustomerName, DocStatus, InvoiceLine, InvoiceSummary, SalesInvoiceName, SalesOrderName,
    is_overdue,
};

use crate::erp::types::{SalesInvoiceRow, SalesOrderRow};
use crate::erp::{ErpClient, ErpError, Filter, ListQuery};

use super::AccessError;

const DOCUMENT_LIMIT: usize = 500;

/// One sales order in the order history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLine {
    pub name: SalesOrderName,
    pub date: Option<NaiveDate>,
    pub total: Decimal,
    pub status: Option<String>,
    pub docstatus: DocStatus,
    /// ERP print view of the order.
    pub pdf_url: Option<String>,
}

/// Owner fields of a sales invoice.
#[derive(Debug, Deserialize)]
struct InvoiceOwner {
    #[serde(default)]
    customer: Option<String>,
    #[serde(default)]
    docstatus: DocStatus,
}

/// Sales documents of one customer.
pub struct DocumentService<'a> {
    erp: &'a ErpClient,
}

impl<'a> DocumentService<'a> {
    #[must_use]
    pub const fn new(erp: &'a ErpClient) -> Self {
        Self { erp }
    }

    /// Sales orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the ERP read fails.
    #[instrument(skip(self), fields(customer = %customer))]
    pub async fn orders(&self, customer: &CustomerName) -> Result<Vec<OrderLine>, ErpError> {
        let rows: Vec<SalesOrderRow> = self
            .erp
            .list(
                &ListQuery::new("Sales Order")
                    .fields(&["name", "transaction_date", "grand_total", "status", "docstatus"])
                    .filter(Filter::eq("customer", customer.as_str()))
                    .order_by("transaction_date desc")
                    .limit(DOCUMENT_LIMIT),
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let pdf_url = match self.erp.print_view_url("Sales Order", &row.name) {
                    Ok(url) => Some(url.to_string()),
                    Err(e) => {
                        warn!(error = %e, "Cannot build print view link");
                        None
                    }
                };
                OrderLine {
                    name: SalesOrderName::new_unchecked(row.name),
                    date: row.transaction_date,
                    total: row.grand_total.unwrap_or_default(),
                    status: row.status,
                    docstatus: row.docstatus,
                    pdf_url,
                }
            })
            .collect())
    }

    /// Submitted sales invoices, newest first, with their open totals.
    ///
    /// # Errors
    ///
    /// Returns an error if the ERP read fails.
    #[instrument(skip(self), fields(customer = %customer))]
    pub async fn invoices(
        &self,
        customer: &CustomerName,
        today: NaiveDate,
    ) -> Result<(Vec<InvoiceLine>, InvoiceSummary), ErpError> {
        let rows: Vec<SalesInvoiceRow> = self
            .erp
            .list(
                &ListQuery::new("Sales Invoice")
                    .fields(&[
                        "name",
                        "posting_date",
                        "due_date",
                        "status",
                        "grand_total",
                        "outstanding_amount",
                    ])
                    .filters([
                        Filter::eq("customer", customer.as_str()),
                        Filter::eq("docstatus", 1),
                    ])
                    .order_by("posting_date desc")
                    .limit(DOCUMENT_LIMIT),
            )
            .await?;

        let lines: Vec<InvoiceLine> = rows.into_iter().map(|row| invoice_line(row, today)).collect();
        let summary = InvoiceSummary::from_lines(&lines);
        Ok((lines, summary))
    }

    /// PDF of a submitted invoice owned by `customer`.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::NotFound` for unknown or unsubmitted invoices
    /// and `AccessError::NotOwner` for invoices of other customers.
    #[instrument(skip(self), fields(customer = %customer))]
    pub async fn invoice_pdf(
        &self,
        name: &SalesInvoiceName,
        customer: &CustomerName,
    ) -> Result<Vec<u8>, AccessError> {
        let owner: InvoiceOwner = match self.erp.get_doc("Sales Invoice", name.as_str()).await {
            Ok(owner) => owner,
            Err(e) if e.is_not_found() => return Err(AccessError::NotFound("Invoice")),
            Err(e) => return Err(e.into()),
        };
        if !owner.docstatus.is_submitted() {
            return Err(AccessError::NotFound("Invoice"));
        }
        if owner.customer.as_deref() != Some(customer.as_str()) {
            warn!(invoice = %name, "Invoice access denied");
            return Err(AccessError::NotOwner("invoice"));
        }

        Ok(self.erp.download_pdf("Sales Invoice", name.as_str()).await?)
    }
}

fn invoice_line(row: SalesInvoiceRow, today: NaiveDate) -> InvoiceLine {
    let open = row.outstanding_amount.unwrap_or_default();
    InvoiceLine {
        pdf_url: format!("/api/pdf/sales-invoice/{}", urlencoding::encode(&row.name)),
        name: SalesInvoiceName::new_unchecked(row.name),
        date: row.posting_date,
        due_date: row.due_date,
        total: row.grand_total.unwrap_or_default(),
        open,
        status: row.status.unwrap_or_default(),
        is_overdue: is_overdue(open, row.due_date, today),
    }
}
