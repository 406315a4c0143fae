//! ERPNext document shapes as returned by the REST API.
//!
//! Only the fields the storefront asks for are modelled. Every field is
//! optional on the wire: Frappe omits `null` link fields and older documents
//! lack custom fields.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use sudimport_core::{DocStatus, DynamicLink};

/// `{"data": ...}` wrapper of the resource API.
#[derive(Debug, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

/// `{"message": ...}` wrapper of whitelisted methods.
#[derive(Debug, Deserialize)]
pub struct MessageEnvelope<T> {
    pub message: T,
}

/// A row that only carries the document name.
#[derive(Debug, Clone, Deserialize)]
pub struct NameRow {
    pub name: String,
}

// =============================================================================
// User / Contact / Customer
// =============================================================================

/// `User` fields read by the storefront.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub linked_customer: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// A `Contact Email` child row.
#[derive(Debug, Clone, Deserialize)]
pub struct ContactEmailRow {
    pub parent: String,
}

/// The links of a `Contact`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactLinks {
    #[serde(default)]
    pub links: Vec<DynamicLink>,
}

/// `Customer` fields read by the storefront.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerRecord {
    #[serde(default)]
    pub default_price_list: Option<String>,
    #[serde(default)]
    pub customer_primary_address: Option<String>,
    #[serde(default)]
    pub customer_secondary_address: Option<String>,
}

// =============================================================================
// Prices
// =============================================================================

/// One `Item Price` row, or one entry of the personalized price method.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemPriceRow {
    pub item_code: String,
    pub price_list_rate: Decimal,
}

/// Result of the personalized price method.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PriceListMessage {
    #[serde(default)]
    pub prezzi: Vec<ItemPriceRow>,
}

// =============================================================================
// Items
// =============================================================================

/// An `Item` row as shown in listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemRow {
    pub name: String,
    #[serde(default)]
    pub item_name: Option<String>,
    #[serde(default)]
    pub item_group: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing)]
    pub standard_rate: Option<Decimal>,
    #[serde(default, skip_serializing)]
    pub prezzo_vendita: Option<Decimal>,
}

/// Only the item group of an `Item`.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemGroupRow {
    #[serde(default)]
    pub item_group: Option<String>,
}

/// `Item Tax` child row.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemTaxRow {
    #[serde(default)]
    pub item_tax_template: Option<String>,
}

/// `UOM Conversion Detail` child row.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UomConversionRow {
    #[serde(default)]
    pub uom: Option<String>,
    #[serde(default)]
    pub conversion_factor: Option<Decimal>,
}

/// A full `Item` document (`expand=1`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemDocument {
    pub name: String,
    #[serde(default)]
    pub item_url: Option<String>,
    #[serde(default)]
    pub item_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub prezzo_vendita: Option<Decimal>,
    #[serde(default)]
    pub standard_rate: Option<Decimal>,
    #[serde(default)]
    pub taxes: Vec<ItemTaxRow>,
    #[serde(default)]
    pub uoms: Vec<UomConversionRow>,
    #[serde(default)]
    pub stock_uom: Option<String>,
    #[serde(default)]
    pub weight_per_unit: Option<Decimal>,
    #[serde(default)]
    pub weight_uom: Option<String>,
    #[serde(default)]
    pub min_order_qty: Option<Decimal>,
    #[serde(default)]
    pub shelf_life: Option<Value>,
    #[serde(default)]
    pub origin: Option<Value>,
}

// =============================================================================
// Sales documents
// =============================================================================

/// A `Sales Order` row.
#[derive(Debug, Clone, Deserialize)]
pub struct SalesOrderRow {
    pub name: String,
    #[serde(default)]
    pub transaction_date: Option<NaiveDate>,
    #[serde(default)]
    pub grand_total: Option<Decimal>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub docstatus: DocStatus,
}

/// A `Sales Invoice` row.
#[derive(Debug, Clone, Deserialize)]
pub struct SalesInvoiceRow {
    pub name: String,
    #[serde(default)]
    pub posting_date: Option<NaiveDate>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub grand_total: Option<Decimal>,
    #[serde(default)]
    pub outstanding_amount: Option<Decimal>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_item_document_tolerates_missing_fields() {
        let doc: ItemDocument = serde_json::from_value(json!({
            "name": "GEG-00003",
            "prezzo_vendita": 12.9,
            "taxes": [{"item_tax_template": "7% - S"}],
            "uoms": [{"uom": "Karton", "conversion_factor": 12}],
        }))
        .unwrap();
        assert_eq!(doc.prezzo_vendita, Some(Decimal::new(129, 1)));
        assert_eq!(doc.taxes.len(), 1);
        assert_eq!(doc.stock_uom, None);
    }

    #[test]
    fn test_sales_order_row_dates_and_status() {
        let row: SalesOrderRow = serde_json::from_value(json!({
            "name": "SAL-ORD-2025-00012",
            "transaction_date": "2025-07-01",
            "grand_total": 1234.5,
            "status": "To Deliver and Bill",
            "docstatus": 1
        }))
        .unwrap();
        assert_eq!(row.docstatus, DocStatus::Submitted);
        assert_eq!(
            row.transaction_date,
            NaiveDate::from_ymd_opt(2025, 7, 1)
        );
    }
}
