//! Query builder for the Frappe resource list API.

use serde::Serialize;
use serde::ser::{SerializeSeq, Serializer};
use serde_json::Value;
use url::Url;

/// Default page length of ERPNext list calls when none is given.
const DEFAULT_PAGE_LENGTH: usize = 20;

/// One Frappe filter triple, serialized as `["field", "op", value]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    field: String,
    op: &'static str,
    value: Value,
}

impl Filter {
    /// `field = value`
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: "=",
            value: value.into(),
        }
    }

    /// `field like %term%`
    pub fn contains(field: impl Into<String>, term: &str) -> Self {
        Self {
            field: field.into(),
            op: "like",
            value: Value::String(format!("%{term}%")),
        }
    }

    /// `field is not set`
    pub fn not_set(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: "is",
            value: Value::String("not set".to_string()),
        }
    }

    /// `field in (values...)`
    pub fn one_of<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field: field.into(),
            op: "in",
            value: Value::Array(
                values
                    .into_iter()
                    .map(|v| Value::String(v.into()))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(3))?;
        seq.serialize_element(&self.field)?;
        seq.serialize_element(self.op)?;
        seq.serialize_element(&self.value)?;
        seq.end()
    }
}

/// A `GET /api/resource/<Doctype>` list request.
#[derive(Debug, Clone)]
pub struct ListQuery {
    doctype: String,
    fields: Vec<String>,
    filters: Vec<Filter>,
    order_by: Option<String>,
    start: usize,
    page_length: usize,
}

impl ListQuery {
    pub fn new(doctype: impl Into<String>) -> Self {
        Self {
            doctype: doctype.into(),
            fields: Vec::new(),
            filters: Vec::new(),
            order_by: None,
            start: 0,
            page_length: DEFAULT_PAGE_LENGTH,
        }
    }

    #[must_use]
    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    #[must_use]
    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    #[must_use]
    pub const fn start(mut self, start: usize) -> Self {
        self.start = start;
        self
    }

    #[must_use]
    pub const fn limit(mut self, page_length: usize) -> Self {
        self.page_length = page_length;
        self
    }

    #[must_use]
    pub fn doctype(&self) -> &str {
        &self.doctype
    }

    #[must_use]
    pub const fn page_length(&self) -> usize {
        self.page_length
    }

    /// Write the query string parameters onto `url`.
    pub fn apply(&self, url: &mut Url) {
        let mut pairs = url.query_pairs_mut();
        if !self.fields.is_empty() {
            pairs.append_pair("fields", &json_string(&self.fields));
        }
        if !self.filters.is_empty() {
            pairs.append_pair("filters", &json_string(&self.filters));
        }
        if let Some(order_by) = &self.order_by {
            pairs.append_pair("order_by", order_by);
        }
        pairs.append_pair("limit_start", &self.start.to_string());
        pairs.append_pair("limit_page_length", &self.page_length.to_string());
    }
}

/// Serialize `fields`-style parameters the way Frappe expects them.
pub(crate) fn json_string<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_serializes_as_triple() {
        let filters = vec![
            Filter::eq("customer", "Pizzeria Roma"),
            Filter::eq("docstatus", 1),
            Filter::not_set("customer"),
            Filter::one_of("item_code", ["A", "B"]),
            Filter::contains("item_name", "olio"),
        ];
        assert_eq!(
            json_string(&filters),
            r#"[["customer","=","Pizzeria Roma"],["docstatus","=",1],["customer","is","not set"],["item_code","in",["A","B"]],["item_name","like","%olio%"]]"#
        );
    }

    #[test]
    fn test_apply_writes_all_parameters() {
        let mut url = Url::parse("https://erp.test/api/resource/Item").unwrap();
        ListQuery::new("Item")
            .fields(&["name", "item_name"])
            .filter(Filter::eq("item_group", "Olio"))
            .order_by("item_name")
            .start(40)
            .limit(20)
            .apply(&mut url);

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("fields".to_string(), r#"["name","item_name"]"#.to_string()),
                ("filters".to_string(), r#"[["item_group","=","Olio"]]"#.to_string()),
                ("order_by".to_string(), "item_name".to_string()),
                ("limit_start".to_string(), "40".to_string()),
                ("limit_page_length".to_string(), "20".to_string()),
            ]
        );
    }

    #[test]
    fn test_apply_without_filters_skips_them() {
        let mut url = Url::parse("https://erp.test/api/resource/Item").unwrap();
        ListQuery::new("Item").apply(&mut url);
        assert_eq!(
            url.query(),
            Some("limit_start=0&limit_page_length=20")
        );
    }
}
