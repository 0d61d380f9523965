// Sales record model and the CSV column mapping

use serde::{Deserialize, Serialize};

use crate::error::IngestError;

// ============================================================================
// CORE TYPES
// ============================================================================

/// One sold line item
///
/// Field values are taken as uploaded. Negative quantities or revenue are
/// not rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesRecord {
    pub item_name: String,
    pub category: String,
    pub units_sold: i64,
    pub revenue: f64,
}

impl SalesRecord {
    pub fn new(item_name: &str, category: &str, units_sold: i64, revenue: f64) -> Self {
        Self {
            item_name: item_name.to_string(),
            category: category.to_string(),
            units_sold,
            revenue,
        }
    }
}

// ============================================================================
// COLUMN MAPPING
// ============================================================================

/// Header names as they appear in uploaded files (exact, case-sensitive)
pub const COLUMN_ITEM_NAME: &str = "ItemName";
pub const COLUMN_CATEGORY: &str = "Category";
pub const COLUMN_SALES: &str = "Sales";
pub const COLUMN_REVENUE: &str = "Revenue";

/// One CSV row before coercion
///
/// Every column defaults to empty so that missing headers produce
/// default values instead of a deserialization error. Extra columns are
/// ignored.
#[derive(Debug, Default, Deserialize)]
pub struct RawSalesRow {
    #[serde(rename = "ItemName", default)]
    pub item_name: String,

    #[serde(rename = "Category", default)]
    pub category: String,

    #[serde(rename = "Sales", default)]
    pub sales: String,

    #[serde(rename = "Revenue", default)]
    pub revenue: String,
}

impl RawSalesRow {
    /// Coerce the row into a typed record
    ///
    /// Empty numeric cells become zero. A non-empty cell that does not parse,
    /// or a revenue that is NaN or infinite, fails with `MalformedField`.
    pub fn into_record(self, line: u64) -> Result<SalesRecord, IngestError> {
        let units_sold = parse_numeric::<i64>(&self.sales, line, COLUMN_SALES)?;
        let revenue = parse_numeric::<f64>(&self.revenue, line, COLUMN_REVENUE)?;
        if !revenue.is_finite() {
            return Err(IngestError::MalformedField {
                line,
                column: COLUMN_REVENUE,
                value: self.revenue,
            });
        }

        Ok(SalesRecord {
            item_name: self.item_name,
            category: self.category,
            units_sold,
            revenue,
        })
    }
}

fn parse_numeric<T>(raw: &str, line: u64, column: &'static str) -> Result<T, IngestError>
where
    T: std::str::FromStr + Default,
{
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(T::default());
    }

    trimmed.parse().map_err(|_| IngestError::MalformedField {
        line,
        column,
        value: raw.to_string(),
    })
}
