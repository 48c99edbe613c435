use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::lenient;
use crate::core::DeliveryError;

/// Body of `/create-pdf` and `/send-pdf`.
///
/// Only the fields the workflow and templates read are named; everything
/// else is kept in `extra` and reaches the templates untouched. Amounts and
/// identifiers accept numbers or strings, as form clients send either.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoicePayload {
    /// Recipient of the emailed invoice.
    #[serde(default)]
    pub email: Option<String>,
    pub company: Company,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub invoice_number: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "lenient::optional_string")]
    pub invoice_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub due_date: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default, deserialize_with = "lenient::optional_number")]
    pub sub_total: Option<f64>,
    #[serde(default, deserialize_with = "lenient::optional_number")]
    pub vat: Option<f64>,
    #[serde(default, deserialize_with = "lenient::optional_number")]
    pub total: Option<f64>,
    #[serde(default, deserialize_with = "lenient::optional_number")]
    pub total_amount_received: Option<f64>,
    #[serde(default, deserialize_with = "lenient::optional_number")]
    pub balance_due: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub business_name: Option<String>,
    /// Used as the reply-to address of the invoice email.
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub contact_address: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default, deserialize_with = "lenient::string")]
    pub item_name: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub unit_price: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub quantity: f64,
    /// Percentage discount applied to the line.
    #[serde(default, deserialize_with = "lenient::number")]
    pub discount: f64,
}

impl LineItem {
    pub fn amount(&self) -> f64 {
        let gross = self.quantity * self.unit_price;
        gross - gross * (self.discount / 100.0)
    }
}

impl Company {
    /// Name shown to the recipient: the business name when present, the
    /// plain company name otherwise.
    pub fn display_name(&self) -> Option<&str> {
        self.business_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or_else(|| Some(self.name.trim()).filter(|s| !s.is_empty()))
    }
}

impl InvoicePayload {
    pub fn subject_line(&self) -> Result<String, DeliveryError> {
        self.company
            .display_name()
            .map(|name| format!("Invoice from {}", name))
            .ok_or_else(|| {
                DeliveryError::Validation("company.name or company.businessName is required".into())
            })
    }

    pub fn recipient(&self) -> Result<&str, DeliveryError> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DeliveryError::Validation("email is required".into()))
    }

    pub fn reply_to(&self) -> Option<&str> {
        self.company
            .email
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Sum of line amounts, used when the caller did not send `subTotal`.
    pub fn computed_sub_total(&self) -> f64 {
        self.items.iter().map(LineItem::amount).sum()
    }
}
