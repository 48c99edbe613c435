use minijinja::{context, Environment};
use serde::Serialize;

use super::helpers;
use crate::core::RenderError;
use crate::models::InvoicePayload;

const INVOICE_TEMPLATE: &str = "invoice.html";
const EMAIL_TEMPLATE: &str = "email.html";

/// HTML templates for the invoice document and the email body.
pub struct TemplateEngine {
    env: Environment<'static>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LineView<'a> {
    item_name: &'a str,
    quantity: f64,
    unit_price: f64,
    discount: f64,
    amount: f64,
}

impl TemplateEngine {
    pub fn new() -> Result<Self, RenderError> {
        let mut env = Environment::new();
        env.add_template(INVOICE_TEMPLATE, include_str!("html/invoice.html"))?;
        env.add_template(EMAIL_TEMPLATE, include_str!("html/email.html"))?;
        env.add_filter("money", helpers::money_filter);
        env.add_filter("date", helpers::date_filter);

        Ok(Self { env })
    }

    /// HTML fed to the PDF renderer.
    pub fn render_invoice(&self, payload: &InvoicePayload) -> Result<String, RenderError> {
        self.render(INVOICE_TEMPLATE, payload, None)
    }

    /// HTML body of the delivery email.
    pub fn render_email(
        &self,
        payload: &InvoicePayload,
        subject: &str,
    ) -> Result<String, RenderError> {
        self.render(EMAIL_TEMPLATE, payload, Some(subject))
    }

    fn render(
        &self,
        name: &str,
        payload: &InvoicePayload,
        subject: Option<&str>,
    ) -> Result<String, RenderError> {
        let lines: Vec<LineView<'_>> = payload
            .items
            .iter()
            .map(|item| LineView {
                item_name: &item.item_name,
                quantity: item.quantity,
                unit_price: item.unit_price,
                discount: item.discount,
                amount: item.amount(),
            })
            .collect();

        let template = self.env.get_template(name)?;
        let html = template.render(context! {
            invoice => payload,
            lines => lines,
            sub_total => payload.sub_total.unwrap_or_else(|| payload.computed_sub_total()),
            currency => payload.currency.as_deref(),
            company_name => payload.company.display_name().unwrap_or_default(),
            doc_type => payload.invoice_type.as_deref().filter(|t| !t.is_empty()).unwrap_or("Invoice"),
            subject => subject,
        })?;

        Ok(html)
    }
}
