use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, IntCounterVec};

pub static DOCUMENTS_RENDERED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "invoice_documents_rendered_total",
        "Invoice PDF renders by outcome",
        &["outcome"]
    )
    .expect("metric can be registered")
});

pub static EMAILS_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "invoice_emails_sent_total",
        "Invoice emails handed to the relay by outcome",
        &["outcome"]
    )
    .expect("metric can be registered")
});

pub fn record_render(success: bool) {
    DOCUMENTS_RENDERED
        .with_label_values(&[if success { "success" } else { "failure" }])
        .inc();
}

pub fn record_send(success: bool) {
    EMAILS_SENT
        .with_label_values(&[if success { "success" } else { "failure" }])
        .inc();
}
