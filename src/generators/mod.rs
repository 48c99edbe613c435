pub mod pdf;

pub use pdf::{DocumentRenderer, HtmlPdfRenderer};
