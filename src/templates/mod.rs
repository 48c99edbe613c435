pub mod engine;
pub mod helpers;

pub use engine::TemplateEngine;
