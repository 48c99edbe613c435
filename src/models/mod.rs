pub mod document;
pub mod invoice;
mod lenient;

pub use document::*;
pub use invoice::*;
