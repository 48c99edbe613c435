pub mod documents;

pub use documents::{DocumentStore, PendingDocument};
