pub mod metadata;

pub use metadata::{MetadataStore, MetadataTicket};
