pub mod form;
pub mod orchestrator;

pub use form::{FieldUpdate, FormController, FormState};
pub use orchestrator::{RequestOrchestrator, RequestState};
