pub mod event;
pub mod payload;
pub mod result;

pub use event::{InvocationEvent, PayloadSource};
pub use payload::{ContractRequest, Lang, RequestPayload, ValidationError};
pub use result::HandlerResult;
