pub mod admission;
pub mod gateway;
pub mod models;
pub mod translator;

pub use admission::{AdmissionController, AdmissionError, AdmissionPermit};
pub use gateway::{GatewayReply, GatewayService, Outcome};
pub use models::{CookieSpec, GatewayResponse, OutboundRequestSpec};
pub use translator::{OutboundRequest, RequestTranslator, TranslateError};
