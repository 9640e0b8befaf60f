pub mod backend_client;
pub mod http_handler;
pub mod server;

/// Re-export commonly used types from adapters
pub use backend_client::ReqwestBackendClient;
pub use http_handler::HttpHandler;
pub use server::{GatewayServer, LifecycleState};
