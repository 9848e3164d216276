//! JSON-RPC host.
//!
//! Line-delimited JSON-RPC 2.0 over stdio:
//! - `generate`: Generate one song starter
//! - `model_info`: Describe the loaded model
//! - `sweep_outputs`: Remove old generated files
//! - `ping`: Health check
//! - `shutdown`: Graceful shutdown

pub mod methods;
pub mod server;
pub mod types;

pub use server::{run_server, serve, ServerState};
pub use types::{
    GenerateParams, GenerateResult, JsonRpcError, JsonRpcErrorResponse, JsonRpcRequest,
    JsonRpcResponse, ModelInfoResult, RequestId, SweepParams, SweepResult,
};
