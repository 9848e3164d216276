//! JSON-RPC server over stdin/stdout.
//!
//! Reads one JSON-RPC 2.0 request per line and writes one response per line.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{ErrorCode, Result, ServiceError};
use crate::generation::{GenerationService, ModelProvider};

use super::methods::handle_request;
use super::types::{JsonRpcError, JsonRpcErrorResponse, JsonRpcRequest, JsonRpcResponse};

/// State shared across all request handlers.
pub struct ServerState<P: ModelProvider> {
    /// The generation service backing every method.
    pub service: GenerationService<P>,
    shutdown: AtomicBool,
}

impl<P: ModelProvider> ServerState<P> {
    /// Creates new server state.
    pub fn new(service: GenerationService<P>) -> Self {
        Self {
            service,
            shutdown: AtomicBool::new(false),
        }
    }

    /// Signals the server to shut down.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Returns true if shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// Runs the JSON-RPC server, reading from stdin and writing to stdout.
pub fn run_server<P: ModelProvider>(state: &ServerState<P>) -> Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    serve(state, stdin.lock(), stdout.lock())
}

/// Serves requests from `reader` until end of input or shutdown.
pub fn serve<P: ModelProvider, R: BufRead, W: Write>(
    state: &ServerState<P>,
    reader: R,
    mut writer: W,
) -> Result<()> {
    tracing::info!("JSON-RPC server started, waiting for requests");

    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(error = %e, "error reading stdin");
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let response = process_request(&line, state);
        writeln!(writer, "{}", response)
            .and_then(|()| writer.flush())
            .map_err(|e| {
                ServiceError::with_source(ErrorCode::EncodeError, "Failed to write response", e)
            })?;

        if state.is_shutdown() {
            tracing::info!("server shutdown requested");
            break;
        }
    }

    tracing::info!("JSON-RPC server stopped");
    Ok(())
}

/// Processes a single JSON-RPC request line into a response line.
fn process_request<P: ModelProvider>(line: &str, state: &ServerState<P>) -> String {
    let request: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            return error_line(None, JsonRpcError::parse_error(format!("Invalid JSON: {}", e)));
        }
    };

    if request.jsonrpc != "2.0" {
        return error_line(
            Some(request.id),
            JsonRpcError::invalid_request("Invalid JSON-RPC version (expected 2.0)"),
        );
    }

    tracing::debug!(method = %request.method, "handling request");
    match handle_request(&request.method, request.params, state) {
        Ok(result) => serde_json::to_string(&JsonRpcResponse::new(request.id, result))
            .unwrap_or_default(),
        Err(error) => error_line(Some(request.id), error),
    }
}

fn error_line(id: Option<super::types::RequestId>, error: JsonRpcError) -> String {
    serde_json::to_string(&JsonRpcErrorResponse::new(id, error)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::provider::testing::SineProvider;
    use crate::output::OutputStore;

    fn test_state() -> (ServerState<SineProvider>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let service =
            GenerationService::new(SineProvider::new(8000, 1), OutputStore::new(dir.path()));
        (ServerState::new(service), dir)
    }

    #[test]
    fn server_state_new() {
        let (state, _dir) = test_state();
        assert!(!state.is_shutdown());
    }

    #[test]
    fn server_state_shutdown() {
        let (state, _dir) = test_state();
        state.shutdown();
        assert!(state.is_shutdown());
    }

    #[test]
    fn process_invalid_json() {
        let (state, _dir) = test_state();
        let response = process_request("not json", &state);
        assert!(response.contains("-32700"));
    }

    #[test]
    fn process_invalid_version() {
        let (state, _dir) = test_state();
        let request = r#"{"jsonrpc":"1.0","method":"test","id":1}"#;
        assert!(process_request(request, &state).contains("-32600"));
    }

    #[test]
    fn process_unknown_method() {
        let (state, _dir) = test_state();
        let request = r#"{"jsonrpc":"2.0","method":"unknown","id":1}"#;
        assert!(process_request(request, &state).contains("-32601"));
    }

    #[test]
    fn serve_answers_each_line_and_stops_on_shutdown() {
        let (state, _dir) = test_state();
        let input = concat!(
            r#"{"jsonrpc":"2.0","method":"ping","id":1}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","method":"shutdown","id":"two"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"ping","id":3}"#,
            "\n"
        );
        let mut output = Vec::new();
        serve(&state, input.as_bytes(), &mut output).unwrap();

        let lines: Vec<serde_json::Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], 1);
        assert_eq!(lines[0]["result"]["status"], "ok");
        assert_eq!(lines[1]["id"], "two");
        assert_eq!(lines[1]["result"]["status"], "shutting_down");
    }
}
