//! JSON-RPC adapter for the node under test.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use cb_02_compact_relay::{NodeRpc, RelayError};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use shared_types::{hash_from_hex, Encodable, Hash, Transaction};
use thiserror::Error;

/// Errors that can occur when talking to the node's RPC server.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("Failed to parse response: {0}")]
    Parse(String),
    #[error("Connection failed: {0}")]
    Connection(String),
}

impl From<RpcError> for RelayError {
    fn from(err: RpcError) -> Self {
        RelayError::Rpc(err.to_string())
    }
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<R> {
    result: Option<R>,
    #[serde(default)]
    error: Option<JsonRpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorBody {
    code: i64,
    message: String,
}

/// Node RPC client over HTTP with optional basic auth.
pub struct JsonRpcNode {
    client: Client,
    url: String,
    auth: Option<(String, String)>,
    request_id: AtomicU64,
}

impl JsonRpcNode {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            auth: None,
            request_id: AtomicU64::new(1),
        })
    }

    #[must_use]
    pub fn with_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some((user.into(), password.into()));
        self
    }

    fn call<P: Serialize, R: serde::de::DeserializeOwned>(&self, method: &str, params: P) -> Result<R, RpcError> {
        let request = JsonRpcRequest {
            jsonrpc: "1.0",
            id: self.request_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        tracing::debug!("[cb-runtime] RPC {}", method);

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some((user, password)) = &self.auth {
            builder = builder.basic_auth(user, Some(password));
        }
        let response = builder.send().map_err(|e| {
            if e.is_connect() {
                RpcError::Connection(format!("Cannot connect to {}", self.url))
            } else {
                RpcError::Http(e)
            }
        })?;

        // Error replies come with a non-200 status but still carry a JSON body.
        let body: JsonRpcResponse<R> = response.json().map_err(|e| RpcError::Parse(e.to_string()))?;
        if let Some(error) = body.error {
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        body.result
            .ok_or_else(|| RpcError::Parse(format!("{method}: missing result")))
    }

    fn parse_hash(method: &str, hex_id: &str) -> Result<Hash, RpcError> {
        hash_from_hex(hex_id).map_err(|e| RpcError::Parse(format!("{method}: {e}")))
    }
}

impl NodeRpc for JsonRpcNode {
    fn best_block_hash(&self) -> Result<Hash, RelayError> {
        let hex_id: String = self.call("getbestblockhash", [(); 0])?;
        Ok(Self::parse_hash("getbestblockhash", &hex_id)?)
    }

    fn send_raw_transaction(&self, tx: &Transaction, allow_high_fees: bool) -> Result<Hash, RelayError> {
        let raw = hex::encode(tx.to_bytes());
        let hex_id: String = self.call("sendrawtransaction", (raw, allow_high_fees))?;
        Ok(Self::parse_hash("sendrawtransaction", &hex_id)?)
    }

    fn set_excessive_block(&self, max_block_size: u64) -> Result<(), RelayError> {
        let _: serde_json::Value = self.call("setexcessiveblock", [max_block_size])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::hash_to_hex;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Answer one HTTP request with `status` and `body`; yields the request body.
    fn serve_once(status: &'static str, body: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut request = vec![0u8; content_length];
            reader.read_exact(&mut request).unwrap();
            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
            String::from_utf8(request).unwrap()
        });
        (url, handle)
    }

    #[test]
    fn test_best_block_hash_reads_display_order() {
        let mut expected = [0u8; 32];
        expected[0] = 0xab;
        let body = format!(r#"{{"result":"{}","error":null,"id":1}}"#, hash_to_hex(&expected));
        let (url, server) = serve_once("200 OK", body);
        let node = JsonRpcNode::new(url, Duration::from_secs(5)).unwrap();
        assert_eq!(node.best_block_hash().unwrap(), expected);
        let request = server.join().unwrap();
        assert!(request.contains(r#""method":"getbestblockhash""#));
        assert!(request.contains(r#""params":[]"#));
    }

    #[test]
    fn test_sendrawtransaction_params() {
        let tx = Transaction::new(1, vec![], vec![], 0);
        let body = format!(r#"{{"result":"{}","error":null,"id":1}}"#, hash_to_hex(&tx.txid()));
        let (url, server) = serve_once("200 OK", body);
        let node = JsonRpcNode::new(url, Duration::from_secs(5)).unwrap();
        assert_eq!(node.send_raw_transaction(&tx, true).unwrap(), tx.txid());
        let request = server.join().unwrap();
        let expected = format!(r#""params":["{}",true]"#, hex::encode(tx.to_bytes()));
        assert!(request.contains(&expected), "{request}");
    }

    #[test]
    fn test_rpc_error_surfaces_code_and_message() {
        let body = r#"{"result":null,"error":{"code":-26,"message":"bad-txns-inputs-missingorspent"},"id":1}"#;
        let (url, server) = serve_once("500 Internal Server Error", body.to_string());
        let node = JsonRpcNode::new(url, Duration::from_secs(5)).unwrap();
        match node.set_excessive_block(1) {
            Err(RelayError::Rpc(message)) => {
                assert!(message.contains("-26"));
                assert!(message.contains("bad-txns-inputs-missingorspent"));
            }
            other => panic!("expected rpc error, got {other:?}"),
        }
        server.join().unwrap();
    }

    #[test]
    fn test_unreachable_node() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);
        let node = JsonRpcNode::new(url, Duration::from_secs(2)).unwrap();
        assert!(matches!(node.best_block_hash(), Err(RelayError::Rpc(_))));
    }
}
