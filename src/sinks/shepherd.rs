//! Client side of the shepherd update protocol.
//!
//! The shepherd daemon hosts indicator displays for several client processes.
//! Each update is a single JSON-RPC request line on a fresh TCP connection:
//!
//! ```text
//! {"method":"Shepherd.Update","params":[{"id":..,"icon":..,"label":..,"guide":..,"active":true}],"id":1}
//! ```
//!
//! and the daemon answers with one line `{"id":1,"result":..,"error":null}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, instrument};

use crate::core::display::{DisplaySink, PublishError};

const UPDATE_METHOD: &str = "Shepherd.Update";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Update {
    pub id: String,
    pub icon: Option<String>,
    pub label: String,
    pub guide: String,
    pub active: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    pub params: Vec<Update>,
    pub id: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    #[serde(default)]
    pub result: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
}

pub struct ShepherdSink {
    addr: String,
    indicator_id: String,
    icon: Option<String>,
    guide: String,
    timeout: Duration,
    seq: AtomicU64,
}

impl ShepherdSink {
    pub fn new(
        addr: &str,
        indicator_id: &str,
        icon: Option<String>,
        guide: String,
        timeout: Duration,
    ) -> Self {
        ShepherdSink {
            addr: addr.to_string(),
            indicator_id: indicator_id.to_string(),
            icon,
            guide,
            timeout,
            seq: AtomicU64::new(0),
        }
    }

    fn request(&self, label: &str) -> Request {
        Request {
            method: UPDATE_METHOD.to_string(),
            params: vec![Update {
                id: self.indicator_id.clone(),
                icon: self.icon.clone(),
                label: label.to_string(),
                guide: self.guide.clone(),
                active: true,
            }],
            id: self.seq.fetch_add(1, Ordering::Relaxed) + 1,
        }
    }

    async fn call(&self, request: &Request) -> Result<Response, PublishError> {
        let mut stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| PublishError::Unreachable(format!("{}: {e}", self.addr)))?;

        let mut line = serde_json::to_vec(request).map_err(std::io::Error::from)?;
        line.push(b'\n');

        let (reader, mut writer) = stream.split();
        writer
            .write_all(&line)
            .await
            .map_err(|e| PublishError::Unreachable(e.to_string()))?;

        let mut reply = String::new();
        let read = BufReader::new(reader)
            .read_line(&mut reply)
            .await
            .map_err(|e| PublishError::Unreachable(e.to_string()))?;
        if read == 0 {
            return Err(PublishError::Unreachable(
                "connection closed before reply".to_string(),
            ));
        }

        serde_json::from_str(&reply)
            .map_err(|e| PublishError::Rejected(format!("malformed reply: {e}")))
    }
}

#[async_trait]
impl DisplaySink for ShepherdSink {
    #[instrument(name = "ShepherdPublish", skip(self), fields(addr = %self.addr))]
    async fn publish(&self, label: &str) -> Result<(), PublishError> {
        let request = self.request(label);
        let response = tokio::time::timeout(self.timeout, self.call(&request))
            .await
            .map_err(|_| {
                PublishError::Unreachable(format!("no reply within {:?}", self.timeout))
            })??;

        if let Some(error) = response.error {
            return Err(PublishError::Rejected(error));
        }
        if response.id != request.id {
            return Err(PublishError::Rejected(format!(
                "reply id {} does not match request id {}",
                response.id, request.id
            )));
        }
        debug!(seq = request.id, "Shepherd accepted update");
        Ok(())
    }
}
