//! Wire transport for XenAPI calls.
//!
//! `XenTransport` is the seam between the session façade and the network:
//! one async operation taking a wire method name plus positional values and
//! returning the decoded `{Status, …}` envelope. `XmlRpcTransport` is the
//! production implementation speaking XML-RPC over HTTP(S); tests substitute
//! their own implementation through the same trait.

use async_trait::async_trait;
use log::{debug, error, trace};
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::config::XenConnectionConfig;
use crate::error::{XenError, XenResult};
use crate::types::MethodResponse;
use crate::xmlrpc::{self, XmlRpcResponse};

// ── Transport trait ──────────────────────────────────────────────────────────

/// Unified interface for performing one XenAPI round-trip.
#[async_trait]
pub trait XenTransport: Send + Sync {
    /// Invoke `method` with positional `params`, returning the result envelope.
    async fn call(&self, method: &str, params: Vec<Value>) -> XenResult<MethodResponse>;

    /// Endpoint description for logging.
    fn endpoint(&self) -> &str;
}

// ── XML-RPC implementation ───────────────────────────────────────────────────

/// XML-RPC over HTTP(S) implementation of [`XenTransport`].
pub struct XmlRpcTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl XmlRpcTransport {
    /// Build a transport from connection settings.
    ///
    /// XenServer installations ship self-signed certificates, so certificate
    /// verification is disabled unless `verify_tls` asks for it.
    pub fn new(config: &XenConnectionConfig) -> XenResult<Self> {
        let endpoint = Self::endpoint_url(&config.uri)?;
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        debug!(
            "XenAPI transport ready endpoint={} verify_tls={} timeout={}s",
            endpoint, config.verify_tls, config.timeout_secs
        );
        Ok(Self { client, endpoint })
    }

    /// Resolve the request URL, defaulting the path to the standard XML-RPC
    /// mount point `/RPC2` when the configured URI has none.
    fn endpoint_url(uri: &str) -> XenResult<String> {
        let mut url = Url::parse(uri)?;
        if url.path().is_empty() || url.path() == "/" {
            url.set_path("/RPC2");
        }
        Ok(url.into())
    }
}

#[async_trait]
impl XenTransport for XmlRpcTransport {
    async fn call(&self, method: &str, params: Vec<Value>) -> XenResult<MethodResponse> {
        let body = xmlrpc::encode_method_call(method, &params)?;
        debug!("XenAPI → {} ({} params)", method, params.len());
        trace!("XenAPI request body: {} bytes", body.len());

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        trace!("XenAPI response: HTTP {}, {} bytes", status, text.len());

        if !status.is_success() {
            // Some server-side failures ride an HTTP error status with a
            // regular fault document in the body.
            if let Ok(XmlRpcResponse::Fault { code, message }) =
                xmlrpc::parse_method_response(&text)
            {
                error!("XenAPI fault {} on {}: {}", code, method, message);
                return Err(XenError::Api(format!("XML-RPC fault {}: {}", code, message)));
            }
            let snippet: String = text.chars().take(200).collect();
            error!("XenAPI HTTP {} from {}", status, self.endpoint);
            return Err(XenError::Network(format!("HTTP {}: {}", status, snippet)));
        }

        match xmlrpc::parse_method_response(&text)? {
            XmlRpcResponse::Success(value) => serde_json::from_value(value)
                .map_err(|e| XenError::Parse(format!("unexpected response shape: {}", e))),
            XmlRpcResponse::Fault { code, message } => {
                error!("XenAPI fault {} on {}: {}", code, method, message);
                Err(XenError::Api(format!("XML-RPC fault {}: {}", code, message)))
            }
        }
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
