//! Data node client
//!
//! Resolves a node through the [`NodeCache`], forwards the caller's token and
//! trace id, and streams bodies in both directions without buffering.

use futures::TryStreamExt;
use reqwest::StatusCode;
use reqwest::header::HeaderValue;
use std::sync::Arc;
use std::time::Duration;
use strata_common::{
    API_ARG_HEADER, ByteStream, CHECKSUM_HEADER, DATA_NODE_ROLE, Error, ErrorKind, PathRequest,
    RoutingConfig, TRACE_ID_HEADER, User,
};
use tracing::{debug, warn};

use crate::cache::{NodeCache, ResolveError};
use crate::registry::Registry;
use crate::selector::NodeSelector;

/// Per-call values forwarded to the data node
#[derive(Clone, Debug)]
pub struct CallContext {
    pub trace_id: String,
    pub access_token: String,
}

impl CallContext {
    pub fn new(trace_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            access_token: access_token.into(),
        }
    }
}

/// Routing client failures
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Taxonomy-coded failure, rebuilt from the node's response
    #[error(transparent)]
    Coded(#[from] Error),

    /// No node could be resolved
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ClientError {
    /// Taxonomy kind, when the failure carries one
    #[must_use]
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Coded(err) => Some(err.kind()),
            Self::Resolve(_) | Self::Transport(_) => None,
        }
    }
}

/// Upload/download entry point used by upstream callers
pub struct DataClient {
    http: reqwest::Client,
    nodes: Arc<NodeCache>,
    role: String,
}

impl DataClient {
    pub fn new(nodes: Arc<NodeCache>) -> Self {
        Self {
            http: reqwest::Client::new(),
            nodes,
            role: DATA_NODE_ROLE.to_string(),
        }
    }

    /// Client with its own node cache, set up from a `[routing]` section
    pub fn from_config(
        config: &RoutingConfig,
        registry: Arc<dyn Registry>,
        selector: Arc<dyn NodeSelector>,
    ) -> Self {
        let cache = NodeCache::new(registry, selector)
            .with_ttl(Duration::from_secs(config.cache_ttl_secs));
        Self::new(Arc::new(cache)).with_role(config.role.clone())
    }

    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    fn api_arg(path: &str) -> Result<HeaderValue, Error> {
        let encoded = PathRequest::new(path).to_header_value()?;
        HeaderValue::from_bytes(encoded.as_bytes())
            .map_err(|_| Error::bad_input_data(format!("path {path:?} cannot be sent in a header")))
    }

    fn request(
        &self,
        url: String,
        ctx: &CallContext,
        api_arg: HeaderValue,
    ) -> reqwest::RequestBuilder {
        self.http
            .post(url)
            .bearer_auth(&ctx.access_token)
            .header(TRACE_ID_HEADER, ctx.trace_id.as_str())
            .header(API_ARG_HEADER, api_arg)
    }

    /// Stream `body` to `path` on a resolved data node.
    ///
    /// A non-empty `checksum` is forwarded for verification on the node.
    pub async fn upload(
        &self,
        ctx: &CallContext,
        user: &User,
        path: &str,
        body: ByteStream,
        checksum: &str,
    ) -> Result<(), ClientError> {
        let api_arg = Self::api_arg(path)?;
        let url = self.nodes.resolve(&self.role).await?;
        debug!(user = %user.username, path, %url, "uploading file");

        let mut request = self
            .request(format!("{url}/upload"), ctx, api_arg)
            .body(reqwest::Body::wrap_stream(body));
        if !checksum.is_empty() {
            request = request.header(CHECKSUM_HEADER, checksum);
        }

        let response = request.send().await?;
        let status = response.status();
        // drain so the connection can be reused
        if let Err(e) = response.bytes().await {
            warn!("failed to drain upload response body: {}", e);
        }

        if status == StatusCode::CREATED {
            return Ok(());
        }
        debug!(path, status = status.as_u16(), "upload rejected by data node");
        Err(Error::from_http_status(status.as_u16()).into())
    }

    /// Open `path` on a resolved data node as a byte stream.
    ///
    /// The stream owns the live response; dropping it closes the transfer.
    pub async fn download(
        &self,
        ctx: &CallContext,
        user: &User,
        path: &str,
    ) -> Result<ByteStream, ClientError> {
        let api_arg = Self::api_arg(path)?;
        let url = self.nodes.resolve(&self.role).await?;
        debug!(user = %user.username, path, %url, "downloading file");

        let response = self
            .request(format!("{url}/download"), ctx, api_arg)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(
                Error::internal(format!("http status code: {}", status.as_u16())).into(),
            );
        }
        Ok(Box::pin(
            response.bytes_stream().map_err(std::io::Error::other),
        ))
    }
}
