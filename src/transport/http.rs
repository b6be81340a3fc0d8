use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Url;
use tracing::debug;
use tracing::error;
use tracing::warn;

use super::Method;
use super::ParamEncoding;
use super::RawReply;
use super::StoreRequest;
use super::Transport;
use crate::constants::STORE_INDEX_HEADER;
use crate::ClientApiError;
use crate::ClientConfig;

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// HTTP implementation of [`Transport`].
///
/// Holds one pooled `reqwest::Client` shared by every request. Requests go
/// to the preferred endpoint first; a connect-level failure moves on to the
/// next configured endpoint, and whichever endpoint answers becomes the
/// preferred one. Any other failure is returned to the caller untouched.
#[derive(Debug)]
pub struct HttpTransport {
    http: reqwest::Client,
    endpoints: Vec<Url>,
    preferred: AtomicUsize,
}

impl HttpTransport {
    /// Builds the transport from the configured endpoints and timeouts
    ///
    /// # Errors
    /// - [`ClientApiError::InvalidArgument`] if no endpoint is given or one is
    ///   not an `http`/`https` URI
    /// - [`ClientApiError::Network`] if the HTTP client cannot be built
    pub fn new(config: &ClientConfig) -> std::result::Result<Self, ClientApiError> {
        let endpoints = parse_endpoints(&config.endpoints)?;

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .tcp_keepalive(Duration::from_secs(config.tcp_keepalive_secs))
            .build()?;

        // Spread clients over the cluster instead of piling onto the first node
        let preferred = rand::thread_rng().gen_range(0..endpoints.len());

        Ok(Self {
            http,
            endpoints,
            preferred: AtomicUsize::new(preferred),
        })
    }

    pub fn endpoints(&self) -> &[Url] {
        &self.endpoints
    }

    fn build(
        &self,
        endpoint: &Url,
        request: &StoreRequest,
    ) -> std::result::Result<reqwest::RequestBuilder, ClientApiError> {
        let path = escape_path(request.path.trim_start_matches('/'));
        let url = endpoint.join(&path).map_err(|e| {
            ClientApiError::invalid_argument(format!("invalid request path {}: {e}", request.path))
        })?;

        let builder = self
            .http
            .request(request.method.into(), url)
            .timeout(request.timeout);

        let builder = match request.encoding {
            ParamEncoding::Query => builder.query(&request.params),
            ParamEncoding::Form => builder.form(&request.params),
            ParamEncoding::Json => {
                let body: HashMap<&str, &str> = request
                    .params
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect();
                builder.json(&body)
            }
        };
        Ok(builder)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        request: StoreRequest,
    ) -> std::result::Result<RawReply, ClientApiError> {
        let start = self.preferred.load(Ordering::Relaxed);
        let mut last_error = None;

        for attempt in 0..self.endpoints.len() {
            let index = (start + attempt) % self.endpoints.len();
            let endpoint = &self.endpoints[index];

            match self.build(endpoint, &request)?.send().await {
                Ok(response) => {
                    self.preferred.store(index, Ordering::Relaxed);
                    let status = response.status().as_u16();
                    let store_index = response
                        .headers()
                        .get(STORE_INDEX_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok());
                    let body = response.text().await?;
                    debug!(%endpoint, status, ?store_index, path = %request.path, "store replied");
                    return Ok(RawReply {
                        status,
                        body,
                        store_index,
                    });
                }
                Err(e) if e.is_connect() => {
                    warn!(%endpoint, "endpoint unreachable, trying next: {:?}", e);
                    last_error = Some(ClientApiError::from(e));
                }
                Err(e) => {
                    error!(%endpoint, path = %request.path, "request failed: {:?}", e);
                    return Err(e.into());
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ClientApiError::invalid_argument("no endpoints configured")))
    }
}

/// Escapes the characters that would otherwise end the path component
fn escape_path(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            '?' => escaped.push_str("%3F"),
            '#' => escaped.push_str("%23"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn parse_endpoints(endpoints: &[String]) -> std::result::Result<Vec<Url>, ClientApiError> {
    if endpoints.is_empty() {
        return Err(ClientApiError::invalid_argument("at least one endpoint required"));
    }

    endpoints
        .iter()
        .map(|raw| {
            // join() resolves against the last path segment, so keep a trailing slash
            let normalized = if raw.ends_with('/') {
                raw.clone()
            } else {
                format!("{raw}/")
            };
            let url = Url::parse(&normalized)
                .map_err(|e| ClientApiError::invalid_argument(format!("invalid endpoint {raw}: {e}")))?;
            match url.scheme() {
                "http" | "https" => Ok(url),
                scheme => Err(ClientApiError::invalid_argument(format!(
                    "unsupported endpoint scheme {scheme} in {raw}"
                ))),
            }
        })
        .collect()
}
