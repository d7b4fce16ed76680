// src/interception/http_proxy.rs
//! Plain HTTP forward proxy
//!
//! Accepts absolute-form proxy requests, runs each request through the
//! interceptor pipeline (which may point it at a different endpoint) and
//! forwards it upstream. Responses are dispatched back through the pipeline
//! for auditing before being returned to the client. Headers, including
//! `Host`, are forwarded as received.

use crate::interception::interceptor::HttpMessage;
use crate::interception::pipeline::InterceptorPipeline;
use crate::redirect::endpoint::{HttpService, Scheme};
use crate::utils::errors::{RedirectorError, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderName, CONNECTION, PROXY_AUTHORIZATION};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

const PROXY_CONNECTION: HeaderName = HeaderName::from_static("proxy-connection");

/// Configuration for the forward proxy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Proxy listen address
    pub listen_addr: SocketAddr,

    /// Upstream request timeout in seconds
    pub upstream_timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8888)),
            upstream_timeout_secs: 30,
        }
    }
}

/// Target of a proxied request, split into the routable service and the path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    pub service: HttpService,
    pub path_and_query: String,
}

impl ProxyTarget {
    /// Parse an absolute-form request URI
    pub fn from_uri(uri: &Uri) -> Option<Self> {
        let scheme = match uri.scheme_str()? {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            _ => return None,
        };
        let host = uri.host()?.to_string();
        let port = uri.port_u16().unwrap_or_else(|| scheme.default_port());
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        Some(Self {
            service: HttpService::new(scheme, host, port),
            path_and_query,
        })
    }

    /// Upstream URL for the (possibly rewritten) service
    pub fn upstream_url(&self) -> String {
        format!("{}{}", self.service.url(), self.path_and_query)
    }
}

/// Forward proxy feeding the interceptor pipeline
pub struct HttpProxy {
    config: ProxyConfig,
    pipeline: Arc<InterceptorPipeline>,
    client: reqwest::Client,
}

impl HttpProxy {
    pub fn new(config: ProxyConfig, pipeline: Arc<InterceptorPipeline>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(config.upstream_timeout_secs))
            .build()
            .map_err(|e| {
                RedirectorError::InterceptionFailed(format!("Failed to build upstream client: {}", e))
            })?;

        Ok(Self {
            config,
            pipeline,
            client,
        })
    }

    /// Serve until the listener fails
    pub async fn start(self: Arc<Self>) -> Result<()> {
        let listener = TcpListener::bind(self.config.listen_addr)
            .await
            .map_err(|e| {
                RedirectorError::InterceptionFailed(format!("Failed to bind proxy: {}", e))
            })?;

        info!("HTTP proxy listening on {}", self.config.listen_addr);

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let proxy = Arc::clone(&self);

                    tokio::spawn(async move {
                        debug!("Accepted connection from {}", addr);

                        let io = TokioIo::new(stream);

                        let service = service_fn(move |req| {
                            let proxy = Arc::clone(&proxy);
                            async move { Ok::<_, Infallible>(proxy.handle_request(req).await) }
                        });

                        if let Err(e) = http1::Builder::new()
                            .serve_connection(io, service)
                            .await
                        {
                            error!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }

    /// Handle one proxied request
    async fn handle_request(&self, req: Request<Incoming>) -> Response<Full<Bytes>> {
        if req.method() == Method::CONNECT {
            warn!("CONNECT to {} refused; tunnels are not intercepted", req.uri());
            return error_response(
                StatusCode::NOT_IMPLEMENTED,
                "CONNECT tunnels are not supported by this proxy",
            );
        }

        let Some(mut target) = ProxyTarget::from_uri(req.uri()) else {
            warn!("Rejected non-proxy request for {}", req.uri());
            return error_response(StatusCode::BAD_REQUEST, "Expected an absolute-form request URI");
        };

        let mut message = HttpMessage::new(target.service.clone());
        self.pipeline.dispatch(true, &mut message);
        target.service = message.service;

        match self.forward(req, &target).await {
            Ok(response) => {
                let mut observed = HttpMessage::new(target.service.clone());
                self.pipeline.dispatch(false, &mut observed);
                response
            }
            Err(e) => {
                error!("Failed to forward request to {}: {}", target.upstream_url(), e);
                error_response(StatusCode::BAD_GATEWAY, "Failed to reach upstream")
            }
        }
    }

    /// Send the request to `target` and buffer the response
    async fn forward(&self, req: Request<Incoming>, target: &ProxyTarget) -> Result<Response<Full<Bytes>>> {
        let (parts, body) = req.into_parts();

        let body_bytes = body
            .collect()
            .await
            .map_err(|e| RedirectorError::InterceptionFailed(format!("Body read error: {}", e)))?
            .to_bytes();

        let mut headers = parts.headers;
        headers.remove(PROXY_CONNECTION);
        headers.remove(PROXY_AUTHORIZATION);
        headers.remove(CONNECTION);

        let upstream = self
            .client
            .request(parts.method, target.upstream_url())
            .headers(headers)
            .body(body_bytes)
            .send()
            .await
            .map_err(|e| RedirectorError::InterceptionFailed(format!("Upstream request failed: {}", e)))?;

        let status = upstream.status();
        let upstream_headers = upstream.headers().clone();
        let body = upstream.bytes().await.map_err(|e| {
            RedirectorError::InterceptionFailed(format!("Response body error: {}", e))
        })?;

        let mut response = Response::new(Full::new(body));
        *response.status_mut() = status;
        *response.headers_mut() = upstream_headers;
        response.headers_mut().remove(CONNECTION);
        response.headers_mut().remove(hyper::header::TRANSFER_ENCODING);

        Ok(response)
    }
}

fn error_response(status: StatusCode, message: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(message.as_bytes())));
    *response.status_mut() = status;
    response
}
