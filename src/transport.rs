use crate::auth::{self, EnvLookup};
use anyhow::Context as _;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, AUTHORIZATION};
use http::StatusCode;
use std::io::Write;
use url::Url;

/// A single API call. Every call this client makes is a `POST`.
#[derive(Clone, Debug)]
pub struct Request {
    pub url: Url,
    /// Sent in order, duplicates are not collapsed
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub body: Bytes,
}

#[derive(Clone, Debug)]
pub struct Response {
    pub status: StatusCode,
    pub body: Bytes,
}

/// Performs exactly one network round trip for a request
pub trait Transport {
    fn send(&self, req: Request) -> anyhow::Result<Response>;
}

/// The real transport, a blocking reqwest client
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            // One round trip per invocation, there is nothing to reuse
            .pool_max_idle_per_host(0)
            .build()
            .context("failed to build client")?;

        Ok(Self { client })
    }
}

/// The most that is reserved for a response body before any of it arrives
const MAX_PREALLOC: u64 = 8 * 1024 * 1024;

#[inline]
fn describe(err: &reqwest::Error) -> &'static str {
    if err.is_timeout() {
        "request timed out"
    } else if err.is_connect() {
        "failed to connect"
    } else if err.is_builder() {
        "failed to build request"
    } else if err.is_body() || err.is_decode() {
        "failed to receive body"
    } else {
        "failed to send request"
    }
}

impl Transport for HttpTransport {
    fn send(&self, req: Request) -> anyhow::Result<Response> {
        let mut rb = self.client.post(req.url.clone());

        for (name, value) in req.headers {
            rb = rb.header(name, value);
        }

        let mut res = rb.body(req.body).send().map_err(|err| {
            let what = describe(&err);
            anyhow::Error::new(err).context(format!("{what}: {}", req.url))
        })?;

        let status = res.status();

        // Content-Length is only a hint from the server, never trust it for
        // more than a modest up front allocation
        let content_len = res
            .content_length()
            .unwrap_or_default()
            .min(MAX_PREALLOC) as usize;
        let mut buffer = bytes::BytesMut::with_capacity(content_len);

        let mut block = [0u8; 8 * 1024];

        loop {
            use std::io::Read;
            let read = res
                .read(&mut block)
                .with_context(|| format!("failed to receive body: {}", req.url))?;

            if read > 0 {
                buffer.extend_from_slice(&block[..read]);
            } else {
                break;
            }
        }

        Ok(Response {
            status,
            body: buffer.freeze(),
        })
    }
}

/// What to do when the API answers with a non-success status
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum StatusPolicy {
    /// Write the body to the sink regardless and report success
    #[default]
    PassThrough,
    /// Fail with the status and the body text, leaving the sink untouched
    Fail,
}

/// Attaches the credential to requests, performs them, and relays the
/// response body to a sink
pub struct Executor<T> {
    transport: T,
    env: EnvLookup,
    status: StatusPolicy,
}

impl<T: Transport> Executor<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            env: auth::process_env,
            status: StatusPolicy::default(),
        }
    }

    pub fn with_env(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }

    pub fn with_status_policy(mut self, status: StatusPolicy) -> Self {
        self.status = status;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// POSTs `body` to `url` and writes the complete response body to `sink`.
    ///
    /// The `Authorization` header is always appended after `headers`. If the
    /// credential can't be resolved no request is made.
    pub fn perform(
        &self,
        url: Url,
        mut headers: Vec<(HeaderName, HeaderValue)>,
        body: Bytes,
        sink: &mut dyn Write,
    ) -> anyhow::Result<()> {
        let token = auth::resolve(self.env)?;
        headers.push((AUTHORIZATION, token.header_value()?));

        tracing::debug!(%url, body_len = body.len(), "sending request");

        let res = self.transport.send(Request { url, headers, body })?;

        tracing::debug!(status = %res.status, body_len = res.body.len(), "received response");

        if !res.status.is_success() {
            let code = res.status;
            match self.status {
                StatusPolicy::PassThrough => {
                    tracing::warn!("API responded with {code}");
                }
                StatusPolicy::Fail => {
                    if let Ok(err_str) = String::from_utf8(res.body.into()) {
                        anyhow::bail!("API request failed: HTTP status {code} -> {err_str}");
                    } else {
                        anyhow::bail!("API request failed: HTTP status {code}");
                    }
                }
            }
        }

        sink.write_all(&res.body)
            .context("failed to write response")?;
        sink.flush().context("failed to write response")?;

        Ok(())
    }
}
