//! Request orchestration.
//!
//! [`Client`] sends the request through its [`Transport`], inflates the body
//! per Content-Encoding, runs it through a [`DecodeState`] and hands back
//! text, bytes or a byte count.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT_ENCODING, HeaderValue};
use serde_json::Value;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::decode::pipeline::BINARY_CHARSET;
use crate::decode::{Codec, DecodeState, Decoded, ResponseHead, StandardCodec, UnsupportedCharset};
use crate::decompress::{ContentCoding, Inflater};
use crate::destination::{Destination, resolve_file_path};
use crate::error::FetchError;
use crate::json::parse_json_or_jsonp;
use crate::request::{Body, FetchOptions, OutputMode, ResponseInfo, Target};
use crate::transport::{ReqwestTransport, Transport, TransportRequest};

/// Path reported in IO errors for caller-supplied writers.
const SINK_PATH: &str = "<sink>";

/// HTTP client that decodes response bodies.
///
/// Cheap to clone; clones share the connection pool.
///
/// # Example
///
/// ```no_run
/// use by_request::{Client, FetchOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::new();
/// let text = client
///     .fetch_text("https://example.com/", &FetchOptions::default())
///     .await?;
/// println!("{text}");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    codec: Arc<dyn Codec>,
    config: ClientConfig,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

/// Where body bytes go while streaming.
enum Output<'a> {
    Memory,
    File {
        path: &'a Path,
        created: &'a mut bool,
    },
    Writer(&'a mut (dyn AsyncWrite + Send + Unpin)),
}

impl Client {
    /// Creates a client with [`ClientConfig::from_env`].
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build. This should never
    /// happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_config(ClientConfig::from_env())
            .expect("failed to build HTTP client with static configuration")
    }

    /// Creates a reqwest-backed client from `config`.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the client cannot be built.
    pub fn with_config(config: ClientConfig) -> Result<Self, reqwest::Error> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(Arc::new(transport), config))
    }

    /// Creates a client over any [`Transport`].
    #[must_use]
    pub fn with_transport(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Self {
            transport,
            codec: Arc::new(StandardCodec),
            config,
        }
    }

    /// Replaces the charset codec.
    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// The configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetches `target`, returning text or bytes as the Content-Type
    /// suggests.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] for an invalid URL, transport failure, non-2xx
    /// status, unsupported coding or charset, decompression failure, or
    /// timeout.
    pub async fn fetch(
        &self,
        target: impl Into<Target>,
        options: &FetchOptions,
    ) -> Result<Body, FetchError> {
        let url = target.into().to_url()?;
        let (decoded, info) = self.run(&url, options, OutputMode::Auto, Output::Memory).await?;
        notify(options, &info);

        Ok(match decoded {
            Decoded::Text(text) => Body::Text(text),
            Decoded::Bytes(bytes) => Body::Bytes(bytes),
            Decoded::Forwarded => Body::Written(info.content_length),
        })
    }

    /// Fetches `target` and decodes it as text whatever its Content-Type.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::BinaryNotPermitted`] if the default encoding is
    /// `binary`, otherwise the same errors as [`fetch`](Self::fetch).
    pub async fn fetch_text(
        &self,
        target: impl Into<Target>,
        options: &FetchOptions,
    ) -> Result<String, FetchError> {
        if options
            .default_encoding
            .as_deref()
            .is_some_and(|enc| enc.trim().eq_ignore_ascii_case(BINARY_CHARSET))
        {
            return Err(FetchError::BinaryNotPermitted);
        }

        let url = target.into().to_url()?;
        let (decoded, info) = self.run(&url, options, OutputMode::Text, Output::Memory).await?;
        notify(options, &info);
        Ok(expect_text(decoded))
    }

    /// Fetches `target` as raw bytes.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`fetch`](Self::fetch).
    pub async fn fetch_binary(
        &self,
        target: impl Into<Target>,
        options: &FetchOptions,
    ) -> Result<Vec<u8>, FetchError> {
        let url = target.into().to_url()?;
        let (decoded, info) = self.run(&url, options, OutputMode::Binary, Output::Memory).await?;
        notify(options, &info);

        match decoded {
            Decoded::Bytes(bytes) => Ok(bytes),
            Decoded::Text(text) => Ok(text.into_bytes()),
            Decoded::Forwarded => Ok(Vec::new()),
        }
    }

    /// Fetches `target` as JSON, accepting a JSONP wrapper.
    ///
    /// Text decoding defaults to UTF-8. The JSONP callback name, if any, is
    /// reported through [`ResponseInfo::callback`].
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidJson`] if the body is neither JSON nor
    /// JSONP, otherwise the same errors as [`fetch_text`](Self::fetch_text).
    pub async fn fetch_json(
        &self,
        target: impl Into<Target>,
        options: &FetchOptions,
    ) -> Result<Value, FetchError> {
        let url = target.into().to_url()?;
        let mut options = options.clone();
        if options.default_encoding.is_none() {
            options.default_encoding = Some("utf-8".to_string());
        }

        let (decoded, mut info) = self.run(&url, &options, OutputMode::Text, Output::Memory).await?;
        let parsed = parse_json_or_jsonp(&expect_text(decoded))?;
        info.callback = parsed.callback;
        notify(&options, &info);
        Ok(parsed.value)
    }

    /// Downloads `target` into `destination` and returns the number of
    /// bytes read from the wire.
    ///
    /// The body is written exactly as decompressed, never decoded. A file
    /// created here is removed again if the download fails.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidDestination`] before any network
    /// activity if no file name can be worked out, [`FetchError::Io`] for
    /// write failures, otherwise the same errors as [`fetch`](Self::fetch).
    pub async fn fetch_to_file(
        &self,
        target: impl Into<Target>,
        destination: Destination<'_>,
        options: &FetchOptions,
    ) -> Result<u64, FetchError> {
        let url = target.into().to_url()?;

        let result = match destination {
            Destination::Sink(writer) => {
                let result = self
                    .run(&url, options, OutputMode::Sink, Output::Writer(&mut *writer))
                    .await;
                if result.is_err() && !options.dont_end_stream {
                    let _ = writer.shutdown().await;
                }
                result
            }
            Destination::Path(path) => self.download(&url, Some(&path), options).await,
            Destination::UrlName => self.download(&url, None, options).await,
        };

        let (_, info) = result?;
        notify(options, &info);
        Ok(info.content_length)
    }

    /// Alias of [`fetch_to_file`](Self::fetch_to_file).
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`fetch_to_file`](Self::fetch_to_file).
    pub async fn wget(
        &self,
        target: impl Into<Target>,
        destination: Destination<'_>,
        options: &FetchOptions,
    ) -> Result<u64, FetchError> {
        self.fetch_to_file(target, destination, options).await
    }

    async fn download(
        &self,
        url: &Url,
        path: Option<&Path>,
        options: &FetchOptions,
    ) -> Result<(Decoded, ResponseInfo), FetchError> {
        let file_path: PathBuf = resolve_file_path(path, url)?;
        let mut created = false;

        let result = self
            .run(
                url,
                options,
                OutputMode::Sink,
                Output::File {
                    path: &file_path,
                    created: &mut created,
                },
            )
            .await;

        if result.is_err() && created {
            debug!(path = %file_path.display(), "cleaning up partial file after error");
            let _ = tokio::fs::remove_file(&file_path).await;
        }
        result
    }

    /// Runs one exchange under the caller's timeout.
    #[instrument(skip(self, options, output), fields(url = %url, mode = ?mode))]
    async fn run(
        &self,
        url: &Url,
        options: &FetchOptions,
        mode: OutputMode,
        output: Output<'_>,
    ) -> Result<(Decoded, ResponseInfo), FetchError> {
        let started = Instant::now();
        let exchange = self.exchange(url, options, mode, output);

        let result = match options.timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| FetchError::timeout(url.as_str(), started.elapsed()))?,
            None => exchange.await,
        };

        match &result {
            Ok((_, info)) => info!(
                status = info.status,
                charset = %info.charset,
                bytes = info.content_length,
                elapsed_ms = started.elapsed().as_millis(),
                "fetch complete"
            ),
            Err(error) => debug!(error = %error, "fetch failed"),
        }
        result
    }

    async fn exchange(
        &self,
        url: &Url,
        options: &FetchOptions,
        mode: OutputMode,
        output: Output<'_>,
    ) -> Result<(Decoded, ResponseInfo), FetchError> {
        let url_text = url.as_str();

        let mut headers = options.headers.clone();
        if !headers.contains_key(ACCEPT_ENCODING) {
            if let Some(value) = self
                .config
                .codings
                .accept_encoding()
                .and_then(|v| HeaderValue::from_str(&v).ok())
            {
                headers.insert(ACCEPT_ENCODING, value);
            }
        }

        let response = self
            .transport
            .send(TransportRequest {
                method: options.method.clone(),
                url: url.clone(),
                headers,
                body: options.body.clone(),
            })
            .await?;

        if !(200..300).contains(&response.status) {
            return Err(FetchError::http_status(url_text, response.status));
        }

        let head = ResponseHead::from_headers(response.status, &response.headers);
        let keep_compressed = options.dont_decompress
            && mode != OutputMode::Text
            && !matches!(head.content_encoding.as_str(), "" | "identity");
        let coding = if keep_compressed {
            ContentCoding::Identity
        } else {
            self.select_coding(url_text, &head.content_encoding)?
        };
        debug!(coding = coding.as_str(), keep_compressed, "content coding selected");

        let mut inflater = Inflater::new(coding);
        let mut state = DecodeState::new(head, options, mode, !keep_compressed, self.codec.as_ref())
            .map_err(|e| unsupported_charset(url_text, &e))?;

        let mut file_writer: Option<BufWriter<File>> = None;
        let (mut writer, end_stream, sink_path): (
            Option<&mut (dyn AsyncWrite + Send + Unpin)>,
            bool,
            PathBuf,
        ) = match output {
            Output::Memory => (None, false, PathBuf::new()),
            Output::File { path, created } => {
                let file = File::create(path)
                    .await
                    .map_err(|e| FetchError::io(path, e))?;
                *created = true;
                let writer = file_writer.insert(BufWriter::new(file));
                (Some(writer), true, path.to_path_buf())
            }
            Output::Writer(writer) => (Some(writer), !options.dont_end_stream, PathBuf::from(SINK_PATH)),
        };

        let mut body = response.body;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            let (read, total) = state.record_wire_bytes(chunk.len());
            if let Some(progress) = &options.progress {
                progress(read, total);
            }

            let plain = inflater
                .push(&chunk)
                .map_err(|e| FetchError::decompression(url_text, coding.as_str(), e))?;
            consume(&mut state, writer.as_deref_mut(), &plain, url_text, &sink_path).await?;
        }

        let tail = inflater
            .finish()
            .map_err(|e| FetchError::decompression(url_text, coding.as_str(), e))?;
        consume(&mut state, writer.as_deref_mut(), &tail, url_text, &sink_path).await?;

        if let Some(writer) = writer.as_deref_mut() {
            writer
                .flush()
                .await
                .map_err(|e| FetchError::io(sink_path.clone(), e))?;
            if end_stream {
                writer
                    .shutdown()
                    .await
                    .map_err(|e| FetchError::io(sink_path.clone(), e))?;
            }
        }

        if state.total_expected().is_none() {
            if let Some(progress) = &options.progress {
                let read = state.bytes_read();
                progress(read, Some(read));
            }
        }

        let (decoded, info) = state.finish().map_err(|e| unsupported_charset(url_text, &e))?;
        debug!(?info, "response info");
        Ok((decoded, info))
    }

    fn select_coding(&self, url: &str, header: &str) -> Result<ContentCoding, FetchError> {
        match ContentCoding::parse(header) {
            Some(coding) if self.config.codings.accepts(coding) => Ok(coding),
            Some(coding) => {
                warn!(coding = coding.as_str(), "content coding disabled by configuration");
                Err(FetchError::unsupported(url, format!("content-encoding {header}")))
            }
            None => Err(FetchError::unsupported(url, format!("content-encoding {header}"))),
        }
    }
}

/// Feeds decompressed bytes to the decode state and forwards them to the
/// sink, if any.
async fn consume<'w>(
    state: &mut DecodeState<'_>,
    writer: Option<&mut (dyn AsyncWrite + Send + Unpin + 'w)>,
    plain: &[u8],
    url: &str,
    sink_path: &Path,
) -> Result<(), FetchError> {
    if plain.is_empty() {
        return Ok(());
    }
    state
        .push_chunk(plain)
        .map_err(|e| unsupported_charset(url, &e))?;
    if let Some(writer) = writer {
        writer
            .write_all(plain)
            .await
            .map_err(|e| FetchError::io(sink_path, e))?;
    }
    Ok(())
}

fn unsupported_charset(url: &str, error: &UnsupportedCharset) -> FetchError {
    FetchError::unsupported(url, format!("charset {}", error.0))
}

fn notify(options: &FetchOptions, info: &ResponseInfo) {
    if let Some(observer) = &options.response_info {
        observer(info);
    }
}

fn expect_text(decoded: Decoded) -> String {
    match decoded {
        Decoded::Text(text) => text,
        Decoded::Bytes(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Decoded::Forwarded => String::new(),
    }
}
