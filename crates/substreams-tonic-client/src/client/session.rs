//! The streaming session: one channel, one `Blocks` call, one reader.
//!
//! A [`Session`] walks through
//! `Idle → Connecting → Streaming → {Completed | Failed | Cancelled}`.
//!
//! - `Connecting` opens the channel to the configured endpoint.
//! - `Streaming` issues the call and pulls responses one at a time, handing
//!   each to the [`ResponseSink`] before asking the transport for the next.
//!   HTTP/2 flow control does the rest: nothing is read ahead of the sink.
//! - The terminal states are reached on end of stream, on any error, or when
//!   the cancellation token fires.
//!
//! [`Session::run`] takes the session by value. The response stream, the
//! client and the channel are owned by that call and dropped exactly once on
//! every exit path, which closes the HTTP/2 stream and the connection. A new
//! run needs a new session; nothing carries over between the two.

use crate::client::{
    credentials::{AuthInterceptor, Credentials},
    sink::ResponseSink,
    telemetry::{
        increment_responses, increment_sessions, increment_stream_errors,
        record_session_duration,
    },
};
use core::fmt;
use futures::{Stream, StreamExt};
use std::time::{Duration, Instant};
use substreams_tonic_core::{
    Error, Result,
    proto::{Request, Response, stream_client::StreamClient},
};
use tokio_util::sync::CancellationToken;
use tonic::{
    Status,
    codec::CompressionEncoding,
    transport::{Channel, Endpoint},
};

/// Largest single response the client will decode, 128 MiB.
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 128 * 1024 * 1024;

/// Lifecycle states of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// How a stream that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The service closed the stream.
    Completed,
    /// The cancellation token fired.
    Cancelled,
}

/// Result of draining a response stream into a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Consumed {
    pub end: StreamEnd,
    /// Responses handed to the sink.
    pub responses: u64,
}

/// Summary of a session that ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// Either [`SessionState::Completed`] or [`SessionState::Cancelled`].
    pub state: SessionState,
    pub responses: u64,
    pub elapsed: Duration,
}

/// A single authenticated `Blocks` call against one endpoint.
pub struct Session {
    endpoint: Endpoint,
    interceptor: AuthInterceptor,
    max_response_size: usize,
    state: SessionState,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", self.endpoint.uri())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Prepares a session for `endpoint` (`host:port`).
    ///
    /// Only the endpoint is validated here; the connection is opened by
    /// [`Session::run`]. `connect_timeout` bounds connection establishment;
    /// the stream itself has no deadline.
    pub fn new(
        endpoint: &str,
        credentials: &Credentials,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let uri = format!("{}://{}", credentials.scheme(), endpoint);
        let invalid = |source| Error::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            source,
        };

        let mut builder = Endpoint::from_shared(uri)
            .map_err(invalid)?
            .connect_timeout(connect_timeout)
            .http2_adaptive_window(true);

        if let Some(tls) = credentials.tls() {
            builder = builder.tls_config(tls.clone()).map_err(invalid)?;
        }

        Ok(Self {
            endpoint: builder,
            interceptor: credentials.interceptor(),
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
            state: SessionState::Idle,
        })
    }

    /// Caps the decoded size of a single response. A larger message fails
    /// the stream with `OUT_OF_RANGE`.
    pub fn with_max_response_size(mut self, limit: usize) -> Self {
        self.max_response_size = limit;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Connects, opens the stream for `request` and renders every response
    /// into `sink` until the service ends the stream, an error occurs or
    /// `cancel` fires.
    ///
    /// Cancellation is observed while connecting, while opening the call and
    /// between responses; a response already handed to the sink is always
    /// rendered completely.
    #[tracing::instrument(
        name = "session",
        skip_all,
        fields(
            endpoint = %self.endpoint.uri(),
            start = request.start_block_num,
            stop = request.stop_block_num,
        )
    )]
    pub async fn run<S>(
        mut self,
        request: Request,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<SessionSummary>
    where
        S: ResponseSink + ?Sized,
    {
        let started = Instant::now();
        increment_sessions();

        let result = self.drive(request, sink, cancel).await;
        record_session_duration(started.elapsed().as_millis() as f64);

        match result {
            Ok(consumed) => {
                let state = match consumed.end {
                    StreamEnd::Completed => SessionState::Completed,
                    StreamEnd::Cancelled => SessionState::Cancelled,
                };
                self.transition(state);
                tracing::info!(
                    state = %state,
                    responses = consumed.responses,
                    "Session ended"
                );
                Ok(SessionSummary {
                    state,
                    responses: consumed.responses,
                    elapsed: started.elapsed(),
                })
            }
            Err(err) => {
                self.transition(SessionState::Failed);
                increment_stream_errors();
                tracing::error!("Session failed: {err}");
                Err(err)
            }
        }
    }

    async fn drive<S>(
        &mut self,
        request: Request,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<Consumed>
    where
        S: ResponseSink + ?Sized,
    {
        let cancelled = Consumed {
            end: StreamEnd::Cancelled,
            responses: 0,
        };

        self.transition(SessionState::Connecting);
        let endpoint = self.endpoint.clone();
        let channel: Channel = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(cancelled),
            res = endpoint.connect() => res.map_err(Error::Connect)?,
        };

        let mut client = StreamClient::with_interceptor(channel, self.interceptor.clone())
            .accept_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Gzip)
            .max_decoding_message_size(self.max_response_size);

        let stream = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(cancelled),
            res = client.blocks(request) => res.map_err(Error::from_call_status)?.into_inner(),
        };

        self.transition(SessionState::Streaming);
        consume(stream, sink, cancel).await
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(from = %self.state, to = %next, "Session state");
        self.state = next;
    }
}

/// Pulls responses from `stream` one at a time and renders each into `sink`.
///
/// Returns once the stream ends or `cancel` fires. Cancellation takes priority
/// over a response that is already available, and the stream is dropped before
/// returning on every path.
pub async fn consume<St, S>(
    mut stream: St,
    sink: &mut S,
    cancel: &CancellationToken,
) -> Result<Consumed>
where
    St: Stream<Item = core::result::Result<Response, Status>> + Unpin,
    S: ResponseSink + ?Sized,
{
    let mut responses = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Ok(Consumed { end: StreamEnd::Cancelled, responses });
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(response)) => {
                sink.render(&response)?;
                responses += 1;
                increment_responses();
            }
            Some(Err(status)) => return Err(Error::from_stream_status(status)),
            None => {
                return Ok(Consumed {
                    end: StreamEnd::Completed,
                    responses,
                });
            }
        }
    }
}
