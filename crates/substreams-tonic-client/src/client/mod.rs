//! Client-side components of the substreams block-streaming CLI.
//!
//! ## Submodules
//!
//! - [`config`] - Command-line arguments and the validated run configuration.
//! - [`credentials`] - TLS and per-call `authorization` metadata.
//! - [`package`] - Loading of `.spkg` package files.
//! - [`session`] - The streaming session state machine.
//! - [`sink`] - Rendering of streamed responses.
//! - [`telemetry`] - Logging and optional OpenTelemetry export.

pub mod config;
pub mod credentials;
pub mod package;
pub mod session;
pub mod sink;
pub mod telemetry;

use config::ClientConfig;
use credentials::Credentials;
use package::load_package;
use session::{Session, SessionSummary};
use sink::ResponseSink;
use substreams_tonic_core::{Result, request::build_request};
use tokio_util::sync::CancellationToken;

/// Executes one run described by `config`, rendering responses into `sink`.
///
/// Credentials are validated first and the package is loaded next, so
/// configuration and resource errors surface before any connection is
/// attempted. Each call builds a fresh [`Session`].
pub async fn run<S>(
    config: &ClientConfig,
    sink: &mut S,
    cancel: &CancellationToken,
) -> Result<SessionSummary>
where
    S: ResponseSink + ?Sized,
{
    let credentials = if config.plaintext {
        Credentials::plaintext(&config.api_token)?
    } else {
        Credentials::new(&config.api_token)?
    };

    let package = load_package(&config.package_path).await?;
    let request = build_request(&package, &config.range, &config.output_modules)?;

    let session = Session::new(&config.endpoint, &credentials, config.connect_timeout)?;
    session.run(request, sink, cancel).await
}
