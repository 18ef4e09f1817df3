use anyhow::{Context, bail};
use clap::{
    Args, CommandFactory, Parser, Subcommand, builder::NonEmptyStringValueParser,
    error::ErrorKind,
};
use core::fmt;
use std::{path::PathBuf, time::Duration};
use substreams_tonic_core::types::RequestedRange;

/// Default endpoint, overridable through `--endpoint` or
/// `SUBSTREAMS_ENDPOINT`.
pub const DEFAULT_ENDPOINT: &str = "api-dev.streamingfast.io:443";

/// Command-line interface of the `substreams-client` binary.
///
/// Every option of the `run` subcommand falls back to an environment variable
/// in the `SUBSTREAMS_` namespace, which is also populated from a `.env` file
/// when one is present.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "substreams-client",
    version,
    about = "Stream substreams module output block by block"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run a substream.
    Run(RunArgs),
}

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Path to the package (`.spkg`) file to execute.
    ///
    /// Relative paths are resolved against the current working directory.
    #[arg(value_name = "PACKAGE")]
    pub package: PathBuf,

    /// Names of the modules whose output should be streamed back.
    ///
    /// Every module of the package is sent to the service; this only selects
    /// which results are emitted. Accepts several values or a comma-separated
    /// list.
    ///
    /// Environment variable: `SUBSTREAMS_MODULES`
    #[arg(
        long,
        env = "SUBSTREAMS_MODULES",
        required = true,
        num_args = 1..,
        value_delimiter = ',',
        value_parser = NonEmptyStringValueParser::new()
    )]
    pub modules: Vec<String>,

    /// API token sent as the `authorization` header of the stream request.
    ///
    /// Environment variable: `SUBSTREAMS_API_TOKEN`
    #[arg(
        long,
        env = "SUBSTREAMS_API_TOKEN",
        hide_env_values = true,
        value_parser = NonEmptyStringValueParser::new()
    )]
    pub api_token: String,

    /// Service endpoint as `host:port`.
    ///
    /// Environment variable: `SUBSTREAMS_ENDPOINT`
    #[arg(long, env = "SUBSTREAMS_ENDPOINT", default_value_t = String::from(DEFAULT_ENDPOINT))]
    pub endpoint: String,

    /// First block to process.
    ///
    /// Environment variable: `SUBSTREAMS_START_BLOCK`
    #[arg(long, env = "SUBSTREAMS_START_BLOCK")]
    pub start_block: u64,

    /// Block to stop at (exclusive). When omitted the stream follows the
    /// chain until interrupted.
    ///
    /// Environment variable: `SUBSTREAMS_STOP_BLOCK`
    #[arg(long, env = "SUBSTREAMS_STOP_BLOCK")]
    pub stop_block: Option<u64>,

    /// Connect without TLS. Only meant for local endpoints.
    ///
    /// Environment variable: `SUBSTREAMS_PLAINTEXT`
    #[arg(long, env = "SUBSTREAMS_PLAINTEXT", default_value_t = false)]
    pub plaintext: bool,

    /// Seconds allowed for establishing the connection. The stream itself has
    /// no deadline.
    ///
    /// Environment variable: `SUBSTREAMS_CONNECT_TIMEOUT`
    #[arg(long, env = "SUBSTREAMS_CONNECT_TIMEOUT", default_value_t = 10)]
    pub connect_timeout: u64,
}

// Keeps the token out of `--help` debug output and logs.
impl fmt::Debug for RunArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunArgs")
            .field("package", &self.package)
            .field("modules", &self.modules)
            .field("api_token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("start_block", &self.start_block)
            .field("stop_block", &self.stop_block)
            .field("plaintext", &self.plaintext)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Validated, immutable configuration of a single run.
#[derive(Clone)]
pub struct ClientConfig {
    pub package_path: PathBuf,
    pub output_modules: Vec<String>,
    pub api_token: String,
    pub endpoint: String,
    pub range: RequestedRange,
    pub plaintext: bool,
    pub connect_timeout: Duration,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("package_path", &self.package_path)
            .field("output_modules", &self.output_modules)
            .field("api_token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("range", &self.range)
            .field("plaintext", &self.plaintext)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl ClientConfig {
    /// Builds the configuration from parsed arguments.
    ///
    /// Values that parse but do not validate are reported as clap usage
    /// errors, so `err.exit()` prints the usage text and exits with status 2
    /// like any other malformed invocation.
    pub fn from_cli(args: CliArgs) -> Result<Self, clap::Error> {
        let Command::Run(run_args) = args.command;
        Self::try_from(run_args).map_err(|err| {
            CliArgs::command().error(ErrorKind::ValueValidation, format!("{err:#}"))
        })
    }
}

impl TryFrom<RunArgs> for ClientConfig {
    type Error = anyhow::Error;

    fn try_from(args: RunArgs) -> Result<Self, Self::Error> {
        if args.modules.is_empty() {
            bail!("at least one output module is required");
        }

        if args.api_token.trim().is_empty() {
            bail!("API token must not be empty");
        }

        validate_endpoint(&args.endpoint)?;

        if args.connect_timeout == 0 {
            bail!("SUBSTREAMS_CONNECT_TIMEOUT must be greater than 0");
        }

        let range = RequestedRange::new(args.start_block, args.stop_block)?;

        Ok(Self {
            package_path: args.package,
            output_modules: args.modules,
            api_token: args.api_token,
            endpoint: args.endpoint,
            range,
            plaintext: args.plaintext,
            connect_timeout: Duration::from_secs(args.connect_timeout),
        })
    }
}

/// Checks that `endpoint` has the `host:port` shape.
fn validate_endpoint(endpoint: &str) -> anyhow::Result<()> {
    let (host, port) = endpoint
        .rsplit_once(':')
        .with_context(|| format!("endpoint `{endpoint}` must be in `host:port` form"))?;
    if host.is_empty() {
        bail!("endpoint `{endpoint}` is missing a host");
    }
    port.parse::<u16>()
        .with_context(|| format!("endpoint `{endpoint}` has an invalid port `{port}`"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliArgs, clap::Error> {
        CliArgs::try_parse_from(std::iter::once("substreams-client").chain(args.iter().copied()))
    }

    fn run_args(args: &[&str]) -> RunArgs {
        let Command::Run(run) = parse(args).expect("valid arguments").command;
        run
    }

    const REQUIRED: &[&str] = &[
        "run",
        "pkg.spkg",
        "--modules",
        "block_to_tokens",
        "--api-token",
        "secret",
        "--start-block",
        "100000",
    ];

    #[test]
    fn parses_minimal_run() {
        let config = ClientConfig::try_from(run_args(REQUIRED)).unwrap();
        assert_eq!(config.package_path, PathBuf::from("pkg.spkg"));
        assert_eq!(config.output_modules, ["block_to_tokens"]);
        assert_eq!(config.api_token, "secret");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.range.start(), 100_000);
        assert!(config.range.is_open_ended());
        assert!(!config.plaintext);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn parses_multiple_modules_in_order() {
        let mut args = REQUIRED.to_vec();
        args.extend(["--modules", "graph_out,map_pools", "--stop-block", "200000"]);
        let config = ClientConfig::try_from(run_args(&args)).unwrap();
        assert_eq!(
            config.output_modules,
            ["block_to_tokens", "graph_out", "map_pools"]
        );
        assert_eq!(config.range.stop(), Some(200_000));
    }

    #[test]
    fn missing_required_options_are_usage_errors() {
        for missing in ["--modules", "--api-token", "--start-block"] {
            let pos = REQUIRED.iter().position(|a| *a == missing).unwrap();
            let mut args = REQUIRED.to_vec();
            args.drain(pos..pos + 2);
            // Environment fallbacks would satisfy the requirement.
            if std::env::var_os(format!(
                "SUBSTREAMS_{}",
                missing.trim_start_matches("--").replace('-', "_").to_uppercase()
            ))
            .is_some()
            {
                continue;
            }
            let err = parse(&args).unwrap_err();
            assert_eq!(
                err.kind(),
                clap::error::ErrorKind::MissingRequiredArgument,
                "{missing}"
            );
        }
    }

    #[test]
    fn missing_package_is_usage_error() {
        let err = parse(&["run", "--modules", "a", "--api-token", "t", "--start-block", "1"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn non_numeric_block_is_usage_error() {
        let mut args = REQUIRED.to_vec();
        args[7] = "latest";
        let err = parse(&args).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let mut args = REQUIRED.to_vec();
        args[7] = "-5";
        assert!(parse(&args).is_err());
    }

    #[test]
    fn empty_token_rejected() {
        let mut args = REQUIRED.to_vec();
        args[5] = "";
        assert!(parse(&args).is_err());

        args[5] = "   ";
        let err = ClientConfig::try_from(run_args(&args)).unwrap_err();
        assert!(err.to_string().contains("API token"));
    }

    #[test]
    fn stop_block_must_follow_start_block() {
        let mut args = REQUIRED.to_vec();
        args.extend(["--stop-block", "100000"]);
        let err = ClientConfig::try_from(run_args(&args)).unwrap_err();
        assert!(err.to_string().contains("stop block"), "{err}");
    }

    #[test]
    fn endpoint_must_be_host_port() {
        for bad in ["localhost", ":443", "localhost:http", "localhost:70000"] {
            let mut args = REQUIRED.to_vec();
            args.extend(["--endpoint", bad]);
            assert!(ClientConfig::try_from(run_args(&args)).is_err(), "{bad}");
        }

        let mut args = REQUIRED.to_vec();
        args.extend(["--endpoint", "127.0.0.1:9000", "--plaintext"]);
        let config = ClientConfig::try_from(run_args(&args)).unwrap();
        assert_eq!(config.endpoint, "127.0.0.1:9000");
        assert!(config.plaintext);
    }

    #[test]
    fn invalid_values_are_usage_errors() {
        for extra in [
            ["--endpoint", "localhost"],
            ["--connect-timeout", "0"],
            ["--stop-block", "100000"],
        ] {
            let mut args = REQUIRED.to_vec();
            args.extend(extra);
            let err = ClientConfig::from_cli(parse(&args).unwrap()).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation, "{extra:?}");
            assert_eq!(err.exit_code(), 2, "{extra:?}");
        }

        let config = ClientConfig::from_cli(parse(REQUIRED).unwrap()).unwrap();
        assert_eq!(config.range.start(), 100_000);
    }

    #[test]
    fn debug_output_redacts_token() {
        let args = run_args(REQUIRED);
        assert!(!format!("{args:?}").contains("secret"));
        let config = ClientConfig::try_from(args).unwrap();
        assert!(!format!("{config:?}").contains("secret"));
    }
}
