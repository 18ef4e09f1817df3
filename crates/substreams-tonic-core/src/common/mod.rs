//! Shared protocol bindings, types and errors used by the substreams client.
//!
//! ## Submodules
//!
//! - [`error`] - Centralized client error type.
//! - [`types`] - The validated block range a session streams over.
//! - [`request`] - Assembly of the outbound `Blocks` request.
//! - [`proto`] - Generated `sf.substreams.v1` messages and gRPC stubs.

pub mod error;
pub mod request;
pub mod types;

pub use error::{Error, Result};

/// gRPC service and message definitions generated from
/// `proto/sf/substreams/v1/*.proto`.
///
/// ## Service
///
/// - `Stream/Blocks` - Executes a package's modules over a block range and
///   streams back one [`Response`](proto::Response) per block, interleaved
///   with progress and snapshot control messages.
///
/// ## Message Format
///
/// - [`Request`](proto::Request) - Block range, fork steps, the full module
///   set and the output module selection.
/// - [`Response`](proto::Response) - A `oneof` of progress, snapshot data,
///   snapshot completion, or block-scoped module output.
/// - [`Package`](proto::Package) - The on-disk `.spkg` descriptor holding
///   the module graph, the compiled binaries and the protobuf schemas.
pub mod proto {
    tonic::include_proto!("sf.substreams.v1");
}
