/// Builds the gRPC client and server code for the `sf.substreams.v1` protocol
/// using `tonic-prost-build`.
///
/// This code generation step processes the Protocol Buffer definitions located
/// in the `proto` directory and emits Rust modules with gRPC bindings into the
/// crate's `OUT_DIR`.
///
/// # Byte Field Optimization
///
/// The `content` field of the `Binary` message carries the compiled module
/// code of a package (typically a WASM blob of several megabytes). It is marked
/// with `.bytes(...)` so it decodes into a `Bytes` buffer instead of a
/// `Vec<u8>`, which lets the request builder clone a package's module set into
/// the outbound request without copying the binaries.
///
/// # Files and Paths
///
/// - Proto files: `proto/sf/substreams/v1/{substreams,package}.proto`
/// - Includes: `proto/`
///
/// Well-known types (`google.protobuf.Any`, `Timestamp`,
/// `FileDescriptorProto`) are mapped onto `prost-types`.
///
/// # Panics
///
/// This function will `panic!` if code generation fails.
///
/// # Output
///
/// Generated code will be accessible in Rust via:
///
/// ```rust
/// pub mod proto {
///     tonic::include_proto!("sf.substreams.v1");
/// }
/// ```
fn main() {
    let mut config = tonic_prost_build::Config::new();

    // Module binaries are large; keep them as `Bytes`.
    config.bytes([".sf.substreams.v1.Binary.content"]);

    tonic_prost_build::configure()
        .compile_with_config(
            config,
            &[
                "proto/sf/substreams/v1/substreams.proto",
                "proto/sf/substreams/v1/package.proto",
            ],
            &["proto"],
        )
        .unwrap();
}
