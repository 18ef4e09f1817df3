//! Loading of `.spkg` package files.

use std::path::{Path, PathBuf};
use substreams_tonic_core::{
    Error, Result,
    prost::{Message, bytes::Bytes},
    proto::Package,
};

/// Reads and decodes the package at `path`.
///
/// Relative paths are resolved against the current working directory. A
/// missing or unreadable file yields [`Error::PackageRead`]; bytes that are
/// not an encoded `Package` yield [`Error::PackageDecode`]. There is no
/// partial decoding.
pub async fn load_package(path: &Path) -> Result<Package> {
    let path = resolve(path)?;

    let raw = tokio::fs::read(&path)
        .await
        .map_err(|source| Error::PackageRead {
            path: path.clone(),
            source,
        })?;

    // Decoding from `Bytes` lets the module binaries share the file buffer.
    let package = Package::decode(Bytes::from(raw))
        .map_err(|source| Error::PackageDecode { path: path.clone(), source })?;

    let modules = package.modules.as_ref().map_or(0, |m| m.modules.len());
    tracing::debug!(path = %path.display(), modules, "Loaded package");

    Ok(package)
}

fn resolve(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|source| Error::PackageRead {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use substreams_tonic_core::proto::{Binary, Module, Modules, PackageMetadata};

    fn sample_package() -> Package {
        Package {
            version: 1,
            modules: Some(Modules {
                modules: ["map_pools", "store_pools", "graph_out"]
                    .into_iter()
                    .map(|name| Module {
                        name: name.to_string(),
                        ..Default::default()
                    })
                    .collect(),
                binaries: vec![Binary {
                    r#type: "wasm/rust-v1".to_string(),
                    content: Bytes::from_static(b"\0asm\x01\0\0\0"),
                }],
            }),
            package_meta: vec![PackageMetadata {
                name: "uniswap_v3".to_string(),
                version: "v0.1.0-beta".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn loads_encoded_package() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("uniswap-v3-v0.1.0-beta.spkg");
        let expected = sample_package();
        std::fs::write(&file, expected.encode_to_vec()).unwrap();

        let package = load_package(&file).await.unwrap();
        assert_eq!(package, expected);
    }

    #[tokio::test]
    async fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("missing.spkg");

        let err = load_package(&file).await.unwrap_err();
        match err {
            Error::PackageRead { path, source } => {
                assert_eq!(path, file);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn garbage_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("broken.spkg");
        // Field 1 with wire type 7, which does not exist.
        std::fs::write(&file, b"\x0f\x00\x01").unwrap();

        let err = load_package(&file).await.unwrap_err();
        assert!(matches!(err, Error::PackageDecode { .. }), "{err}");
    }

    #[test]
    fn relative_path_resolves_against_cwd() {
        let resolved = resolve(Path::new("pkg/uniswap.spkg")).unwrap();
        assert!(resolved.is_absolute());
        assert_eq!(
            resolved,
            std::env::current_dir().unwrap().join("pkg/uniswap.spkg")
        );
    }
}
