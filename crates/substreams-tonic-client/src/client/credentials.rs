//! Channel credentials for the substreams service.
//!
//! A [`Credentials`] value combines two things: the transport security of the
//! channel (TLS with the platform's native root certificates, unless plaintext
//! was requested) and a per-call metadata generator that attaches the API
//! token to every outbound request.
//!
//! The metadata generator is a [`MetadataProvider`] capability wrapped in an
//! [`AuthInterceptor`]. Tonic invokes the interceptor lazily for each call, so
//! a provider is free to hand out a different header per call even though a
//! run only ever opens one.

use core::fmt;
use std::sync::Arc;
use substreams_tonic_core::{Error, Result};
use tonic::{
    Request, Status,
    metadata::{AsciiMetadataValue, MetadataMap},
    service::Interceptor,
    transport::ClientTlsConfig,
};

/// Metadata key carrying the API token.
pub const AUTHORIZATION: &str = "authorization";

/// Produces the metadata attached to a single outbound call.
pub trait MetadataProvider: Send + Sync + 'static {
    fn apply(&self, metadata: &mut MetadataMap) -> core::result::Result<(), Status>;
}

/// Static API token sent verbatim as the `authorization` header.
#[derive(Clone)]
pub struct ApiToken {
    value: AsciiMetadataValue,
}

impl ApiToken {
    /// Parses `token` into a header value.
    ///
    /// Fails with [`Error::InvalidConfig`] when the token is blank or contains
    /// characters a header cannot carry.
    pub fn new(token: &str) -> Result<Self> {
        if token.trim().is_empty() {
            return Err(Error::invalid_config("API token must not be empty"));
        }

        let mut value: AsciiMetadataValue = token.parse().map_err(|_| {
            Error::invalid_config("API token contains characters not allowed in a header")
        })?;
        value.set_sensitive(true);

        Ok(Self { value })
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(<redacted>)")
    }
}

impl MetadataProvider for ApiToken {
    fn apply(&self, metadata: &mut MetadataMap) -> core::result::Result<(), Status> {
        metadata.insert(AUTHORIZATION, self.value.clone());
        Ok(())
    }
}

/// Tonic interceptor delegating to a [`MetadataProvider`] on every call.
#[derive(Clone)]
pub struct AuthInterceptor {
    provider: Arc<dyn MetadataProvider>,
}

impl AuthInterceptor {
    pub fn new(provider: impl MetadataProvider) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }
}

impl Interceptor for AuthInterceptor {
    fn call(&mut self, mut request: Request<()>) -> core::result::Result<Request<()>, Status> {
        self.provider.apply(request.metadata_mut())?;
        Ok(request)
    }
}

/// Transport security plus per-call authentication for one session.
#[derive(Clone)]
pub struct Credentials {
    tls: Option<ClientTlsConfig>,
    interceptor: AuthInterceptor,
}

impl Credentials {
    /// Builds TLS credentials trusting the native root store, authenticated
    /// with `api_token`.
    ///
    /// No I/O happens here; the token is only validated and parsed.
    pub fn new(api_token: &str) -> Result<Self> {
        Ok(Self {
            tls: Some(ClientTlsConfig::new().with_native_roots()),
            interceptor: AuthInterceptor::new(ApiToken::new(api_token)?),
        })
    }

    /// Same as [`Credentials::new`] but for a channel without TLS.
    pub fn plaintext(api_token: &str) -> Result<Self> {
        Ok(Self {
            tls: None,
            interceptor: AuthInterceptor::new(ApiToken::new(api_token)?),
        })
    }

    pub fn tls(&self) -> Option<&ClientTlsConfig> {
        self.tls.as_ref()
    }

    pub fn interceptor(&self) -> AuthInterceptor {
        self.interceptor.clone()
    }

    /// URI scheme matching the transport security.
    pub fn scheme(&self) -> &'static str {
        if self.tls.is_some() { "https" } else { "http" }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("tls", &self.tls.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn interceptor_attaches_raw_token() {
        let credentials = Credentials::plaintext("eyJhbGciOi.token").unwrap();
        let mut interceptor = credentials.interceptor();

        let request = interceptor.call(Request::new(())).unwrap();
        let header = request.metadata().get(AUTHORIZATION).unwrap();
        assert_eq!(header.to_str().unwrap(), "eyJhbGciOi.token");
    }

    #[test]
    fn interceptor_runs_on_every_call() {
        struct Counting(Arc<AtomicUsize>);

        impl MetadataProvider for Counting {
            fn apply(&self, metadata: &mut MetadataMap) -> core::result::Result<(), Status> {
                let n = self.0.fetch_add(1, Ordering::SeqCst);
                metadata.insert(AUTHORIZATION, n.to_string().parse().unwrap());
                Ok(())
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let mut interceptor = AuthInterceptor::new(Counting(Arc::clone(&calls)));

        for expected in ["0", "1", "2"] {
            let request = interceptor.call(Request::new(())).unwrap();
            let header = request.metadata().get(AUTHORIZATION).unwrap();
            assert_eq!(header.to_str().unwrap(), expected);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn provider_error_aborts_call() {
        struct Expired;

        impl MetadataProvider for Expired {
            fn apply(&self, _: &mut MetadataMap) -> core::result::Result<(), Status> {
                Err(Status::unauthenticated("token expired"))
            }
        }

        let mut interceptor = AuthInterceptor::new(Expired);
        let status = interceptor.call(Request::new(())).unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unauthenticated);
    }

    #[test]
    fn blank_or_invalid_token_fails_fast() {
        for token in ["", "  ", "line\nbreak"] {
            let err = Credentials::new(token).unwrap_err();
            assert!(matches!(err, Error::InvalidConfig { .. }), "{token:?}");
        }
    }

    #[test]
    fn scheme_follows_transport_security() {
        assert_eq!(Credentials::new("t").unwrap().scheme(), "https");
        assert_eq!(Credentials::plaintext("t").unwrap().scheme(), "http");
    }

    #[test]
    fn debug_hides_token() {
        let credentials = Credentials::new("super-secret").unwrap();
        assert!(!format!("{credentials:?}").contains("super-secret"));
        assert!(!format!("{:?}", ApiToken::new("super-secret").unwrap()).contains("super-secret"));
    }
}
