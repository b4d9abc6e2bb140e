//! HTTP/HTTPS connection handles configured with the current secure context.
//!
//! Opening a handle does no I/O. The TCP connect (bounded by the connect
//! timeout) and the TLS handshake happen on first use.

use http::header::{HeaderMap, HOST};
use http::{Method, Request, StatusCode, Uri};
use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use rustls::CertificateError;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::context::SecureContext;
use crate::error::{Result, TrustError};

/// Parsed connection target.
#[derive(Debug, Clone)]
pub struct Target {
    uri: Uri,
    secure: bool,
    host: String,
    port: u16,
}

impl Target {
    pub fn parse(url: &str) -> Result<Self> {
        let uri: Uri = url
            .trim()
            .parse()
            .map_err(|e| TrustError::InvalidUrl(format!("{url}: {e}")))?;
        let secure = match uri.scheme_str().map(|s| s.to_ascii_lowercase()).as_deref() {
            Some("https") => true,
            Some("http") => false,
            Some(other) => {
                return Err(TrustError::InvalidUrl(format!("unsupported scheme {other}")))
            }
            None => return Err(TrustError::InvalidUrl(format!("{url}: missing scheme"))),
        };
        let host = uri
            .host()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| TrustError::InvalidUrl(format!("{url}: missing host")))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = uri.port_u16().unwrap_or(if secure { 443 } else { 80 });
        Ok(Self {
            uri,
            secure,
            host,
            port,
        })
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

/// Response of a completed request.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
struct Tls {
    context: SecureContext,
    server_name: ServerName<'static>,
}

/// Unopened connection to a target.
#[derive(Debug, Clone)]
pub struct Connection {
    target: Target,
    tls: Option<Tls>,
    connect_timeout: Duration,
}

impl Connection {
    /// `context` is required for https targets and ignored otherwise.
    pub fn new(
        target: Target,
        context: Option<SecureContext>,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let tls = if target.secure {
            let context = context.ok_or(TrustError::NotInitialized)?;
            let server_name = ServerName::try_from(target.host.clone())
                .map_err(|e| TrustError::InvalidUrl(format!("{}: {e}", target.host)))?;
            Some(Tls {
                context,
                server_name,
            })
        } else {
            None
        };
        Ok(Self {
            target,
            tls,
            connect_timeout,
        })
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Secure context this handle was configured with, for https targets.
    pub fn context(&self) -> Option<&SecureContext> {
        self.tls.as_ref().map(|t| &t.context)
    }

    /// Issue a GET for the target's path and collect the response.
    pub async fn get(&self) -> Result<HttpResponse> {
        let tcp = self.connect_tcp().await?;
        match &self.tls {
            None => self.exchange(tcp).await,
            Some(tls) => {
                let connector = TlsConnector::from(tls.context.client_config().clone());
                let stream = connector
                    .connect(tls.server_name.clone(), tcp)
                    .await
                    .map_err(handshake_error)?;
                self.exchange(stream).await
            }
        }
    }

    async fn connect_tcp(&self) -> Result<TcpStream> {
        let addr = (self.target.host.as_str(), self.target.port);
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr)).await {
            Ok(stream) => Ok(stream?),
            Err(_) => Err(TrustError::Timeout),
        }
    }

    async fn exchange<S>(&self, io: S) -> Result<HttpResponse>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut sender, conn) =
            hyper::client::conn::http1::handshake::<_, Empty<Bytes>>(TokioIo::new(io))
                .await
                .map_err(http_error)?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!("connection closed: {e}");
            }
        });

        let path = self
            .target
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let authority = self
            .target
            .uri
            .authority()
            .map(|a| a.as_str().to_string())
            .unwrap_or_else(|| self.target.host.clone());
        let req = Request::builder()
            .method(Method::GET)
            .uri(path)
            .header(HOST, authority)
            .body(Empty::<Bytes>::new())
            .map_err(|e| TrustError::InvalidUrl(e.to_string()))?;

        let res = sender.send_request(req).await.map_err(http_error)?;
        let (parts, body) = res.into_parts();
        let body = body.collect().await.map_err(http_error)?.to_bytes();
        Ok(HttpResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

fn http_error(e: hyper::Error) -> TrustError {
    TrustError::Io(io::Error::other(e))
}

/// Map a handshake failure to the trust taxonomy when rustls caused it.
fn handshake_error(e: io::Error) -> TrustError {
    match e
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
    {
        Some(rustls::Error::InvalidCertificate(CertificateError::UnknownIssuer)) => {
            TrustError::ChainNotTrusted
        }
        Some(rustls::Error::InvalidCertificate(CertificateError::BadEncoding)) => {
            TrustError::CertificateParse("server certificate".to_string())
        }
        Some(other) => TrustError::Security(other.to_string()),
        None => TrustError::Io(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_defaults_ports() {
        let t = Target::parse("https://panel.local/start").unwrap();
        assert!(t.is_secure());
        assert_eq!(t.port(), 443);
        assert_eq!(t.host(), "panel.local");

        let t = Target::parse("HTTP://panel.local:8080").unwrap();
        assert!(!t.is_secure());
        assert_eq!(t.port(), 8080);
    }

    #[test]
    fn parse_strips_ipv6_brackets() {
        let t = Target::parse("https://[::1]:8443/").unwrap();
        assert_eq!(t.host(), "::1");
        assert_eq!(t.port(), 8443);
    }

    #[test]
    fn parse_rejects_bad_urls() {
        assert!(matches!(Target::parse("ftp://x"), Err(TrustError::InvalidUrl(_))));
        assert!(matches!(Target::parse("/relative"), Err(TrustError::InvalidUrl(_))));
    }

    #[test]
    fn https_without_context_is_not_initialized() {
        let t = Target::parse("https://panel.local").unwrap();
        let err = Connection::new(t, None, Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, TrustError::NotInitialized));
    }

    #[test]
    fn http_needs_no_context() {
        let t = Target::parse("http://panel.local").unwrap();
        let c = Connection::new(t, None, Duration::from_millis(200)).unwrap();
        assert!(c.context().is_none());
    }
}
