//! Plain-TCP/TLS socket abstraction, with `try_read`/`try_write` added so the session engine can
//! drive I/O from a synchronous `tick()` instead of an async task (see [`crate::noop_waker`]).

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::OnceLock;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

#[cfg(feature = "tls-rustls")]
use tokio_rustls::client::TlsStream;

#[cfg(feature = "tls-native")]
use tokio_native_tls::TlsStream;

/// Process-wide TLS connector, built lazily on first use. One connector (and therefore one
/// native-cert bundle load) is shared by every server's connect worker.
#[cfg(feature = "tls-rustls")]
fn rustls_connector() -> &'static tokio_rustls::TlsConnector {
    static CONNECTOR: OnceLock<tokio_rustls::TlsConnector> = OnceLock::new();
    CONNECTOR.get_or_init(|| {
        let mut roots = tokio_rustls::rustls::RootCertStore::empty();
        if let Ok(certs) = rustls_native_certs::load_native_certs() {
            for cert in certs {
                let _ = roots.add(cert);
            }
        }
        let config = tokio_rustls::rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        tokio_rustls::TlsConnector::from(std::sync::Arc::new(config))
    })
}

#[cfg(feature = "tls-native")]
fn native_connector() -> &'static tokio_native_tls::TlsConnector {
    static CONNECTOR: OnceLock<tokio_native_tls::TlsConnector> = OnceLock::new();
    CONNECTOR.get_or_init(|| {
        tokio_native_tls::TlsConnector::from(
            native_tls::TlsConnector::new().expect("failed to build native-tls connector"),
        )
    })
}

pub enum Stream {
    Tcp(Box<TcpStream>),
    #[cfg(any(feature = "tls-rustls", feature = "tls-native"))]
    Tls(Box<TlsStream<TcpStream>>),
}

impl Stream {
    pub async fn connect_tcp(addr: SocketAddr) -> io::Result<Stream> {
        Ok(Stream::Tcp(Box::new(TcpStream::connect(addr).await?)))
    }

    #[cfg(feature = "tls-rustls")]
    pub async fn connect_tls(addr: SocketAddr, server_name: &str) -> io::Result<Stream> {
        let tcp = TcpStream::connect(addr).await?;
        let name = rustls_pki_types::ServerName::try_from(server_name.to_owned())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let tls = rustls_connector().connect(name, tcp).await?;
        Ok(Stream::Tls(Box::new(tls)))
    }

    #[cfg(all(feature = "tls-native", not(feature = "tls-rustls")))]
    pub async fn connect_tls(addr: SocketAddr, server_name: &str) -> io::Result<Stream> {
        let tcp = TcpStream::connect(addr).await?;
        let tls = native_connector()
            .connect(server_name, tcp)
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(Stream::Tls(Box::new(tls)))
    }

    /// Non-blocking read, polled once with a throwaway waker: never suspends. `Ok(0)` means
    /// EOF/remote hangup; `Err(WouldBlock)` means no data was available this tick.
    pub fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let waker = crate::noop_waker::noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut read_buf = ReadBuf::new(buf);
        match Pin::new(self).poll_read(&mut cx, &mut read_buf) {
            Poll::Ready(Ok(())) => Ok(read_buf.filled().len()),
            Poll::Ready(Err(e)) => Err(e),
            Poll::Pending => Err(io::Error::from(io::ErrorKind::WouldBlock)),
        }
    }

    /// Non-blocking write; short writes (e.g. mid-TLS-renegotiation) are tolerated by the caller
    /// retrying.
    pub fn try_write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let waker = crate::noop_waker::noop_waker();
        let mut cx = Context::from_waker(&waker);
        match Pin::new(self).poll_write(&mut cx, buf) {
            Poll::Ready(result) => result,
            Poll::Pending => Err(io::Error::from(io::ErrorKind::WouldBlock)),
        }
    }
}

impl AsyncRead for Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
            #[cfg(any(feature = "tls-rustls", feature = "tls-native"))]
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Stream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
            #[cfg(any(feature = "tls-rustls", feature = "tls-native"))]
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s.as_mut()).poll_flush(cx),
            #[cfg(any(feature = "tls-rustls", feature = "tls-native"))]
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
            #[cfg(any(feature = "tls-rustls", feature = "tls-native"))]
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}
