//! # Local Transport
//!
//! The control plane only ever listens on a local endpoint:
//! - Unix: a domain socket `<service folder>/cashbox-launcher-<port>.sock`
//! - Windows: a named pipe `\\.\pipe\cashbox-launcher-<port>`
//!
//! The configured launcher port is only used to name the endpoint.

use std::fmt;
use std::path::Path;

use tokio::io::{AsyncRead, AsyncWrite};

/// A connected byte stream of either platform.
pub trait LocalStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> LocalStream for T {}

/// Boxed connected stream.
pub type BoxedStream = Box<dyn LocalStream>;

/// Address of the supervisor's control-plane endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPlaneAddress(String);

impl ControlPlaneAddress {
    /// Derive the platform endpoint from the service folder and port.
    pub fn for_launcher(service_folder: &Path, port: u16) -> Self {
        #[cfg(windows)]
        {
            let _ = service_folder;
            Self(format!(r"\\.\pipe\cashbox-launcher-{port}"))
        }
        #[cfg(not(windows))]
        {
            Self(
                service_folder
                    .join(format!("cashbox-launcher-{port}.sock"))
                    .to_string_lossy()
                    .into_owned(),
            )
        }
    }

    /// Use an explicit address (socket path or pipe name).
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControlPlaneAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ControlPlaneAddress {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(unix)]
mod platform {
    use std::io;
    use std::path::PathBuf;

    use tokio::net::{UnixListener, UnixStream};

    use super::{BoxedStream, ControlPlaneAddress};

    /// Listening domain socket. The socket file is removed on drop.
    pub struct LocalListener {
        inner: UnixListener,
        path: PathBuf,
    }

    impl LocalListener {
        pub fn bind(address: &ControlPlaneAddress) -> io::Result<Self> {
            let path = PathBuf::from(address.as_str());
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            // A previous supervisor that died without cleanup leaves the file behind.
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
            let inner = UnixListener::bind(&path)?;
            Ok(Self { inner, path })
        }

        pub async fn accept(&mut self) -> io::Result<BoxedStream> {
            let (stream, _) = self.inner.accept().await?;
            Ok(Box::new(stream))
        }
    }

    impl Drop for LocalListener {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    pub async fn connect(address: &ControlPlaneAddress) -> io::Result<BoxedStream> {
        let stream = UnixStream::connect(address.as_str()).await?;
        Ok(Box::new(stream))
    }
}

#[cfg(windows)]
mod platform {
    use std::io;
    use std::time::Duration;

    use tokio::net::windows::named_pipe::{ClientOptions, NamedPipeServer, ServerOptions};

    use super::{BoxedStream, ControlPlaneAddress};

    const ERROR_PIPE_BUSY: i32 = 231;

    /// Listening named pipe. A fresh server instance is created for every
    /// accepted connection.
    pub struct LocalListener {
        name: String,
        next: NamedPipeServer,
    }

    impl LocalListener {
        pub fn bind(address: &ControlPlaneAddress) -> io::Result<Self> {
            let name = address.as_str().to_string();
            let next = ServerOptions::new()
                .first_pipe_instance(true)
                .create(&name)?;
            Ok(Self { name, next })
        }

        pub async fn accept(&mut self) -> io::Result<BoxedStream> {
            self.next.connect().await?;
            let fresh = ServerOptions::new().create(&self.name)?;
            let connected = std::mem::replace(&mut self.next, fresh);
            Ok(Box::new(connected))
        }
    }

    pub async fn connect(address: &ControlPlaneAddress) -> io::Result<BoxedStream> {
        for _ in 0..50 {
            match ClientOptions::new().open(address.as_str()) {
                Ok(client) => return Ok(Box::new(client)),
                Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY) => {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
                Err(e) => return Err(e),
            }
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "named pipe stayed busy"))
    }
}

pub use platform::{connect, LocalListener};

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_unix_address_lives_in_service_folder() {
        let address = ControlPlaneAddress::for_launcher(Path::new("/srv/cashbox"), 5050);
        assert_eq!(address.as_str(), "/srv/cashbox/cashbox-launcher-5050.sock");
    }

    #[cfg(windows)]
    #[test]
    fn test_windows_address_is_a_pipe() {
        let address = ControlPlaneAddress::for_launcher(Path::new("C:\\cashbox"), 5050);
        assert_eq!(address.as_str(), r"\\.\pipe\cashbox-launcher-5050");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bind_replaces_stale_socket_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let address = ControlPlaneAddress::for_launcher(dir.path(), 1);
        std::fs::write(address.as_str(), b"stale").unwrap();

        let listener = LocalListener::bind(&address).unwrap();
        assert!(Path::new(address.as_str()).exists());

        drop(listener);
        assert!(!Path::new(address.as_str()).exists());
    }
}
