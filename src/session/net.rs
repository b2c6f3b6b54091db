//! A trait to represent a stream

use std::{
    fmt::{self, Debug, Formatter},
    io::{self, Read, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use native_tls::TlsStream;

use crate::{
    error::{self, Error},
    session::tls::TlsParameters,
};

/// A trait for the concept of opening, upgrading and closing a stream
pub trait Connector: Sized {
    /// Opens a connection to the given host and port
    ///
    /// When `tls_parameters` is given the TLS handshake is performed from
    /// the first byte (implicit TLS).
    fn connect(
        host: &str,
        port: u16,
        timeout: Option<Duration>,
        tls_parameters: Option<&TlsParameters>,
    ) -> Result<Self, Error>;

    /// Upgrades the existing plaintext stream to TLS in place
    fn upgrade_tls(&mut self, tls_parameters: &TlsParameters) -> Result<(), Error>;

    /// Is the stream encrypted
    fn is_encrypted(&self) -> bool;

    /// Closes the stream; a forced shutdown skips the orderly TLS goodbye
    fn shutdown(&mut self, force: bool) -> io::Result<()>;
}

/// A trait for read and write timeout support
pub trait Timeout: Sized {
    /// Set read timeout for IO calls
    fn set_read_timeout(&mut self, duration: Option<Duration>) -> io::Result<()>;
    /// Set write timeout for IO calls
    fn set_write_timeout(&mut self, duration: Option<Duration>) -> io::Result<()>;
}

/// Represents the different types of underlying network streams
pub enum NetworkStream {
    /// Plain TCP
    Tcp(TcpStream),
    /// TLS over TCP
    Tls(TlsStream<TcpStream>),
}

impl Debug for NetworkStream {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            NetworkStream::Tcp(_) => "NetworkStream::Tcp(_)",
            NetworkStream::Tls(_) => "NetworkStream::Tls(_)",
        })
    }
}

fn open_tcp(host: &str, port: u16, timeout: Option<Duration>) -> Result<TcpStream, Error> {
    let addrs = (host, port).to_socket_addrs().map_err(error::connection)?;

    let mut last_err = None;
    for addr in addrs {
        match connect_addr(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }

    Err(match last_err {
        Some(err) => error::connection(err),
        None => error::connection("could not resolve hostname"),
    })
}

fn connect_addr(addr: &SocketAddr, timeout: Option<Duration>) -> io::Result<TcpStream> {
    match timeout {
        Some(duration) => TcpStream::connect_timeout(addr, duration),
        None => TcpStream::connect(addr),
    }
}

impl Connector for NetworkStream {
    fn connect(
        host: &str,
        port: u16,
        timeout: Option<Duration>,
        tls_parameters: Option<&TlsParameters>,
    ) -> Result<NetworkStream, Error> {
        let tcp_stream = open_tcp(host, port, timeout)?;

        match tls_parameters {
            Some(parameters) => match parameters
                .connector()
                .connect(parameters.domain(), tcp_stream)
            {
                Ok(tls_stream) => Ok(NetworkStream::Tls(tls_stream)),
                Err(err) => Err(error::tls(err)),
            },
            None => Ok(NetworkStream::Tcp(tcp_stream)),
        }
    }

    fn upgrade_tls(&mut self, tls_parameters: &TlsParameters) -> Result<(), Error> {
        *self = match *self {
            NetworkStream::Tcp(ref mut stream) => {
                // a second handle onto the same socket; the plain one is
                // dropped with the replacement
                let tcp_stream = stream.try_clone().map_err(error::network)?;
                match tls_parameters
                    .connector()
                    .connect(tls_parameters.domain(), tcp_stream)
                {
                    Ok(tls_stream) => NetworkStream::Tls(tls_stream),
                    Err(err) => return Err(error::tls(err)),
                }
            }
            NetworkStream::Tls(_) => return Ok(()),
        };

        Ok(())
    }

    fn is_encrypted(&self) -> bool {
        match *self {
            NetworkStream::Tcp(_) => false,
            NetworkStream::Tls(_) => true,
        }
    }

    fn shutdown(&mut self, force: bool) -> io::Result<()> {
        match *self {
            NetworkStream::Tcp(ref mut stream) => stream.shutdown(Shutdown::Both),
            NetworkStream::Tls(ref mut stream) => {
                if !force {
                    let _ = stream.shutdown();
                }
                stream.get_ref().shutdown(Shutdown::Both)
            }
        }
    }
}

impl Read for NetworkStream {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match *self {
            NetworkStream::Tcp(ref mut stream) => stream.read(buf),
            NetworkStream::Tls(ref mut stream) => stream.read(buf),
        }
    }
}

impl Write for NetworkStream {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match *self {
            NetworkStream::Tcp(ref mut stream) => stream.write(buf),
            NetworkStream::Tls(ref mut stream) => stream.write(buf),
        }
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        match *self {
            NetworkStream::Tcp(ref mut stream) => stream.flush(),
            NetworkStream::Tls(ref mut stream) => stream.flush(),
        }
    }
}

impl Timeout for NetworkStream {
    fn set_read_timeout(&mut self, duration: Option<Duration>) -> io::Result<()> {
        match *self {
            NetworkStream::Tcp(ref mut stream) => stream.set_read_timeout(duration),
            NetworkStream::Tls(ref mut stream) => stream.get_ref().set_read_timeout(duration),
        }
    }

    fn set_write_timeout(&mut self, duration: Option<Duration>) -> io::Result<()> {
        match *self {
            NetworkStream::Tcp(ref mut stream) => stream.set_write_timeout(duration),
            NetworkStream::Tls(ref mut stream) => stream.get_ref().set_write_timeout(duration),
        }
    }
}
