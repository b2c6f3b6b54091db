#![allow(missing_docs)]

//! A scripted stream standing in for the network, mainly useful in tests
//!
//! Server replies are preloaded as a script and handed out as the session
//! reads; everything the session writes is recorded. Reading past the end of
//! the script either signals end-of-file or, in starving mode, an
//! inactivity timeout.

use std::{
    io::{self, Cursor, Read, Write},
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::{
    error::Error,
    session::{
        net::{Connector, Timeout},
        tls::TlsParameters,
    },
};

#[derive(Clone, Debug, Default)]
pub struct MockStream {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    reader: Cursor<Vec<u8>>,
    written: Vec<u8>,
    encrypted: bool,
    starve: bool,
}

impl MockStream {
    pub fn new() -> MockStream {
        MockStream::default()
    }

    /// Preloads the server side of the conversation
    pub fn with_script(script: &str) -> MockStream {
        let mock = MockStream::new();
        mock.inner.lock().unwrap().reader = Cursor::new(script.as_bytes().to_vec());
        mock
    }

    /// Reads past the end of the script report a timeout instead of EOF
    pub fn starving(self) -> MockStream {
        self.inner.lock().unwrap().starve = true;
        self
    }

    /// Everything written so far
    pub fn written(&self) -> String {
        String::from_utf8(self.inner.lock().unwrap().written.clone())
            .expect("mock received non-utf8 output")
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock().unwrap();
        if inner.starve && inner.reader.position() == inner.reader.get_ref().len() as u64 {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "mock read timed out",
            ));
        }
        inner.reader.read(buf)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().unwrap().written.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Connector for MockStream {
    fn connect(
        _host: &str,
        _port: u16,
        _timeout: Option<Duration>,
        tls_parameters: Option<&TlsParameters>,
    ) -> Result<MockStream, Error> {
        let mock = MockStream::new();
        mock.inner.lock().unwrap().encrypted = tls_parameters.is_some();
        Ok(mock)
    }

    fn upgrade_tls(&mut self, _tls_parameters: &TlsParameters) -> Result<(), Error> {
        self.inner.lock().unwrap().encrypted = true;
        Ok(())
    }

    fn is_encrypted(&self) -> bool {
        self.inner.lock().unwrap().encrypted
    }

    fn shutdown(&mut self, _force: bool) -> io::Result<()> {
        Ok(())
    }
}

impl Timeout for MockStream {
    fn set_read_timeout(&mut self, _duration: Option<Duration>) -> io::Result<()> {
        Ok(())
    }

    fn set_write_timeout(&mut self, _duration: Option<Duration>) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::MockStream;
    use std::io::{BufRead, BufReader, Read, Write};

    #[test]
    fn test_script_and_written() {
        let mut mock = MockStream::with_script("220 ready\r\n");
        let handle = mock.clone();

        mock.write_all(b"EHLO example.com\r\n").unwrap();
        assert_eq!(handle.written(), "EHLO example.com\r\n");

        let mut line = String::new();
        BufReader::new(mock).read_line(&mut line).unwrap();
        assert_eq!(line, "220 ready\r\n");
    }

    #[test]
    fn test_exhausted_script_is_eof() {
        let mut mock = MockStream::with_script("");
        let mut buf = Vec::new();
        assert_eq!(mock.read_to_end(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_starving_reports_timeout() {
        let mut mock = MockStream::with_script("").starving();
        let mut buf = [0u8; 16];
        let err = mock.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::TimedOut);
    }
}
