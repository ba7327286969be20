use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::time::Duration;
use std::{env, fs};

use bytes::Bytes;
use log::{debug, info, warn};

use crate::{decompose, Error, Sink};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_STORAGE_DIR: &str = "./request";
const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_BUF_SIZE: usize = 1024;

/// Sent when no `RESPONSE_FILE` is configured.
const DEFAULT_RESPONSE: &[u8] =
    b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

/// Server settings, loaded once at startup and read-only thereafter.
pub struct Config {
    pub bind_addr: String,
    pub storage_dir: PathBuf,
    /// Canned bytes sent back on every connection.
    pub response: Bytes,
    /// A read stalling longer than this ends the request; it does not fail it.
    pub client_timeout: Duration,
}

impl Config {
    /// Reads `BIND_ADDR`, `STORAGE_DIR`, `RESPONSE_FILE` and
    /// `CLIENT_TIMEOUT_SECS` from the environment, with defaults for all of
    /// them. A configured response file must be readable.
    pub fn from_env() -> Result<Self, Error> {
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        let storage_dir = env::var("STORAGE_DIR")
            .unwrap_or_else(|_| DEFAULT_STORAGE_DIR.to_string())
            .into();

        let response = match env::var("RESPONSE_FILE") {
            Ok(path) => fs::read(&path)
                .map(Bytes::from)
                .map_err(|e| Error::config(format!("cannot read response file {}: {}", path, e)))?,
            Err(_) => Bytes::from_static(DEFAULT_RESPONSE),
        };

        let client_timeout = match env::var("CLIENT_TIMEOUT_SECS") {
            Ok(secs) => secs
                .parse()
                .map(Duration::from_secs)
                .map_err(|e| Error::config(format!("invalid CLIENT_TIMEOUT_SECS: {}", e)))?,
            Err(_) => DEFAULT_CLIENT_TIMEOUT,
        };

        Ok(Config {
            bind_addr,
            storage_dir,
            response,
            client_timeout,
        })
    }
}

/// Accepts raw byte streams, captures each request through the sink, and
/// feeds it to the decomposer. One connection at a time; the decomposer is
/// stateless, so nothing here would prevent handling connections in parallel.
pub struct Server<S> {
    config: Config,
    sink: S,
}

impl<S: Sink> Server<S> {
    pub fn new(config: Config, sink: S) -> Self {
        Server { config, sink }
    }

    pub fn run(&self) -> Result<(), Error> {
        let listener = TcpListener::bind(&self.config.bind_addr)?;
        info!("Listening on {}", self.config.bind_addr);

        for stream in listener.incoming() {
            let mut stream = stream?;
            if let Err(e) = self.handle(&mut stream) {
                warn!("Connection failed: {}", e);
            }
        }

        Ok(())
    }

    fn handle(&self, stream: &mut TcpStream) -> Result<(), Error> {
        debug!("Request from {:?}", stream.peer_addr());

        let data = read_request(stream, self.config.client_timeout)?;

        if !data.is_empty() {
            let timestamp = timestamp();
            if let Err(e) = self.process_request(&data, &timestamp) {
                warn!("Error processing request: {}", e);
            }
        }

        // The canned response goes out even when extraction failed.
        stream.write_all(&self.config.response)?;
        Ok(())
    }

    /// Persists the raw request as `{timestamp}.bin`, then every image part
    /// the decomposer emits, in boundary order.
    fn process_request(&self, data: &[u8], timestamp: &str) -> Result<(), Error> {
        let path = self.sink.persist(&format!("{}.bin", timestamp), data)?;
        info!("Request saved to: {}", path.display());

        for action in decompose(data, timestamp)? {
            let path = self.sink.persist(&action.filename, &action.bytes)?;
            info!("Image saved to: {}", path.display());
        }

        Ok(())
    }
}

/// Reads until the peer closes the connection or the read timeout fires.
/// Whatever arrived before a timeout is the request.
fn read_request(stream: &mut TcpStream, timeout: Duration) -> Result<Vec<u8>, Error> {
    stream.set_read_timeout(Some(timeout))?;

    let mut buf = [0u8; READ_BUF_SIZE];
    let mut data = Vec::new();

    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => data.extend_from_slice(&buf[..n]),
            Err(ref e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::TimedOut =>
            {
                debug!("Request read timed out after {} bytes", data.len());
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(data)
}

/// Local time as `YYYY-MM-DD-HH-MM-SS`; doubles as the raw-capture filename stem.
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d-%H-%M-%S").to_string()
}
