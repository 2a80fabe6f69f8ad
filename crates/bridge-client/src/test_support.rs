//! Test doubles for the automation endpoint and its status records.
//!
//! Compiled for this crate's tests and, behind the `test-support` feature, for
//! other workspace crates that drive the client end to end.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use tempfile::TempDir;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const READ_POLL: Duration = Duration::from_millis(50);

/// How a [`FakeEndpoint`] answers each request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Behaviour {
    /// Replies `{"status":"success","result":<request>}` and keeps the
    /// connection open.
    Echo,
    /// Replies like [`Behaviour::Echo`], then closes the connection.
    EchoThenClose,
    /// Sends a partial frame with no delimiter and never finishes it.
    Unterminated,
    /// Replies `{"status":"error","error":<message>}`.
    ApplicationError(String),
    /// Replies with the given line verbatim, delimiter appended.
    Raw(String),
}

#[derive(Default)]
struct Shared {
    connections: AtomicUsize,
    disconnects: AtomicUsize,
    requests: Mutex<Vec<Value>>,
}

/// A threaded TCP server that speaks the newline-delimited JSON protocol.
pub struct FakeEndpoint {
    port: u16,
    shared: Arc<Shared>,
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl FakeEndpoint {
    /// Starts listening on an ephemeral loopback port.
    ///
    /// # Errors
    ///
    /// Returns an error when the listener cannot be bound.
    pub fn spawn(behaviour: Behaviour) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).context("bind fake endpoint")?;
        listener
            .set_nonblocking(true)
            .context("fake endpoint nonblocking")?;
        let port = listener.local_addr().context("local addr")?.port();
        let shared = Arc::new(Shared::default());
        let shutdown = Arc::new(AtomicBool::new(false));

        let handle = {
            let loop_shared = Arc::clone(&shared);
            let loop_shutdown = Arc::clone(&shutdown);
            thread::spawn(move || accept_loop(&listener, &behaviour, &loop_shared, &loop_shutdown))
        };

        Ok(Self {
            port,
            shared,
            shutdown,
            handle: Some(handle),
        })
    }

    /// Port the endpoint listens on.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Number of connections accepted so far.
    #[must_use]
    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// Number of connections that have ended, from either side.
    #[must_use]
    pub fn disconnects(&self) -> usize {
        self.shared.disconnects.load(Ordering::SeqCst)
    }

    /// Waits until at least `count` connections were accepted.
    #[must_use]
    pub fn wait_for_connections(&self, count: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.connections() >= count)
    }

    /// Waits until at least `count` connections have ended.
    #[must_use]
    pub fn wait_for_disconnects(&self, count: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.disconnects() >= count)
    }

    /// Requests received so far, parsed as JSON. Lines that are not JSON are
    /// recorded as strings.
    ///
    /// # Errors
    ///
    /// Returns an error when the request log lock is poisoned.
    pub fn requests(&self) -> Result<Vec<Value>> {
        let requests = self
            .shared
            .requests
            .lock()
            .map_err(|error| anyhow!("lock requests: {error}"))?;
        Ok(requests.clone())
    }
}

impl Drop for FakeEndpoint {
    #[expect(
        clippy::let_underscore_must_use,
        reason = "a panicked accept loop has already failed the test"
    )]
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[expect(
    clippy::let_underscore_must_use,
    reason = "worker errors end the connection, which is what tests observe"
)]
fn accept_loop(
    listener: &TcpListener,
    behaviour: &Behaviour,
    shared: &Arc<Shared>,
    shutdown: &Arc<AtomicBool>,
) {
    let mut workers = Vec::new();
    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => {
                shared.connections.fetch_add(1, Ordering::SeqCst);
                let worker_behaviour = behaviour.clone();
                let worker_shared = Arc::clone(shared);
                let worker_shutdown = Arc::clone(shutdown);
                workers.push(thread::spawn(move || {
                    let _ = serve_connection(
                        stream,
                        &worker_behaviour,
                        &worker_shared,
                        &worker_shutdown,
                    );
                    worker_shared.disconnects.fetch_add(1, Ordering::SeqCst);
                }));
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(POLL_INTERVAL);
            }
            Err(_) => break,
        }
    }
    for worker in workers {
        let _ = worker.join();
    }
}

fn serve_connection(
    stream: TcpStream,
    behaviour: &Behaviour,
    shared: &Shared,
    shutdown: &AtomicBool,
) -> Result<()> {
    stream
        .set_nonblocking(false)
        .context("blocking connection")?;
    stream
        .set_read_timeout(Some(READ_POLL))
        .context("connection read timeout")?;
    let mut writer = stream.try_clone().context("clone stream")?;
    let mut reader = BufReader::new(stream);
    let mut pending: Vec<u8> = Vec::new();

    while !shutdown.load(Ordering::SeqCst) {
        match reader.read_until(b'\n', &mut pending) {
            Ok(0) => return Ok(()),
            Ok(_) if pending.ends_with(b"\n") => {
                let request = parse_request(&pending);
                pending.clear();
                record(shared, request.clone())?;
                if !respond(&mut writer, behaviour, request)? {
                    return Ok(());
                }
            }
            Ok(_) => return Ok(()),
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) => {}
            Err(error) => return Err(error).context("read request"),
        }
    }
    Ok(())
}

fn parse_request(line: &[u8]) -> Value {
    let text = String::from_utf8_lossy(line);
    let trimmed = text.trim_end();
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_owned()))
}

fn record(shared: &Shared, request: Value) -> Result<()> {
    shared
        .requests
        .lock()
        .map_err(|error| anyhow!("lock requests: {error}"))?
        .push(request);
    Ok(())
}

/// Writes the reply for one request; returns whether to keep serving.
#[expect(
    clippy::let_underscore_must_use,
    reason = "the peer may already be gone when the endpoint hangs up"
)]
fn respond(writer: &mut TcpStream, behaviour: &Behaviour, request: Value) -> Result<bool> {
    match behaviour {
        Behaviour::Echo => {
            write_line(writer, &echo(request))?;
            Ok(true)
        }
        Behaviour::EchoThenClose => {
            write_line(writer, &echo(request))?;
            let _ = writer.shutdown(Shutdown::Both);
            Ok(false)
        }
        Behaviour::Unterminated => {
            writer
                .write_all(b"{\"status\":\"success\"")
                .context("write partial frame")?;
            writer.flush().context("flush partial frame")?;
            Ok(true)
        }
        Behaviour::ApplicationError(message) => {
            write_line(writer, &json!({"status": "error", "error": message}).to_string())?;
            Ok(true)
        }
        Behaviour::Raw(line) => {
            write_line(writer, line)?;
            Ok(true)
        }
    }
}

fn echo(request: Value) -> String {
    json!({"status": "success", "result": request}).to_string()
}

fn write_line(writer: &mut impl Write, line: &str) -> Result<()> {
    writer
        .write_all(line.as_bytes())
        .and_then(|()| writer.write_all(b"\n"))
        .and_then(|()| writer.flush())
        .context("write response line")
}

/// A temporary status directory for publishing endpoint records.
pub struct StatusDirectory {
    dir: TempDir,
}

impl StatusDirectory {
    /// Creates an empty status directory.
    ///
    /// # Errors
    ///
    /// Returns an error when the temporary directory cannot be created.
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create status directory")?;
        Ok(Self { dir })
    }

    /// Directory path, suitable for status directory configuration.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes a status record advertising `port`, last modified `age` ago.
    ///
    /// # Errors
    ///
    /// Returns an error when the record cannot be written.
    pub fn publish_port(&self, name: &str, port: u16, age: Duration) -> Result<()> {
        let record = json!({
            "port": port,
            "projectPath": "/projects/demo",
            "unityVersion": "2022.3.10f1",
        });
        self.write_record(name, &record.to_string(), age)
    }

    /// Writes `contents` to `name`, last modified `age` ago.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written or its modification
    /// time cannot be set.
    pub fn write_record(&self, name: &str, contents: &str, age: Duration) -> Result<()> {
        let path = self.record_path(name);
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        let modified = SystemTime::now()
            .checked_sub(age)
            .context("record age precedes the epoch")?;
        File::options()
            .write(true)
            .open(&path)
            .and_then(|file| file.set_modified(modified))
            .with_context(|| format!("set modification time of {}", path.display()))
    }

    /// Removes a previously written record.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be removed.
    pub fn remove_record(&self, name: &str) -> Result<()> {
        let path = self.record_path(name);
        fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}
