use std::env;
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{self, Child, Command as ProcessCommand, Stdio};
use std::thread;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::error::PlaybackError;

use super::player::{MediaBackend, MediaOpener};

const SOCKET_POLLS: usize = 50;
const LOAD_POLLS: usize = 50;
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const IPC_TIMEOUT: Duration = Duration::from_secs(5);
const QUIT_POLLS: usize = 20;

/// Starts one headless mpv process per episode.
pub(crate) struct MpvOpener {
    binary: PathBuf,
}

impl MpvOpener {
    pub(crate) fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl MediaOpener for MpvOpener {
    fn open(&mut self, stream_url: &str) -> Result<Box<dyn MediaBackend>, PlaybackError> {
        Ok(Box::new(MpvBackend::spawn(&self.binary, stream_url)?))
    }
}

/// JSON IPC channel to a running mpv: one request per line, replies matched
/// by `request_id`, unsolicited events skipped.
struct IpcConnection {
    reader: BufReader<UnixStream>,
    writer: UnixStream,
    next_request: u64,
}

impl IpcConnection {
    fn new(stream: UnixStream) -> io::Result<Self> {
        stream.set_read_timeout(Some(IPC_TIMEOUT))?;
        let writer = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
            next_request: 1,
        })
    }

    fn send_line(&mut self, command: &Value, request_id: u64) -> io::Result<()> {
        let mut line = serde_json::to_string(&json!({
            "command": command,
            "request_id": request_id,
        }))?;
        line.push('\n');
        self.writer.write_all(line.as_bytes())
    }

    fn command(&mut self, command: Value) -> Result<Value, PlaybackError> {
        let request_id = self.next_request;
        self.next_request += 1;
        self.send_line(&command, request_id)?;

        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "mpv closed the IPC socket",
                )
                .into());
            }
            let reply: Value = match serde_json::from_str(line.trim()) {
                Ok(reply) => reply,
                Err(err) => {
                    debug!("skipping unparsable mpv line: {err}");
                    continue;
                }
            };
            if reply.get("request_id").and_then(Value::as_u64) != Some(request_id) {
                continue;
            }

            let status = reply.get("error").and_then(Value::as_str).unwrap_or("success");
            if status == "success" {
                return Ok(reply.get("data").cloned().unwrap_or(Value::Null));
            }
            return Err(PlaybackError::Rejected {
                command: command_name(&command),
                reason: status.to_string(),
            });
        }
    }

    /// Reads a seconds-valued property as milliseconds. Properties that
    /// are not available yet read as 0.
    fn get_ms(&mut self, property: &str) -> Result<u64, PlaybackError> {
        match self.command(json!(["get_property", property])) {
            Ok(value) => Ok(value
                .as_f64()
                .map(|secs| (secs * 1000.0).max(0.0) as u64)
                .unwrap_or(0)),
            Err(PlaybackError::Rejected { reason, .. }) if reason == "property unavailable" => {
                Ok(0)
            }
            Err(err) => Err(err),
        }
    }

    fn set_pause(&mut self, paused: bool) -> Result<(), PlaybackError> {
        self.command(json!(["set_property", "pause", paused]))
            .map(|_| ())
    }
}

fn command_name(command: &Value) -> String {
    command
        .get(0)
        .and_then(Value::as_str)
        .unwrap_or("command")
        .to_string()
}

struct MpvBackend {
    child: Child,
    ipc: IpcConnection,
    socket_path: PathBuf,
    finished: bool,
}

impl MpvBackend {
    fn spawn(binary: &Path, stream_url: &str) -> Result<Self, PlaybackError> {
        let socket_path = env::temp_dir().join(format!("termcast-mpv-{}.sock", process::id()));
        let _ = fs::remove_file(&socket_path);

        let mut child = ProcessCommand::new(binary)
            .arg("--no-video")
            .arg("--idle=yes")
            .arg("--pause")
            .arg("--really-quiet")
            .arg(format!("--input-ipc-server={}", socket_path.display()))
            .arg(stream_url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| PlaybackError::Launch {
                binary: binary.to_path_buf(),
                source,
            })?;
        info!(pid = child.id(), url = stream_url, "spawned mpv");

        let connected = wait_for_socket(&mut child, &socket_path)
            .and_then(|stream| IpcConnection::new(stream).map_err(PlaybackError::from));
        let ipc = match connected {
            Ok(ipc) => ipc,
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = fs::remove_file(&socket_path);
                return Err(err);
            }
        };

        let mut backend = Self {
            child,
            ipc,
            socket_path,
            finished: false,
        };
        backend.wait_until_loaded()?;
        Ok(backend)
    }

    /// Seeking before the file is loaded is rejected, so wait for a duration.
    fn wait_until_loaded(&mut self) -> Result<(), PlaybackError> {
        for _ in 0..LOAD_POLLS {
            if self.ipc.get_ms("duration")? > 0 {
                return Ok(());
            }
            thread::sleep(POLL_INTERVAL);
        }
        warn!("mpv reported no duration; continuing without one");
        Ok(())
    }
}

fn wait_for_socket(child: &mut Child, socket_path: &Path) -> Result<UnixStream, PlaybackError> {
    for _ in 0..SOCKET_POLLS {
        if let Some(status) = child.try_wait()? {
            return Err(PlaybackError::Rejected {
                command: "start".to_string(),
                reason: format!("mpv exited early ({status})"),
            });
        }
        if socket_path.exists()
            && let Ok(stream) = UnixStream::connect(socket_path)
        {
            return Ok(stream);
        }
        thread::sleep(POLL_INTERVAL);
    }
    Err(io::Error::new(io::ErrorKind::TimedOut, "mpv IPC socket did not appear").into())
}

impl MediaBackend for MpvBackend {
    fn play(&mut self) -> Result<(), PlaybackError> {
        self.ipc.set_pause(false)
    }

    fn pause(&mut self) -> Result<(), PlaybackError> {
        self.ipc.set_pause(true)
    }

    fn stop(&mut self) -> Result<(), PlaybackError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        // mpv exits before it can answer a quit, so no reply is awaited.
        let request_id = self.ipc.next_request;
        if let Err(err) = self.ipc.send_line(&json!(["quit"]), request_id) {
            debug!("mpv quit not delivered: {err}");
        }
        for _ in 0..QUIT_POLLS {
            if self.child.try_wait()?.is_some() {
                let _ = fs::remove_file(&self.socket_path);
                return Ok(());
            }
            thread::sleep(POLL_INTERVAL / 2);
        }
        warn!(pid = self.child.id(), "mpv ignored quit; killing it");
        self.child.kill()?;
        self.child.wait()?;
        let _ = fs::remove_file(&self.socket_path);
        Ok(())
    }

    fn time_ms(&mut self) -> Result<u64, PlaybackError> {
        self.ipc.get_ms("time-pos")
    }

    fn set_time_ms(&mut self, ms: u64) -> Result<(), PlaybackError> {
        self.ipc
            .command(json!(["set_property", "time-pos", ms as f64 / 1000.0]))
            .map(|_| ())
    }

    fn length_ms(&mut self) -> Result<u64, PlaybackError> {
        self.ipc.get_ms("duration")
    }
}

impl Drop for MpvBackend {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
        let _ = fs::remove_file(&self.socket_path);
    }
}
