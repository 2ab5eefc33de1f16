//! [`Transport`] backed by an `mpv` child process driven over its JSON IPC socket.

use anyhow::{Context, anyhow};
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::{
  io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
  net::UnixStream,
  process::{Child, Command},
  sync::mpsc,
  task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::constants::constants;
use crate::error::{Error, Result};
use crate::transport::{Transport, TransportEvent};

const OBS_TIME_POS: i64 = 1;
const OBS_VOLUME: i64 = 2;
const OBS_PAUSE: i64 = 3;

/// One line from mpv's IPC socket. Command replies have no `event` and are ignored.
#[derive(Debug, Deserialize)]
struct MpvMessage {
  event: Option<String>,
  name: Option<String>,
  data: Option<Value>,
  reason: Option<String>,
  error: Option<String>,
}

/// Translate one IPC line into a transport event.
pub(crate) fn parse_event(line: &str) -> Option<TransportEvent> {
  let msg: MpvMessage = serde_json::from_str(line).ok()?;
  match msg.event.as_deref() {
    Some("file-loaded") => Some(TransportEvent::Ready),
    // Only a natural end advances the queue; "stop" also fires when a new file replaces the old.
    Some("end-file") if msg.reason.as_deref() == Some("eof") => Some(TransportEvent::Ended),
    Some("property-change") => {
      let data = msg.data?;
      match msg.name.as_deref()? {
        "time-pos" => data.as_f64().filter(|t| t.is_finite()).map(TransportEvent::TimeUpdate),
        "volume" => data.as_f64().map(|v| TransportEvent::VolumeChanged((v / 100.0).clamp(0.0, 1.0))),
        "pause" => data.as_bool().map(TransportEvent::Paused),
        _ => None,
      }
    }
    Some(_) => None,
    None => {
      if let Some(err) = msg.error.filter(|e| e != "success") {
        debug!(err = %err, "mpv: command failed");
      }
      None
    }
  }
}

pub struct MpvTransport {
  child: Child,
  commands: mpsc::UnboundedSender<Value>,
  events: mpsc::UnboundedReceiver<TransportEvent>,
  reader: JoinHandle<()>,
  writer: JoinHandle<()>,
  socket_path: PathBuf,
  time: f64,
  volume: f64,
  paused: bool,
  /// Time updates are dropped between a load or stop and the next `file-loaded`, so a
  /// late position from the previous file is never attributed to the new one.
  accepting_time: bool,
}

impl MpvTransport {
  /// Start an idle `mpv` and connect to its IPC socket.
  pub async fn spawn(video: bool) -> anyhow::Result<Self> {
    let socket_path = std::env::temp_dir().join(format!("mstream-mpv-{}.sock", std::process::id()));
    let socket_str = socket_path.to_str().context("Temp dir path is not valid UTF-8")?.to_string();
    // Remove stale socket if it exists from a previous crash.
    let _ = std::fs::remove_file(&socket_path);

    let mut cmd = Command::new("mpv");
    cmd.args(["--idle=yes", "--no-terminal", "--keep-open=no", &format!("--input-ipc-server={}", socket_str)]);
    if !video {
      cmd.arg("--no-video");
    }
    cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null()).kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        anyhow!("mpv not found. Install it with: brew install mpv (macOS) or apt install mpv (Linux)")
      } else {
        anyhow!(e).context("Failed to spawn mpv process")
      }
    })?;

    let stream = connect(&mut child, &socket_path).await?;
    let (read_half, mut write_half) = stream.into_split();

    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Value>();
    let writer = tokio::spawn(async move {
      while let Some(command) = cmd_rx.recv().await {
        let mut line = json!({ "command": command }).to_string();
        line.push('\n');
        if let Err(e) = write_half.write_all(line.as_bytes()).await {
          warn!(err = %e, "mpv: IPC write failed");
          break;
        }
      }
    });

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let reader = tokio::spawn(async move {
      let mut lines = BufReader::new(read_half).lines();
      while let Ok(Some(line)) = lines.next_line().await {
        if let Some(event) = parse_event(&line)
          && event_tx.send(event).is_err()
        {
          break;
        }
      }
      debug!("mpv: IPC reader finished");
    });

    let transport = Self {
      child,
      commands: cmd_tx,
      events: event_rx,
      reader,
      writer,
      socket_path,
      time: 0.0,
      volume: 1.0,
      paused: true,
      accepting_time: false,
    };
    transport.send(json!(["observe_property", OBS_TIME_POS, "time-pos"]))?;
    transport.send(json!(["observe_property", OBS_VOLUME, "volume"]))?;
    transport.send(json!(["observe_property", OBS_PAUSE, "pause"]))?;
    info!(socket = %socket_str, video, "mpv: started");
    Ok(transport)
  }

  fn send(&self, command: Value) -> Result<()> {
    self.commands.send(command).map_err(|_| Error::Transport("mpv IPC connection closed".to_string()))
  }

  /// Drain events reported since the last call, updating the cached player state.
  pub fn poll_events(&mut self) -> Vec<TransportEvent> {
    let mut out = Vec::new();
    while let Ok(event) = self.events.try_recv() {
      match event {
        TransportEvent::Ready => self.accepting_time = true,
        TransportEvent::TimeUpdate(t) => {
          if !self.accepting_time {
            continue;
          }
          self.time = t;
        }
        TransportEvent::VolumeChanged(v) => self.volume = v,
        TransportEvent::Paused(p) => self.paused = p,
        TransportEvent::Ended => self.accepting_time = false,
      }
      out.push(event);
    }
    out
  }

  /// Quit mpv and clean up the socket.
  pub async fn shutdown(&mut self) -> anyhow::Result<()> {
    let _ = self.send(json!(["quit"]));
    if tokio::time::timeout(Duration::from_secs(1), self.child.wait()).await.is_err() {
      self.child.kill().await.context("Failed to kill mpv process")?;
    }
    self.reader.abort();
    self.writer.abort();
    let _ = std::fs::remove_file(&self.socket_path);
    info!("mpv: stopped");
    Ok(())
  }
}

async fn connect(child: &mut Child, socket_path: &Path) -> anyhow::Result<UnixStream> {
  let c = constants();
  for attempt in 1..=c.mpv_connect_attempts {
    match UnixStream::connect(socket_path).await {
      Ok(stream) => return Ok(stream),
      Err(e) => {
        if let Some(status) = child.try_wait().context("Failed to poll mpv process")? {
          return Err(anyhow!("mpv exited during startup ({})", status));
        }
        debug!(attempt, err = %e, "mpv: IPC socket not ready");
        tokio::time::sleep(Duration::from_millis(c.mpv_connect_delay_ms)).await;
      }
    }
  }
  Err(anyhow!("Timed out connecting to mpv IPC socket at {}", socket_path.display()))
}

impl Transport for MpvTransport {
  fn load(&mut self, source: &str) -> Result<()> {
    self.accepting_time = false;
    self.time = 0.0;
    self.send(json!(["loadfile", source, "replace"]))
  }

  fn play(&mut self) -> Result<()> {
    self.paused = false;
    self.send(json!(["set_property", "pause", false]))
  }

  fn pause(&mut self) -> Result<()> {
    self.paused = true;
    self.send(json!(["set_property", "pause", true]))
  }

  fn stop(&mut self) -> Result<()> {
    self.accepting_time = false;
    self.time = 0.0;
    self.send(json!(["stop"]))
  }

  fn seek(&mut self, time: f64) -> Result<()> {
    self.time = time;
    self.send(json!(["seek", time, "absolute"]))
  }

  fn set_volume(&mut self, volume: f64) -> Result<()> {
    self.volume = volume.clamp(0.0, 1.0);
    self.send(json!(["set_property", "volume", self.volume * 100.0]))
  }

  fn current_time(&self) -> f64 {
    self.time
  }

  fn volume(&self) -> f64 {
    self.volume
  }

  fn is_paused(&self) -> bool {
    self.paused
  }

  fn set_cookie(&mut self, cookie: Option<&str>) -> Result<()> {
    let fields: Vec<String> = cookie.map(|c| format!("Cookie: {}", c)).into_iter().collect();
    self.send(json!(["set_property", "http-header-fields", fields]))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn file_loaded_is_ready() {
    assert_eq!(parse_event(r#"{"event":"file-loaded"}"#), Some(TransportEvent::Ready));
  }

  #[test]
  fn only_natural_end_of_file_ends() {
    assert_eq!(parse_event(r#"{"event":"end-file","reason":"eof","playlist_entry_id":1}"#), Some(TransportEvent::Ended));
    assert_eq!(parse_event(r#"{"event":"end-file","reason":"stop"}"#), None);
    assert_eq!(parse_event(r#"{"event":"end-file","reason":"error","file_error":"loading failed"}"#), None);
  }

  #[test]
  fn property_changes_map_to_events() {
    assert_eq!(
      parse_event(r#"{"event":"property-change","id":1,"name":"time-pos","data":12.5}"#),
      Some(TransportEvent::TimeUpdate(12.5))
    );
    assert_eq!(
      parse_event(r#"{"event":"property-change","id":2,"name":"volume","data":50.0}"#),
      Some(TransportEvent::VolumeChanged(0.5))
    );
    assert_eq!(
      parse_event(r#"{"event":"property-change","id":2,"name":"volume","data":130.0}"#),
      Some(TransportEvent::VolumeChanged(1.0))
    );
    assert_eq!(
      parse_event(r#"{"event":"property-change","id":3,"name":"pause","data":true}"#),
      Some(TransportEvent::Paused(true))
    );
  }

  #[test]
  fn idle_time_pos_and_replies_are_ignored() {
    // mpv reports time-pos without data while nothing is loaded.
    assert_eq!(parse_event(r#"{"event":"property-change","id":1,"name":"time-pos"}"#), None);
    assert_eq!(parse_event(r#"{"event":"property-change","id":1,"name":"time-pos","data":null}"#), None);
    assert_eq!(parse_event(r#"{"data":null,"request_id":0,"error":"success"}"#), None);
    assert_eq!(parse_event(r#"{"error":"property unavailable"}"#), None);
    assert_eq!(parse_event(r#"{"event":"playback-restart"}"#), None);
    assert_eq!(parse_event("not json"), None);
  }
}
