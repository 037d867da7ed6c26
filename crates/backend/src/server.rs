//! Line-delimited JSON bridge between a coordinator and one worker.
//!
//! The coordinator writes one [`Command`] per line to the worker's input and
//! reads one [`Report`] per line from its output. Any `AsyncRead`/`AsyncWrite`
//! pair works; the CLI uses stdin/stdout.
//!
//! # Shutdown
//!
//! End of input is treated as `shutdown`: the worker cancels and reports any
//! running search, then exits. The bridge returns once the report channel is
//! closed and every report has been written.

use futures::{SinkExt, StreamExt};
use tokio::{
  io::{AsyncRead, AsyncWrite},
  sync::mpsc,
};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, info, trace, warn};

use crate::{
  actor::WorkerHandle,
  ipc::{Command, Report},
};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
  #[error("Codec error: {0}")]
  Codec(#[from] LinesCodecError),
  #[error("Ser/de error: {0}")]
  Serde(#[from] serde_json::Error),
}

/// Counters for one bridge session
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServeStats {
  pub commands: u64,
  pub malformed: u64,
  pub reports: u64,
}

/// Serve `worker` over a line-delimited JSON stream.
///
/// `reports` must be the receiving end of the channel the worker was
/// spawned with.
pub async fn serve<R, W>(
  reader: R,
  writer: W,
  worker: WorkerHandle,
  mut reports: mpsc::Receiver<Report>,
) -> Result<ServeStats, ServerError>
where
  R: AsyncRead + Unpin,
  W: AsyncWrite + Unpin,
{
  let mut lines = FramedRead::new(reader, LinesCodec::new());
  let mut sink = FramedWrite::new(writer, LinesCodec::new());
  let mut stats = ServeStats::default();
  let mut input_open = true;
  // At most one parsed command waits for room in the worker's inbox. Reports
  // keep draining meanwhile, so a worker blocked on a full report channel
  // can always make progress.
  let mut pending: Option<Command> = None;

  info!(worker = %worker.id(), "Serving worker over line-delimited JSON");

  loop {
    tokio::select! {
      permit = worker.reserve(), if pending.is_some() => {
        match (permit, pending.take()) {
          (Ok(permit), Some(command)) => {
            trace!(command = command_name(&command), "Forwarding command");
            permit.send(command);
          }
          (Err(_), _) => {
            warn!(worker = %worker.id(), "Worker is gone, closing input");
            input_open = false;
          }
          (Ok(_), None) => {}
        }
      }

      line = lines.next(), if input_open && pending.is_none() => {
        match line {
          Some(Ok(line)) => {
            let trimmed = line.trim();
            if trimmed.is_empty() {
              continue;
            }

            match serde_json::from_str::<Command>(trimmed) {
              Ok(command) => {
                stats.commands += 1;
                pending = Some(command);
              }
              Err(e) => {
                warn!(error = %e, "Ignoring malformed command");
                stats.malformed += 1;
              }
            }
          }
          Some(Err(e)) => {
            warn!(error = %e, "Error reading commands, treating as end of input");
            input_open = false;
            pending = Some(Command::Shutdown);
          }
          None => {
            debug!("Input closed, shutting worker down");
            input_open = false;
            pending = Some(Command::Shutdown);
          }
        }
      }

      report = reports.recv() => {
        match report {
          Some(report) => {
            let json = serde_json::to_string(&report)?;
            sink.send(json).await?;
            stats.reports += 1;
          }
          None => {
            debug!("Report channel closed");
            break;
          }
        }
      }
    }
  }

  info!(
    commands = stats.commands,
    malformed = stats.malformed,
    reports = stats.reports,
    "Bridge finished"
  );
  Ok(stats)
}

fn command_name(command: &Command) -> &'static str {
  match command {
    Command::Do { .. } => "do",
    Command::Stop => "stop",
    Command::Shutdown => "shutdown",
  }
}
