//! Administrative control channel
//!
//! Commands reach the sync driver's event loop as [`ControlRequest`]s on an
//! mpsc channel and are answered on a oneshot. [`ControlSocket`] exposes the
//! same channel on a Unix domain socket.
//!
//! | Request line                 | Reply                                  |
//! |------------------------------|----------------------------------------|
//! | `exit`                       | empty; the driver stops after replying |
//! | `status`                     | driver state as JSON                   |
//! | `diag-dump basic <feature>`  | diagnostic text                        |

pub mod socket;

pub use socket::{ControlSocket, send_command};

use crate::error::{Error, Result};
use tokio::sync::{mpsc, oneshot};

/// A parsed administrative command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Stop the daemon after the current iteration
    Exit,
    /// Report the driver state
    Status,
    /// Basic diagnostic dump for a feature
    DiagDump {
        /// Feature name
        feature: String,
    },
}

impl ControlCommand {
    /// Parse a request line
    pub fn parse(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Err(Error::control("empty command"));
        };
        let args: Vec<&str> = words.collect();

        match (command, args.as_slice()) {
            ("exit", []) => Ok(ControlCommand::Exit),
            ("status", []) => Ok(ControlCommand::Status),
            ("diag-dump", ["basic", feature]) => Ok(ControlCommand::DiagDump {
                feature: (*feature).to_string(),
            }),
            ("diag-dump", [level, _]) => Err(Error::control(format!(
                "unsupported diag-dump level \"{level}\""
            ))),
            ("exit" | "status" | "diag-dump", _) => Err(Error::control(format!(
                "wrong number of arguments for \"{command}\""
            ))),
            _ => Err(Error::control(format!("unknown command \"{command}\""))),
        }
    }
}

/// A command together with the channel its reply goes to
#[derive(Debug)]
pub struct ControlRequest {
    /// The command
    pub command: ControlCommand,
    /// Reply text
    pub reply: oneshot::Sender<String>,
}

/// Sending side of the control channel
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<ControlRequest>,
}

impl ControlHandle {
    /// Send a command to the driver and wait for its reply
    pub async fn send(&self, command: ControlCommand) -> Result<String> {
        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(ControlRequest { command, reply })
            .await
            .map_err(|_| Error::control("sync driver is not running"))?;
        reply_rx
            .await
            .map_err(|_| Error::control("sync driver stopped before replying"))
    }
}

/// Create a control channel
///
/// The receiver goes to [`SyncDriver::with_control`](crate::SyncDriver::with_control).
pub fn channel(capacity: usize) -> (ControlHandle, mpsc::Receiver<ControlRequest>) {
    let (tx, rx) = mpsc::channel(capacity);
    (ControlHandle { tx }, rx)
}

/// Response to a basic diagnostic dump request
pub fn diag_basic_handler(feature: &str) -> String {
    format!(
        "Diagnostic dump response for feature {feature}.\n\
         diag-dump feature for DNS Client is not implemented"
    )
}
