// # Control Socket
//
// Unix domain socket front end for the control channel.
//
// ## Protocol
//
// One request per connection: the client writes a single command line, the
// server writes the reply text followed by a newline and closes the
// connection. Failures are reported as a reply starting with `error: `.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

use super::{ControlCommand, ControlHandle};
use crate::error::{Error, Result};

/// Longest request line accepted
const MAX_REQUEST_LEN: u64 = 4096;

/// Listening control socket
///
/// The socket file is removed when the value is dropped.
#[derive(Debug)]
pub struct ControlSocket {
    listener: UnixListener,
    path: PathBuf,
    handle: ControlHandle,
}

impl ControlSocket {
    /// Bind the socket at `path`, replacing a stale socket file
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind<P: AsRef<Path>>(path: P, handle: ControlHandle) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| {
                Error::control(format!(
                    "Cannot remove stale socket {}: {}",
                    path.display(),
                    e
                ))
            })?;
        }

        let listener = UnixListener::bind(&path).map_err(|e| {
            Error::control(format!("Cannot bind socket {}: {}", path.display(), e))
        })?;

        tracing::info!("Control socket listening on {}", path.display());
        Ok(Self {
            listener,
            path,
            handle,
        })
    }

    /// Socket path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept connections until the task is dropped
    pub async fn serve(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, _)) => {
                    let handle = self.handle.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &handle).await {
                            tracing::debug!("Control connection failed: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!("Control socket accept failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }
}

impl Drop for ControlSocket {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

async fn handle_connection(stream: UnixStream, handle: &ControlHandle) -> Result<()> {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read.take(MAX_REQUEST_LEN));
    let mut line = String::new();
    reader.read_line(&mut line).await?;

    let reply = match ControlCommand::parse(&line) {
        Ok(command) => {
            tracing::debug!("Control request: {:?}", command);
            handle
                .send(command)
                .await
                .unwrap_or_else(|e| format!("error: {e}"))
        }
        Err(e) => format!("error: {e}"),
    };

    write.write_all(reply.as_bytes()).await?;
    if !reply.ends_with('\n') {
        write.write_all(b"\n").await?;
    }
    write.shutdown().await?;
    Ok(())
}

/// Send one command line to the control socket at `path` and return the reply
///
/// The trailing newline of the reply is stripped.
pub async fn send_command<P: AsRef<Path>>(path: P, command: &str) -> Result<String> {
    let path = path.as_ref();
    let mut stream = UnixStream::connect(path).await.map_err(|e| {
        Error::control(format!("Cannot connect to {}: {}", path.display(), e))
    })?;

    stream.write_all(command.trim_end().as_bytes()).await?;
    stream.write_all(b"\n").await?;
    stream.shutdown().await?;

    let mut reply = String::new();
    stream.read_to_string(&mut reply).await?;
    if reply.ends_with('\n') {
        reply.pop();
    }
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{ControlRequest, channel};
    use tempfile::tempdir;

    #[tokio::test]
    async fn forwards_commands_and_replies() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dnsclientd.ctl");
        let (handle, mut rx) = channel(4);

        let socket = ControlSocket::bind(&path, handle).unwrap();
        let server = tokio::spawn(socket.serve());

        let responder = tokio::spawn(async move {
            let ControlRequest { command, reply } = rx.recv().await.unwrap();
            assert_eq!(command, ControlCommand::Status);
            reply.send("{\"system_ready\":true}".to_string()).unwrap();
        });

        let reply = send_command(&path, "status").await.unwrap();
        assert_eq!(reply, "{\"system_ready\":true}");
        responder.await.unwrap();

        server.abort();
    }

    #[tokio::test]
    async fn rejects_unknown_commands_without_forwarding() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dnsclientd.ctl");
        let (handle, mut rx) = channel(4);

        let server = tokio::spawn(ControlSocket::bind(&path, handle).unwrap().serve());

        let reply = send_command(&path, "reload").await.unwrap();
        assert!(reply.starts_with("error: "), "unexpected reply {reply:?}");
        assert!(rx.try_recv().is_err());

        server.abort();
    }

    #[tokio::test]
    async fn replaces_stale_socket_and_cleans_up() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dnsclientd.ctl");
        std::fs::write(&path, "stale").unwrap();

        let (handle, _rx) = channel(1);
        let socket = ControlSocket::bind(&path, handle).unwrap();
        assert_eq!(socket.path(), path.as_path());

        drop(socket);
        assert!(!path.exists());
    }
}
