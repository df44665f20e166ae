//! Per-connection session task.
//!
//! Each accepted socket runs one of these to completion: read the identity
//! line, open the client's log file, then append every further line as a
//! record until the client disconnects. The task owns its socket, its
//! sequence counter, and its file handle for its whole lifetime; nothing is
//! shared with other sessions.

use crate::config::Config;
use crate::store::ClientLog;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, trace};

/// Drive one client connection from accept to disconnect.
///
/// The first newline-delimited line (trimmed) is the client identity; the
/// log file is opened and the start marker written as soon as it arrives.
/// Every subsequent line is one record. Clean end-of-stream ends the session
/// normally; any other transport error is propagated after the stop marker
/// is written. Disconnecting before sending an identity line ends the
/// session without ever opening a file.
pub async fn run(
    stream: TcpStream,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();

    // AwaitingName: the first line establishes identity. A partial line at
    // end-of-stream is not a line; identity is never established from one.
    let n = reader.read_line(&mut line).await?;
    if n == 0 || !line.ends_with('\n') {
        debug!("Client disconnected before sending a name");
        return Ok(());
    }
    let name = line.trim().to_string();

    info!(client = %name, "Client connected");

    // Active: fatal if the log file cannot be opened or its start marker
    // written; no record has been accepted yet.
    let mut log = ClientLog::open(&config.log_dir, &config.prefix, &name)?;

    let result = loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break Ok(()),
            // Bytes with no terminating newline are a truncated record at
            // end-of-stream; discard them.
            Ok(_) if !line.ends_with('\n') => break Ok(()),
            Ok(_) => {
                trace!(client = %name, "New log record received");
                log.put_record(line.trim());
            }
            // Draining happens either way; abnormal disconnects are
            // reported after cleanup.
            Err(e) => break Err(e),
        }
    };

    // Draining: the stop marker and file close run in ClientLog's drop, on
    // the error path as much as the clean one.
    drop(log);

    info!(client = %name, "Client disconnected");
    result.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::log_path;
    use std::path::Path;
    use tempfile::tempdir;
    use tokio::io::AsyncWriteExt;
    use tokio::net::{TcpListener, TcpStream};

    fn test_config(dir: &Path) -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            prefix: "co".to_string(),
            log_dir: dir.to_path_buf(),
            log_level: "info".to_string(),
        }
    }

    /// Connect a socket pair and run the session on the server end.
    async fn session_pair(config: Config) -> (TcpStream, tokio::task::JoinHandle<bool>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server_side, _) = listener.accept().await.unwrap();

        let handle =
            tokio::spawn(async move { run(server_side, &config).await.is_ok() });
        (client, handle)
    }

    #[tokio::test]
    async fn test_records_are_trimmed_and_sequenced() {
        let dir = tempdir().unwrap();
        let (mut client, handle) = session_pair(test_config(dir.path())).await;

        client.write_all(b"alice\n").await.unwrap();
        client.write_all(b"  hello  \n").await.unwrap();
        client.write_all(b"world\n").await.unwrap();
        drop(client);

        assert!(handle.await.unwrap());

        let contents =
            std::fs::read_to_string(log_path(dir.path(), "co", "alice")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("---=== Client \"alice\" started ===---"));
        assert!(lines[1].starts_with("    2. "));
        assert!(lines[1].ends_with(" hello"));
        assert!(lines[2].starts_with("    3. "));
        assert!(lines[2].ends_with(" world"));
        assert!(lines[3].starts_with("    4. "));
        assert!(lines[3].contains("Client stopped"));
    }

    #[tokio::test]
    async fn test_disconnect_before_name_opens_no_file() {
        let dir = tempdir().unwrap();
        let (client, handle) = session_pair(test_config(dir.path())).await;

        drop(client);
        assert!(handle.await.unwrap());

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_name_only_session_writes_both_markers() {
        let dir = tempdir().unwrap();
        let (mut client, handle) = session_pair(test_config(dir.path())).await;

        client.write_all(b"bob\n").await.unwrap();
        drop(client);
        assert!(handle.await.unwrap());

        let contents =
            std::fs::read_to_string(log_path(dir.path(), "co", "bob")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("    1. "));
        assert!(lines[1].starts_with("    2. "));
    }

    #[tokio::test]
    async fn test_unterminated_final_line_is_discarded() {
        let dir = tempdir().unwrap();
        let (mut client, handle) = session_pair(test_config(dir.path())).await;

        client.write_all(b"alice\nhello\nworld").await.unwrap();
        drop(client);
        assert!(handle.await.unwrap());

        let contents =
            std::fs::read_to_string(log_path(dir.path(), "co", "alice")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with(" hello"));
        assert!(lines[2].contains("Client stopped"));
        assert!(!contents.contains("world"));
    }

    #[tokio::test]
    async fn test_unterminated_name_opens_no_file() {
        let dir = tempdir().unwrap();
        let (mut client, handle) = session_pair(test_config(dir.path())).await;

        client.write_all(b"alice").await.unwrap();
        drop(client);
        assert!(handle.await.unwrap());

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_non_utf8_record_ends_session_with_error() {
        let dir = tempdir().unwrap();
        let (mut client, handle) = session_pair(test_config(dir.path())).await;

        client.write_all(b"bob\n\xff\xfe\n").await.unwrap();
        drop(client);

        // Text-only framing: the invalid bytes are a transport error, the
        // session drains and the markers survive.
        assert!(!handle.await.unwrap());

        let contents =
            std::fs::read_to_string(log_path(dir.path(), "co", "bob")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("Client stopped"));
    }

    #[tokio::test]
    async fn test_unopenable_log_dir_fails_session() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.log_dir = dir.path().join("missing");

        let (mut client, handle) = session_pair(config).await;
        client.write_all(b"carol\n").await.unwrap();

        assert!(!handle.await.unwrap());
    }
}
