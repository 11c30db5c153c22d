//! Common test utilities: an in-process SMTP receiver

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// A message as seen by the receiver
#[derive(Debug, Clone, Default)]
pub struct ReceivedMail {
    pub auth: Option<String>,
    pub mail_from: String,
    pub rcpt_to: Vec<String>,
    pub data: String,
}

impl ReceivedMail {
    /// Header section, without the blank separator line
    fn header_section(&self) -> &str {
        self.data.split("\r\n\r\n").next().unwrap_or_default()
    }

    /// First header with the given name, unfolded
    pub fn header(&self, name: &str) -> Option<String> {
        let mut unfolded: Vec<String> = Vec::new();
        for line in self.header_section().split("\r\n") {
            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some(last) = unfolded.last_mut() {
                    last.push(' ');
                    last.push_str(line.trim());
                }
            } else {
                unfolded.push(line.to_string());
            }
        }

        let prefix = format!("{}:", name.to_lowercase());
        unfolded
            .into_iter()
            .find(|line| line.to_lowercase().starts_with(&prefix))
            .map(|line| line[prefix.len()..].trim().to_string())
    }

    pub fn body(&self) -> String {
        let body = match self.data.split_once("\r\n\r\n") {
            Some((_, body)) => body,
            None => "",
        };
        body.strip_suffix("\r\n").unwrap_or(body).to_string()
    }
}

#[derive(Default)]
struct ServerState {
    connections: AtomicUsize,
    messages: Mutex<Vec<ReceivedMail>>,
}

/// Minimal SMTP server that accepts every session and stores each message
pub struct TestSmtpServer {
    port: u16,
    state: Arc<ServerState>,
    rejected: Arc<Vec<String>>,
    handle: JoinHandle<()>,
}

impl TestSmtpServer {
    pub async fn start() -> Self {
        Self::start_rejecting(&[]).await
    }

    /// Start a server that answers `550` to `RCPT TO` for the given addresses
    pub async fn start_rejecting(rejected: &[&str]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test smtp server");
        let port = listener.local_addr().expect("local addr").port();
        let state = Arc::new(ServerState::default());
        let rejected: Arc<Vec<String>> =
            Arc::new(rejected.iter().map(|r| r.to_string()).collect());

        let accept_state = state.clone();
        let accept_rejected = rejected.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_state.connections.fetch_add(1, Ordering::SeqCst);
                let state = accept_state.clone();
                let rejected = accept_rejected.clone();
                tokio::spawn(async move {
                    let _ = handle_session(stream, state, rejected).await;
                });
            }
        });

        Self {
            port,
            state,
            rejected,
            handle,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<ReceivedMail> {
        self.state.messages.lock().unwrap().clone()
    }
}

impl Drop for TestSmtpServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_session(
    stream: TcpStream,
    state: Arc<ServerState>,
    rejected: Arc<Vec<String>>,
) -> std::io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);
    let mut mail = ReceivedMail::default();
    let mut line = String::new();

    write.write_all(b"220 localhost test smtp server\r\n").await?;

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let command = line.trim_end().to_string();
        let upper = command.to_uppercase();

        if upper.starts_with("EHLO") || upper.starts_with("HELO") {
            write
                .write_all(b"250-localhost\r\n250 AUTH PLAIN LOGIN\r\n")
                .await?;
        } else if upper.starts_with("AUTH") {
            mail.auth = Some(command);
            write
                .write_all(b"235 2.7.0 Authentication successful\r\n")
                .await?;
        } else if upper.starts_with("MAIL FROM:") {
            mail.mail_from = extract_path(&command);
            write.write_all(b"250 2.1.0 OK\r\n").await?;
        } else if upper.starts_with("RCPT TO:") {
            let recipient = extract_path(&command);
            if rejected.contains(&recipient) {
                write.write_all(b"550 5.1.1 No such user\r\n").await?;
            } else {
                mail.rcpt_to.push(recipient);
                write.write_all(b"250 2.1.5 OK\r\n").await?;
            }
        } else if upper == "DATA" {
            write.write_all(b"354 End data with <CR><LF>.<CR><LF>\r\n").await?;
            let mut data = String::new();
            loop {
                line.clear();
                if reader.read_line(&mut line).await? == 0 {
                    return Ok(());
                }
                if line == ".\r\n" || line == ".\n" {
                    break;
                }
                // Undo dot-stuffing
                let content = line.strip_prefix('.').unwrap_or(&line);
                data.push_str(content);
            }
            mail.data = data;
            state.messages.lock().unwrap().push(mail.clone());
            write.write_all(b"250 2.0.0 OK queued\r\n").await?;
        } else if upper == "RSET" {
            mail = ReceivedMail::default();
            write.write_all(b"250 2.0.0 OK\r\n").await?;
        } else if upper == "NOOP" {
            write.write_all(b"250 2.0.0 OK\r\n").await?;
        } else if upper == "QUIT" {
            write.write_all(b"221 2.0.0 Bye\r\n").await?;
            return Ok(());
        } else {
            write.write_all(b"502 5.5.2 Command not recognized\r\n").await?;
        }
    }
}

/// `MAIL FROM:<a@b.com> BODY=8BITMIME` -> `a@b.com`
fn extract_path(command: &str) -> String {
    let start = command.find('<').map(|i| i + 1).unwrap_or(0);
    let end = command[start..]
        .find('>')
        .map(|i| start + i)
        .unwrap_or(command.len());
    command[start..end].to_string()
}
