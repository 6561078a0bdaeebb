use std::io::{IsTerminal, Write};

use anyhow::{Context, Result, bail};
use colored::Colorize;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::frame::decode_frame;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An open connection to the relay
pub struct ChatSession {
    socket: Socket,
}

impl ChatSession {
    /// Connect and wait for the greeting.
    pub async fn connect(url: &str) -> Result<(Self, String)> {
        let (socket, _) = tokio_tungstenite::connect_async(url)
            .await
            .with_context(|| format!("Failed to connect to {}", url))?;
        tracing::debug!(url, "Connected");

        let mut session = Self { socket };
        let greeting = session
            .next_text()
            .await?
            .context("Connection closed before the greeting")?;
        Ok((session, greeting))
    }

    /// Send one prompt and write the streamed reply to `out` as it arrives.
    pub async fn ask<W: Write>(&mut self, prompt: &str, out: &mut W) -> Result<()> {
        self.socket
            .send(Message::Text(prompt.into()))
            .await
            .context("Failed to send message")?;

        loop {
            let Some(text) = self.next_text().await? else {
                bail!("Connection closed before the reply finished");
            };

            let decoded = decode_frame(&text);
            if let Some(chunk) = decoded.chunk {
                out.write_all(chunk.as_bytes())?;
                out.flush()?;
            }
            if decoded.done {
                return Ok(());
            }
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.socket.close(None).await.context("Failed to close connection")
    }

    /// Next text frame, or `None` once the server has closed the connection.
    async fn next_text(&mut self) -> Result<Option<String>> {
        while let Some(frame) = self.socket.next().await {
            match frame.context("WebSocket error")? {
                Message::Text(text) => return Ok(Some(text.to_string())),
                Message::Close(frame) => {
                    if let Some(frame) = frame {
                        tracing::warn!(code = %frame.code, reason = %frame.reason, "Server closed the connection");
                        bail!("Server closed the connection: {} ({})", frame.reason, frame.code);
                    }
                    return Ok(None);
                }
                Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
        Ok(None)
    }
}

/// Send a single message and print the reply.
pub async fn run_once(url: &str, message: &str) -> Result<()> {
    send_once(url, message, &mut std::io::stdout(), &mut std::io::stderr()).await
}

/// The reply goes to `out`; the greeting goes to `notes` so `out` can be piped.
async fn send_once<O: Write, E: Write>(
    url: &str,
    message: &str,
    out: &mut O,
    notes: &mut E,
) -> Result<()> {
    let (mut session, greeting) = ChatSession::connect(url).await?;
    writeln!(notes, "{}", greeting)?;
    session.ask(message, out).await?;
    writeln!(out)?;
    session.close().await
}

/// Read prompts from stdin until EOF.
pub async fn run_interactive(url: &str) -> Result<()> {
    let (mut session, greeting) = ChatSession::connect(url).await?;
    let interactive = std::io::stdin().is_terminal();
    let mut stdout = std::io::stdout();

    writeln!(stdout, "{} {}", "bot>".cyan().bold(), greeting)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if interactive {
            write!(stdout, "{} ", "you>".green().bold())?;
            stdout.flush()?;
        }

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }

        write!(stdout, "{} ", "bot>".cyan().bold())?;
        session.ask(prompt, &mut stdout).await?;
        writeln!(stdout)?;
    }

    session.close().await
}
