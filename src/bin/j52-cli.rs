//! j52 CLI client
//!
//! Sends tool calls to the j52 worker over UDP and prints the results.
//! Uses rustyline for readline-style editing and history.
//!
//! Input lines have the form `<tool_name> [json-arguments]`, for example
//! `run_shell {"command": "uptime"}`.

use clap::Parser;
use rmp_serde::decode::Deserializer;
use rmp_serde::encode::Serializer;
use rustyline::Editor;
use rustyline::history::FileHistory;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{Instant, timeout};

/// Message types
#[derive(Debug, Clone, Copy)]
#[repr(u8)]
enum MsgType {
    Request = 0x01,
    RequestAck = 0x02,
    Response = 0x03,
}

#[derive(Debug, Serialize)]
struct RequestPayload {
    tool_call_id: String,
    tool_name: String,
    arguments_json: String,
}

#[derive(Debug, Deserialize)]
struct ResponsePayload {
    #[allow(dead_code)]
    tool_call_id: String,
    success: bool,
    output: Option<String>,
    error: Option<String>,
    execution_time_ms: Option<u64>,
}

/// CLI arguments
#[derive(Debug, Parser)]
#[command(name = "j52-cli")]
#[command(about = "j52 worker CLI client")]
struct Args {
    /// Worker address (e.g., 127.0.0.1:9700)
    #[arg(short, long, default_value = "127.0.0.1:9700")]
    target: SocketAddr,

    /// ACK timeout in seconds
    #[arg(long, default_value = "5")]
    timeout: u64,

    /// Response timeout in seconds; agent calls may run for up to 15 minutes
    #[arg(long, default_value = "960")]
    response_timeout: u64,

    /// Maximum retry attempts
    #[arg(short, long, default_value = "3")]
    max_retries: u32,

    /// History file path
    #[arg(long)]
    history_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
struct Config {
    target: SocketAddr,
    ack_timeout: Duration,
    response_timeout: Duration,
    max_retries: u32,
    history_file: PathBuf,
}

impl Config {
    fn from_args(args: Args) -> Self {
        let history_file = args.history_file.unwrap_or_else(|| {
            dirs::home_dir()
                .map(|p| p.join(".j52_history"))
                .unwrap_or_else(|| PathBuf::from(".j52_history"))
        });

        Self {
            target: args.target,
            ack_timeout: Duration::from_secs(args.timeout),
            response_timeout: Duration::from_secs(args.response_timeout),
            max_retries: args.max_retries,
            history_file,
        }
    }
}

/// Split `<tool_name> [json]` into its parts
fn parse_line(line: &str) -> Result<(String, String), String> {
    let line = line.trim();
    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };
    if name.is_empty() {
        return Err("missing tool name".to_string());
    }
    if !rest.is_empty() {
        serde_json::from_str::<serde_json::Value>(rest)
            .map_err(|e| format!("arguments are not valid JSON: {}", e))?;
    }
    Ok((name.to_string(), rest.to_string()))
}

struct Client {
    socket: UdpSocket,
    config: Config,
    seq: AtomicU32,
}

impl Client {
    async fn new(config: Config) -> io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;

        Ok(Self {
            socket,
            config,
            seq: AtomicU32::new(1),
        })
    }

    /// Send a tool call and wait for its result
    async fn call(&self, tool_name: String, arguments_json: String) -> io::Result<ResponsePayload> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);

        let payload = RequestPayload {
            tool_call_id: uuid::Uuid::new_v4().to_string(),
            tool_name,
            arguments_json,
        };
        let mut payload_bytes = Vec::new();
        let mut ser = Serializer::new(&mut payload_bytes);
        payload
            .serialize(&mut ser)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        // Build packet: type (1) + seq (4) + payload
        let mut packet = vec![MsgType::Request as u8];
        packet.extend_from_slice(&seq.to_be_bytes());
        packet.extend_from_slice(&payload_bytes);

        // Retries reuse the seq so the worker deduplicates them
        for _attempt in 0..self.config.max_retries {
            self.socket.send_to(&packet, self.config.target).await?;

            if !self.wait_for_ack(seq).await? {
                continue;
            }
            match self.wait_for_response(seq).await {
                Ok(response) => return Ok(response),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                    eprintln!("[warning] Response timeout, retrying...");
                }
                Err(e) => return Err(e),
            }
        }

        Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "worker not responding",
        ))
    }

    /// Wait for REQUEST_ACK; false on timeout
    async fn wait_for_ack(&self, expected_seq: u32) -> io::Result<bool> {
        let deadline = Instant::now() + self.config.ack_timeout;
        let mut buf = [0u8; 1024];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, self.socket.recv_from(&mut buf)).await {
                Ok(Ok((len, addr))) => {
                    if addr != self.config.target || len < 5 {
                        continue;
                    }
                    let seq = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
                    if buf[0] == MsgType::RequestAck as u8 && seq == expected_seq {
                        return Ok(true);
                    }
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => return Ok(false),
            }
        }
    }

    /// Wait for RESPONSE, skipping stray acks from retries
    async fn wait_for_response(&self, expected_seq: u32) -> io::Result<ResponsePayload> {
        let deadline = Instant::now() + self.config.response_timeout;
        let mut buf = vec![0u8; 65536];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let (len, addr) = match timeout(remaining, self.socket.recv_from(&mut buf)).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "Response timeout"));
                }
            };

            if addr != self.config.target || len < 5 {
                continue;
            }
            let seq = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
            if buf[0] != MsgType::Response as u8 || seq != expected_seq {
                continue;
            }

            let mut de = Deserializer::new(&buf[5..len]);
            return ResponsePayload::deserialize(&mut de)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e));
        }
    }
}

fn print_response(response: &ResponsePayload) {
    let elapsed = response
        .execution_time_ms
        .map(|ms| format!(" ({} ms)", ms))
        .unwrap_or_default();

    if response.success {
        println!("{}", response.output.as_deref().unwrap_or(""));
        if !elapsed.is_empty() {
            println!("[ok{}]", elapsed);
        }
    } else {
        println!(
            "[error{}] {}",
            elapsed,
            response.error.as_deref().unwrap_or("unknown error")
        );
    }
}

fn main() -> io::Result<()> {
    let args = Args::parse();
    let config = Config::from_args(args);

    if let Ok(lang) = std::env::var("LANG")
        && !lang.to_lowercase().contains("utf-8")
        && !lang.to_lowercase().contains("utf8")
    {
        eprintln!(
            "[warning] Terminal locale is not UTF-8. Non-ASCII characters may not display correctly."
        );
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async { run_client(config).await })
}

async fn run_client(config: Config) -> io::Result<()> {
    let client = Client::new(config.clone()).await?;

    let mut rl: Editor<(), FileHistory> = Editor::new().map_err(io::Error::other)?;

    if config.history_file.exists()
        && let Err(e) = rl.load_history(&config.history_file)
    {
        eprintln!("[warning] Failed to load history: {}", e);
    }

    println!("j52-cli v{}", env!("CARGO_PKG_VERSION"));
    println!("Target: {}", client.config.target);
    println!("Enter `<tool_name> [json-arguments]`. Ctrl+D to quit.");
    println!();

    loop {
        match rl.readline("> ") {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(input);

                let (tool_name, arguments_json) = match parse_line(input) {
                    Ok(parts) => parts,
                    Err(e) => {
                        println!("[error] {}", e);
                        continue;
                    }
                };

                print!("[waiting...]");
                io::stdout().flush()?;

                let result = client.call(tool_name, arguments_json).await;
                print!("\r");
                match result {
                    Ok(response) => print_response(&response),
                    Err(e) => println!("[error] {}", e),
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                // Ctrl+C - cancel current input, continue
                println!("^C");
                continue;
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("[error] Readline error: {}", e);
                break;
            }
        }
    }

    if let Err(e) = rl.save_history(&config.history_file) {
        eprintln!("[warning] Failed to save history: {}", e);
    }

    println!("\nGoodbye!");
    Ok(())
}
