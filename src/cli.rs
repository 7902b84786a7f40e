//! `mindmesh` — headless CLI client for the gateway (§1: "a
//! `cli` feature providing a `clap`-based command-line client that drives
//! the gateway over a `tokio-tungstenite` WebSocket connection (REPL +
//! subcommands)").
//!
//! A top-level `Cli` with a `#[command(subcommand)]` plus a no-subcommand
//! interactive REPL that streams responses, connecting over
//! `tokio_tungstenite::connect_async`.

use std::io::{self, BufRead, IsTerminal, Write};

use clap::{Parser, Subcommand};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser, Debug)]
#[command(
    name = "mindmesh",
    about = "mindmesh multi-agent runtime CLI",
    version,
    long_about = "Headless interface to the mindmesh gateway.\n\
                  Run without a subcommand to enter the interactive REPL."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Gateway host.
    #[arg(long, global = true, default_value = "127.0.0.1")]
    host: String,

    /// Gateway port.
    #[arg(long, global = true, default_value_t = 8780)]
    port: u16,

    /// Print raw JSON-RPC frames instead of formatted text.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the agent personas the gateway can instantiate.
    Agents,
    /// Start a new session and print its id.
    Start,
    /// Send one message to a session and print the reply.
    Send { session_id: String, message: String },
    /// Switch a session's active agent.
    Switch { session_id: String, agent_id: String },
    /// Stop (tear down) a session.
    Stop { session_id: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let base_url = format!("ws://{}:{}/ws", cli.host, cli.port);

    match &cli.command {
        Some(command) => run_one_shot(&base_url, command, cli.json).await,
        None => run_repl(&base_url, cli.json).await,
    }
}

async fn connect(base_url: &str) -> Option<tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>> {
    match connect_async(base_url).await {
        Ok((stream, _)) => Some(stream),
        Err(e) => {
            eprintln!("could not connect to gateway at {base_url}: {e}");
            None
        }
    }
}

/// Send one request, print the matching response, ignoring unrelated
/// notification frames that may interleave (§6: the socket is
/// bidirectional and shared).
async fn request(
    ws: &mut tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    id: u64,
    method: &str,
    params: Value,
) -> Option<Value> {
    let frame = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
    if ws.send(Message::Text(frame.to_string())).await.is_err() {
        return None;
    }
    while let Some(Ok(Message::Text(text))) = ws.next().await {
        let Ok(parsed) = serde_json::from_str::<Value>(&text) else { continue };
        if parsed.get("id").and_then(Value::as_u64) == Some(id) {
            return Some(parsed);
        }
    }
    None
}

async fn run_one_shot(base_url: &str, command: &Commands, json_mode: bool) {
    let Some(mut ws) = connect(base_url).await else { return };
    let (method, params) = match command {
        Commands::Agents => ("agent.list", Value::Null),
        Commands::Start => ("startSession", json!({"userId": "cli"})),
        Commands::Send { session_id, message } => {
            ("sendUserMessage", json!({"sessionId": session_id, "message": message}))
        }
        Commands::Switch { session_id, agent_id } => {
            ("session.switch_agent", json!({"sessionId": session_id, "agent_id": agent_id}))
        }
        Commands::Stop { session_id } => ("stopSession", json!({"sessionId": session_id})),
    };
    let Some(response) = request(&mut ws, 1, method, params).await else {
        eprintln!("no response from gateway");
        return;
    };
    print_response(&response, json_mode);
}

fn print_response(response: &Value, json_mode: bool) {
    if json_mode {
        println!("{response}");
        return;
    }
    if let Some(error) = response.get("error") {
        eprintln!("error: {}", error.get("message").and_then(Value::as_str).unwrap_or("unknown error"));
        return;
    }
    match response.get("result") {
        Some(Value::Object(map)) if map.contains_key("ai_response") => {
            println!("{}", map["ai_response"].as_str().unwrap_or(""));
        }
        Some(result) => println!("{result}"),
        None => println!("{response}"),
    }
}

async fn run_repl(base_url: &str, json_mode: bool) {
    let is_tty = io::stdin().is_terminal();
    let Some(mut ws) = connect(base_url).await else { return };

    let Some(start) = request(&mut ws, 1, "startSession", json!({"userId": "cli"})).await else {
        eprintln!("startSession failed");
        return;
    };
    let Some(session_id) = start.get("result").and_then(|r| r.get("sessionId")).and_then(Value::as_str).map(str::to_string)
    else {
        eprintln!("startSession returned no sessionId");
        return;
    };

    if is_tty {
        println!("mindmesh session {session_id}. Type 'exit' to quit.");
    }

    let stdin = io::stdin();
    let mut next_id = 2u64;
    loop {
        if is_tty {
            print!("mindmesh> ");
            io::stdout().flush().unwrap_or_default();
        }
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(_) => break,
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if matches!(trimmed, "exit" | "quit" | "q") {
            let _ = request(&mut ws, next_id, "stopSession", json!({"sessionId": session_id})).await;
            break;
        }

        let Some(response) =
            request(&mut ws, next_id, "sendUserMessage", json!({"sessionId": session_id, "message": trimmed})).await
        else {
            eprintln!("no response from gateway");
            break;
        };
        next_id += 1;
        print_response(&response, json_mode);
    }
}
