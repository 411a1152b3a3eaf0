// Classroom Server CLI Validation Tool
// Validates a running classroom server through automated scenarios and interactive commands

use clap::{Parser, Subcommand};
use colored::*;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::io::{self, Write};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

#[derive(Parser)]
#[command(name = "classroom-cli")]
#[command(about = "Classroom Server CLI Validation Tool", long_about = None)]
struct Cli {
    /// Server address (default: 127.0.0.1:3000)
    #[arg(short, long, default_value = "127.0.0.1:3000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health endpoint
    Health,

    /// Get client bootstrap configuration
    Config,

    /// Print the current classroom state
    State,

    /// Test WebSocket connection
    Connect,

    /// Join the classroom and print the catch-up snapshot
    Join {
        #[arg(short, long)]
        username: String,

        /// teacher or student
        #[arg(short, long, default_value = "student")]
        role: String,

        /// Display name (optional)
        #[arg(short, long)]
        name: Option<String>,

        /// Stay joined and print every event (press Ctrl+C to exit)
        #[arg(short, long)]
        keep_alive: bool,
    },

    /// Join, send one chat message and wait for its broadcast
    Chat {
        #[arg(short, long)]
        username: String,

        #[arg(short, long, default_value = "student")]
        role: String,

        #[arg(short, long)]
        text: String,
    },

    /// Run automated validation scenarios
    Validate {
        /// Run all validation tests
        #[arg(short, long)]
        all: bool,

        /// Test specific scenario
        #[arg(short, long)]
        scenario: Option<String>,
    },

    /// Interactive mode - send raw JSON frames
    Interactive,
}

const SCENARIOS: [&str; 5] = [
    "connection",
    "join",
    "chat",
    "slide-permission",
    "teacher-departure",
];

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Health => {
            check_health(&cli.server).await;
        }
        Commands::Config => {
            check_config(&cli.server).await;
        }
        Commands::State => {
            show_state(&cli.server).await;
        }
        Commands::Connect => {
            test_connection(&cli.server).await;
        }
        Commands::Join {
            username,
            role,
            name,
            keep_alive,
        } => {
            join_classroom(&cli.server, username, role, name.as_deref(), *keep_alive).await;
        }
        Commands::Chat {
            username,
            role,
            text,
        } => {
            send_chat(&cli.server, username, role, text).await;
        }
        Commands::Validate { all, scenario } => {
            if *all {
                run_all_validations(&cli.server).await;
            } else if let Some(s) = scenario {
                run_scenario(&cli.server, s).await;
            } else {
                println!("{}", "Use --all or --scenario <name>".yellow());
                list_scenarios();
            }
        }
        Commands::Interactive => {
            interactive_mode(&cli.server).await;
        }
    }
}

async fn fetch_json(server: &str, path: &str) -> Result<Value, String> {
    let url = format!("http://{}{}", server, path);
    let resp = reqwest::get(&url).await.map_err(|e| e.to_string())?;
    if !resp.status().is_success() {
        return Err(format!("status {}", resp.status()));
    }
    resp.json::<Value>().await.map_err(|e| e.to_string())
}

async fn check_health(server: &str) {
    println!("{}", "Checking server health...".cyan());

    match fetch_json(server, "/classroom/health").await {
        Ok(body) => {
            println!("{} Health check passed", "✓".green());
            println!("  Status: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("  Service: {}", body["service"].as_str().unwrap_or("unknown"));
            println!("  Version: {}", body["version"].as_str().unwrap_or("unknown"));
        }
        Err(e) => {
            println!("{} Health check failed: {}", "✗".red(), e);
            println!("  Make sure the server is running on {}", server);
        }
    }
}

async fn check_config(server: &str) {
    println!("{}", "Fetching server configuration...".cyan());

    match fetch_json(server, "/classroom/config").await {
        Ok(body) => {
            println!("{} Config endpoint accessible", "✓".green());
            println!("\nConfiguration:");
            println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
        }
        Err(e) => {
            println!("{} Config fetch failed: {}", "✗".red(), e);
        }
    }
}

async fn show_state(server: &str) {
    println!("{}", "Fetching classroom state...".cyan());

    match fetch_json(server, "/classroom/state").await {
        Ok(state) => print_state(&state),
        Err(e) => {
            println!("{} State fetch failed: {}", "✗".red(), e);
        }
    }
}

fn print_state(state: &Value) {
    println!("\n{}", "═".repeat(50).green());
    println!(
        "{} {} / {}",
        "Slide:".bold(),
        state["currentSlideIndex"],
        state["totalSlides"]
    );
    println!("{} {}", "Teacher present:".bold(), state["isTeacherPresent"]);
    println!("{} {}", "Whiteboard:".bold(), state["whiteboardMode"]);
    println!("{}", "Participants:".bold());
    if let Some(participants) = state["participants"].as_array() {
        for p in participants {
            println!(
                "  {} {} ({})",
                "•".cyan(),
                p["displayName"].as_str().unwrap_or("?"),
                p["role"].as_str().unwrap_or("?")
            );
        }
    }
    println!("{}", "═".repeat(50).green());
}

async fn test_connection(server: &str) {
    println!("{}", "Testing WebSocket connection...".cyan());

    let url = format!("ws://{}/classroom", server);

    match connect_async(&url).await {
        Ok((ws_stream, _)) => {
            println!("{} WebSocket connection established", "✓".green());
            println!("  URL: {}", url);
            drop(ws_stream);
            println!("{} Connection closed cleanly", "✓".green());
        }
        Err(e) => {
            println!("{} WebSocket connection failed: {}", "✗".red(), e);
        }
    }
}

async fn connect(server: &str) -> Result<(WsWrite, WsRead), String> {
    let url = format!("ws://{}/classroom", server);
    let (ws_stream, _) = connect_async(&url).await.map_err(|e| e.to_string())?;
    Ok(ws_stream.split())
}

async fn send_json(write: &mut WsWrite, frame: Value) -> bool {
    write.send(Message::Text(frame.to_string())).await.is_ok()
}

/// Wait for the next frame of the given type, skipping everything else.
async fn wait_for(read: &mut WsRead, kind: &str, secs: u64) -> Option<Value> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(secs);
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match timeout(remaining, read.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                if let Ok(value) = serde_json::from_str::<Value>(&text) {
                    if value["type"] == kind {
                        return Some(value);
                    }
                }
            }
            Ok(Some(Ok(_))) => continue,
            _ => return None,
        }
    }
}

/// Join and wait for either the catch-up snapshot or a join error.
async fn join_as(
    write: &mut WsWrite,
    read: &mut WsRead,
    username: &str,
    role: &str,
    name: Option<&str>,
) -> Result<Value, String> {
    let frame = json!({
        "type": "join",
        "username": username,
        "role": role,
        "displayName": name,
    });
    if !send_json(write, frame).await {
        return Err("failed to send join".to_string());
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match timeout(remaining, read.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                let Ok(value) = serde_json::from_str::<Value>(&text) else {
                    continue;
                };
                match value["type"].as_str() {
                    Some("classroom-joined") => return Ok(value),
                    Some("join-error") => {
                        return Err(format!(
                            "{}: {}",
                            value["code"].as_str().unwrap_or("unknown"),
                            value["message"].as_str().unwrap_or("")
                        ))
                    }
                    _ => continue,
                }
            }
            Ok(Some(Ok(_))) => continue,
            Ok(Some(Err(e))) => return Err(e.to_string()),
            Ok(None) => return Err("connection closed by server".to_string()),
            Err(_) => return Err("timeout waiting for classroom-joined".to_string()),
        }
    }
}

async fn join_classroom(
    server: &str,
    username: &str,
    role: &str,
    name: Option<&str>,
    keep_alive: bool,
) {
    println!("{}", "Joining classroom...".cyan());
    println!("  Username: {}", username);
    println!("  Role: {}", role);
    if let Some(n) = name {
        println!("  Name: {}", n);
    }

    let (mut write, mut read) = match connect(server).await {
        Ok(halves) => halves,
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
            return;
        }
    };

    match join_as(&mut write, &mut read, username, role, name).await {
        Ok(joined) => {
            println!("{} Joined as {}", "✓".green(), joined["connectionId"].to_string().green().bold());
            print_state(&joined["state"]);
        }
        Err(e) => {
            println!("{} Join failed: {}", "✗".red(), e);
            return;
        }
    }

    if !keep_alive {
        return;
    }

    println!("\n{}", "Connection is being kept alive...".yellow());
    println!("Press {} to leave the classroom.", "Ctrl+C".bold());

    loop {
        match timeout(Duration::from_secs(30), read.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                println!("{} {}", "◀".green(), text.bright_white());
            }
            Ok(Some(Ok(Message::Close(_)))) => {
                println!("{} Server closed the connection", "✗".yellow());
                break;
            }
            Ok(Some(Ok(_))) => continue,
            Ok(Some(Err(e))) => {
                println!("{} Connection error: {}", "✗".red(), e);
                break;
            }
            Ok(None) => {
                println!("{} Connection closed", "✗".yellow());
                break;
            }
            // Timeout - just continue listening
            Err(_) => continue,
        }
    }
}

async fn send_chat(server: &str, username: &str, role: &str, text: &str) {
    let (mut write, mut read) = match connect(server).await {
        Ok(halves) => halves,
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
            return;
        }
    };

    if let Err(e) = join_as(&mut write, &mut read, username, role, None).await {
        println!("{} Join failed: {}", "✗".red(), e);
        return;
    }

    if !send_json(&mut write, json!({"type": "send-message", "text": text})).await {
        println!("{} Failed to send message", "✗".red());
        return;
    }

    match wait_for(&mut read, "new-message", 5).await {
        Some(message) => {
            println!(
                "{} [{}] {}",
                "✓".green(),
                message["sender"].as_str().unwrap_or("?").cyan(),
                message["text"].as_str().unwrap_or("")
            );
        }
        None => {
            println!("{} Message was not broadcast", "✗".red());
        }
    }
}

fn list_scenarios() {
    println!("\n{}", "Available Validation Scenarios:".bold());
    println!("  {} - Basic WebSocket connection test", "connection".cyan());
    println!("  {} - Student join with catch-up snapshot", "join".cyan());
    println!("  {} - Chat message broadcast", "chat".cyan());
    println!("  {} - Students cannot navigate slides", "slide-permission".cyan());
    println!("  {} - Students are told when the teacher leaves", "teacher-departure".cyan());
    println!("\nExample: classroom-cli validate --scenario join");
}

async fn validate(server: &str, scenario: &str) -> Option<bool> {
    let result = match scenario {
        "connection" => validate_connection(server).await,
        "join" => validate_join(server).await,
        "chat" => validate_chat(server).await,
        "slide-permission" => validate_slide_permission(server).await,
        "teacher-departure" => validate_teacher_departure(server).await,
        _ => return None,
    };
    Some(result)
}

async fn run_scenario(server: &str, scenario: &str) {
    println!("\n{} {}", "Running scenario:".bold(), scenario.cyan());
    println!("{}", "─".repeat(60));

    match validate(server, scenario).await {
        Some(true) => println!("\n{} Scenario passed", "✓".green().bold()),
        Some(false) => println!("\n{} Scenario failed", "✗".red().bold()),
        None => {
            println!("{} Unknown scenario: {}", "✗".red(), scenario);
            list_scenarios();
        }
    }
}

async fn run_all_validations(server: &str) {
    println!("\n{}", "Running All Validation Tests".bold().green());
    println!("{}\n", "═".repeat(60).green());

    let mut passed = 0;
    let mut failed = 0;

    for scenario in SCENARIOS {
        println!("\n{} Testing: {}", "▶".cyan(), scenario.bold());
        println!("{}", "─".repeat(60));

        if validate(server, scenario).await.unwrap_or(false) {
            passed += 1;
        } else {
            failed += 1;
        }

        sleep(Duration::from_millis(300)).await;
    }

    println!("\n{}", "═".repeat(60).green());
    println!("{}", "Validation Summary".bold());
    println!("{}", "═".repeat(60).green());
    println!("  {} Passed: {}", "✓".green(), passed.to_string().green());
    println!("  {} Failed: {}", "✗".red(), failed.to_string().red());
    println!("  Total: {}", passed + failed);

    if failed == 0 {
        println!("\n{}", "All validations passed!".green().bold());
    } else {
        println!("\n{}", "Some validations failed. Check output above.".yellow());
    }
}

async fn validate_connection(server: &str) -> bool {
    match connect(server).await {
        Ok(_) => {
            println!("{} WebSocket connection successful", "✓".green());
            true
        }
        Err(e) => {
            println!("{} Connection failed: {}", "✗".red(), e);
            false
        }
    }
}

async fn validate_join(server: &str) -> bool {
    let (mut write, mut read) = match connect(server).await {
        Ok(halves) => halves,
        Err(e) => {
            println!("{} Connection failed: {}", "✗".red(), e);
            return false;
        }
    };

    let joined = match join_as(&mut write, &mut read, "validator_student", "student", None).await {
        Ok(joined) => joined,
        Err(e) => {
            println!("{} Join failed: {}", "✗".red(), e);
            return false;
        }
    };

    if joined["you"]["username"] != "validator_student" || !joined["state"].is_object() {
        println!("{} Snapshot missing identity or state", "✗".red());
        return false;
    }
    println!("{} Received classroom-joined with snapshot", "✓".green());

    match wait_for(&mut read, "participants-updated", 3).await {
        Some(roster) => {
            let listed = roster["participants"]
                .as_array()
                .map(|ps| ps.iter().any(|p| p["username"] == "validator_student"))
                .unwrap_or(false);
            if listed {
                println!("{} Roster includes the new participant", "✓".green());
            } else {
                println!("{} Roster does not list the new participant", "✗".red());
            }
            listed
        }
        None => {
            println!("{} No roster update received", "✗".red());
            false
        }
    }
}

async fn validate_chat(server: &str) -> bool {
    let (mut write, mut read) = match connect(server).await {
        Ok(halves) => halves,
        Err(e) => {
            println!("{} Connection failed: {}", "✗".red(), e);
            return false;
        }
    };

    if let Err(e) = join_as(&mut write, &mut read, "validator_chat", "student", None).await {
        println!("{} Join failed: {}", "✗".red(), e);
        return false;
    }

    println!("  Step 1: Sending whitespace-only message...");
    send_json(&mut write, json!({"type": "send-message", "text": "   "})).await;
    match wait_for(&mut read, "command-rejected", 3).await {
        Some(rejected) if rejected["code"] == "empty-message" => {
            println!("  {} Empty message rejected", "✓".green());
        }
        _ => {
            println!("{} Empty message was not rejected", "✗".red());
            return false;
        }
    }

    println!("  Step 2: Sending chat message...");
    send_json(&mut write, json!({"type": "send-message", "text": "validation ping"})).await;
    match wait_for(&mut read, "new-message", 3).await {
        Some(message) if message["text"] == "validation ping" => {
            println!("  {} Message broadcast with timestamp {}", "✓".green(), message["timestamp"]);
            true
        }
        _ => {
            println!("{} Message was not broadcast", "✗".red());
            false
        }
    }
}

async fn validate_slide_permission(server: &str) -> bool {
    let (mut write, mut read) = match connect(server).await {
        Ok(halves) => halves,
        Err(e) => {
            println!("{} Connection failed: {}", "✗".red(), e);
            return false;
        }
    };

    if let Err(e) = join_as(&mut write, &mut read, "validator_student", "student", None).await {
        println!("{} Join failed: {}", "✗".red(), e);
        return false;
    }

    send_json(&mut write, json!({"type": "change-slide", "index": 0})).await;
    match wait_for(&mut read, "command-rejected", 3).await {
        Some(rejected) if rejected["code"] == "unauthorized" => {
            println!("{} Student slide change rejected", "✓".green());
            true
        }
        Some(rejected) => {
            println!("{} Unexpected rejection code: {}", "✗".yellow(), rejected["code"]);
            false
        }
        None => {
            println!("{} Student slide change was not rejected", "✗".red());
            false
        }
    }
}

async fn validate_teacher_departure(server: &str) -> bool {
    println!("  Step 1: Teacher joins...");
    let (mut teacher_write, mut teacher_read) = match connect(server).await {
        Ok(halves) => halves,
        Err(e) => {
            println!("{} Teacher connection failed: {}", "✗".red(), e);
            return false;
        }
    };
    if let Err(e) = join_as(
        &mut teacher_write,
        &mut teacher_read,
        "validator_teacher",
        "teacher",
        None,
    )
    .await
    {
        println!("{} Teacher join failed: {}", "✗".red(), e);
        return false;
    }

    println!("  Step 2: Student joins...");
    let (mut student_write, mut student_read) = match connect(server).await {
        Ok(halves) => halves,
        Err(e) => {
            println!("{} Student connection failed: {}", "✗".red(), e);
            return false;
        }
    };
    match join_as(
        &mut student_write,
        &mut student_read,
        "validator_student",
        "student",
        None,
    )
    .await
    {
        Ok(joined) if joined["state"]["isTeacherPresent"] == true => {
            println!("  {} Student sees teacher present", "✓".green());
        }
        Ok(_) => {
            println!("{} Snapshot reports no teacher", "✗".red());
            return false;
        }
        Err(e) => {
            println!("{} Student join failed: {}", "✗".red(), e);
            return false;
        }
    }

    println!("  Step 3: Teacher disconnects...");
    let _ = teacher_write.close().await;
    drop(teacher_read);

    match wait_for(&mut student_read, "teacher-left", 5).await {
        Some(_) => {
            println!("{} Student notified that the teacher left", "✓".green());
            true
        }
        None => {
            println!("{} No teacher-left notification", "✗".red());
            println!("  (another teacher may still be connected)");
            false
        }
    }
}

async fn interactive_mode(server: &str) {
    println!("\n{}", "Interactive Mode".bold().green());
    println!("{}", "═".repeat(60).green());
    println!("Type {} for help, {} to quit\n", "help".cyan(), "quit".cyan());

    let (mut write, mut read) = match connect(server).await {
        Ok(halves) => halves,
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
            return;
        }
    };
    println!("{} Connected to server", "✓".green());

    // Spawn task to receive messages
    let receive_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = read.next().await {
            if let Message::Text(text) = msg {
                println!("\n{} {}", "◀".green(), text.bright_white());
            }
        }
    });

    loop {
        print!("{} ", "►".cyan());
        let _ = io::stdout().flush();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input == "quit" || input == "exit" {
            println!("Goodbye!");
            break;
        }

        if input == "help" {
            print_interactive_help();
            continue;
        }

        match serde_json::from_str::<Value>(input) {
            Ok(parsed) => {
                if send_json(&mut write, parsed).await {
                    println!("{} Message sent", "✓".green());
                } else {
                    println!("{} Failed to send message", "✗".red());
                    break;
                }
            }
            Err(_) => {
                println!("{} Invalid JSON. Type 'help' for examples.", "✗".yellow());
            }
        }
    }

    receive_task.abort();
}

fn print_interactive_help() {
    println!("\n{}", "Interactive Mode Commands".bold());
    println!("{}", "─".repeat(60));
    println!("Send JSON frames directly to the server.\n");

    println!("{}", "Example Messages:".bold());
    println!("\n{}:", "Join".cyan());
    println!(r#"  {{"type":"join","username":"mlee","role":"teacher","displayName":"Ms. Lee"}}"#);

    println!("\n{}:", "Change Slide".cyan());
    println!(r#"  {{"type":"change-slide","index":2}}"#);

    println!("\n{}:", "Chat".cyan());
    println!(r#"  {{"type":"send-message","text":"Hello class"}}"#);

    println!("\n{}:", "Whiteboard".cyan());
    println!(r#"  {{"type":"whiteboard-toggle","mode":"on"}}"#);
    println!(r#"  {{"type":"whiteboard-update","delta":{{"points":[[0,0],[10,10]]}}}}"#);
    println!(r#"  {{"type":"whiteboard-clear"}}"#);

    println!("\n{}:", "Signaling".cyan());
    println!(r#"  {{"type":"webrtc-offer","sdp":{{"type":"offer","sdp":"v=0..."}}}}"#);
    println!(r#"  {{"type":"webrtc-answer","targetId":"c1-abc","sdp":{{"type":"answer","sdp":"v=0..."}}}}"#);

    println!("\n{}: quit, exit", "Commands".bold());
    println!();
}
