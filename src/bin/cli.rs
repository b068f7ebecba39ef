// Live Classroom CLI
// Operator and validation client for the classroom WebSocket server

use clap::{Parser, Subcommand};
use colored::*;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::io::{self, Write};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use classroom_server::classroom::protocol::{
    ClientEvent, CodeChange, JoinRoom, PermissionRequest, PermissionResponse, Room,
};
use classroom_server::classroom::ServerEvent;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "classroom-cli")]
#[command(about = "Live Classroom CLI", long_about = None)]
struct Cli {
    /// Server address (default: 127.0.0.1:8080)
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health endpoint
    Health,

    /// Show room, connection and participant counts
    Stats,

    /// List classrooms
    List,

    /// Create a classroom and join it as owner
    Create {
        /// Classroom name
        #[arg(short, long)]
        name: String,

        /// Owner display name
        #[arg(short, long)]
        owner: String,

        /// Shared room password
        #[arg(short, long)]
        password: String,

        /// Keep the owner connection open (the classroom closes with it)
        #[arg(short, long)]
        keep_alive: bool,
    },

    /// Join a classroom as a participant
    Join {
        /// Classroom id to join
        #[arg(short, long)]
        room_id: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Room password
        #[arg(short, long)]
        password: String,
    },

    /// Delete a classroom
    Delete {
        /// Classroom id to delete
        #[arg(short, long)]
        room_id: String,
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

    /// Interactive mode - send raw JSON events
    Interactive,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Health => check_health(&cli.server).await,
        Commands::Stats => show_stats(&cli.server).await,
        Commands::List => list_classrooms(&cli.server).await,
        Commands::Create {
            name,
            owner,
            password,
            keep_alive,
        } => create_classroom(&cli.server, name, owner, password, *keep_alive).await,
        Commands::Join {
            room_id,
            name,
            password,
        } => join_classroom(&cli.server, room_id, name, password).await,
        Commands::Delete { room_id } => delete_classroom(&cli.server, room_id).await,
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
        Commands::Interactive => interactive_mode(&cli.server).await,
    }
}

/// One WebSocket connection speaking the classroom protocol
struct Session {
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
    connection_id: String,
}

impl Session {
    async fn open(server: &str) -> Result<Self, String> {
        let url = format!("ws://{}/classroom", server);
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| format!("cannot connect to {}: {}", url, e))?;
        let (write, read) = stream.split();

        let mut session = Self {
            write,
            read,
            connection_id: String::new(),
        };
        match session.next_event().await {
            Some(ServerEvent::Connected(connected)) => {
                session.connection_id = connected.connection_id;
                Ok(session)
            }
            other => Err(format!("expected connected greeting, got {:?}", other)),
        }
    }

    async fn send(&mut self, event: ClientEvent) -> Result<(), String> {
        let text = event.encode().map_err(|e| e.to_string())?;
        self.write
            .send(Message::Text(text))
            .await
            .map_err(|e| e.to_string())
    }

    /// Next classroom event, or None on timeout/close
    async fn next_event(&mut self) -> Option<ServerEvent> {
        loop {
            match timeout(RESPONSE_TIMEOUT, self.read.next()).await {
                Ok(Some(Ok(Message::Text(text)))) => match ServerEvent::decode(&text) {
                    Ok(event) => return Some(event),
                    Err(e) => {
                        println!("{} Undecodable frame ({}): {}", "✗".yellow(), e, text);
                    }
                },
                Ok(Some(Ok(Message::Close(_)))) | Ok(None) | Ok(Some(Err(_))) | Err(_) => {
                    return None
                }
                Ok(Some(Ok(_))) => continue,
            }
        }
    }

    /// Skips events until one matches
    async fn wait_for<T>(&mut self, mut pick: impl FnMut(ServerEvent) -> Option<T>) -> Option<T> {
        while let Some(event) = self.next_event().await {
            if let Some(found) = pick(event) {
                return Some(found);
            }
        }
        None
    }

    async fn fetch_classrooms(&mut self) -> Option<Vec<Room>> {
        self.send(ClientEvent::GetClassrooms).await.ok()?;
        self.wait_for(|e| match e {
            ServerEvent::ClassroomsUpdate(rooms) => Some(rooms),
            _ => None,
        })
        .await
    }

    async fn close(mut self) {
        let _ = self.write.send(Message::Close(None)).await;
    }
}

fn generate_room_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

fn print_event(event: &ServerEvent) {
    match event.encode() {
        Ok(text) => println!("{} {}", "◀".green(), text.bright_white()),
        Err(e) => println!("{} {:?} ({})", "◀".yellow(), event, e),
    }
}

async fn stream_events(session: &mut Session) {
    loop {
        match session.read.next().await {
            Some(Ok(Message::Text(text))) => match ServerEvent::decode(&text) {
                Ok(event) => {
                    print_event(&event);
                    if matches!(
                        event,
                        ServerEvent::ClassroomDeletedNotification | ServerEvent::KickedNotification
                    ) {
                        println!("{} Classroom session ended", "✗".yellow());
                        break;
                    }
                }
                Err(_) => println!("{} {}", "◀".green(), text.bright_white()),
            },
            Some(Ok(Message::Close(_))) | None => {
                println!("{} Server closed the connection", "✗".yellow());
                break;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                println!("{} Connection error: {}", "✗".red(), e);
                break;
            }
        }
    }
}

async fn check_health(server: &str) {
    println!("{}", "Checking server health...".cyan());

    let url = format!("http://{}/classroom/health", server);
    match reqwest::get(&url).await {
        Ok(resp) if resp.status().is_success() => {
            println!("{} Health check passed", "✓".green());
            if let Ok(body) = resp.json::<serde_json::Value>().await {
                println!("  Status: {}", body["status"].as_str().unwrap_or("unknown"));
                println!("  Service: {}", body["service"].as_str().unwrap_or("unknown"));
                println!("  Version: {}", body["version"].as_str().unwrap_or("unknown"));
            }
        }
        Ok(resp) => println!("{} Health check failed: {}", "✗".red(), resp.status()),
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
            println!("  Make sure the server is running on {}", server);
        }
    }
}

async fn show_stats(server: &str) {
    let url = format!("http://{}/classroom/stats", server);
    match reqwest::get(&url).await {
        Ok(resp) if resp.status().is_success() => match resp.json::<serde_json::Value>().await {
            Ok(body) => {
                println!("{}", "Server stats".bold());
                println!("  Classrooms:   {}", body["rooms"]);
                println!("  Connections:  {}", body["connections"]);
                println!("  Participants: {}", body["participants"]);
            }
            Err(e) => println!("{} Invalid stats response: {}", "✗".red(), e),
        },
        Ok(resp) => println!("{} Stats fetch failed: {}", "✗".red(), resp.status()),
        Err(e) => println!("{} Cannot connect to server: {}", "✗".red(), e),
    }
}

async fn list_classrooms(server: &str) {
    let mut session = match Session::open(server).await {
        Ok(session) => session,
        Err(e) => return println!("{} {}", "✗".red(), e),
    };

    match session.fetch_classrooms().await {
        Some(rooms) if rooms.is_empty() => println!("{}", "No classrooms yet".yellow()),
        Some(rooms) => {
            println!("{}", "Classrooms".bold());
            println!("{}", "─".repeat(60));
            for room in rooms {
                println!("  {}  {}  (owner: {})", room.id.cyan(), room.name.bold(), room.owner);
            }
        }
        None => println!("{} No classroom list received", "✗".red()),
    }
    session.close().await;
}

async fn create_classroom(server: &str, name: &str, owner: &str, password: &str, keep_alive: bool) {
    println!("{}", "Creating classroom...".cyan());

    let mut session = match Session::open(server).await {
        Ok(session) => session,
        Err(e) => return println!("{} {}", "✗".red(), e),
    };

    let room = Room {
        id: generate_room_id(),
        name: name.to_string(),
        owner: owner.to_string(),
        pass: password.to_string(),
    };
    let room_id = room.id.clone();

    if let Err(e) = session.send(ClientEvent::CreateClassroom(room)).await {
        return println!("{} Failed to send create-classroom: {}", "✗".red(), e);
    }
    let joined = join_and_confirm(&mut session, &room_id, owner, true).await;
    if !joined {
        return println!("{} Classroom was not created", "✗".red());
    }

    println!("{} Classroom created", "✓".green());
    println!("\n{}", "═".repeat(50).green());
    println!("{} {}", "Classroom ID:".bold(), room_id.green().bold());
    println!("{}", "═".repeat(50).green());

    if keep_alive {
        println!("\n{}", "Owner connection is being kept alive...".yellow());
        println!("Press {} to disconnect and close the classroom.", "Ctrl+C".bold());
        stream_events(&mut session).await;
    } else {
        println!("\n{}", "⚠ Note: the classroom closes with this connection.".yellow());
        println!("Use {} to keep it open.", "--keep-alive".cyan());
        session.close().await;
    }
}

/// Sends join-room and waits for the room data
async fn join_and_confirm(session: &mut Session, room_id: &str, user_name: &str, is_owner: bool) -> bool {
    let join = ClientEvent::JoinRoom(JoinRoom {
        room_id: room_id.to_string(),
        user_name: user_name.to_string(),
        is_owner,
    });
    if session.send(join).await.is_err() {
        return false;
    }
    session
        .wait_for(|e| match e {
            ServerEvent::ClassroomData(data) => Some(data.is_some()),
            _ => None,
        })
        .await
        .unwrap_or(false)
}

async fn join_classroom(server: &str, room_id: &str, name: &str, password: &str) {
    println!("{}", "Joining classroom...".cyan());

    let mut session = match Session::open(server).await {
        Ok(session) => session,
        Err(e) => return println!("{} {}", "✗".red(), e),
    };

    let Some(rooms) = session.fetch_classrooms().await else {
        return println!("{} No classroom list received", "✗".red());
    };
    let Some(room) = rooms.into_iter().find(|r| r.id == room_id) else {
        return println!("{} Classroom {} not found", "✗".red(), room_id);
    };
    if room.pass != password {
        return println!("{} Incorrect password", "✗".red());
    }

    if !join_and_confirm(&mut session, room_id, name, false).await {
        return println!("{} Classroom {} not found", "✗".red(), room_id);
    }
    println!("{} Joined {} as {}", "✓".green(), room.name.bold(), name.cyan());
    println!("  Connection ID: {}", session.connection_id);
    stream_events(&mut session).await;
}

async fn delete_classroom(server: &str, room_id: &str) {
    let mut session = match Session::open(server).await {
        Ok(session) => session,
        Err(e) => return println!("{} {}", "✗".red(), e),
    };

    if let Err(e) = session
        .send(ClientEvent::DeleteClassroom(room_id.to_string()))
        .await
    {
        return println!("{} Failed to send delete-classroom: {}", "✗".red(), e);
    }

    let still_listed = session
        .fetch_classrooms()
        .await
        .map(|rooms| rooms.iter().any(|r| r.id == room_id));
    match still_listed {
        Some(false) => println!("{} Classroom {} deleted", "✓".green(), room_id),
        Some(true) => println!("{} Classroom {} is owned by a live connection", "✗".yellow(), room_id),
        None => println!("{} No confirmation received", "✗".red()),
    }
    session.close().await;
}

const SCENARIOS: &[(&str, &str)] = &[
    ("connection", "Test WebSocket connection and greeting"),
    ("create-list", "Create a classroom and find it in the listing"),
    ("join-roster", "Owner and participant appear on the roster"),
    ("code-relay", "Code changes reach others but not the sender"),
    ("permission", "Permission request/response handshake"),
    ("owner-teardown", "Owner disconnect closes the classroom"),
    ("invalid-room", "Joining an unknown classroom is answered with null"),
];

fn list_scenarios() {
    println!("\n{}", "Available scenarios:".bold());
    for (name, description) in SCENARIOS {
        println!("  {:<16} - {}", name.cyan(), description);
    }
}

async fn run_scenario(server: &str, scenario: &str) {
    let passed = match scenario {
        "connection" => validate_connection(server).await,
        "create-list" => validate_create_list(server).await,
        "join-roster" => validate_join_roster(server).await,
        "code-relay" => validate_code_relay(server).await,
        "permission" => validate_permission(server).await,
        "owner-teardown" => validate_owner_teardown(server).await,
        "invalid-room" => validate_invalid_room(server).await,
        _ => {
            println!("{} Unknown scenario: {}", "✗".red(), scenario);
            list_scenarios();
            return;
        }
    };
    report(scenario, passed);
}

async fn run_all_validations(server: &str) {
    println!("\n{}", "Running All Validations".bold().green());
    println!("{}", "═".repeat(60).green());

    let mut passed = 0;
    for (name, _) in SCENARIOS {
        let ok = match *name {
            "connection" => validate_connection(server).await,
            "create-list" => validate_create_list(server).await,
            "join-roster" => validate_join_roster(server).await,
            "code-relay" => validate_code_relay(server).await,
            "permission" => validate_permission(server).await,
            "owner-teardown" => validate_owner_teardown(server).await,
            _ => validate_invalid_room(server).await,
        };
        report(name, ok);
        if ok {
            passed += 1;
        }
    }

    println!("{}", "═".repeat(60).green());
    let summary = format!("{}/{} scenarios passed", passed, SCENARIOS.len());
    if passed == SCENARIOS.len() {
        println!("{}", summary.green().bold());
    } else {
        println!("{}", summary.red().bold());
    }
}

fn report(name: &str, passed: bool) {
    if passed {
        println!("{} {}", "✓".green(), name);
    } else {
        println!("{} {}", "✗".red(), name);
    }
}

/// Creates a fresh classroom owned by a new session
async fn owned_classroom(server: &str, owner: &str) -> Option<(Session, String)> {
    let mut session = Session::open(server).await.ok()?;
    let room_id = generate_room_id();
    session
        .send(ClientEvent::CreateClassroom(Room {
            id: room_id.clone(),
            name: "Validation".to_string(),
            owner: owner.to_string(),
            pass: "secret".to_string(),
        }))
        .await
        .ok()?;
    join_and_confirm(&mut session, &room_id, owner, true)
        .await
        .then_some((session, room_id))
}

async fn validate_connection(server: &str) -> bool {
    match Session::open(server).await {
        Ok(session) => {
            let ok = !session.connection_id.is_empty();
            session.close().await;
            ok
        }
        Err(e) => {
            println!("  {}", e);
            false
        }
    }
}

async fn validate_create_list(server: &str) -> bool {
    let Some((owner, room_id)) = owned_classroom(server, "Validator").await else {
        return false;
    };
    let Ok(mut browser) = Session::open(server).await else {
        return false;
    };
    let listed = browser
        .fetch_classrooms()
        .await
        .is_some_and(|rooms| rooms.iter().any(|r| r.id == room_id));
    browser.close().await;
    owner.close().await;
    listed
}

async fn validate_join_roster(server: &str) -> bool {
    let Some((owner, room_id)) = owned_classroom(server, "Teacher").await else {
        return false;
    };
    let Ok(mut student) = Session::open(server).await else {
        return false;
    };
    if !join_and_confirm(&mut student, &room_id, "Student", false).await {
        return false;
    }
    let roster_ok = student
        .wait_for(|e| match e {
            ServerEvent::UsersUpdate(roster) => Some(roster),
            _ => None,
        })
        .await
        .is_some_and(|roster| {
            roster.len() == 2
                && roster.iter().any(|p| p.name == "Teacher" && p.is_owner && p.has_permission)
                && roster.iter().any(|p| p.name == "Student" && !p.has_permission)
        });
    student.close().await;
    owner.close().await;
    roster_ok
}

async fn validate_code_relay(server: &str) -> bool {
    let Some((mut owner, room_id)) = owned_classroom(server, "Teacher").await else {
        return false;
    };
    let Ok(mut student) = Session::open(server).await else {
        return false;
    };
    if !join_and_confirm(&mut student, &room_id, "Student", false).await {
        return false;
    }

    let code = "print('relay')".to_string();
    if owner
        .send(ClientEvent::CodeChange(CodeChange {
            room_id: room_id.clone(),
            code: code.clone(),
        }))
        .await
        .is_err()
    {
        return false;
    }
    let received = student
        .wait_for(|e| match e {
            ServerEvent::CodeUpdate(update) => Some(update),
            _ => None,
        })
        .await;

    student.close().await;
    owner.close().await;
    received.as_deref() == Some(code.as_str())
}

async fn validate_permission(server: &str) -> bool {
    let Some((mut owner, room_id)) = owned_classroom(server, "Teacher").await else {
        return false;
    };
    let Ok(mut student) = Session::open(server).await else {
        return false;
    };
    if !join_and_confirm(&mut student, &room_id, "Student", false).await {
        return false;
    }

    let request = ClientEvent::PermissionRequest(PermissionRequest {
        room_id: room_id.clone(),
        student_id: student.connection_id.clone(),
        student_name: "Student".to_string(),
    });
    if student.send(request).await.is_err() {
        return false;
    }
    let Some(student_id) = owner
        .wait_for(|e| match e {
            ServerEvent::PermissionRequestToOwner(request) => Some(request.student_id),
            _ => None,
        })
        .await
    else {
        return false;
    };

    let response = ClientEvent::PermissionResponse(PermissionResponse {
        room_id,
        student_id,
        approved: true,
    });
    if owner.send(response).await.is_err() {
        return false;
    }
    let granted = student
        .wait_for(|e| match e {
            ServerEvent::PermissionResponseFromOwner(response) => Some(response.permission_granted),
            _ => None,
        })
        .await
        .unwrap_or(false);

    student.close().await;
    owner.close().await;
    granted
}

async fn validate_owner_teardown(server: &str) -> bool {
    let Some((owner, room_id)) = owned_classroom(server, "Teacher").await else {
        return false;
    };
    let Ok(mut student) = Session::open(server).await else {
        return false;
    };
    if !join_and_confirm(&mut student, &room_id, "Student", false).await {
        return false;
    }

    owner.close().await;
    let notified = student
        .wait_for(|e| matches!(e, ServerEvent::ClassroomDeletedNotification).then_some(()))
        .await
        .is_some();
    student.close().await;
    notified
}

async fn validate_invalid_room(server: &str) -> bool {
    let Ok(mut session) = Session::open(server).await else {
        return false;
    };
    let found = join_and_confirm(&mut session, "does-not-exist", "Ghost", false).await;
    session.close().await;
    !found
}

async fn interactive_mode(server: &str) {
    println!("\n{}", "Interactive Mode".bold().green());
    println!("{}", "═".repeat(60).green());
    println!("Type {} for help, {} to quit\n", "help".cyan(), "quit".cyan());

    let url = format!("ws://{}/classroom", server);

    match connect_async(url.as_str()).await {
        Ok((ws_stream, _)) => {
            println!("{} Connected to server", "✓".green());

            let (mut write, mut read) = ws_stream.split();

            let receive_task = tokio::spawn(async move {
                while let Some(Ok(msg)) = read.next().await {
                    if let Message::Text(text) = msg {
                        println!("\n{} {}", "◀".green(), text.bright_white());
                    }
                }
            });

            loop {
                print!("{} ", "►".cyan());
                if io::stdout().flush().is_err() {
                    break;
                }

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

                match ClientEvent::decode(input) {
                    Ok(event) => match event.encode() {
                        Ok(text) if write.send(Message::Text(text.clone())).await.is_ok() => {
                            println!("{} {} sent", "✓".green(), event.name());
                        }
                        _ => {
                            println!("{} Failed to send message", "✗".red());
                            break;
                        }
                    },
                    Err(e) => println!("{} Not a classroom event: {}", "✗".yellow(), e),
                }
            }

            receive_task.abort();
        }
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
        }
    }
}

fn print_interactive_help() {
    println!("\n{}", "Interactive Mode Commands".bold());
    println!("{}", "─".repeat(60));
    println!("Send classroom events as JSON.\n");

    println!("{}", "Example Events:".bold());
    println!("\n{}:", "List Classrooms".cyan());
    println!(r#"  {{"event":"get-classrooms"}}"#);

    println!("\n{}:", "Create Classroom".cyan());
    println!(r#"  {{"event":"create-classroom","data":{{"id":"r1","name":"Algo","owner":"Alice","pass":"1234"}}}}"#);

    println!("\n{}:", "Join".cyan());
    println!(r#"  {{"event":"join-room","data":{{"roomId":"r1","userName":"Alice","isOwner":true}}}}"#);

    println!("\n{}:", "Code Change".cyan());
    println!(r#"  {{"event":"code-change","data":{{"roomId":"r1","code":"print(1)"}}}}"#);

    println!("\n{}:", "Permission Request".cyan());
    println!(r#"  {{"event":"permission-request","data":{{"roomId":"r1","studentId":"<id>","studentName":"Bob"}}}}"#);

    println!("\n{}: quit, exit", "Commands".bold());
    println!();
}
