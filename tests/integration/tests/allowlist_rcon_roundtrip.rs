use std::{
    path::Path,
    sync::{Arc, Mutex as StdMutex},
};

use mcbridge_allowlist::{
    AddOutcome, AllowlistCommands, AllowlistPatterns, Authorizer, CommandError, ProvenanceStore,
    RemoveOutcome, Requester,
};
use mcbridge_config::{parse_settings_with_defaults, AdminRemovalPolicy};
use mcbridge_rcon::{RconClient, RconClientConfig, RconPacket, RconPacketKind};
use serde_json::json;
use tempfile::tempdir;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::Mutex,
    task::JoinHandle,
};

const PASSWORD: &str = "hunter2";
const KNOWN_PLAYERS: [&str; 4] = ["Steve", "Alex", "Notch", "jeb_"];
/// Vanilla servers split response bodies at this many bytes.
const RESPONSE_FRAGMENT_BYTES: usize = 4096;

/// Minimal Minecraft RCON endpoint with a real allowlist behind it.
struct FakeMinecraftServer {
    allowlist: Arc<StdMutex<Vec<String>>>,
    commands: Arc<StdMutex<Vec<String>>>,
    port: u16,
    _accept_loop: JoinHandle<()>,
}

impl FakeMinecraftServer {
    async fn start(initial: &[&str]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let allowlist = Arc::new(StdMutex::new(
            initial.iter().map(|name| name.to_string()).collect::<Vec<_>>(),
        ));
        let commands = Arc::new(StdMutex::new(Vec::new()));
        let accept_loop = {
            let allowlist = allowlist.clone();
            let commands = commands.clone();
            tokio::spawn(async move {
                while let Ok((socket, _)) = listener.accept().await {
                    let allowlist = allowlist.clone();
                    let commands = commands.clone();
                    tokio::spawn(async move {
                        serve_connection(socket, allowlist, commands).await;
                    });
                }
            })
        };
        Self {
            allowlist,
            commands,
            port,
            _accept_loop: accept_loop,
        }
    }

    fn client(&self) -> RconClient {
        RconClient::new(RconClientConfig {
            host: "127.0.0.1".to_string(),
            port: self.port,
            password: PASSWORD.to_string(),
            timeout_ms: 2_000,
        })
    }

    fn operator_adds(&self, name: &str) {
        self.allowlist
            .lock()
            .expect("allowlist")
            .push(name.to_string());
    }

    fn allowlist(&self) -> Vec<String> {
        self.allowlist.lock().expect("allowlist").clone()
    }

    fn commands(&self) -> Vec<String> {
        self.commands.lock().expect("commands").clone()
    }
}

async fn read_frame(socket: &mut TcpStream) -> Option<(i32, String)> {
    let len = socket.read_i32_le().await.ok()? as usize;
    let mut payload = vec![0_u8; len];
    socket.read_exact(&mut payload).await.ok()?;
    let id = i32::from_le_bytes(payload[0..4].try_into().ok()?);
    Some((id, String::from_utf8_lossy(&payload[8..len - 2]).into_owned()))
}

async fn serve_connection(
    mut socket: TcpStream,
    allowlist: Arc<StdMutex<Vec<String>>>,
    commands: Arc<StdMutex<Vec<String>>>,
) {
    let Some((auth_id, password)) = read_frame(&mut socket).await else {
        return;
    };
    let verdict = if password == PASSWORD { auth_id } else { -1 };
    if RconPacket::new(verdict, RconPacketKind::AuthResponse, "")
        .write_to(&mut socket)
        .await
        .is_err()
        || verdict == -1
    {
        return;
    }
    let Some((command_id, command)) = read_frame(&mut socket).await else {
        return;
    };
    let Some((marker_id, _)) = read_frame(&mut socket).await else {
        return;
    };
    commands.lock().expect("commands").push(command.clone());
    let reply = answer(&command, &mut allowlist.lock().expect("allowlist"));
    for chunk in reply.as_bytes().chunks(RESPONSE_FRAGMENT_BYTES) {
        if write_response(&mut socket, command_id, chunk).await.is_err() {
            return;
        }
    }
    let _ = write_response(&mut socket, marker_id, b"Unknown request 0").await;
}

async fn write_response(socket: &mut TcpStream, id: i32, body: &[u8]) -> std::io::Result<()> {
    let mut frame = Vec::with_capacity(body.len() + 14);
    frame.extend_from_slice(&(body.len() as i32 + 10).to_le_bytes());
    frame.extend_from_slice(&id.to_le_bytes());
    frame.extend_from_slice(&0_i32.to_le_bytes());
    frame.extend_from_slice(body);
    frame.extend_from_slice(&[0, 0]);
    socket.write_all(&frame).await
}

fn answer(command: &str, allowlist: &mut Vec<String>) -> String {
    let parts = command.split_whitespace().collect::<Vec<_>>();
    let known = |name: &str| {
        KNOWN_PLAYERS
            .iter()
            .find(|known| known.eq_ignore_ascii_case(name))
            .map(|known| known.to_string())
    };
    match parts.as_slice() {
        ["whitelist", "list"] if allowlist.is_empty() => {
            "There are no whitelisted players".to_string()
        }
        ["whitelist", "list"] => format!(
            "There are {} whitelisted player(s): {}",
            allowlist.len(),
            allowlist.join(", ")
        ),
        ["whitelist", "add", name] => match known(*name) {
            None => "That player does not exist".to_string(),
            Some(canonical) if allowlist.contains(&canonical) => {
                "Player is already whitelisted".to_string()
            }
            Some(canonical) => {
                allowlist.push(canonical.clone());
                format!("Added {canonical} to the whitelist")
            }
        },
        ["whitelist", "remove", name] => match known(*name) {
            None => "That player does not exist".to_string(),
            Some(canonical) if !allowlist.contains(&canonical) => {
                "Player is not whitelisted".to_string()
            }
            Some(canonical) => {
                allowlist.retain(|entry| entry != &canonical);
                format!("Removed {canonical} from the whitelist")
            }
        },
        ["list"] => "There are 1 of a max of 20 players online: Steve".to_string(),
        _ => "Unknown or incomplete command, see below for error".to_string(),
    }
}

fn handlers(path: &Path, server: &FakeMinecraftServer) -> AllowlistCommands {
    let settings = parse_settings_with_defaults("").expect("settings");
    let patterns =
        AllowlistPatterns::compile(&settings.patterns, &settings.responses).expect("patterns");
    AllowlistCommands::new(
        Arc::new(Mutex::new(ProvenanceStore::load(path).expect("store"))),
        Arc::new(server.client()),
        Arc::new(patterns),
        AdminRemovalPolicy::Anyone,
    )
}

fn requester(user_id: u64) -> Requester {
    Requester {
        user_id,
        display_name: format!("member-{user_id}"),
        role_ids: Vec::new(),
    }
}

fn stored(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).expect("read store")).expect("json")
}

#[tokio::test]
async fn integration_add_list_remove_over_rcon_keeps_provenance_consistent() {
    let server = FakeMinecraftServer::start(&["Notch"]).await;
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("whitelist_log.json");
    let handlers = handlers(&path, &server);

    assert_eq!(
        handlers.add(&requester(42), "steve").await.expect("add"),
        AddOutcome::Added {
            player: "Steve".to_string()
        }
    );
    assert_eq!(stored(&path), json!({ "notch": "ADMIN", "steve": 42 }));

    server.operator_adds("Alex");
    let listing = handlers.list().await.expect("list");
    let rows = listing
        .iter()
        .map(|row| (row.player.as_str(), row.authorizer))
        .collect::<Vec<_>>();
    assert_eq!(
        rows,
        vec![
            ("Alex", Authorizer::Admin),
            ("Notch", Authorizer::Admin),
            ("Steve", Authorizer::User(42)),
        ]
    );

    assert!(matches!(
        handlers.remove(&requester(7), "Steve").await.expect("remove"),
        RemoveOutcome::Denied {
            authorizer: Authorizer::User(42),
            ..
        }
    ));
    assert!(server.allowlist().contains(&"Steve".to_string()));

    assert_eq!(
        handlers.remove(&requester(42), "Steve").await.expect("remove"),
        RemoveOutcome::Removed {
            player: "Steve".to_string()
        }
    );
    assert_eq!(stored(&path), json!({ "notch": "ADMIN", "alex": "ADMIN" }));
    assert_eq!(
        server
            .commands()
            .iter()
            .filter(|command| command.starts_with("whitelist remove"))
            .count(),
        1,
        "the denied removal never reached the server"
    );
}

#[tokio::test]
async fn integration_online_roster_reads_provenance_over_rcon() {
    let server = FakeMinecraftServer::start(&["Steve"]).await;
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("whitelist_log.json");
    std::fs::write(&path, r#"{"steve": 42}"#).expect("seed");
    let handlers = handlers(&path, &server);

    let roster = handlers.online().await.expect("online");
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].player, "Steve");
    assert_eq!(roster[0].authorizer, Authorizer::User(42));
    assert_eq!(server.commands(), vec!["list".to_string()]);
}

#[tokio::test]
async fn regression_large_allowlist_keeps_attribution_past_first_response_packet() {
    let names = (0..300)
        .map(|index| format!("player_{index:05}"))
        .collect::<Vec<_>>();
    let initial = names.iter().map(String::as_str).collect::<Vec<_>>();
    let server = FakeMinecraftServer::start(&initial).await;
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("whitelist_log.json");
    std::fs::write(&path, r#"{"player_00000": 7, "player_00299": 42}"#).expect("seed");
    let handlers = handlers(&path, &server);

    let listing = handlers.list().await.expect("list");

    assert_eq!(listing.len(), 300);
    let last = listing.last().expect("last row");
    assert_eq!(last.player, "player_00299");
    assert_eq!(last.authorizer, Authorizer::User(42));
    let persisted = stored(&path);
    let entries = persisted.as_object().expect("object");
    assert_eq!(entries.len(), 300);
    assert_eq!(persisted["player_00000"], json!(7));
    assert_eq!(persisted["player_00299"], json!(42));
    assert_eq!(persisted["player_00150"], json!("ADMIN"));
}

#[tokio::test]
async fn regression_wrong_rcon_password_aborts_without_touching_store() {
    let server = FakeMinecraftServer::start(&["Steve"]).await;
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("whitelist_log.json");
    std::fs::write(&path, r#"{"steve": 42}"#).expect("seed");
    let before = std::fs::read_to_string(&path).expect("read");

    let settings = parse_settings_with_defaults("").expect("settings");
    let handlers = AllowlistCommands::new(
        Arc::new(Mutex::new(ProvenanceStore::load(&path).expect("store"))),
        Arc::new(RconClient::new(RconClientConfig {
            host: "127.0.0.1".to_string(),
            port: server.port,
            password: "wrong".to_string(),
            timeout_ms: 2_000,
        })),
        Arc::new(
            AllowlistPatterns::compile(&settings.patterns, &settings.responses).expect("patterns"),
        ),
        AdminRemovalPolicy::Anyone,
    );

    let error = handlers
        .add(&requester(1), "Alex")
        .await
        .expect_err("auth failure");
    assert!(matches!(error, CommandError::Transport(_)));
    assert_eq!(std::fs::read_to_string(&path).expect("read"), before);
    assert!(server.commands().is_empty());
}
