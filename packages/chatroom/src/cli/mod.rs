pub mod chat;

use anyhow::{Context, Result};
use tracing::info;

use chatroom::{ChatClient, ClientConfig, Session, match_session};

fn connect(config: &ClientConfig) -> Result<ChatClient> {
    ChatClient::new(config).with_context(|| format!("Invalid base URL '{}'", config.base_url))
}

pub async fn list_command(config: &ClientConfig, json: bool) -> Result<()> {
    let mut client = connect(config)?;
    let sessions = client.refresh_sessions().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(sessions)?);
    } else {
        print_sessions(sessions);
    }
    Ok(())
}

pub async fn create_command(config: &ClientConfig, name: &str) -> Result<()> {
    let mut client = connect(config)?;
    match client.create_session(name).await? {
        Some(created) => {
            info!(session_id = %created.session_id, "session created");
            println!("Created '{}' ({})", created.name, created.session_id);
        }
        None => println!("Created '{name}'"),
    }

    // Creation does not refresh on its own
    let sessions = client.refresh_sessions().await?;
    print_sessions(sessions);
    Ok(())
}

/// Resolve the target against a fresh session list, then chat until `/quit`
/// or end of input.
pub async fn join_command(config: &ClientConfig, target: &str) -> Result<()> {
    let mut client = connect(config)?;
    let session = resolve_session(&mut client, target).await?;
    chat::run(&mut client, session).await
}

pub(crate) async fn resolve_session(client: &mut ChatClient, target: &str) -> Result<Session> {
    let sessions = client.refresh_sessions().await?;
    Ok(match_session(sessions, target)?.clone())
}

pub(crate) fn print_sessions(sessions: &[Session]) {
    if sessions.is_empty() {
        println!("No sessions.");
        return;
    }
    println!("{:<38} {:<24} {}", "ID", "NAME", "USERS");
    println!("{}", "-".repeat(70));
    for s in sessions {
        println!("{:<38} {:<24} {}", s.session_id, s.name, s.active_users);
    }
    println!("\n{} session(s)", sessions.len());
}
