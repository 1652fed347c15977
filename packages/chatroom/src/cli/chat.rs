//! Interactive chat loop: stdin lines in, stream events applied as they
//! arrive, new messages and errors printed after each step.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use chatroom::{ChatClient, ClientError, ConnectionState, Message, Session, UserIdentity};

const HELP: &str = "commands: /switch <target>, /sessions, /leave, /dismiss, /quit";

#[derive(Debug, PartialEq, Eq)]
pub enum Input<'a> {
    Empty,
    Text(&'a str),
    Switch(&'a str),
    Sessions,
    Leave,
    Dismiss,
    Quit,
    Unknown(&'a str),
}

pub fn parse_input(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Input::Empty;
    }
    let Some(command) = trimmed.strip_prefix('/') else {
        return Input::Text(line);
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    match (name, arg) {
        ("switch", "") => Input::Unknown(trimmed),
        ("switch", target) => Input::Switch(target),
        ("sessions", _) => Input::Sessions,
        ("leave", _) => Input::Leave,
        ("dismiss", _) => Input::Dismiss,
        ("quit", _) => Input::Quit,
        _ => Input::Unknown(trimmed),
    }
}

pub fn format_message(message: &Message, me: &UserIdentity) -> String {
    let who = if message.is_from(me) {
        "You"
    } else {
        message.sender_id.as_str()
    };
    format!("{who}: {}", message.message)
}

/// What has already been shown, so each render prints only what changed.
#[derive(Default)]
struct ChatView {
    generation: u64,
    printed: u64,
    state: Option<ConnectionState>,
    error: Option<Arc<ClientError>>,
}

impl ChatView {
    fn render(&mut self, client: &ChatClient) {
        let connection = client.connection();

        if self.state != Some(connection.state()) {
            self.state = Some(connection.state());
            let name = connection.session().map(|s| s.name.as_str()).unwrap_or("-");
            eprintln!("[chatroom: {name} {}]", connection.state());
        }

        if self.generation != connection.generation() {
            self.generation = connection.generation();
            self.printed = 0;
        }
        let buffer = connection.messages();
        let unseen = buffer.received().saturating_sub(self.printed);
        if unseen > 0 {
            let skip = buffer.len().saturating_sub(unseen as usize);
            for message in buffer.iter().skip(skip) {
                println!("{}", format_message(message, client.identity()));
            }
            self.printed = buffer.received();
        }

        let current = client.current_error();
        let changed = match (&current, &self.error) {
            (Some(a), Some(b)) => !Arc::ptr_eq(a, b),
            (None, None) => false,
            _ => true,
        };
        if changed {
            if let Some(err) = &current {
                eprintln!("[error: {err}] (/dismiss to clear)");
            }
            self.error = current;
        }
    }
}

pub async fn run(client: &mut ChatClient, session: Session) -> Result<()> {
    eprintln!("[chatroom: you are {}; {HELP}]", client.identity());
    client.select_session(session);

    let mut view = ChatView::default();
    view.render(client);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    debug!("stdin closed");
                    break;
                };
                match parse_input(&line) {
                    Input::Empty => {}
                    // Failures land in the error slot and are rendered below
                    Input::Text(text) => {
                        let _ = client.send(text);
                    }
                    Input::Switch(target) => {
                        match super::resolve_session(client, target).await {
                            Ok(next) => client.select_session(next),
                            Err(e) => eprintln!("[chatroom: {e}]"),
                        }
                    }
                    Input::Sessions => {
                        if client.refresh_sessions().await.is_ok() {
                            super::print_sessions(client.sessions());
                        }
                    }
                    Input::Leave => client.close(),
                    Input::Dismiss => client.dismiss_error(),
                    Input::Quit => break,
                    Input::Unknown(cmd) => eprintln!("[chatroom: unknown command {cmd}; {HELP}]"),
                }
            }
            Some(event) = client.next_event() => {
                client.handle_event(event);
            }
        }
        view.render(client);
    }

    client.close();
    Ok(())
}
