//! Line-oriented operator console.
//!
//! Reads commands from stdin and drives the node. Incoming chats are printed
//! by [`ConsoleFrontend`]. Connection requests the [`ApprovalPolicy`] does
//! not pre-approve are queued to the console loop, which asks the operator
//! and treats the next input line as the y/n answer.

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use peerlink_core::{AddressError, Body, ChatMessage, PeerAddress, WireError};
use peerlink_services::{ApprovalPolicy, Frontend};

use crate::node::Node;

pub const HELP: &str = "\
commands:
  send <host:port> <text>   send a chat message (text \"exit\" leaves)
  connect <host:port>       ask a peer to accept us
  disconnect [host:port]    notify one peer, or every active peer
  reconnect                 repeat the handshake with every active peer
  peers                     list active and previously seen peers
  help                      show this text
  quit                      disconnect everyone and exit
connection requests are answered with y or n when prompted";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send { peer: PeerAddress, body: Body },
    Connect(PeerAddress),
    Disconnect(Option<PeerAddress>),
    Reconnect,
    Peers,
    Help,
    Quit,
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command {0:?}, try \"help\"")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Body(#[from] WireError),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        match verb.to_ascii_lowercase().as_str() {
            "send" => {
                let (peer, text) = rest
                    .split_once(char::is_whitespace)
                    .ok_or(CommandError::Usage("send <host:port> <text>"))?;
                Ok(Command::Send {
                    peer: peer.parse()?,
                    body: Body::new(text.trim())?,
                })
            }
            "connect" if !rest.is_empty() => Ok(Command::Connect(rest.parse()?)),
            "connect" => Err(CommandError::Usage("connect <host:port>")),
            "disconnect" if rest.is_empty() => Ok(Command::Disconnect(None)),
            "disconnect" => Ok(Command::Disconnect(Some(rest.parse()?))),
            "reconnect" => Ok(Command::Reconnect),
            "peers" | "list" => Ok(Command::Peers),
            "help" | "?" => Ok(Command::Help),
            "quit" => Ok(Command::Quit),
            _ => Err(CommandError::Unknown(verb.to_string())),
        }
    }
}

/// A connection request waiting for the operator.
pub struct ApprovalRequest {
    from: PeerAddress,
    reply: std_mpsc::SyncSender<bool>,
}

impl ApprovalRequest {
    pub fn from(&self) -> &PeerAddress {
        &self.from
    }

    /// Deliver the operator's answer. False if the requester stopped waiting.
    pub fn answer(self, accept: bool) -> bool {
        self.reply.try_send(accept).is_ok()
    }
}

/// Frontend that prints to stdout and asks the operator about connection
/// requests the policy does not already permit.
pub struct ConsoleFrontend {
    policy: ApprovalPolicy,
    prompts: mpsc::UnboundedSender<ApprovalRequest>,
    answer_timeout: Duration,
}

impl ConsoleFrontend {
    /// Returns the frontend and the queue of requests to hand to [`run`].
    /// Unanswered requests are rejected after `answer_timeout`.
    pub fn new(
        policy: ApprovalPolicy,
        answer_timeout: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<ApprovalRequest>) {
        let (prompts, requests) = mpsc::unbounded_channel();
        let frontend = Self {
            policy,
            prompts,
            answer_timeout,
        };
        (frontend, requests)
    }

    /// Queue `from` for the operator. None if the console is gone.
    fn ask(&self, from: &PeerAddress) -> Option<std_mpsc::Receiver<bool>> {
        let (reply, answer) = std_mpsc::sync_channel(1);
        let request = ApprovalRequest {
            from: from.clone(),
            reply,
        };
        self.prompts.send(request).ok()?;
        Some(answer)
    }
}

impl Frontend for ConsoleFrontend {
    /// Blocks until the operator answers or the timeout passes.
    fn approve_incoming(&self, from: &PeerAddress) -> bool {
        if self.policy.permits(from) {
            println!("connection request from {from}: accepted by policy");
            return true;
        }

        let Some(answer) = self.ask(from) else {
            tracing::warn!(peer = %from, "console closed, rejecting connection request");
            return false;
        };
        match answer.recv_timeout(self.answer_timeout) {
            Ok(accepted) => accepted,
            Err(e) => {
                println!("connection request from {from}: no answer, rejected");
                tracing::info!(peer = %from, error = %e, "connection request not answered");
                false
            }
        }
    }

    fn display_chat(&self, message: &ChatMessage) {
        println!("{message}");
    }

    fn peer_disconnected(&self, from: &PeerAddress) {
        println!("{from} disconnected");
    }
}

/// Parse an operator's answer to a connection prompt.
pub fn parse_answer(line: &str) -> Option<bool> {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

fn prompt(request: &ApprovalRequest) {
    println!("connection request from {}. Do you accept? (y/n)", request.from);
}

/// Run commands from `input` until `quit` or end of input. While a
/// connection request is pending, the next line answers it instead.
pub async fn run<R>(
    node: &Node,
    input: R,
    mut requests: mpsc::UnboundedReceiver<ApprovalRequest>,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut pending: VecDeque<ApprovalRequest> = VecDeque::new();
    let mut requests_open = true;

    loop {
        tokio::select! {
            // Queued requests go first so an answer never lands on a command.
            biased;

            request = requests.recv(), if requests_open => match request {
                Some(request) => {
                    if pending.is_empty() {
                        prompt(&request);
                    }
                    pending.push_back(request);
                }
                None => requests_open = false,
            },

            line = lines.next_line() => {
                let Some(line) = line? else { break };

                if let Some(request) = pending.pop_front() {
                    match parse_answer(&line) {
                        Some(accept) => {
                            let from = request.from.clone();
                            if !request.answer(accept) {
                                println!("connection request from {from} already expired");
                            }
                            if let Some(next) = pending.front() {
                                prompt(next);
                            }
                        }
                        None => {
                            println!("please answer y or n");
                            pending.push_front(request);
                        }
                    }
                    continue;
                }

                if line.trim().is_empty() {
                    continue;
                }
                let command = match line.parse::<Command>() {
                    Ok(c) => c,
                    Err(e) => {
                        println!("{e}");
                        continue;
                    }
                };
                if command == Command::Quit {
                    break;
                }
                execute(node, command).await;
            }
        }
    }
    Ok(())
}

async fn execute(node: &Node, command: Command) {
    match command {
        Command::Send { peer, body } => match node.send_chat(&peer, node.label(), &body).await {
            Ok(ack) => println!("{peer}: {ack}"),
            Err(e) => println!("send failed: {e}"),
        },
        Command::Connect(peer) => match node.send_connect_request(&peer).await {
            Ok(()) => println!("connected to {peer}"),
            Err(e) => println!("{e}"),
        },
        Command::Disconnect(Some(peer)) => match node.disconnect_one(&peer).await {
            Ok(()) => println!("disconnected from {peer}"),
            Err(e) => println!("{peer} removed, notice not delivered: {e}"),
        },
        Command::Disconnect(None) => {
            let outcomes = node.disconnect_all().await;
            if outcomes.is_empty() {
                println!("no active peers");
            }
            for (peer, result) in outcomes {
                match result {
                    Ok(()) => println!("disconnected from {peer}"),
                    Err(e) => println!("{peer} removed, notice not delivered: {e}"),
                }
            }
        }
        Command::Reconnect => {
            let outcomes = node.reconnect_active().await;
            if outcomes.is_empty() {
                println!("no active peers");
            }
            for (peer, result) in outcomes {
                match result {
                    Ok(()) => println!("reconnected to {peer}"),
                    Err(e) => println!("{e}"),
                }
            }
        }
        Command::Peers => print_peers(node),
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
}

fn print_peers(node: &Node) {
    let snapshot = node.list_peers();
    println!("local address: {}", node.local_address());
    if snapshot.active.is_empty() {
        println!("active peers: none");
    } else {
        println!("active peers:");
        for peer in &snapshot.active {
            println!("  {peer}");
        }
    }
    let inactive: Vec<_> = snapshot
        .ever_seen
        .iter()
        .filter(|p| !snapshot.active.contains(p))
        .collect();
    if !inactive.is_empty() {
        println!("previously seen:");
        for peer in inactive {
            println!("  {peer}");
        }
    }
}
