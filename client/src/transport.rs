//! Connection to the match server: framing, type-keyed dispatch and the log
//! of sent commands that rollbacks unwind.

use crate::config::{ClientConfig, Codec};
use crate::error::SyncError;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ClientCommand, Frame, MessageKind, ProtocolError, ServerMessage};
use std::collections::{HashMap, VecDeque};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Sent commands in send order.
///
/// The log is split into an acknowledged prefix and an unacknowledged tail.
/// A rollback acknowledgment moves the split point and returns whatever lay
/// beyond it.
#[derive(Debug)]
pub struct EventLog {
    entries: VecDeque<ClientCommand>,
    /// Length of the acknowledged prefix.
    acknowledged: usize,
    /// Highest sequence confirmed so far.
    watermark: Option<u32>,
    /// Acknowledged entries kept around for inspection.
    retain: usize,
}

impl EventLog {
    pub fn new(retain: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            acknowledged: 0,
            watermark: None,
            retain,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unacknowledged(&self) -> usize {
        self.entries.len() - self.acknowledged
    }

    pub fn sequences(&self) -> Vec<u32> {
        self.entries.iter().map(ClientCommand::sequence).collect()
    }

    pub fn push(&mut self, command: ClientCommand) {
        self.entries.push_back(command);
    }

    /// Cuts the log after `ack` and returns the removed commands, newest first.
    /// Acknowledgments older than one already applied are ignored.
    pub fn truncate_after(&mut self, ack: u32) -> Vec<ClientCommand> {
        if let Some(mark) = self.watermark {
            if ack < mark {
                debug!("Ignoring stale acknowledgment {} (watermark {})", ack, mark);
                return Vec::new();
            }
        }

        let keep = self
            .entries
            .iter()
            .position(|command| command.sequence() > ack)
            .unwrap_or(self.entries.len());
        let tail: Vec<ClientCommand> = self.entries.drain(keep..).collect();

        self.acknowledged = self.entries.len();
        self.watermark = Some(ack);
        while self.acknowledged > self.retain {
            self.entries.pop_front();
            self.acknowledged -= 1;
        }

        tail.into_iter().rev().collect()
    }
}

/// Outbound half of the server connection.
pub struct Transport {
    outbound: mpsc::UnboundedSender<ClientCommand>,
    log: EventLog,
    max_events: usize,
}

impl Transport {
    pub fn new(outbound: mpsc::UnboundedSender<ClientCommand>, max_events: usize) -> Self {
        Self {
            outbound,
            log: EventLog::new(max_events),
            max_events,
        }
    }

    /// Opens the WebSocket and spawns the task that writes outbound frames.
    pub async fn connect(config: &ClientConfig) -> Result<(Transport, Inbound), SyncError> {
        let (socket, _) = connect_async(config.server_url.as_str()).await?;
        info!("Connected to {}", config.server_url);

        let (sink, stream) = socket.split();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(write_frames(sink, rx, config.codec));

        Ok((Transport::new(tx, config.max_events), Inbound { stream }))
    }

    /// Logs and transmits a command. Fails without side effects once
    /// `max_events` commands are waiting for acknowledgment.
    pub fn send(&mut self, command: ClientCommand) -> Result<(), SyncError> {
        let pending = self.log.unacknowledged();
        if pending >= self.max_events {
            warn!(
                "Refusing to send {:?}: {} commands unacknowledged",
                command, pending
            );
            return Err(SyncError::Backpressure {
                pending,
                limit: self.max_events,
            });
        }

        self.outbound
            .send(command.clone())
            .map_err(|_| SyncError::Disconnected)?;
        self.log.push(command);
        Ok(())
    }

    /// Drops every command sent after `server_ack` from the log and returns
    /// them newest first, ready to be undone in that order.
    pub fn rollback(&mut self, server_ack: u32) -> Vec<ClientCommand> {
        let undone = self.log.truncate_after(server_ack);
        if !undone.is_empty() {
            info!(
                "Server accepted up to {}, rolling back {} commands",
                server_ack,
                undone.len()
            );
        }
        undone
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }
}

async fn write_frames(
    mut sink: SplitSink<Socket, Message>,
    mut rx: mpsc::UnboundedReceiver<ClientCommand>,
    codec: Codec,
) {
    while let Some(command) = rx.recv().await {
        let message = match encode(&command, codec) {
            Ok(message) => message,
            Err(e) => {
                error!("Failed to encode {:?}: {}", command, e);
                continue;
            }
        };

        if let Err(e) = sink.send(message).await {
            error!("Failed to send frame: {}", e);
            break;
        }
    }

    if let Err(e) = sink.close().await {
        debug!("Closing socket: {}", e);
    }
}

fn encode(command: &ClientCommand, codec: Codec) -> Result<Message, ProtocolError> {
    match codec {
        Codec::Json => Ok(Message::Text(command.to_json()?)),
        Codec::Bincode => Ok(Message::Binary(command.to_bincode()?)),
    }
}

/// What the inbound half of the connection produced.
#[derive(Debug)]
pub enum InboundEvent {
    Frame(Frame),
    Malformed(ProtocolError),
    Closed { clean: bool, reason: String },
    Failed(SyncError),
}

/// Inbound half of the server connection.
pub struct Inbound {
    stream: SplitStream<Socket>,
}

impl Inbound {
    /// Waits for the next meaningful inbound event. Cancel safe.
    pub async fn next(&mut self) -> InboundEvent {
        loop {
            match self.stream.next().await {
                Some(Ok(message)) => {
                    if let Some(event) = classify(message) {
                        return event;
                    }
                }
                Some(Err(e)) => return InboundEvent::Failed(e.into()),
                None => {
                    return InboundEvent::Closed {
                        clean: false,
                        reason: "connection dropped".to_string(),
                    }
                }
            }
        }
    }
}

fn classify(message: Message) -> Option<InboundEvent> {
    let decoded = match message {
        Message::Text(text) => Frame::from_json(&text),
        Message::Binary(bytes) => Frame::from_bincode(&bytes),
        Message::Close(frame) => {
            return Some(InboundEvent::Closed {
                clean: true,
                reason: frame.map(|f| f.reason.to_string()).unwrap_or_default(),
            })
        }
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => return None,
    };

    Some(match decoded {
        Ok(frame) => InboundEvent::Frame(frame),
        Err(e) => InboundEvent::Malformed(e),
    })
}

/// Handler for one inbound message kind.
pub type Handler<C> =
    Box<dyn FnMut(&mut C, &mut Transport, &ServerMessage) -> Result<(), SyncError>>;

/// Type-keyed dispatch table. Frames are validated once, before any handler
/// runs; handlers of one kind run in subscription order.
pub struct Router<C> {
    handlers: HashMap<MessageKind, Vec<Handler<C>>>,
}

impl<C> Router<C> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn subscribe<F>(&mut self, kind: MessageKind, handler: F)
    where
        F: FnMut(&mut C, &mut Transport, &ServerMessage) -> Result<(), SyncError> + 'static,
    {
        self.handlers.entry(kind).or_default().push(Box::new(handler));
    }

    pub fn dispatch(
        &mut self,
        context: &mut C,
        transport: &mut Transport,
        frame: &Frame,
    ) -> Result<(), SyncError> {
        let kind = MessageKind::from_code(frame.class)
            .ok_or(ProtocolError::UnknownClass(frame.class as u64))?;
        let handlers = self
            .handlers
            .get_mut(&kind)
            .ok_or(ProtocolError::Unhandled(kind))?;
        let message = ServerMessage::decode(kind, &frame.data)?;

        for handler in handlers.iter_mut() {
            handler(context, transport, &message)?;
        }
        Ok(())
    }
}

impl<C> Default for Router<C> {
    fn default() -> Self {
        Self::new()
    }
}
