//! Message transport seam
//!
//! The session only needs ordered, reliable delivery of whole messages. Any
//! socket layer can sit behind [`Transport`]; [`LoopbackTransport`] connects
//! two endpoints inside one process.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use super::protocol::{Message, decode, encode};
use crate::error::{Error, Result};

pub trait Transport {
    /// Queue a message for the peer
    fn send(&mut self, message: &Message) -> Result<()>;

    /// Next inbound message without blocking.
    /// `Err(Error::Disconnected)` once the peer is gone and the queue is empty.
    fn poll(&mut self) -> Result<Option<Message>>;
}

/// In-process endpoint. Messages travel as encoded JSON text so the codec is
/// exercised exactly as it would be over a socket.
#[derive(Debug)]
pub struct LoopbackTransport {
    tx: Sender<String>,
    rx: Receiver<String>,
}

impl LoopbackTransport {
    /// Two connected endpoints (host, peer)
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::channel();
        let (b_tx, a_rx) = mpsc::channel();
        (Self { tx: a_tx, rx: a_rx }, Self { tx: b_tx, rx: b_rx })
    }
}

impl Transport for LoopbackTransport {
    fn send(&mut self, message: &Message) -> Result<()> {
        let text = encode(message)?;
        self.tx.send(text).map_err(|_| Error::Disconnected)
    }

    fn poll(&mut self) -> Result<Option<Message>> {
        match self.rx.try_recv() {
            Ok(text) => decode(&text).map(Some),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(Error::Disconnected),
        }
    }
}
