//! Wire messages (§4.C) and core data types (§3).
use std::io;

use crate::clock::Timestamp;
use crate::wire::{self, Decode, Encode};

/// Network node identifier. Opaque, 32-bit, unique within a run. `0` is
/// reserved to mean "no node" (used as the `new` field of a step-down
/// [`Message::ModeChange`]).
pub type NodeId = u32;

/// Reserved node id meaning "no node" / "nobody".
pub const NO_NODE: NodeId = 0;

/// Monotonically increasing, run-wide-unique message identifier. Used for
/// both request/response correlation and duplicate suppression.
pub type MessageId = u64;

/// An immutable, reference-shared piece of data. Every holder (storage,
/// buffer, a pending response, an in-flight message) owns its own copy of
/// the payload — there is no shared ownership across components, matching
/// the value-type re-architecture in spec §9 ("raw pointer-owned
/// payloads").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataItem {
    /// Globally unique identifier for this item.
    pub id: u64,
    /// Node that originally created the item.
    pub owner: NodeId,
    /// Opaque application payload.
    pub payload: Vec<u8>,
}

impl Encode for DataItem {
    fn encode<W: io::Write + ?Sized>(&self, writer: &mut W) -> Result<usize, io::Error> {
        let mut n = self.id.encode(writer)?;
        n += self.owner.encode(writer)?;
        n += self.payload.encode(writer)?;
        Ok(n)
    }
}

impl Decode for DataItem {
    fn decode<R: io::Read + ?Sized>(reader: &mut R) -> Result<Self, wire::Error> {
        let id = u64::decode(reader)?;
        let owner = NodeId::decode(reader)?;
        let payload = Vec::<u8>::decode(reader)?;

        Ok(Self { id, owner, payload })
    }
}

/// Envelope wrapping every message sent over the network. Fields common to
/// every payload per §4.C: a message id (used for duplicate suppression)
/// and a send-side timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub id: MessageId,
    pub timestamp_ms: u64,
    pub message: Message,
}

impl Encode for Envelope {
    fn encode<W: io::Write + ?Sized>(&self, writer: &mut W) -> Result<usize, io::Error> {
        let mut n = self.id.encode(writer)?;
        n += self.timestamp_ms.encode(writer)?;
        n += self.message.encode(writer)?;
        Ok(n)
    }
}

impl Decode for Envelope {
    fn decode<R: io::Read + ?Sized>(reader: &mut R) -> Result<Self, wire::Error> {
        let id = MessageId::decode(reader)?;
        let timestamp_ms = u64::decode(reader)?;
        let message = Message::decode(reader)?;

        Ok(Self {
            id,
            timestamp_ms,
            message,
        })
    }
}

/// The tagged union of message payloads (§4.C).
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Neighborhood beacon, hop-limited to `neighborhood_hops`.
    Ping { delivery: f64 },
    /// "I am a replica holder", flooded to the election neighborhood.
    ReplicaAnnounce,
    /// Start an election, flooded to the election neighborhood.
    Election,
    /// Election ballot: the sender's computed fitness.
    Fitness { fitness: f64 },
    /// Role transition notice. `old == new` is a step-up, `new == NO_NODE`
    /// is a step-down, anything else is a handover (§4.I).
    ModeChange { old: NodeId, new: NodeId },
    /// Disseminate an item.
    Store { item: DataItem },
    /// Ask who has `data_id`.
    Request {
        data_id: u64,
        requestor: NodeId,
        sigma: f64,
    },
    /// Answer a [`Message::Request`].
    Response {
        request_id: MessageId,
        item: DataItem,
    },
    /// Hand off the sender's buffer contents to the recipient.
    Transfer { items: Vec<DataItem> },
}

impl Message {
    fn tag(&self) -> u8 {
        match self {
            Self::Ping { .. } => 0,
            Self::ReplicaAnnounce => 1,
            Self::Election => 2,
            Self::Fitness { .. } => 3,
            Self::ModeChange { .. } => 4,
            Self::Store { .. } => 5,
            Self::Request { .. } => 6,
            Self::Response { .. } => 7,
            Self::Transfer { .. } => 8,
        }
    }

    /// The message name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ping { .. } => "Ping",
            Self::ReplicaAnnounce => "ReplicaAnnounce",
            Self::Election => "Election",
            Self::Fitness { .. } => "Fitness",
            Self::ModeChange { .. } => "ModeChange",
            Self::Store { .. } => "Store",
            Self::Request { .. } => "Request",
            Self::Response { .. } => "Response",
            Self::Transfer { .. } => "Transfer",
        }
    }
}

impl Encode for Message {
    fn encode<W: io::Write + ?Sized>(&self, writer: &mut W) -> Result<usize, io::Error> {
        let mut n = self.tag().encode(writer)?;

        match self {
            Self::Ping { delivery } => n += delivery.encode(writer)?,
            Self::ReplicaAnnounce | Self::Election => {}
            Self::Fitness { fitness } => n += fitness.encode(writer)?,
            Self::ModeChange { old, new } => {
                n += old.encode(writer)?;
                n += new.encode(writer)?;
            }
            Self::Store { item } => n += item.encode(writer)?,
            Self::Request {
                data_id,
                requestor,
                sigma,
            } => {
                n += data_id.encode(writer)?;
                n += requestor.encode(writer)?;
                n += sigma.encode(writer)?;
            }
            Self::Response { request_id, item } => {
                n += request_id.encode(writer)?;
                n += item.encode(writer)?;
            }
            Self::Transfer { items } => n += items.encode(writer)?,
        }
        Ok(n)
    }
}

impl Decode for Message {
    fn decode<R: io::Read + ?Sized>(reader: &mut R) -> Result<Self, wire::Error> {
        let tag = u8::decode(reader)?;

        Ok(match tag {
            0 => Self::Ping {
                delivery: f64::decode(reader)?,
            },
            1 => Self::ReplicaAnnounce,
            2 => Self::Election,
            3 => Self::Fitness {
                fitness: f64::decode(reader)?,
            },
            4 => Self::ModeChange {
                old: NodeId::decode(reader)?,
                new: NodeId::decode(reader)?,
            },
            5 => Self::Store {
                item: DataItem::decode(reader)?,
            },
            6 => Self::Request {
                data_id: u64::decode(reader)?,
                requestor: NodeId::decode(reader)?,
                sigma: f64::decode(reader)?,
            },
            7 => Self::Response {
                request_id: MessageId::decode(reader)?,
                item: DataItem::decode(reader)?,
            },
            8 => Self::Transfer {
                items: Vec::<DataItem>::decode(reader)?,
            },
            n => return Err(wire::Error::UnknownTag(n)),
        })
    }
}

/// Used by [`crate::engine::Engine`] to mint message ids. Scoped to a single
/// engine instance rather than the whole process, so that several engines
/// (e.g. in a simulation) don't share a counter (§9).
#[derive(Debug, Default)]
pub struct MessageIdGen(MessageId);

impl MessageIdGen {
    pub fn next(&mut self) -> MessageId {
        self.0 += 1;
        self.0
    }
}

pub(crate) fn envelope(id: MessageId, now_ms: u64, message: Message) -> Envelope {
    Envelope {
        id,
        timestamp_ms: now_ms,
        message,
    }
}
