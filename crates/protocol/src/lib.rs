//! Wire types for the dispatch server's Socket.IO order feed.

pub mod constants;
pub mod events;
pub mod orders;
pub mod packet;
pub mod role;

// Re-export primary types for convenience.
pub use constants::DisconnectReason;
pub use events::{InboundEvent, OutboundEvent};
pub use orders::{
    Address, AdminDetails, Contact, CourierDetails, DecodeError, Enrichment, OrderClaim,
    OrderItem, OrderNotification, PaymentMethod, StatusPayload, Zone,
};
pub use packet::{EnginePacket, OpenHandshake, PacketError, SocketPacket};
pub use role::Role;
