pub mod api;
pub mod decode;
pub mod memory;
pub mod websocket;
pub mod wire;


pub use api::{GalleryTransport, TransportError};
pub use decode::{decode_frame, DecodeError};
pub use memory::MemoryTransport;
pub use websocket::WebSocketTransport;
pub use wire::{FilterState, OutboundMessage};
