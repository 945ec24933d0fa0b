//! WLED UDP realtime protocol support.
//!
//! Frames carry the "DRGB" realtime format: a two byte header followed by one
//! RGB triple per LED, sent fire-and-forget over UDP. Loss tolerance comes
//! from the fixed-rate re-send on the broadcaster side; there is no
//! acknowledgment and no retry.

pub mod net;
pub mod protocol;
pub mod sender;

pub use net::{spawn_target_refresh, subnet_broadcast_targets, RefreshHandle};
pub use protocol::{encode_frame, frame_len, write_header, DEFAULT_PORT, HEADER_LEN, MODE_DRGB};
pub use sender::{Targets, WledSender};
