// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! warden-wire: framing and message types shared by the subprocess stdio
//! protocol and the debugging TCP protocol.
//!
//! Wire format: newline-delimited JSON frames. Empty lines are skipped;
//! a frame over the configured cap closes the channel.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod frame;
mod register;
mod session;

pub use frame::{encode_frame, write_frame, FrameReader};
pub use register::{AssetChunkPayload, HandshakePayload, RegisterEventType, RegisterPayload};
pub use session::{ErrorResponse, SessionMessage, SessionMessageType};
