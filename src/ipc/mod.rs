//! The daemon/client request protocol.
//!
//! A daemon holds one decoded [Volume](crate::Volume) and serves it to
//! short-lived clients over a Unix stream socket, one connection per
//! request. Each request carries two open file descriptors as ancillary
//! data: slot zero is the error channel, slot one the bulk channel. The
//! daemon replies with a fixed seven-slot status vector on the socket,
//! then streams the requested artifact down the bulk channel; failure
//! detail is plain text on the error channel.
//!
//! The [wire] module defines the message shapes, [fd] the descriptor
//! passing, and [Daemon]/[Client] the two sides of the conversation.

pub mod wire;

#[allow(unsafe_code)]
pub mod fd;

mod client;
mod daemon;

pub use client::Client;
pub use daemon::Daemon;
