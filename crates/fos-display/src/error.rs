//! Display bridge errors

use crate::message::ConnectionId;
use std::io;
use thiserror::Error;

/// The shared memory region could not be mapped.
///
/// Fatal to the updater: the connection owner tears it down and the
/// compositor retries with a fresh updater.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("Framebuffer has zero area")]
    EmptySize,

    #[error("Framebuffer size overflows the address space")]
    SizeOverflow,

    #[error("Region holds {available} bytes, framebuffer needs {required}")]
    RegionTooSmall { required: usize, available: usize },

    #[error("Failed to map region: {0}")]
    Io(#[from] io::Error),
}

/// The remote peer issued a call out of sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("Draw requested before a framebuffer was allocated")]
    DrawBeforeAllocate,

    #[error("Draw requested while another draw is outstanding")]
    OverlappingDraw,

    #[error("Framebuffer reallocated while a draw is outstanding")]
    AllocateDuringDraw,
}

/// Errors surfaced by the display bridge
#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    #[error("{0} is no longer the active connection")]
    ConnectionClosed(ConnectionId),

    #[error("Display host is no longer running")]
    HostGone,
}

impl DisplayError {
    /// The protocol violation behind this error, if any
    pub fn violation(&self) -> Option<ProtocolViolation> {
        match self {
            Self::Protocol(violation) => Some(*violation),
            _ => None,
        }
    }
}
