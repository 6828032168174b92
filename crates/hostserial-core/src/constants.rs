//! Default values shared by the hardware and transport layers.
//!
//! The defaults mirror the behaviour of the adapter firmware this transport
//! was written against: 256-byte queues in each direction, a short connection
//! timeout so the pump keeps polling for hot-plugged devices, and a one second
//! ceiling on a single blocking transmit.
//!
//! # Usage
//!
//! ```
//! use hostserial_core::constants::*;
//! use std::time::Duration;
//!
//! assert_eq!(DEFAULT_BUFFER_SIZE, 256);
//! let transmit = Duration::from_millis(DEFAULT_TRANSMIT_TIMEOUT_MS);
//! assert_eq!(transmit.as_secs(), 1);
//! ```

// ============================================================================
// Buffers
// ============================================================================

/// Capacity in bytes of the TX and RX queues, and of the device's IN/OUT
/// transfer buffers.
pub const DEFAULT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Device Matching
// ============================================================================

/// Wildcard vendor id: matches any attached adapter.
pub const ANY_VID: u16 = 0;

/// Wildcard product id: matches any attached adapter.
pub const ANY_PID: u16 = 0;

// ============================================================================
// Timeouts (milliseconds)
// ============================================================================

/// How long a single open attempt waits for a matching device.
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 10;

/// Upper bound for one blocking transmit on the device.
pub const DEFAULT_TRANSMIT_TIMEOUT_MS: u64 = 1000;

/// How long the pump waits for queued TX bytes before re-checking for detach.
pub const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 10;

/// How long an application write may wait for TX space.
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 1;

/// How long an application read may wait for RX bytes.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1;

/// Pause before and after each open attempt.
pub const DEFAULT_ATTACH_SETTLE_MS: u64 = 10;

/// Ceiling for the backoff between consecutive failed attach attempts.
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 500;

// ============================================================================
// Line Coding
// ============================================================================

/// Baud rate used when none is given.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// The only data width the supported VCP drivers accept.
pub const SUPPORTED_DATA_BITS: u8 = 8;
