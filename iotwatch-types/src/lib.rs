//! # iotwatch-types
//!
//! Wire and identity types shared by the iotwatch crates.
//!
//! The remote dashboard backend reports live device state as a JSON object
//! keyed by device identifier. This crate defines that shape ([`Frame`],
//! [`Reading`]), the request bodies accepted by the command and limits
//! endpoints ([`CommandRequest`], [`LimitsRequest`]), and the session
//! identity handed over by login ([`Identity`], [`Role`]).
//!
//! ## Features
//!
//! - `serde`: JSON (de)serialization of every wire type
//!
//! ## Example
//!
//! ```rust
//! use iotwatch_types::{Frame, Reading};
//!
//! let mut frame = Frame::new();
//! frame.insert(
//!     "kitchen".to_string(),
//!     Reading::builder().temperature(21.5).gas(0.4).build(),
//! );
//!
//! assert_eq!(frame["kitchen"].temperature_or_zero(), 21.5);
//! assert_eq!(frame["kitchen"].humidity_or_zero(), 0.0);
//! ```

mod command;
mod identity;
mod reading;

pub use command::{CommandRequest, DeviceAction, LimitsRequest, ParseActionError};
pub use identity::{Identity, ParseRoleError, Role};
pub use reading::{Frame, Reading, ReadingBuilder, DEFAULT_GAS_THRESHOLD, DEFAULT_TEMP_THRESHOLD};

/// Current wall-clock time as Unix milliseconds.
pub fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
