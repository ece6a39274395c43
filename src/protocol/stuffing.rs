//! Byte stuffing for the framed octet protocol.
//!
//! A frame on the wire is `SOP | stuffed(payload) | EOP`. Stuffing
//! guarantees that neither delimiter can occur inside a frame body: every
//! payload octet in `0x80..=0x82` is emitted as [`ESC`] followed by the
//! octet minus `0x80`. All other octets are copied verbatim.
//!
//! Both operations are pure; [`encode`] never fails and [`decode`] inverts
//! it exactly for any payload.
//!
//! # Example
//!
//! ```
//! use easywave_rx22::protocol::stuffing;
//!
//! assert_eq!(stuffing::encode(&[0x01, 0x02, 0x03]), [0x81, 0x01, 0x02, 0x03, 0x82]);
//! assert_eq!(stuffing::decode(&[0x80, 0x01, 0x80, 0x02]).unwrap(), [0x81, 0x82]);
//! ```

use crate::error::{Result, Rx22Error};

/// Start-of-packet delimiter.
pub const SOP: u8 = 0x81;
/// End-of-packet delimiter.
pub const EOP: u8 = 0x82;
/// Escape introducer for stuffed octets.
pub const ESC: u8 = 0x80;

/// Highest value that may legally follow [`ESC`].
const MAX_ESCAPED: u8 = 0x02;

/// Frame a payload for the wire.
///
/// The result starts with [`SOP`], ends with [`EOP`] and contains neither
/// delimiter in between. An empty payload is legal and encodes to the bare
/// delimiter pair.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(payload.len() + 2);
    framed.push(SOP);
    for &byte in payload {
        if (ESC..=EOP).contains(&byte) {
            framed.push(ESC);
            framed.push(byte - ESC);
        } else {
            framed.push(byte);
        }
    }
    framed.push(EOP);
    framed
}

/// Unstuff the bytes strictly between [`SOP`] and [`EOP`].
///
/// # Errors
///
/// Returns [`Rx22Error::InvalidEscape`] when [`ESC`] is followed by a byte
/// greater than `0x02`, or is the last byte of the input.
pub fn decode(stuffed: &[u8]) -> Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(stuffed.len());
    let mut i = 0;
    while i < stuffed.len() {
        let byte = stuffed[i];
        if byte == ESC {
            let Some(&escaped) = stuffed.get(i + 1) else {
                return Err(Rx22Error::InvalidEscape { offset: i });
            };
            if escaped > MAX_ESCAPED {
                return Err(Rx22Error::InvalidEscape { offset: i });
            }
            payload.push(ESC + escaped);
            i += 2;
        } else {
            payload.push(byte);
            i += 1;
        }
    }
    Ok(payload)
}
