//! Data structures and converter functions for AMQP 0-9-1 frames.
//!
//! All the data types are in the `frame` module, the `codec` implements
//! the encoding and the decoding. Decoding never panics: malformed input is
//! reported as a [`FrameError`] wrapped in an `io::Error` of kind `InvalidData`.
pub mod codec;
pub mod frame;


#[macro_use]
extern crate bitflags;

use std::fmt;

/// Type alias for a sync and send error.
pub type Error = Box<dyn std::error::Error + Send + Sync>;
/// Type alias for a simplified Result with Error.
pub type Result<T> = std::result::Result<T, Error>;

/// AMQP reply code of a malformed frame.
pub const FRAME_ERROR: u16 = 501;
/// AMQP reply code of a frame with invalid field values.
pub const SYNTAX_ERROR: u16 = 502;

/// Error struct used by the crate.
#[derive(Debug)]
pub struct FrameError {
    pub code: u16,
    pub message: String,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for FrameError {}

/// Shorthand for making errors with error code and error message.
///
/// ```no_run
/// use rabbitwire_codec::frame_error;
/// use rabbitwire_codec::frame::FieldValue;
///
/// fn as_string(val: FieldValue) -> rabbitwire_codec::Result<String> {
///     if let FieldValue::String(s) = val {
///         return Ok(s);
///     }
///
///     frame_error!(rabbitwire_codec::SYNTAX_ERROR, "Value cannot be converted to string")
/// }
/// ```
#[macro_export]
macro_rules! frame_error {
    ($code:expr, $message:expr) => {
        ::std::result::Result::Err(Box::new($crate::FrameError {
            code: $code,
            message: ::std::string::String::from($message),
        }))
    };
}
