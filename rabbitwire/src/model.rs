use rabbitwire_codec::frame;
use std::fmt;

pub type ChannelNumber = frame::Channel;
pub type ClassMethod = frame::ClassMethod;

macro_rules! reply_codes {
    ($(#[$doc:meta])* $name:ident { $($variant:ident = $code:literal => $text:literal,)* }) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        pub enum $name {
            $($variant = $code,)*
        }

        impl $name {
            pub fn from_code(code: u16) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)*
                    _ => None,
                }
            }

            pub fn code(self) -> u16 {
                self as u16
            }

            /// The constant name the broker puts at the start of the reply text.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)*
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} ({})", self.as_str(), self.code())
            }
        }
    };
}

reply_codes! {
    /// Reply codes of connection.close, after them the connection is gone.
    ConnectionError {
        ConnectionForced = 320 => "CONNECTION_FORCED",
        InvalidPath = 402 => "INVALID_PATH",
        AccessRefused = 403 => "ACCESS_REFUSED",
        FrameError = 501 => "FRAME_ERROR",
        SyntaxError = 502 => "SYNTAX_ERROR",
        CommandInvalid = 503 => "COMMAND_INVALID",
        ChannelError = 504 => "CHANNEL_ERROR",
        UnexpectedFrame = 505 => "UNEXPECTED_FRAME",
        ResourceError = 506 => "RESOURCE_ERROR",
        NotAllowed = 530 => "NOT_ALLOWED",
        NotImplemented = 540 => "NOT_IMPLEMENTED",
        InternalError = 541 => "INTERNAL_ERROR",
    }
}

reply_codes! {
    /// Reply codes of channel.close and basic.return.
    ChannelError {
        Success = 200 => "REPLY_SUCCESS",
        ContentTooLarge = 311 => "CONTENT_TOO_LARGE",
        NoRoute = 312 => "NO_ROUTE",
        NoConsumers = 313 => "NO_CONSUMERS",
        AccessRefused = 403 => "ACCESS_REFUSED",
        NotFound = 404 => "NOT_FOUND",
        ResourceLocked = 405 => "RESOURCE_LOCKED",
        PreconditionFailed = 406 => "PRECONDITION_FAILED",
    }
}
