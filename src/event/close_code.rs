//! WebSocket close status codes

/// Normal closure
pub const NORMAL: u16 = 1000;
/// Endpoint is going away
pub const GOING_AWAY: u16 = 1001;
/// Protocol error
pub const PROTOCOL_ERROR: u16 = 1002;
/// Unsupported data
pub const UNSUPPORTED: u16 = 1003;
/// No status code was present
pub const NO_STATUS: u16 = 1005;
/// Connection dropped without a close frame
pub const ABNORMAL: u16 = 1006;
/// Message too large
pub const TOO_LARGE: u16 = 1009;

/// Longest close reason accepted by `close_with`, in UTF-8 bytes
pub const MAX_REASON_BYTES: usize = 123;

/// Whether application code may close a socket with this code
pub fn is_application_code(code: u16) -> bool {
    code == NORMAL || (3000..=4999).contains(&code)
}

/// Whether a close with this code counts as clean
pub fn is_clean(code: u16) -> bool {
    code == NORMAL || code == NO_STATUS
}
