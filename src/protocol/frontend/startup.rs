//! Startup and termination messages.

use crate::protocol::codec::MessageBuilder;

/// Protocol version 3.0 (major 3, minor 0).
pub const PROTOCOL_VERSION_3_0: i32 = 196608;

/// Write a StartupMessage.
///
/// The startup message carries no tag byte. Parameters are (name, value)
/// pairs; `user` is required, `database` and session settings optional.
/// The parameter list ends with an empty key.
pub fn write_startup(buf: &mut Vec<u8>, params: &[(&str, &str)]) {
    let mut msg = MessageBuilder::untagged(buf);
    msg.write_i32(PROTOCOL_VERSION_3_0);

    for (name, value) in params {
        msg.write_cstr(name);
        msg.write_cstr(value);
    }

    msg.write_u8(0);
    msg.finish();
}

/// Write a Terminate message, sent to cleanly close the session.
pub fn write_terminate(buf: &mut Vec<u8>) {
    let msg = MessageBuilder::tagged(buf, super::msg_type::TERMINATE);
    msg.finish();
}
