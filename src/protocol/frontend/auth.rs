//! Authentication response messages.

use md5::{Digest, Md5};

use crate::protocol::codec::MessageBuilder;

/// Write a PasswordMessage carrying a cleartext or MD5-hashed password.
pub fn write_password(buf: &mut Vec<u8>, password: &str) {
    let mut msg = MessageBuilder::tagged(buf, super::msg_type::PASSWORD);
    msg.write_cstr(password);
    msg.finish();
}

/// Compute the MD5 password response.
///
/// Format: `"md5" || hex(md5(hex(md5(password || user)) || salt))`.
pub fn md5_password(user: &str, password: &str, salt: &[u8; 4]) -> String {
    let mut hasher = Md5::new();
    hasher.update(password.as_bytes());
    hasher.update(user.as_bytes());
    let inner = format!("{:x}", hasher.finalize());

    let mut hasher = Md5::new();
    hasher.update(inner.as_bytes());
    hasher.update(salt);
    format!("md5{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_response_matches_reference() {
        // hex(md5("secretalice")) hashed again with the salt appended.
        let response = md5_password("alice", "secret", &[0x01, 0x02, 0x03, 0x04]);

        let mut hasher = Md5::new();
        hasher.update(b"secretalice");
        let inner = format!("{:x}", hasher.finalize());
        let mut hasher = Md5::new();
        hasher.update(inner.as_bytes());
        hasher.update([0x01, 0x02, 0x03, 0x04]);
        let expected = format!("md5{:x}", hasher.finalize());

        assert_eq!(response, expected);
        assert!(response.starts_with("md5"));
        assert_eq!(response.len(), 3 + 32);
    }

    #[test]
    fn password_message_layout() {
        let mut buf = Vec::new();
        write_password(&mut buf, "hunter2");

        assert_eq!(buf[0], b'p');
        let len = i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
        assert_eq!(len as usize, buf.len() - 1);
        assert_eq!(&buf[5..], b"hunter2\0");
    }
}
