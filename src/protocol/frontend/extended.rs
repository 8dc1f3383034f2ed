//! Extended query protocol messages.

use crate::protocol::codec::MessageBuilder;
use crate::protocol::types::{FormatCode, Oid};

/// Write a Parse message creating a named prepared statement.
///
/// `param_oids` declares parameter types; OID 0 lets the server infer.
pub fn write_parse(buf: &mut Vec<u8>, name: &str, sql: &str, param_oids: &[Oid]) {
    let mut msg = MessageBuilder::tagged(buf, super::msg_type::PARSE);
    msg.write_cstr(name);
    msg.write_cstr(sql);
    msg.write_i16(param_oids.len() as i16);
    for &oid in param_oids {
        msg.write_i32(oid as i32);
    }
    msg.finish();
}

/// Write a Bind message creating a portal from a prepared statement.
///
/// `values` are the already-encoded parameter bodies, `None` for NULL;
/// `formats` must have one entry per value. `result_formats` may be empty
/// to accept the server default (text) for all result columns.
pub fn write_bind(
    buf: &mut Vec<u8>,
    portal: &str,
    statement: &str,
    formats: &[FormatCode],
    values: &[Option<Vec<u8>>],
    result_formats: &[FormatCode],
) {
    debug_assert_eq!(formats.len(), values.len());

    let mut msg = MessageBuilder::tagged(buf, super::msg_type::BIND);
    msg.write_cstr(portal);
    msg.write_cstr(statement);

    msg.write_i16(formats.len() as i16);
    for &format in formats {
        msg.write_i16(format as i16);
    }

    msg.write_i16(values.len() as i16);
    for value in values {
        msg.write_nullable_bytes(value.as_deref());
    }

    msg.write_i16(result_formats.len() as i16);
    for &format in result_formats {
        msg.write_i16(format as i16);
    }

    msg.finish();
}

/// Write a Describe message for a prepared statement.
///
/// The server answers with ParameterDescription followed by RowDescription
/// or NoData.
pub fn write_describe_statement(buf: &mut Vec<u8>, name: &str) {
    let mut msg = MessageBuilder::tagged(buf, super::msg_type::DESCRIBE);
    msg.write_u8(b'S');
    msg.write_cstr(name);
    msg.finish();
}

/// Write an Execute message running a portal. `max_rows` 0 means all rows.
pub fn write_execute(buf: &mut Vec<u8>, portal: &str, max_rows: i32) {
    let mut msg = MessageBuilder::tagged(buf, super::msg_type::EXECUTE);
    msg.write_cstr(portal);
    msg.write_i32(max_rows);
    msg.finish();
}

/// Write a Close message releasing a prepared statement.
pub fn write_close_statement(buf: &mut Vec<u8>, name: &str) {
    write_close(buf, b'S', name);
}

/// Write a Close message releasing a portal.
pub fn write_close_portal(buf: &mut Vec<u8>, name: &str) {
    write_close(buf, b'P', name);
}

fn write_close(buf: &mut Vec<u8>, kind: u8, name: &str) {
    let mut msg = MessageBuilder::tagged(buf, super::msg_type::CLOSE);
    msg.write_u8(kind);
    msg.write_cstr(name);
    msg.finish();
}

/// Write a Sync message, ending an extended-query request group.
///
/// The server answers the group and finishes with ReadyForQuery.
pub fn write_sync(buf: &mut Vec<u8>) {
    let msg = MessageBuilder::tagged(buf, super::msg_type::SYNC);
    msg.finish();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_layout() {
        let mut buf = Vec::new();
        write_parse(&mut buf, "stmt0", "SELECT $1", &[23]);

        assert_eq!(buf[0], b'P');
        let len = i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
        assert_eq!(len as usize, buf.len() - 1);
        // name, sql, then a one-entry OID list
        assert!(buf[5..].starts_with(b"stmt0\0SELECT $1\0\x00\x01"));
        assert!(buf.ends_with(&23_i32.to_be_bytes()));
    }

    #[test]
    fn bind_encodes_null_as_minus_one() {
        let mut buf = Vec::new();
        write_bind(
            &mut buf,
            "portal0",
            "stmt0",
            &[FormatCode::Text, FormatCode::Text],
            &[Some(b"42".to_vec()), None],
            &[],
        );

        assert_eq!(buf[0], b'B');
        let len = i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
        assert_eq!(len as usize, buf.len() - 1);

        let null_len = (-1_i32).to_be_bytes();
        assert!(buf.windows(4).any(|w| w == null_len));
    }

    #[test]
    fn sync_layout() {
        let mut buf = Vec::new();
        write_sync(&mut buf);
        assert_eq!(buf, [b'S', 0, 0, 0, 4]);
    }

    #[test]
    fn execute_layout() {
        let mut buf = Vec::new();
        write_execute(&mut buf, "portal0", 0);

        assert_eq!(buf[0], b'E');
        let len = i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
        // 4 length + 8 name with nul + 4 max_rows
        assert_eq!(len, 16);
    }

    #[test]
    fn close_kinds() {
        let mut buf = Vec::new();
        write_close_statement(&mut buf, "stmt0");
        assert_eq!(buf[5], b'S');

        buf.clear();
        write_close_portal(&mut buf, "portal0");
        assert_eq!(buf[5], b'P');
    }
}
