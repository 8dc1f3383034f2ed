//! Scripted mock PostgreSQL server for driver tests.
//!
//! Each test spawns a listener thread running an exact message script:
//! read and assert the frontend messages, answer with canned backend
//! frames. Assertion failures drop the socket, which surfaces on the
//! client side as an I/O error instead of a hang.
#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

pub struct Server {
    stream: TcpStream,
}

/// Start a one-connection scripted server; returns its port and handle.
/// Join the handle at the end of the test so script assertions count.
pub fn serve<F>(script: F) -> (u16, JoinHandle<()>)
where
    F: FnOnce(&mut Server) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("local_addr").port();
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept");
        let mut server = Server { stream };
        script(&mut server);
    });
    (port, handle)
}

/// Connection string for a scripted server.
pub fn conn_str(port: u16) -> String {
    format!("host=127.0.0.1 port={port} user=alice password=secret dbname=test")
}

impl Server {
    // === reading frontend messages ===

    /// Read the untagged StartupMessage; returns its parameter pairs.
    pub fn read_startup(&mut self) -> Vec<(String, String)> {
        let mut len_bytes = [0u8; 4];
        self.stream.read_exact(&mut len_bytes).expect("startup length");
        let len = i32::from_be_bytes(len_bytes) as usize;
        let mut payload = vec![0u8; len - 4];
        self.stream.read_exact(&mut payload).expect("startup payload");

        let version = i32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        assert_eq!(version, 196608, "protocol version 3.0");

        let mut params = Vec::new();
        let mut rest = &payload[4..];
        loop {
            let (name, after) = read_cstr(rest);
            if name.is_empty() {
                break;
            }
            let (value, after) = read_cstr(after);
            params.push((name, value));
            rest = after;
        }
        params
    }

    /// Read one tagged message, asserting its tag.
    pub fn expect_message(&mut self, tag: u8) -> Vec<u8> {
        let mut header = [0u8; 5];
        self.stream.read_exact(&mut header).expect("message header");
        assert_eq!(
            header[0] as char, tag as char,
            "expected frontend message {:?}",
            tag as char
        );
        let len = i32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
        let mut payload = vec![0u8; len - 4];
        self.stream.read_exact(&mut payload).expect("message payload");
        payload
    }

    /// Read a Query message and assert its SQL text.
    pub fn expect_query(&mut self, sql: &str) {
        let payload = self.expect_message(b'Q');
        let (text, _) = read_cstr(&payload);
        assert_eq!(text, sql);
    }

    /// Read a Parse message; returns (statement name, sql).
    pub fn expect_parse(&mut self) -> (String, String) {
        let payload = self.expect_message(b'P');
        let (name, rest) = read_cstr(&payload);
        let (sql, _) = read_cstr(rest);
        (name, sql)
    }

    /// Read a Describe message; returns (kind, name).
    pub fn expect_describe(&mut self) -> (u8, String) {
        let payload = self.expect_message(b'D');
        let (name, _) = read_cstr(&payload[1..]);
        (payload[0], name)
    }

    /// Read a Bind message; returns (portal, statement, values).
    pub fn expect_bind(&mut self) -> (String, String, Vec<Option<Vec<u8>>>) {
        let payload = self.expect_message(b'B');
        let (portal, rest) = read_cstr(&payload);
        let (statement, rest) = read_cstr(rest);

        let format_count = i16::from_be_bytes([rest[0], rest[1]]) as usize;
        let rest = &rest[2 + 2 * format_count..];

        let value_count = i16::from_be_bytes([rest[0], rest[1]]) as usize;
        let mut rest = &rest[2..];
        let mut values = Vec::with_capacity(value_count);
        for _ in 0..value_count {
            let len = i32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]);
            rest = &rest[4..];
            if len == -1 {
                values.push(None);
            } else {
                let len = len as usize;
                values.push(Some(rest[..len].to_vec()));
                rest = &rest[len..];
            }
        }
        (portal, statement, values)
    }

    /// Read an Execute message; returns the portal name.
    pub fn expect_execute(&mut self) -> String {
        let payload = self.expect_message(b'E');
        let (portal, _) = read_cstr(&payload);
        portal
    }

    /// Read a Close message; returns (kind, name).
    pub fn expect_close(&mut self) -> (u8, String) {
        let payload = self.expect_message(b'C');
        let (name, _) = read_cstr(&payload[1..]);
        (payload[0], name)
    }

    pub fn expect_sync(&mut self) {
        self.expect_message(b'S');
    }

    pub fn expect_terminate(&mut self) {
        self.expect_message(b'X');
    }

    /// Read a PasswordMessage; returns the password text.
    pub fn expect_password(&mut self) -> String {
        let payload = self.expect_message(b'p');
        let (password, _) = read_cstr(&payload);
        password
    }

    // === sending backend messages ===

    pub fn send(&mut self, tag: u8, payload: &[u8]) {
        let mut frame = Vec::with_capacity(5 + payload.len());
        frame.push(tag);
        frame.extend_from_slice(&((payload.len() + 4) as i32).to_be_bytes());
        frame.extend_from_slice(payload);
        self.stream.write_all(&frame).expect("send frame");
        self.stream.flush().expect("flush");
    }

    pub fn auth_ok(&mut self) {
        self.send(b'R', &0_i32.to_be_bytes());
    }

    pub fn auth_cleartext(&mut self) {
        self.send(b'R', &3_i32.to_be_bytes());
    }

    pub fn auth_md5(&mut self, salt: [u8; 4]) {
        let mut payload = 5_i32.to_be_bytes().to_vec();
        payload.extend_from_slice(&salt);
        self.send(b'R', &payload);
    }

    pub fn auth_unsupported(&mut self, code: i32) {
        self.send(b'R', &code.to_be_bytes());
    }

    pub fn parameter_status(&mut self, name: &str, value: &str) {
        let mut payload = Vec::new();
        push_cstr(&mut payload, name);
        push_cstr(&mut payload, value);
        self.send(b'S', &payload);
    }

    pub fn backend_key(&mut self, pid: u32, secret: u32) {
        let mut payload = pid.to_be_bytes().to_vec();
        payload.extend_from_slice(&secret.to_be_bytes());
        self.send(b'K', &payload);
    }

    pub fn ready(&mut self, status: u8) {
        self.send(b'Z', &[status]);
    }

    /// One text-format column per (name, type oid) pair.
    pub fn row_description(&mut self, columns: &[(&str, u32)]) {
        let mut payload = (columns.len() as u16).to_be_bytes().to_vec();
        for (name, type_oid) in columns {
            push_cstr(&mut payload, name);
            payload.extend_from_slice(&0_u32.to_be_bytes());
            payload.extend_from_slice(&0_i16.to_be_bytes());
            payload.extend_from_slice(&type_oid.to_be_bytes());
            payload.extend_from_slice(&(-1_i16).to_be_bytes());
            payload.extend_from_slice(&(-1_i32).to_be_bytes());
            payload.extend_from_slice(&0_i16.to_be_bytes());
        }
        self.send(b'T', &payload);
    }

    pub fn data_row(&mut self, values: &[Option<&[u8]>]) {
        let mut payload = (values.len() as u16).to_be_bytes().to_vec();
        for value in values {
            match value {
                Some(bytes) => {
                    payload.extend_from_slice(&(bytes.len() as i32).to_be_bytes());
                    payload.extend_from_slice(bytes);
                }
                None => payload.extend_from_slice(&(-1_i32).to_be_bytes()),
            }
        }
        self.send(b'D', &payload);
    }

    pub fn command_complete(&mut self, tag: &str) {
        let mut payload = Vec::new();
        push_cstr(&mut payload, tag);
        self.send(b'C', &payload);
    }

    pub fn empty_query_response(&mut self) {
        self.send(b'I', &[]);
    }

    pub fn error_response(&mut self, severity: &str, code: &str, message: &str) {
        let mut payload = Vec::new();
        payload.push(b'S');
        push_cstr(&mut payload, severity);
        payload.push(b'C');
        push_cstr(&mut payload, code);
        payload.push(b'M');
        push_cstr(&mut payload, message);
        payload.push(0);
        self.send(b'E', &payload);
    }

    pub fn notice(&mut self, message: &str) {
        let mut payload = Vec::new();
        payload.push(b'S');
        push_cstr(&mut payload, "NOTICE");
        payload.push(b'M');
        push_cstr(&mut payload, message);
        payload.push(0);
        self.send(b'N', &payload);
    }

    pub fn notification(&mut self, pid: u32, channel: &str, body: &str) {
        let mut payload = pid.to_be_bytes().to_vec();
        push_cstr(&mut payload, channel);
        push_cstr(&mut payload, body);
        self.send(b'A', &payload);
    }

    pub fn parse_complete(&mut self) {
        self.send(b'1', &[]);
    }

    pub fn bind_complete(&mut self) {
        self.send(b'2', &[]);
    }

    pub fn close_complete(&mut self) {
        self.send(b'3', &[]);
    }

    pub fn parameter_description(&mut self, oids: &[u32]) {
        let mut payload = (oids.len() as i16).to_be_bytes().to_vec();
        for oid in oids {
            payload.extend_from_slice(&oid.to_be_bytes());
        }
        self.send(b't', &payload);
    }

    pub fn no_data(&mut self) {
        self.send(b'n', &[]);
    }

    /// Trust-auth handshake: auth ok, session data, ready.
    pub fn handshake(&mut self) {
        let params = self.read_startup();
        assert!(params.iter().any(|(n, v)| n == "user" && v == "alice"));
        assert!(params.iter().any(|(n, v)| n == "database" && v == "test"));
        self.auth_ok();
        self.parameter_status("server_version", "9.4.0");
        self.parameter_status("client_encoding", "UTF8");
        self.backend_key(4242, 0xCAFE);
        self.ready(b'I');
    }
}

fn read_cstr(data: &[u8]) -> (String, &[u8]) {
    let pos = data.iter().position(|&b| b == 0).expect("nul terminator");
    let s = String::from_utf8(data[..pos].to_vec()).expect("utf-8");
    (s, &data[pos + 1..])
}

fn push_cstr(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}
