//! Shared harness: spawns a real server on a loopback port and drives it
//! with a blocking FTP client.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use ferroftpd::config::{Config, UserConfig};
use ferroftpd::Server;
use tempfile::TempDir;

pub const TEST_PASSWORD: &str = "secret";

/// Builds a config bound to an ephemeral loopback port with one user whose
/// home is a scratch directory.
pub fn test_config(home: &Path, max_connections: u32) -> Config {
    let mut config = Config::default();
    config.server_name = String::from("testftpd");
    config.connection.bind_address = String::from("127.0.0.1");
    config.connection.bind_port = 0;
    config.connection.max_connections = max_connections;
    // Port zero in the passive range lets the OS pick, so parallel tests
    // never fight over ports.
    config.connection.passive_port_range_start = 0;
    config.connection.passive_port_range_end = 0;
    config.users.push(UserConfig {
        username: String::from("alice"),
        password_hash: bcrypt::hash(TEST_PASSWORD, 4).unwrap(),
        home: home.to_path_buf(),
        permissions: Vec::new(),
        enabled: true,
    });
    config
}

/// Runs the server on its own runtime thread and returns the bound address
/// once it is accepting.
pub fn start_server(config: Config) -> SocketAddr {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let mut server = Server::new(config).unwrap();
            let addr = server.bind().await.unwrap();
            tx.send(addr).unwrap();
            server.serve().await.unwrap();
        });
    });
    rx.recv_timeout(Duration::from_secs(5)).unwrap()
}

/// Creates a scratch home with a known file and starts a fresh server.
pub fn server_with_home() -> (TempDir, PathBuf, SocketAddr) {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("hello.txt"), b"hello, world\n").unwrap();
    let home = dir.path().canonicalize().unwrap();
    let addr = start_server(test_config(&home, 8));
    (dir, home, addr)
}

pub struct TestClient {
    reader: BufReader<TcpStream>,
}

impl TestClient {
    /// Connects and consumes the 220 banner.
    pub fn connect(addr: SocketAddr) -> TestClient {
        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        let mut client = TestClient {
            reader: BufReader::new(stream),
        };
        let banner = client.read_reply();
        assert!(banner.starts_with("220 "), "unexpected banner: {}", banner);
        client
    }

    /// Connects without reading anything (capacity tests).
    pub fn connect_raw(addr: SocketAddr) -> TcpStream {
        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        stream
    }

    /// Reads one reply, following `xyz-` multi-line continuations to the
    /// terminating `xyz ` line. Returns the full text.
    pub fn read_reply(&mut self) -> String {
        let mut first = String::new();
        self.reader.read_line(&mut first).unwrap();
        if first.len() >= 4 && first.as_bytes()[3] == b'-' {
            let code = first[..3].to_string();
            let mut full = first.clone();
            loop {
                let mut line = String::new();
                self.reader.read_line(&mut line).unwrap();
                full.push_str(&line);
                if line.starts_with(&code) && line.as_bytes().get(3) == Some(&b' ') {
                    break;
                }
            }
            return full;
        }
        first
    }

    pub fn cmd(&mut self, line: &str) -> String {
        self.reader
            .get_mut()
            .write_all(format!("{}\r\n", line).as_bytes())
            .unwrap();
        self.read_reply()
    }

    pub fn login(&mut self) {
        let reply = self.cmd("USER alice");
        assert!(reply.starts_with("331 "), "USER: {}", reply);
        let reply = self.cmd(&format!("PASS {}", TEST_PASSWORD));
        assert!(reply.starts_with("230 "), "PASS: {}", reply);
    }

    /// Issues PASV and opens the advertised data connection.
    pub fn open_passive(&mut self) -> TcpStream {
        let reply = self.cmd("PASV");
        assert!(reply.starts_with("227 "), "PASV: {}", reply);
        let addr = parse_pasv_reply(&reply);
        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        stream
    }

    /// Sends a command and reads the preliminary reply only.
    pub fn cmd_expect_preliminary(&mut self, line: &str) -> String {
        let reply = self.cmd(line);
        assert!(reply.starts_with("150 "), "{}: {}", line, reply);
        reply
    }

    pub fn into_stream(self) -> TcpStream {
        self.reader.into_inner()
    }
}

/// Extracts `(h1,h2,h3,h4,p1,p2)` from a 227 reply and rebuilds the
/// socket address.
pub fn parse_pasv_reply(reply: &str) -> SocketAddr {
    let open = reply.find('(').unwrap();
    let close = reply.find(')').unwrap();
    let numbers: Vec<u16> = reply[open + 1..close]
        .split(',')
        .map(|n| n.trim().parse().unwrap())
        .collect();
    assert_eq!(numbers.len(), 6);
    let ip = format!(
        "{}.{}.{}.{}",
        numbers[0], numbers[1], numbers[2], numbers[3]
    );
    let port = numbers[4] * 256 + numbers[5];
    format!("{}:{}", ip, port).parse().unwrap()
}

/// Drains a data connection to EOF.
pub fn read_all(mut stream: TcpStream) -> Vec<u8> {
    let mut out = Vec::new();
    stream.read_to_end(&mut out).unwrap();
    out
}
