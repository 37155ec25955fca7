//! Data-channel behavior: passive and active transfers, listings, resume,
//! append, and ASCII translation over a real loopback connection.

mod common;

use std::io::Write;
use std::net::TcpListener;

use common::{read_all, server_with_home, TestClient};

#[test]
fn passive_download_round_trips_the_file() {
    let (_guard, _home, addr) = server_with_home();
    let mut client = TestClient::connect(addr);
    client.login();
    assert!(client.cmd("TYPE I").starts_with("200 "));

    let data = client.open_passive();
    client.cmd_expect_preliminary("RETR hello.txt");
    let bytes = read_all(data);
    assert_eq!(bytes, b"hello, world\n");
    assert!(client.read_reply().starts_with("226 "));
}

#[test]
fn stor_then_retr_preserves_bytes_in_image_mode() {
    let (_guard, home, addr) = server_with_home();
    let mut client = TestClient::connect(addr);
    client.login();
    assert!(client.cmd("TYPE I").starts_with("200 "));

    let payload: Vec<u8> = (0..=255u8).cycle().take(70_000).collect();

    let mut data = client.open_passive();
    client.cmd_expect_preliminary("STOR upload.bin");
    data.write_all(&payload).unwrap();
    drop(data);
    assert!(client.read_reply().starts_with("226 "));
    assert_eq!(std::fs::read(home.join("upload.bin")).unwrap(), payload);

    let data = client.open_passive();
    client.cmd_expect_preliminary("RETR upload.bin");
    assert_eq!(read_all(data), payload);
    assert!(client.read_reply().starts_with("226 "));
}

#[test]
fn retr_without_data_setup_gets_425() {
    let (_guard, _home, addr) = server_with_home();
    let mut client = TestClient::connect(addr);
    client.login();
    assert!(client.cmd("TYPE I").starts_with("200 "));

    let reply = client.cmd("RETR hello.txt");
    assert!(reply.starts_with("150 "), "{}", reply);
    assert!(client.read_reply().starts_with("425 "));
}

#[test]
fn retr_of_missing_file_gets_550_without_preliminary() {
    let (_guard, _home, addr) = server_with_home();
    let mut client = TestClient::connect(addr);
    client.login();

    let _data = client.open_passive();
    let reply = client.cmd("RETR nope.txt");
    assert!(reply.starts_with("550 "), "{}", reply);
}

#[test]
fn rest_offset_resumes_a_download() {
    let (_guard, _home, addr) = server_with_home();
    let mut client = TestClient::connect(addr);
    client.login();
    assert!(client.cmd("TYPE I").starts_with("200 "));

    let data = client.open_passive();
    assert!(client.cmd("REST 7").starts_with("350 "));
    client.cmd_expect_preliminary("RETR hello.txt");
    assert_eq!(read_all(data), b"world\n");
    assert!(client.read_reply().starts_with("226 "));

    // The offset was consumed: the next RETR starts from zero.
    let data = client.open_passive();
    client.cmd_expect_preliminary("RETR hello.txt");
    assert_eq!(read_all(data), b"hello, world\n");
    assert!(client.read_reply().starts_with("226 "));
}

#[test]
fn rest_zero_is_identical_to_plain_retr() {
    let (_guard, _home, addr) = server_with_home();
    let mut client = TestClient::connect(addr);
    client.login();
    assert!(client.cmd("TYPE I").starts_with("200 "));

    let data = client.open_passive();
    assert!(client.cmd("REST 0").starts_with("350 "));
    client.cmd_expect_preliminary("RETR hello.txt");
    assert_eq!(read_all(data), b"hello, world\n");
    assert!(client.read_reply().starts_with("226 "));
}

#[test]
fn appe_appends_to_an_existing_file() {
    let (_guard, home, addr) = server_with_home();
    let mut client = TestClient::connect(addr);
    client.login();
    assert!(client.cmd("TYPE I").starts_with("200 "));

    let mut data = client.open_passive();
    client.cmd_expect_preliminary("APPE hello.txt");
    data.write_all(b"more\n").unwrap();
    drop(data);
    assert!(client.read_reply().starts_with("226 "));

    assert_eq!(
        std::fs::read(home.join("hello.txt")).unwrap(),
        b"hello, world\nmore\n"
    );
}

#[test]
fn ascii_upload_rewrites_crlf() {
    let (_guard, home, addr) = server_with_home();
    let mut client = TestClient::connect(addr);
    client.login();
    assert!(client.cmd("TYPE A").starts_with("200 "));

    let mut data = client.open_passive();
    client.cmd_expect_preliminary("STOR notes.txt");
    data.write_all(b"one\r\ntwo\r\n").unwrap();
    drop(data);
    assert!(client.read_reply().starts_with("226 "));

    assert_eq!(std::fs::read(home.join("notes.txt")).unwrap(), b"one\ntwo\n");
}

#[test]
fn ascii_download_emits_crlf() {
    let (_guard, _home, addr) = server_with_home();
    let mut client = TestClient::connect(addr);
    client.login();
    assert!(client.cmd("TYPE A").starts_with("200 "));

    let data = client.open_passive();
    client.cmd_expect_preliminary("RETR hello.txt");
    assert_eq!(read_all(data), b"hello, world\r\n");
    assert!(client.read_reply().starts_with("226 "));
}

#[test]
fn list_produces_long_lines() {
    let (_guard, home, addr) = server_with_home();
    std::fs::create_dir(home.join("docs")).unwrap();
    let mut client = TestClient::connect(addr);
    client.login();

    let data = client.open_passive();
    client.cmd_expect_preliminary("LIST");
    let listing = String::from_utf8(read_all(data)).unwrap();
    assert!(client.read_reply().starts_with("226 "));

    let lines: Vec<&str> = listing.split("\r\n").filter(|l| !l.is_empty()).collect();
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().any(|l| l.starts_with('d') && l.ends_with("docs")));
    assert!(lines.iter().any(|l| l.starts_with('-') && l.ends_with("hello.txt")));
}

#[test]
fn nlst_produces_bare_names() {
    let (_guard, _home, addr) = server_with_home();
    let mut client = TestClient::connect(addr);
    client.login();

    let data = client.open_passive();
    client.cmd_expect_preliminary("NLST");
    let listing = String::from_utf8(read_all(data)).unwrap();
    assert!(client.read_reply().starts_with("226 "));
    assert_eq!(listing, "hello.txt\r\n");
}

#[test]
fn list_of_bad_path_fails_before_the_data_channel() {
    let (_guard, _home, addr) = server_with_home();
    let mut client = TestClient::connect(addr);
    client.login();

    let _data = client.open_passive();
    let reply = client.cmd("LIST nosuchdir");
    assert!(reply.starts_with("550 "), "{}", reply);
}

#[test]
fn active_mode_connects_back_to_the_client() {
    let (_guard, _home, addr) = server_with_home();
    let mut client = TestClient::connect(addr);
    client.login();
    assert!(client.cmd("TYPE I").starts_with("200 "));

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    assert!(port >= 1024, "ephemeral port below 1024");
    let reply = client.cmd(&format!(
        "PORT 127,0,0,1,{},{}",
        port / 256,
        port % 256
    ));
    assert!(reply.starts_with("200 "), "{}", reply);

    client.cmd_expect_preliminary("RETR hello.txt");
    let (data, _) = listener.accept().unwrap();
    assert_eq!(read_all(data), b"hello, world\n");
    assert!(client.read_reply().starts_with("226 "));
}

#[test]
fn new_pasv_discards_prior_setup() {
    let (_guard, _home, addr) = server_with_home();
    let mut client = TestClient::connect(addr);
    client.login();
    assert!(client.cmd("TYPE I").starts_with("200 "));

    // First PASV is superseded; connecting to the second one works.
    let first = client.cmd("PASV");
    assert!(first.starts_with("227 "));
    let data = client.open_passive();
    client.cmd_expect_preliminary("RETR hello.txt");
    assert_eq!(read_all(data), b"hello, world\n");
    assert!(client.read_reply().starts_with("226 "));
}
