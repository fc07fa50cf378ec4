//! End-to-end exchanges between a real server and clients over loopback.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ftpx::{Client, DirStore, Error, FileStore, MemoryStore, Server, Session, SessionState};

/// Starts a server that handles exactly one control connection.
fn spawn_server<S>(store: S) -> (SocketAddr, JoinHandle<ftpx::Result<()>>)
where
    S: FileStore + Send + 'static,
{
    let server = Server::bind("127.0.0.1:0", store).unwrap();
    let addr = server.local_addr().unwrap();
    (addr, thread::spawn(move || server.serve_one()))
}

fn store_with(files: &[(&str, &[u8])]) -> MemoryStore {
    let store = MemoryStore::new();
    for (name, content) in files {
        store.write_all(name, content).unwrap();
    }
    store
}

/// Ephemeral listener on loopback plus its port, standing in for a client's
/// data channel.
fn raw_data_listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

#[test]
fn download_existing_file() {
    let (addr, server) = spawn_server(store_with(&[("a.txt", b"hello")]));

    let mut client = Client::connect(addr, MemoryStore::new()).unwrap();
    assert_eq!(client.download("a.txt").unwrap(), 5);
    assert_eq!(client.store().read_all("a.txt").unwrap(), b"hello");

    client.quit().unwrap();
    server.join().unwrap().unwrap();
}

#[test]
fn download_wire_exchange() {
    let (addr, server) = spawn_server(store_with(&[("a.txt", b"hello")]));
    let mut control = TcpStream::connect(addr).unwrap();
    let (data, port) = raw_data_listener();

    ftpx_proto::send(&mut control, format!("get|a.txt|{port}").as_bytes()).unwrap();
    assert_eq!(ftpx_proto::decode(&mut control).unwrap(), b"1");

    let (mut conn, _) = data.accept().unwrap();
    assert_eq!(ftpx_proto::decode(&mut conn).unwrap(), b"hello");

    ftpx_proto::send(&mut control, b"quit").unwrap();
    server.join().unwrap().unwrap();
}

#[test]
fn download_missing_file_opens_no_data_channel() {
    let (addr, server) = spawn_server(MemoryStore::new());
    let mut control = TcpStream::connect(addr).unwrap();
    let (data, port) = raw_data_listener();
    data.set_nonblocking(true).unwrap();

    ftpx_proto::send(&mut control, format!("get|missing.txt|{port}").as_bytes()).unwrap();
    assert_eq!(ftpx_proto::decode(&mut control).unwrap(), b"0");

    ftpx_proto::send(&mut control, b"quit").unwrap();
    server.join().unwrap().unwrap();

    let err = data.accept().unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
}

#[test]
fn download_missing_file_reports_not_found() {
    let (addr, server) = spawn_server(MemoryStore::new());

    let mut client = Client::connect(addr, MemoryStore::new()).unwrap();
    match client.download("missing.txt") {
        Err(Error::NotFound(name)) => assert_eq!(name, "missing.txt"),
        other => panic!("expected NotFound, got {other:?}"),
    }
    assert!(!client.store().exists("missing.txt"));

    client.quit().unwrap();
    server.join().unwrap().unwrap();
}

#[test]
fn upload_stores_file() {
    let server_store = MemoryStore::new();
    let (addr, server) = spawn_server(server_store.clone());

    let mut client = Client::connect(addr, store_with(&[("b.txt", b"world")])).unwrap();
    assert_eq!(client.upload("b.txt").unwrap(), 5);
    client.quit().unwrap();
    server.join().unwrap().unwrap();

    assert_eq!(server_store.read_all("b.txt").unwrap(), b"world");
}

#[test]
fn upload_of_missing_local_file_sends_nothing() {
    let server_store = store_with(&[("x", b"1")]);
    let (addr, server) = spawn_server(server_store.clone());

    let mut client = Client::connect(addr, MemoryStore::new()).unwrap();
    assert!(matches!(
        client.upload("nope.txt"),
        Err(Error::LocalNotFound(_))
    ));
    // The control channel is still in sync.
    assert_eq!(client.list().unwrap(), ["x"]);

    client.quit().unwrap();
    server.join().unwrap().unwrap();
    assert!(!server_store.exists("nope.txt"));
}

#[test]
fn binary_content_survives_both_directions() {
    let content: Vec<u8> = (0..=255).cycle().take(4096).collect();
    let server_store = MemoryStore::new();
    let (addr, server) = spawn_server(server_store.clone());

    let mut uploader = Client::connect(addr, store_with(&[("blob.bin", content.as_slice())])).unwrap();
    uploader.upload("blob.bin").unwrap();
    uploader.quit().unwrap();
    server.join().unwrap().unwrap();
    assert_eq!(server_store.read_all("blob.bin").unwrap(), content);

    let (addr, server) = spawn_server(server_store);
    let mut downloader = Client::connect(addr, MemoryStore::new()).unwrap();
    downloader.download("blob.bin").unwrap();
    assert_eq!(downloader.store().read_all("blob.bin").unwrap(), content);
    downloader.quit().unwrap();
    server.join().unwrap().unwrap();
}

#[test]
fn list_returns_store_names() {
    let (addr, server) = spawn_server(store_with(&[("a.txt", b"1"), ("b.txt", b"2")]));

    let mut client = Client::connect(addr, MemoryStore::new()).unwrap();
    let mut names = client.list().unwrap();
    names.sort();
    assert_eq!(names, ["a.txt", "b.txt"]);

    client.quit().unwrap();
    server.join().unwrap().unwrap();
}

#[test]
fn list_wire_format_is_newline_terminated() {
    let (addr, server) = spawn_server(store_with(&[("only.txt", b"1")]));
    let mut control = TcpStream::connect(addr).unwrap();
    let (data, port) = raw_data_listener();

    ftpx_proto::send(&mut control, format!("ls|{port}").as_bytes()).unwrap();
    let (mut conn, _) = data.accept().unwrap();
    assert_eq!(ftpx_proto::decode(&mut conn).unwrap(), b"only.txt\n");

    ftpx_proto::send(&mut control, b"quit").unwrap();
    server.join().unwrap().unwrap();
}

#[test]
fn empty_store_lists_nothing() {
    let (addr, server) = spawn_server(MemoryStore::new());

    let mut client = Client::connect(addr, MemoryStore::new()).unwrap();
    assert!(client.list().unwrap().is_empty());

    client.quit().unwrap();
    server.join().unwrap().unwrap();
}

#[test]
fn unknown_command_keeps_session_alive() {
    let (addr, server) = spawn_server(store_with(&[("a.txt", b"hello")]));
    let mut control = TcpStream::connect(addr).unwrap();

    ftpx_proto::send(&mut control, b"frobnicate|x").unwrap();
    ftpx_proto::send(&mut control, b"get|a.txt").unwrap();

    let (data, port) = raw_data_listener();
    ftpx_proto::send(&mut control, format!("get|a.txt|{port}").as_bytes()).unwrap();
    assert_eq!(ftpx_proto::decode(&mut control).unwrap(), b"1");
    let (mut conn, _) = data.accept().unwrap();
    assert_eq!(ftpx_proto::decode(&mut conn).unwrap(), b"hello");

    ftpx_proto::send(&mut control, b"quit").unwrap();
    server.join().unwrap().unwrap();
}

#[test]
fn hangup_is_an_implicit_quit() {
    let (addr, server) = spawn_server(MemoryStore::new());
    drop(TcpStream::connect(addr).unwrap());
    server.join().unwrap().unwrap();
}

#[test]
fn malformed_header_ends_session_with_error() {
    let (addr, server) = spawn_server(MemoryStore::new());
    let mut control = TcpStream::connect(addr).unwrap();
    control.write_all(b"not-a-len!").unwrap();

    assert!(matches!(
        server.join().unwrap(),
        Err(Error::Protocol(ftpx_proto::Error::Framing(_)))
    ));
}

#[test]
fn session_states_follow_commands() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let mut control = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
    let (accepted, _) = listener.accept().unwrap();

    let store = MemoryStore::new();
    let mut session = Session::new(accepted, &store, None).unwrap();
    assert_eq!(session.state(), SessionState::Idle);

    ftpx_proto::send(&mut control, b"frobnicate|x").unwrap();
    assert_eq!(session.step().unwrap(), SessionState::Idle);

    ftpx_proto::send(&mut control, b"quit").unwrap();
    assert_eq!(session.step().unwrap(), SessionState::Terminated);

    // Nothing more is read once terminated, even if the peer keeps talking.
    ftpx_proto::send(&mut control, b"quit").unwrap();
    assert_eq!(session.step().unwrap(), SessionState::Terminated);
}

#[test]
fn dir_store_end_to_end() {
    let server_dir = tempfile::tempdir().unwrap();
    let client_dir = tempfile::tempdir().unwrap();
    std::fs::write(server_dir.path().join("report.txt"), b"quarterly").unwrap();
    std::fs::write(client_dir.path().join("notes.txt"), b"todo").unwrap();

    let (addr, server) = spawn_server(DirStore::open(server_dir.path()).unwrap());
    let mut client = Client::connect(addr, DirStore::open(client_dir.path()).unwrap()).unwrap();

    client.download("report.txt").unwrap();
    client.upload("notes.txt").unwrap();
    assert!(matches!(
        client.download("../etc/passwd"),
        Err(Error::NotFound(_))
    ));
    client.quit().unwrap();
    server.join().unwrap().unwrap();

    assert_eq!(
        std::fs::read(client_dir.path().join("report.txt")).unwrap(),
        b"quarterly"
    );
    assert_eq!(
        std::fs::read(server_dir.path().join("notes.txt")).unwrap(),
        b"todo"
    );
}

#[test]
fn upload_peer_that_never_dials_times_out() {
    let server = Server::bind("127.0.0.1:0", MemoryStore::new())
        .unwrap()
        .with_io_timeout(Some(Duration::from_millis(300)));
    let addr = server.local_addr().unwrap();
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        tx.send(server.serve_one()).unwrap();
        server
    });

    let mut control = TcpStream::connect(addr).unwrap();
    ftpx_proto::send(&mut control, b"put|x").unwrap();
    ftpx_proto::parse_port(&ftpx_proto::decode(&mut control).unwrap()).unwrap();
    drop(control);

    // The abandoned upload times out, then the hangup ends the session.
    let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(result.is_ok(), "{result:?}");
    let server = handle.join().unwrap();
    assert!(!server.store().exists("x"));
}

#[test]
fn list_against_silent_server_times_out() {
    let silent = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = silent.local_addr().unwrap();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut client = Client::connect(addr, MemoryStore::new())
            .unwrap()
            .with_io_timeout(Some(Duration::from_millis(300)))
            .unwrap();
        tx.send(client.list()).unwrap();
    });

    // Accept and hold the control connection without ever dialing back.
    let (_held, _) = silent.accept().unwrap();
    match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
        Err(Error::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
        other => panic!("expected a timeout, got {other:?}"),
    }
}

#[test]
fn serve_outlives_failed_sessions_and_queues_connections() {
    let server = Server::bind("127.0.0.1:0", store_with(&[("a.txt", b"hello")])).unwrap();
    let addr = server.local_addr().unwrap();
    // Runs until the test process exits.
    thread::spawn(move || server.serve());

    // A garbage header ends the first session; the server hangs up on it.
    let mut garbage = TcpStream::connect(addr).unwrap();
    garbage.write_all(b"not-a-len!").unwrap();
    garbage
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    assert_eq!(garbage.read(&mut [0u8; 1]).unwrap(), 0);

    let mut client = Client::connect(addr, MemoryStore::new()).unwrap();
    assert_eq!(client.download("a.txt").unwrap(), 5);
    assert_eq!(client.store().read_all("a.txt").unwrap(), b"hello");

    // A third connection is queued, not served, while the second is open.
    let mut waiting = TcpStream::connect(addr).unwrap();
    let (data, port) = raw_data_listener();
    ftpx_proto::send(&mut waiting, format!("get|a.txt|{port}").as_bytes()).unwrap();
    waiting
        .set_read_timeout(Some(Duration::from_millis(200)))
        .unwrap();
    assert!(ftpx_proto::decode(&mut waiting).is_err());

    client.quit().unwrap();
    waiting
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    assert_eq!(ftpx_proto::decode(&mut waiting).unwrap(), b"1");
    let (mut conn, _) = data.accept().unwrap();
    assert_eq!(ftpx_proto::decode(&mut conn).unwrap(), b"hello");
    ftpx_proto::send(&mut waiting, b"quit").unwrap();
}
