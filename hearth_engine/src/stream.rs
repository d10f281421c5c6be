use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use hearth_stream::{
    decode_payload, encode_message, split_messages, Hello, InputCommand, InputMessage,
    MessageKind, SceneSnapshot,
};
use log::{debug, info, warn};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream worker disconnected")]
    Disconnected,
    #[error("message encode failed: {0}")]
    Encode(#[from] hearth_stream::ProtocolError),
}

enum Command {
    Send(Vec<u8>),
    Shutdown,
}

/// Publishes scene snapshots to a single TCP subscriber and collects the
/// input commands it sends back.
///
/// All socket work happens on a background thread; the session only ever
/// sees already-decoded commands through [`StreamServer::drain_inputs`].
pub struct StreamServer {
    sender: Sender<Command>,
    inputs: Receiver<InputCommand>,
    local_addr: SocketAddr,
}

impl StreamServer {
    pub fn bind<A: ToSocketAddrs>(addr: A, build: Option<String>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).context("binding stream socket")?;
        listener
            .set_nonblocking(true)
            .context("setting stream listener non-blocking")?;
        let local_addr = listener
            .local_addr()
            .context("reading stream socket address")?;
        let (tx, rx) = mpsc::channel();
        let (input_tx, input_rx) = mpsc::channel();
        let build_info = build.unwrap_or_else(|| "dev".to_string());
        thread::Builder::new()
            .name("hearth_stream".to_string())
            .spawn(move || worker_loop(listener, rx, input_tx, build_info))
            .context("spawning stream worker thread")?;
        info!("stream: listening on {local_addr}");
        Ok(Self {
            sender: tx,
            inputs: input_rx,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn send_snapshot(&self, snapshot: &SceneSnapshot) -> Result<(), StreamError> {
        let bytes = encode_message(MessageKind::Snapshot, snapshot)?;
        self.sender
            .send(Command::Send(bytes))
            .map_err(|_| StreamError::Disconnected)
    }

    /// Commands received since the last call, in arrival order.
    pub fn drain_inputs(&self) -> Vec<InputCommand> {
        self.inputs.try_iter().collect()
    }
}

impl Drop for StreamServer {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
    }
}

fn worker_loop(
    listener: TcpListener,
    rx: Receiver<Command>,
    inputs: Sender<InputCommand>,
    build_info: String,
) {
    let mut stream: Option<TcpStream> = None;
    let mut pending: Vec<u8> = Vec::new();
    loop {
        match rx.recv_timeout(Duration::from_millis(16)) {
            Ok(Command::Send(buffer)) => {
                if let Some(conn) = stream.as_mut() {
                    if let Err(err) = write_all(conn, &buffer) {
                        warn!("stream: send failed: {err}; waiting for reconnect");
                        stream = None;
                    }
                }
            }
            Ok(Command::Shutdown) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }

        if let Some(conn) = stream.as_mut() {
            if let Err(err) = read_inputs(conn, &mut pending, &inputs) {
                warn!("stream: subscriber dropped: {err}");
                stream = None;
                pending.clear();
            }
        }

        if stream.is_none() {
            match listener.accept() {
                Ok((mut conn, addr)) => {
                    if let Err(err) = configure(&conn) {
                        warn!("stream: failed to configure connection from {addr}: {err}");
                        continue;
                    }
                    match send_hello(&mut conn, &build_info) {
                        Ok(()) => {
                            info!("stream: subscriber connected from {addr}");
                            stream = Some(conn);
                        }
                        Err(err) => warn!("stream: handshake error with {addr}: {err}"),
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
                Err(err) => {
                    warn!("stream: accept error: {err}");
                    thread::sleep(Duration::from_millis(200));
                }
            }
        }
    }
}

fn configure(conn: &TcpStream) -> io::Result<()> {
    conn.set_nodelay(true)?;
    conn.set_nonblocking(true)
}

fn send_hello(stream: &mut TcpStream, build_info: &str) -> io::Result<()> {
    let hello = Hello::new("hearth_engine", Some(build_info.to_string()));
    let message = encode_message(MessageKind::Hello, &hello)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
    write_all(stream, &message)
}

fn read_inputs(
    stream: &mut TcpStream,
    pending: &mut Vec<u8>,
    inputs: &Sender<InputCommand>,
) -> io::Result<()> {
    let mut chunk = [0u8; 4096];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "subscriber closed connection",
                ))
            }
            Ok(read) => pending.extend_from_slice(&chunk[..read]),
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => break,
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }

    let (commands, consumed) = decode_inputs(pending)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    pending.drain(..consumed);
    for command in commands {
        // The session side may already be gone during shutdown.
        let _ = inputs.send(command);
    }
    Ok(())
}

/// Pulls every complete `Input` message out of `buffer`, returning the
/// commands and the number of bytes consumed.
fn decode_inputs(buffer: &[u8]) -> Result<(Vec<InputCommand>, usize), hearth_stream::ProtocolError> {
    let (messages, consumed) = split_messages(buffer)?;
    let mut commands = Vec::new();
    for (header, payload) in messages {
        match header.kind {
            MessageKind::Input => {
                let message: InputMessage = decode_payload(payload)?;
                debug!("stream: input #{} {:?}", message.seq, message.command);
                commands.push(message.command);
            }
            MessageKind::Heartbeat => {}
            other => debug!("stream: ignoring {other:?} from subscriber"),
        }
    }
    Ok((commands, consumed))
}

fn write_all(stream: &mut TcpStream, bytes: &[u8]) -> io::Result<()> {
    let mut offset = 0;
    while offset < bytes.len() {
        match stream.write(&bytes[offset..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "remote closed connection",
                ))
            }
            Ok(written) => offset += written,
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(1));
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_stream::{decode_envelope, Heartbeat, HEADER_LEN};

    fn input(seq: u64, command: InputCommand) -> Vec<u8> {
        encode_message(MessageKind::Input, &InputMessage { seq, command }).expect("encode")
    }

    #[test]
    fn decode_inputs_keeps_partial_tail() {
        let mut buffer = input(0, InputCommand::Confirm);
        buffer.extend(encode_message(MessageKind::Heartbeat, &Heartbeat { seq: 1 }).expect("encode"));
        let second = input(2, InputCommand::SelectDown);
        buffer.extend_from_slice(&second[..HEADER_LEN + 1]);

        let (commands, consumed) = decode_inputs(&buffer).expect("decode");
        assert_eq!(commands, vec![InputCommand::Confirm]);
        assert_eq!(consumed, buffer.len() - HEADER_LEN - 1);
    }

    #[test]
    fn subscriber_receives_hello_and_can_send_input() {
        let server = StreamServer::bind("127.0.0.1:0", Some("test".to_string())).expect("bind");
        let mut client = TcpStream::connect(server.local_addr()).expect("connect");
        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("timeout");

        let mut header = [0u8; HEADER_LEN];
        client.read_exact(&mut header).expect("hello header");
        let length = u32::from_be_bytes([header[8], header[9], header[10], header[11]]) as usize;
        let mut frame = header.to_vec();
        frame.resize(HEADER_LEN + length, 0);
        client.read_exact(&mut frame[HEADER_LEN..]).expect("hello payload");
        let (envelope, payload) = decode_envelope(&frame).expect("envelope");
        assert_eq!(envelope.kind, MessageKind::Hello);
        let hello: Hello = decode_payload(payload).expect("hello");
        assert_eq!(hello.producer, "hearth_engine");

        client
            .write_all(&input(0, InputCommand::MoveLeft))
            .expect("send input");
        let mut received = Vec::new();
        for _ in 0..200 {
            received.extend(server.drain_inputs());
            if !received.is_empty() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(received, vec![InputCommand::MoveLeft]);
    }
}
