use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;

use anyhow::Context;

use crate::depot::{Depot, PeerId};
use crate::log_debug;
use crate::net::buffer::MessageBuffer;
use crate::protocol::handlers;
use crate::protocol::message::Command;
use crate::utils::text;

/// Longest wire line framed in one read. Longer input is handed on in
/// chunks, matching the original fixed reader buffer.
pub const MAX_LINE_BYTES: usize = 49;

/// Wire up a freshly established socket as a peer: insert the placeholder
/// entry, start its reader and action workers, and introduce ourselves
/// with an `IM`. Used for both accepted and dialed connections.
pub fn start_peer(depot: &Arc<Depot>, stream: TcpStream) -> anyhow::Result<PeerId> {
    let read_half = stream.try_clone().context("cloning peer socket")?;
    let peer = depot.insert_peer(Some(stream));
    let buffer = Arc::new(MessageBuffer::new());

    let reader = {
        let buffer = Arc::clone(&buffer);
        thread::spawn(move || reader_loop(read_half, &buffer))
    };
    let action = {
        let depot = Arc::clone(depot);
        let buffer = Arc::clone(&buffer);
        thread::spawn(move || action_loop(&depot, peer, &buffer))
    };
    depot.set_peer_workers(peer, reader, action);

    send_im(depot, peer);
    Ok(peer)
}

/// `IM:<own-port>:<own-name>` to a newly connected peer.
fn send_im(depot: &Depot, peer: PeerId) {
    let data = depot.lock();
    let line = format!(
        "IM:{}:{}\n",
        data.self_port().unwrap_or(""),
        data.self_name()
    );
    if let Some(writer) = data.peer(peer).writer.as_ref() {
        let mut writer = writer;
        if let Err(err) = writer.write_all(line.as_bytes()).and_then(|_| writer.flush()) {
            log_debug!("Connection", "failed to introduce ourselves: {err}");
        }
    }
}

/// Reader worker: frame inbound lines and hand each to the action worker
/// through the buffer. Exits on end-of-stream, closing the buffer so the
/// action worker can drain and exit too.
fn reader_loop(stream: TcpStream, buffer: &MessageBuffer) {
    let mut reader = BufReader::new(stream);
    loop {
        match read_limited_line(&mut reader, MAX_LINE_BYTES) {
            Ok(Some(chunk)) => {
                let line = text::strip_trailing_newline(&chunk);
                if !buffer.push(line.to_string()) {
                    log_debug!("Connection", "hand-off buffer full, dropping {line:?}");
                }
            }
            Ok(None) => break,
            Err(err) => {
                log_debug!("Connection", "peer read failed: {err}");
                break;
            }
        }
    }
    buffer.close();
}

/// Action worker: the first popped line must be a valid `IM` identifying
/// the peer, or the worker exits and the peer is silenced for good. After
/// the handshake, every line goes through the protocol decoder.
fn action_loop(depot: &Arc<Depot>, peer: PeerId, buffer: &MessageBuffer) {
    let Some(first) = buffer.pop() else {
        return;
    };
    match Command::parse(&first) {
        Some(Command::Im { port, name }) => depot.set_peer_identity(peer, name, port),
        _ => {
            log_debug!("Connection", "handshake rejected on {first:?}, silencing peer");
            return;
        }
    }

    while let Some(line) = buffer.pop() {
        handlers::dispatch_line(depot, &line);
    }
}

/// Read one line of at most `max` bytes, newline included. A line longer
/// than `max` comes back in chunks; the final chunk carries the newline.
/// Returns None at end of stream.
fn read_limited_line(reader: &mut impl BufRead, max: usize) -> io::Result<Option<String>> {
    let mut bytes = Vec::new();
    while bytes.len() < max {
        let (used, saw_newline) = {
            let available = match reader.fill_buf() {
                Ok(buf) => buf,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            if available.is_empty() {
                break;
            }

            let take = available.len().min(max - bytes.len());
            match available[..take].iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    bytes.extend_from_slice(&available[..=pos]);
                    (pos + 1, true)
                }
                None => {
                    bytes.extend_from_slice(&available[..take]);
                    (take, false)
                }
            }
        };
        reader.consume(used);
        if saw_newline {
            break;
        }
    }

    if bytes.is_empty() {
        Ok(None)
    } else {
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }
}
