//! Transport collaborators for the control plane.
//!
//! The control plane consumes complete lines and produces complete lines;
//! everything below that (sockets, buffering, terminators) lives here.
//! `TcpLineTransport` is the collaborator the demo daemon ships: a
//! nonblocking TCP listener with newline framing, serving interactive
//! operators over `nc` or `visionctl`.

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

use crate::repl::Transport;

/// Input buffered per client before a terminator must arrive. A client
/// exceeding this is disconnected rather than allowed to grow the buffer.
const MAX_LINE_BYTES: usize = 4096;

struct Client {
    stream: TcpStream,
    buffer: Vec<u8>,
}

/// Newline-framed TCP transport.
///
/// Both the listener and every accepted stream are nonblocking, so
/// `poll_line` returns immediately whether or not bytes arrived; the REPL
/// context polls it between sleeps. Multiple clients may be connected;
/// responses go to the client whose line was polled last.
pub struct TcpLineTransport {
    listener: TcpListener,
    addr: SocketAddr,
    clients: Vec<Client>,
    // Index of the client that produced the last polled line.
    responder: Option<usize>,
}

impl TcpLineTransport {
    pub fn bind(addr: &str) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            addr,
            clients: Vec::new(),
            responder: None,
        })
    }

    /// Address actually bound, useful when the caller asked for port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if stream.set_nonblocking(true).is_err() {
                        continue;
                    }
                    log::info!("control client connected from {peer}");
                    self.clients.push(Client {
                        stream,
                        buffer: Vec::new(),
                    });
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) => {
                    log::warn!("control accept failed: {err}");
                    break;
                }
            }
        }
    }

    /// Pull whatever bytes the client has pending into its line buffer.
    /// Returns false when the client is gone or over the line cap.
    fn fill_client(client: &mut Client) -> bool {
        let mut chunk = [0u8; 256];
        loop {
            match client.stream.read(&mut chunk) {
                Ok(0) => return false,
                Ok(n) => {
                    client.buffer.extend_from_slice(&chunk[..n]);
                    if client.buffer.len() > MAX_LINE_BYTES {
                        log::warn!("control client dropped: line exceeds {MAX_LINE_BYTES} bytes");
                        return false;
                    }
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => return true,
                Err(err) => {
                    log::debug!("control client read failed: {err}");
                    return false;
                }
            }
        }
    }

    fn take_line(client: &mut Client) -> Option<String> {
        let end = client.buffer.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = client.buffer.drain(..=end).collect();
        let mut line = String::from_utf8_lossy(&raw[..end]).into_owned();
        if line.ends_with('\r') {
            line.pop();
        }
        Some(line)
    }
}

impl Transport for TcpLineTransport {
    fn poll_line(&mut self) -> std::io::Result<Option<String>> {
        self.accept_pending();

        let mut index = 0;
        while index < self.clients.len() {
            let alive = Self::fill_client(&mut self.clients[index]);
            if let Some(line) = Self::take_line(&mut self.clients[index]) {
                self.responder = Some(index);
                return Ok(Some(line));
            }
            if alive {
                index += 1;
            } else {
                self.clients.swap_remove(index);
                self.responder = None;
            }
        }
        Ok(None)
    }

    fn send_line(&mut self, line: &str) -> std::io::Result<()> {
        let Some(index) = self.responder else {
            return Ok(());
        };
        let Some(client) = self.clients.get_mut(index) else {
            return Ok(());
        };
        let rendered = format!("{line}\n");
        if let Err(err) = client
            .stream
            .write_all(rendered.as_bytes())
            .and_then(|()| client.stream.flush())
        {
            log::debug!("control client write failed: {err}");
            self.clients.swap_remove(index);
            self.responder = None;
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
