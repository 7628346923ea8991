/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

use std::{fmt, io, time::Duration};
use tokio::{self, net::TcpStream, io::{AsyncRead,AsyncReadExt}, time::{sleep,timeout}};
use tokio_util::sync::CancellationToken;
use tracing::{debug,info,warn,error};
use crate::config::PtzConfig;

const READ_CHUNK: usize = 4096;

/// default upper bound for buffered bytes without a line delimiter
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// buffered line splitter for a line-oriented byte stream.
/// Partial lines are kept in the internal buffer until their delimiter arrives with a subsequent read.
/// Lines are delimited by LF, a preceding CR is stripped. Empty lines are skipped.
/// More than `max_len` buffered bytes without a delimiter is a read fault.
pub struct LineReader<R> {
    src: R,
    buf: Vec<u8>,
    max_len: usize,
}

impl<R> LineReader<R> where R: AsyncRead + Unpin {
    pub fn new (src: R)->Self {
        Self::with_max_len( src, MAX_LINE_LEN)
    }

    pub fn with_max_len (src: R, max_len: usize)->Self {
        LineReader { src, buf: Vec::with_capacity( 2*READ_CHUNK), max_len }
    }

    /// the next complete line or `None` if the source reached EOF.
    /// A trailing fragment without delimiter is not returned at EOF, it stays in the buffer
    pub async fn next_line (&mut self)->io::Result<Option<String>> {
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            while let Some(idx) = memchr::memchr( b'\n', &self.buf) {
                let mut line: Vec<u8> = self.buf.drain( ..=idx).collect();
                line.pop(); // '\n'
                if line.last() == Some(&b'\r') { line.pop(); }

                if !line.is_empty() {
                    return Ok( Some( String::from_utf8_lossy( &line).into_owned()))
                }
            }

            let n = self.src.read( &mut chunk).await?; // cancel safe - nothing consumed before completion
            if n == 0 { return Ok(None) }
            self.buf.extend_from_slice( &chunk[..n]);

            if self.buf.len() > self.max_len && memchr::memchr( b'\n', &self.buf).is_none() {
                let len = self.buf.len();
                self.buf.clear();
                return Err( io::Error::new( io::ErrorKind::InvalidData, format!("no line delimiter within {len} bytes")))
            }
        }
    }

    /// bytes received after the last complete line
    pub fn pending (&self)->&[u8] { self.buf.as_slice() }

    pub fn clear (&mut self) { self.buf.clear() }

    pub fn into_inner (self)->R { self.src }
}

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "DISCONNECTED"),
            ConnectionState::Connecting => write!(f, "CONNECTING"),
            ConnectionState::Connected => write!(f, "CONNECTED"),
        }
    }
}

/// the TCP client side of a SBS feed (e.g. dump1090 port 30003).
/// Any socket fault (reset, error, EOF, read timeout) closes the connection and ends the current line
/// sequence - the only way to recover is to `connect()` again.
pub struct SbsReader {
    addr: String,
    read_timeout: Duration,
    reconnect_delay: Duration,
    state: ConnectionState,
    has_nagged: bool, // suppress repeated connect failure logs until the next state change
    lines: Option<LineReader<TcpStream>>,
}

impl SbsReader {
    pub fn new (host: &str, port: u16, read_timeout: Duration, reconnect_delay: Duration)->Self {
        SbsReader {
            addr: format!("{host}:{port}"),
            read_timeout,
            reconnect_delay,
            state: ConnectionState::Disconnected,
            has_nagged: false,
            lines: None
        }
    }

    pub fn from_config (config: &PtzConfig)->Self {
        SbsReader::new( &config.feed_host, config.feed_port, config.read_timeout, config.reconnect_delay)
    }

    pub fn addr (&self)->&str { self.addr.as_str() }
    pub fn state (&self)->ConnectionState { self.state }
    pub fn is_connected (&self)->bool { self.state == ConnectionState::Connected }

    /// make sure we are connected. On failure this waits `reconnect_delay` (or until cancelled) and returns false
    pub async fn connect (&mut self, cancel: &CancellationToken)->bool {
        if self.lines.is_some() { return true }

        self.state = ConnectionState::Connecting;
        if !self.has_nagged { info!("connecting to SBS feed {}", self.addr); }

        let addr = self.addr.clone();
        let res = tokio::select! {
            res = timeout( self.read_timeout, TcpStream::connect( addr.as_str())) => res,
            _ = cancel.cancelled() => {
                self.state = ConnectionState::Disconnected;
                return false
            }
        };

        match res {
            Ok(Ok(stream)) => {
                info!("SBS feed {} connected", self.addr);
                self.lines = Some( LineReader::new( stream));
                self.state = ConnectionState::Connected;
                self.has_nagged = false;
                true
            }
            Ok(Err(e)) => { self.connect_failed( e.to_string(), cancel).await; false }
            Err(_) => { self.connect_failed( "connect timeout".to_string(), cancel).await; false }
        }
    }

    async fn connect_failed (&mut self, reason: String, cancel: &CancellationToken) {
        if !self.has_nagged {
            error!("failed to connect to SBS feed {}, retrying: {}", self.addr, reason);
            self.has_nagged = true;
        }
        self.state = ConnectionState::Disconnected;

        tokio::select! {
            _ = sleep( self.reconnect_delay) => {}
            _ = cancel.cancelled() => {}
        }
    }

    /// next raw SBS line, or `None` if we are not connected or the connection just failed (which closes it)
    pub async fn next_line (&mut self)->Option<String> {
        let lines = self.lines.as_mut()?;

        match timeout( self.read_timeout, lines.next_line()).await {
            Ok(Ok(Some(line))) => Some(line),
            Ok(Ok(None)) => {
                warn!("SBS feed {} closed connection", self.addr);
                self.close();
                None
            }
            Ok(Err(e)) => {
                error!("SBS feed {} socket error: {}", self.addr, e);
                self.close();
                None
            }
            Err(_) => {
                warn!("no data from SBS feed {} within {:?}", self.addr, self.read_timeout);
                self.close();
                None
            }
        }
    }

    /// drop the socket and any buffered partial line
    pub fn close (&mut self) {
        if let Some(lines) = self.lines.take() {
            debug!("discarding {} pending bytes", lines.pending().len());
            info!("closing SBS feed connection {}", self.addr);
        }
        self.state = ConnectionState::Disconnected;
        self.has_nagged = false;
    }
}
