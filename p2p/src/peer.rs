// Copyright 2019 The Silo Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A connected peer, plus the short-lived request/response exchanges.
//! Broadcasts ride a persistent connection per peer; requests (block
//! ranges, catch-up, peer discovery) dial a fresh connection, ask, read
//! the answer and hang up.

use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use silo_util::Mutex;

use silo_core::core::hash::Hash;
use silo_core::core::{Block, Transaction};

use crate::msg::{
	self, write_message, BlockList, CatchUpRequest, CatchUpResponse, Hostname, PeerList,
	PeerRequest, RangeRequest, SockAddr, Type,
};
use crate::types::Error;

/// How long a dial may take before the peer is considered unreachable.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(5);
/// Deadline on reads and writes of a single exchange.
pub const IO_TIMEOUT: Duration = Duration::from_secs(10);

/// A peer this node broadcasts to.
pub struct Peer {
	/// The peer's address.
	pub addr: SocketAddr,
	conn: Mutex<TcpStream>,
}

impl Peer {
	/// Dials a peer, with the standard timeouts in place.
	pub fn connect(addr: SocketAddr) -> Result<Peer, Error> {
		let conn = dial(addr)?;
		Ok(Peer {
			addr,
			conn: Mutex::new(conn),
		})
	}

	/// Sends a block broadcast.
	pub fn send_block(&self, b: &Block) -> Result<(), Error> {
		let mut conn = self.conn.lock();
		write_message(&mut *conn, Type::Block, b)
	}

	/// Sends a transaction broadcast.
	pub fn send_transaction(&self, tx: &Transaction) -> Result<(), Error> {
		let mut conn = self.conn.lock();
		write_message(&mut *conn, Type::Transaction, tx)
	}
}

fn dial(addr: SocketAddr) -> Result<TcpStream, Error> {
	let conn = TcpStream::connect_timeout(&addr, DIAL_TIMEOUT)?;
	conn.set_read_timeout(Some(IO_TIMEOUT))?;
	conn.set_write_timeout(Some(IO_TIMEOUT))?;
	Ok(conn)
}

// One request, one response, hang up.
fn exchange<Req, Resp>(addr: SocketAddr, msg_type: Type, req: &Req) -> Result<Resp, Error>
where
	Req: silo_core::ser::Writeable,
	Resp: silo_core::ser::Readable,
{
	let mut conn = dial(addr)?;
	write_message(&mut conn, msg_type, req)?;
	let header = msg::read_header(&mut conn)?;
	if header.msg_type != msg_type {
		return Err(Error::BadMessage);
	}
	msg::read_body(&header, &mut conn)
}

/// Asks a peer for the canonical blocks from `start_height` up.
pub fn request_blocks(addr: SocketAddr, start_height: u32) -> Result<Vec<Block>, Error> {
	let resp: BlockList = exchange(addr, Type::BlockRange, &RangeRequest { start_height })?;
	Ok(resp.blocks)
}

/// Presents our block id history to a peer and gets successors back.
pub fn request_catch_up(addr: SocketAddr, known: Vec<Hash>) -> Result<CatchUpResponse, Error> {
	exchange(addr, Type::CatchUp, &CatchUpRequest { known })
}

/// Asks a peer for up to `count` other peer addresses.
pub fn request_peers(addr: SocketAddr, count: u8) -> Result<Vec<SocketAddr>, Error> {
	let resp: PeerList = exchange(addr, Type::PeerRequest, &PeerRequest { count })?;
	Ok(resp.peers.into_iter().map(|sa| sa.0).collect())
}

/// Asks a peer how our address looks from its side.
pub fn request_hostname(addr: SocketAddr) -> Result<String, Error> {
	let resp: Hostname = exchange(addr, Type::Hostname, &Hostname {
		name: String::new(),
	})?;
	Ok(resp.name)
}

/// Announces our listening address to a peer.
pub fn announce_self(addr: SocketAddr, own_addr: SocketAddr) -> Result<(), Error> {
	let mut conn = dial(addr)?;
	write_message(&mut conn, Type::Announce, &SockAddr(own_addr))
}
