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

//! The per-connection receive loop: maps incoming frames to adapter calls
//! and answers the request/response message types. A malformed frame ends
//! the connection; the sender only ever observes the hangup.

use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;

use silo_core::core::{Block, Transaction};

use crate::msg::{
	self, write_message, BlockList, CatchUpRequest, CatchUpResponse, CatchUpStatus, Hostname,
	PeerList, PeerRequest, RangeRequest, SockAddr, Type,
};
use crate::types::{Error, NetAdapter};

/// Serves one inbound connection until it closes or misbehaves.
pub fn handle_connection(mut conn: TcpStream, adapter: Arc<dyn NetAdapter>) {
	let peer_addr = match conn.peer_addr() {
		Ok(addr) => addr,
		Err(e) => {
			debug!("connection lost before address resolution: {}", e);
			return;
		}
	};
	loop {
		match handle_one(&mut conn, peer_addr, &adapter) {
			Ok(()) => (),
			Err(Error::Connection(e)) => {
				debug!("peer {} connection closed: {}", peer_addr, e);
				return;
			}
			Err(e) => {
				debug!("dropping peer {}: {}", peer_addr, e);
				return;
			}
		}
	}
}

fn handle_one(
	conn: &mut TcpStream,
	peer_addr: SocketAddr,
	adapter: &Arc<dyn NetAdapter>,
) -> Result<(), Error> {
	let header = msg::read_header(conn)?;
	match header.msg_type {
		Type::Block => {
			let b: Block = msg::read_body(&header, conn)?;
			trace!("peer {} sent block {:?}", peer_addr, b.id());
			adapter.block_received(b, Some(peer_addr));
		}
		Type::Transaction => {
			let tx: Transaction = msg::read_body(&header, conn)?;
			adapter.transaction_received(tx);
		}
		Type::BlockRange => {
			let req: RangeRequest = msg::read_body(&header, conn)?;
			let blocks = adapter.blocks_requested(req.start_height as u64);
			write_message(conn, Type::BlockRange, &BlockList { blocks })?;
		}
		Type::CatchUp => {
			let req: CatchUpRequest = msg::read_body(&header, conn)?;
			let resp = match adapter.catch_up_requested(req.known) {
				None => CatchUpResponse {
					status: CatchUpStatus::NoCommonBlock,
					blocks: vec![],
				},
				Some((blocks, more)) => CatchUpResponse {
					status: if more {
						CatchUpStatus::MoreAvailable
					} else {
						CatchUpStatus::Complete
					},
					blocks,
				},
			};
			write_message(conn, Type::CatchUp, &resp)?;
		}
		Type::Hostname => {
			let _: Hostname = msg::read_body(&header, conn)?;
			let echo = Hostname {
				name: peer_addr.to_string(),
			};
			write_message(conn, Type::Hostname, &echo)?;
		}
		Type::PeerRequest => {
			let req: PeerRequest = msg::read_body(&header, conn)?;
			let peers = adapter
				.peers_requested(req.count)
				.into_iter()
				.map(SockAddr)
				.collect();
			write_message(conn, Type::PeerRequest, &PeerList { peers })?;
		}
		Type::Announce => {
			let announced: SockAddr = msg::read_body(&header, conn)?;
			adapter.peer_announced(announced.0);
		}
	}
	Ok(())
}
