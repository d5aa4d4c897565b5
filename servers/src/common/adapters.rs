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

//! Adapters connecting network events to the core. Blocks and transactions
//! go through the dispatcher channels; read-only queries (catch-up
//! serving, block ranges) take the engine lock directly and release it
//! before any bytes hit the wire.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;

use silo_util::{Mutex, OneTime};

use silo_chain::{Chain, MAX_CATCH_UP_BLOCKS};
use silo_core::core::{Block, BlockId, Height, Transaction};
use silo_p2p::{NetAdapter, Peer, Peers};

use crate::core::{BlockChannel, TxnChannel};

/// Implementation of the p2p NetAdapter: gets notified when new blocks and
/// transactions are received, and serves the peer-facing queries.
pub struct NetToCoreAdapter {
	chain: Arc<Mutex<Chain>>,
	block_channel: BlockChannel,
	txn_channel: TxnChannel,
	peers: OneTime<Arc<Peers>>,
}

impl NetToCoreAdapter {
	/// Builds the adapter over the core's channels and engine handle.
	pub fn new(
		chain: Arc<Mutex<Chain>>,
		block_channel: BlockChannel,
		txn_channel: TxnChannel,
	) -> NetToCoreAdapter {
		NetToCoreAdapter {
			chain,
			block_channel,
			txn_channel,
			peers: OneTime::new(),
		}
	}

	/// Wires in the peer directory once the p2p server exists.
	pub fn init_peers(&self, peers: Arc<Peers>) {
		self.peers.init(peers);
	}
}

impl NetAdapter for NetToCoreAdapter {
	fn block_received(&self, b: Block, from: Option<SocketAddr>) {
		self.block_channel.send(b, from);
	}

	fn transaction_received(&self, tx: Transaction) {
		self.txn_channel.send(tx, None);
	}

	fn blocks_requested(&self, start_height: Height) -> Vec<Block> {
		let chain = self.chain.lock();
		let mut blocks = vec![];
		let mut height = start_height;
		while blocks.len() < MAX_CATCH_UP_BLOCKS {
			match chain.block_id_at(height) {
				Some(id) => {
					if let Some(b) = chain.get_block(&id) {
						blocks.push(b.clone());
					}
				}
				None => break,
			}
			height += 1;
		}
		blocks
	}

	fn catch_up_requested(&self, known: Vec<BlockId>) -> Option<(Vec<Block>, bool)> {
		let chain = self.chain.lock();
		chain.blocks_after(&known)
	}

	fn block_id_history(&self) -> Vec<BlockId> {
		let chain = self.chain.lock();
		chain.block_id_history()
	}

	fn peers_requested(&self, count: u8) -> Vec<SocketAddr> {
		if self.peers.is_init() {
			self.peers.borrow().addrs(count as usize)
		} else {
			vec![]
		}
	}

	fn peer_announced(&self, addr: SocketAddr) {
		if !self.peers.is_init() {
			return;
		}
		let peers = self.peers.borrow().clone();
		let _ = thread::Builder::new()
			.name("peer-dial".to_string())
			.spawn(move || match Peer::connect(addr) {
				Ok(peer) => {
					peers.add(peer);
					info!("connected to announced peer {}", addr);
				}
				Err(e) => debug!("announced peer {} unreachable: {}", addr, e),
			});
	}
}
