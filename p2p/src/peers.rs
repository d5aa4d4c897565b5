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

//! The peer directory: every peer this node currently broadcasts to, under
//! its own lock, fully independent of the engine lock.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use rand::seq::IteratorRandom;
use rand::thread_rng;

use silo_util::RwLock;

use silo_core::core::{Block, Transaction};

use crate::peer::Peer;

/// All the peers we're connected to.
pub struct Peers {
	peers: RwLock<HashMap<SocketAddr, Arc<Peer>>>,
}

impl Peers {
	/// An empty directory.
	pub fn new() -> Peers {
		Peers {
			peers: RwLock::new(HashMap::new()),
		}
	}

	/// Registers a connected peer.
	pub fn add(&self, peer: Peer) -> Arc<Peer> {
		let peer = Arc::new(peer);
		self.peers.write().insert(peer.addr, peer.clone());
		peer
	}

	/// Drops a peer from the directory.
	pub fn remove(&self, addr: &SocketAddr) {
		self.peers.write().remove(addr);
	}

	/// Number of connected peers.
	pub fn count(&self) -> usize {
		self.peers.read().len()
	}

	/// A uniformly random connected peer, if any.
	pub fn random(&self) -> Option<Arc<Peer>> {
		let peers = self.peers.read();
		peers.values().choose(&mut thread_rng()).cloned()
	}

	/// Up to `count` peer addresses, for the peer discovery exchange.
	pub fn addrs(&self, count: usize) -> Vec<SocketAddr> {
		self.peers.read().keys().take(count).cloned().collect()
	}

	/// Sends a block to every connected peer, optionally skipping the one
	/// it came from. Peers that fail to take the write are dropped.
	pub fn broadcast_block(&self, b: &Block, skip: Option<SocketAddr>) {
		self.broadcast(skip, |peer| peer.send_block(b));
	}

	/// Sends a transaction to every connected peer, optionally skipping the
	/// one it came from.
	pub fn broadcast_transaction(&self, tx: &Transaction, skip: Option<SocketAddr>) {
		self.broadcast(skip, |peer| peer.send_transaction(tx));
	}

	fn broadcast<F>(&self, skip: Option<SocketAddr>, send: F)
	where
		F: Fn(&Peer) -> Result<(), crate::types::Error>,
	{
		let targets: Vec<Arc<Peer>> = {
			let peers = self.peers.read();
			peers
				.values()
				.filter(|p| skip != Some(p.addr))
				.cloned()
				.collect()
		};
		for peer in targets {
			if let Err(e) = send(&peer) {
				debug!("dropping peer {} after failed broadcast: {}", peer.addr, e);
				self.remove(&peer.addr);
			}
		}
	}
}
