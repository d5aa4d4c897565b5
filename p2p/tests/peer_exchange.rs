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

//! Exchanges over real sockets: broadcast delivery, block range serving
//! and the catch-up request/response.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use silo_core::core::hash::{hash_bytes, Hash};
use silo_core::core::{Block, Transaction};
use silo_p2p::{
	request_blocks, request_catch_up, CatchUpStatus, NetAdapter, P2PConfig, Peer, Server,
};
use silo_util::Mutex;

fn test_block(tag: &[u8], timestamp: i64) -> Block {
	Block::new(hash_bytes(tag), vec![], hash_bytes(b"miner"), timestamp)
}

/// Records what arrives and serves a canned chain.
struct TestAdapter {
	blocks: Mutex<Vec<Block>>,
	transactions: Mutex<Vec<Transaction>>,
	serves: Vec<Block>,
}

impl TestAdapter {
	fn new(serves: Vec<Block>) -> TestAdapter {
		TestAdapter {
			blocks: Mutex::new(vec![]),
			transactions: Mutex::new(vec![]),
			serves,
		}
	}
}

impl NetAdapter for TestAdapter {
	fn block_received(&self, b: Block, _from: Option<SocketAddr>) {
		self.blocks.lock().push(b);
	}
	fn transaction_received(&self, tx: Transaction) {
		self.transactions.lock().push(tx);
	}
	fn blocks_requested(&self, start_height: u64) -> Vec<Block> {
		self.serves
			.iter()
			.skip(start_height as usize)
			.cloned()
			.collect()
	}
	fn catch_up_requested(&self, known: Vec<Hash>) -> Option<(Vec<Block>, bool)> {
		if known.contains(&self.serves[0].id()) {
			Some((self.serves[1..].to_vec(), false))
		} else {
			None
		}
	}
	fn block_id_history(&self) -> Vec<Hash> {
		self.serves.iter().map(|b| b.id()).collect()
	}
	fn peers_requested(&self, _count: u8) -> Vec<SocketAddr> {
		vec![]
	}
	fn peer_announced(&self, _addr: SocketAddr) {}
}

fn wait_until<F: Fn() -> bool>(cond: F) {
	let deadline = Instant::now() + Duration::from_secs(5);
	while !cond() {
		assert!(Instant::now() < deadline, "timed out waiting for delivery");
		thread::sleep(Duration::from_millis(20));
	}
}

fn start_server(adapter: Arc<TestAdapter>) -> (Server, SocketAddr) {
	let config = P2PConfig {
		host: "127.0.0.1".to_string(),
		port: 0,
	};
	let server = Server::new(config, adapter);
	let (addr, _) = server.listen().unwrap();
	(server, addr)
}

#[test]
fn broadcasts_are_delivered() {
	let adapter = Arc::new(TestAdapter::new(vec![test_block(b"g", 0)]));
	let (server, addr) = start_server(adapter.clone());

	let peer = Peer::connect(addr).unwrap();
	let b = test_block(b"new block", 7);
	peer.send_block(&b).unwrap();
	let tx = Transaction {
		arbitrary_data: vec![b"hi".to_vec()],
		inputs: vec![],
		outputs: vec![],
		miner_fees: vec![],
		file_contracts: vec![],
		storage_proofs: vec![],
		signatures: vec![],
	};
	peer.send_transaction(&tx).unwrap();

	wait_until(|| adapter.blocks.lock().len() == 1 && adapter.transactions.lock().len() == 1);
	assert_eq!(adapter.blocks.lock()[0], b);
	assert_eq!(adapter.transactions.lock()[0], tx);
	server.stop();
}

#[test]
fn block_ranges_are_served() {
	let chain: Vec<Block> = (0..5).map(|i| test_block(&[i as u8], i)).collect();
	let adapter = Arc::new(TestAdapter::new(chain.clone()));
	let (server, addr) = start_server(adapter);

	let blocks = request_blocks(addr, 2).unwrap();
	assert_eq!(blocks, chain[2..].to_vec());
	server.stop();
}

#[test]
fn catch_up_exchange() {
	let chain: Vec<Block> = (0..4).map(|i| test_block(&[i as u8], i)).collect();
	let adapter = Arc::new(TestAdapter::new(chain.clone()));
	let (server, addr) = start_server(adapter);

	// a requester that knows genesis gets the rest
	let resp = request_catch_up(addr, vec![chain[0].id()]).unwrap();
	assert_eq!(resp.status, CatchUpStatus::Complete);
	assert_eq!(resp.blocks, chain[1..].to_vec());

	// a stranger gets a clean refusal
	let resp = request_catch_up(addr, vec![hash_bytes(b"who are you")]).unwrap();
	assert_eq!(resp.status, CatchUpStatus::NoCommonBlock);
	assert!(resp.blocks.is_empty());
	server.stop();
}
