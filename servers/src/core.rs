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

//! The core orchestrator: the only holder of the engine lock. Producers
//! (peers, the miner) hand blocks and transactions to channels; one
//! dispatcher thread drains them in receipt order, runs the engine, and
//! fans the results out to sinks and the network. The engine never does
//! I/O while the lock is held; sink and broadcast work happens after it is
//! released.

use std::net::SocketAddr;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use chrono::Utc;

use silo_util::{Mutex, OneTime};

use silo_chain::{Chain, ChainUpdate, ErrorKind};
use silo_core::consensus::ChainParams;
use silo_core::core::{Address, Block, Transaction};
use silo_p2p::{sync, NetAdapter, Peers};

use crate::common::types::{MinerSink, Sinks};

enum Event {
	Block(Block, Option<SocketAddr>),
	Transaction(Transaction, Option<SocketAddr>),
	Shutdown,
}

/// Producer handle delivering blocks to the dispatcher.
#[derive(Clone)]
pub struct BlockChannel(mpsc::Sender<Event>);

impl BlockChannel {
	/// Queues a block, tagging where it came from so broadcasts can skip
	/// the sender. Delivery failure means the node is shutting down.
	pub fn send(&self, b: Block, from: Option<SocketAddr>) {
		let _ = self.0.send(Event::Block(b, from));
	}
}

/// Producer handle delivering transactions to the dispatcher.
#[derive(Clone)]
pub struct TxnChannel(mpsc::Sender<Event>);

impl TxnChannel {
	/// Queues a transaction.
	pub fn send(&self, tx: Transaction, from: Option<SocketAddr>) {
		let _ = self.0.send(Event::Transaction(tx, from));
	}
}

/// The orchestrator. Owns the engine behind its lock and the inbound
/// channels; everything else reaches the engine through it.
pub struct Core {
	chain: Arc<Mutex<Chain>>,
	sender: mpsc::Sender<Event>,
	receiver: Mutex<Option<mpsc::Receiver<Event>>>,
	sinks: Mutex<Sinks>,
	payout_address: Address,
	peers: OneTime<Arc<Peers>>,
	net_adapter: OneTime<Arc<dyn NetAdapter>>,
}

impl Core {
	/// Builds the orchestrator around a fresh engine.
	pub fn new(params: ChainParams, sinks: Sinks, payout_address: Address) -> Core {
		let (sender, receiver) = mpsc::channel();
		Core {
			chain: Arc::new(Mutex::new(Chain::new(params))),
			sender,
			receiver: Mutex::new(Some(receiver)),
			sinks: Mutex::new(sinks),
			payout_address,
			peers: OneTime::new(),
			net_adapter: OneTime::new(),
		}
	}

	/// Registers another miner sink after construction, for collaborators
	/// that need the core's channels to exist first.
	pub fn add_miner_sink(&self, miner: Arc<dyn MinerSink>) {
		self.sinks.lock().miners.push(miner);
	}

	/// The engine, for collaborators that need read access (catch-up
	/// serving, template assembly). Lock discipline: no I/O while held.
	pub fn chain(&self) -> Arc<Mutex<Chain>> {
		self.chain.clone()
	}

	/// A producer handle for blocks.
	pub fn block_channel(&self) -> BlockChannel {
		BlockChannel(self.sender.clone())
	}

	/// A producer handle for transactions.
	pub fn txn_channel(&self) -> TxnChannel {
		TxnChannel(self.sender.clone())
	}

	/// Wires in the peer directory once the p2p server exists.
	pub fn init_peers(&self, peers: Arc<Peers>) {
		self.peers.init(peers);
	}

	/// Wires in the net adapter used to spawn catch-up rounds.
	pub fn init_net_adapter(&self, adapter: Arc<dyn NetAdapter>) {
		self.net_adapter.init(adapter);
	}

	/// Starts the dispatcher thread. Call once.
	pub fn start(core: Arc<Core>) -> thread::JoinHandle<()> {
		let receiver = core
			.receiver
			.lock()
			.take()
			.expect("dispatcher started twice");
		thread::Builder::new()
			.name("dispatcher".to_string())
			.spawn(move || core.dispatch(receiver))
			.expect("failed to spawn dispatcher")
	}

	/// Asks the dispatcher to drain its queue and return.
	pub fn shutdown(&self) {
		let _ = self.sender.send(Event::Shutdown);
	}

	fn dispatch(&self, receiver: mpsc::Receiver<Event>) {
		loop {
			match receiver.recv() {
				Ok(Event::Block(b, from)) => self.process_block(b, from),
				Ok(Event::Transaction(tx, from)) => self.process_transaction(tx, from),
				Ok(Event::Shutdown) | Err(_) => break,
			}
		}
		// drain whatever was queued before the shutdown signal
		while let Ok(event) = receiver.try_recv() {
			match event {
				Event::Block(b, from) => self.process_block(b, from),
				Event::Transaction(tx, from) => self.process_transaction(tx, from),
				Event::Shutdown => (),
			}
		}
		debug!("dispatcher drained and stopped");
	}

	fn process_block(&self, b: Block, from: Option<SocketAddr>) {
		let now = Utc::now().timestamp();
		let (result, ancestor_height) = {
			let mut chain = self.chain.lock();
			let result = chain.accept_block(b.clone(), now);
			let ancestor = match &result {
				Ok(update) => chain.height() - update.applied.len() as u64,
				Err(_) => 0,
			};
			(result, ancestor)
		};

		match result {
			Ok(update) => {
				self.notify_sinks(&update, ancestor_height);
				self.rebuild_miner_templates();
				if self.peers.is_init() {
					self.peers.borrow().broadcast_block(&b, from);
				}
			}
			Err(e) => match e.kind() {
				ErrorKind::BlockKnown => {
					debug!("dispatcher: duplicate block {:?}", b.id());
				}
				ErrorKind::UnknownOrphan => {
					debug!("dispatcher: orphan block {:?}, starting catch-up", b.id());
					self.start_catch_up();
				}
				kind => {
					info!("dispatcher: rejected block {:?}: {}", b.id(), kind);
				}
			},
		}
	}

	fn process_transaction(&self, tx: Transaction, from: Option<SocketAddr>) {
		let result = {
			let mut chain = self.chain.lock();
			chain.accept_transaction(tx.clone())
		};
		match result {
			Ok(()) => {
				self.rebuild_miner_templates();
				if self.peers.is_init() {
					self.peers.borrow().broadcast_transaction(&tx, from);
				}
			}
			Err(e) => {
				debug!("dispatcher: rejected transaction: {}", e.kind());
			}
		}
	}

	// Fans a path move out to the wallet and host sinks. Diffs are already
	// ordered rewinds-first by the engine.
	fn notify_sinks(&self, update: &ChainUpdate, ancestor_height: u64) {
		if update.is_empty() {
			return;
		}
		let sinks = self.sinks.lock();
		for wallet in &sinks.wallets {
			if let Err(e) = wallet.update(&update.rewound, &update.applied, &update.diffs) {
				warn!("wallet sink failed to take update: {}", e);
			}
		}
		for host in &sinks.hosts {
			host.update(ancestor_height, &update.rewound, &update.applied);
		}
	}

	pub(crate) fn rebuild_miner_templates(&self) {
		let sinks = self.sinks.lock();
		if sinks.miners.is_empty() {
			return;
		}
		let (parent_id, transactions, target, earliest) = {
			let chain = self.chain.lock();
			chain.miner_template()
		};
		for miner in &sinks.miners {
			miner.update(
				parent_id,
				transactions.clone(),
				target,
				self.payout_address,
				earliest,
			);
		}
	}

	fn start_catch_up(&self) {
		if !self.peers.is_init() || !self.net_adapter.is_init() {
			return;
		}
		match self.peers.borrow().random() {
			Some(peer) => {
				sync::spawn_catch_up(peer.addr, self.net_adapter.borrow().clone());
			}
			None => debug!("orphan received but no peers to catch up against"),
		}
	}
}
