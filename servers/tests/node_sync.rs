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

//! Whole-node tests: two servers converging over real sockets, and sink
//! notification on block acceptance.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use silo_chain::OutputDiff;
use silo_core::consensus::ChainParams;
use silo_core::core::target::Target;
use silo_core::core::{Address, Block, BlockId, Height, SpendConditions, Stamp, Transaction};
use silo_keychain::Keypair;
use silo_p2p::P2PConfig;
use silo_servers::{HostSink, MinerSink, Server, ServerConfig, SinkError, Sinks, WalletSink};
use silo_util::Mutex;

fn address(seed: u8) -> Address {
	SpendConditions::standard(Keypair::from_entropy([seed; 32]).public).coin_address()
}

fn test_config() -> ServerConfig {
	let mut chain_params = ChainParams::testing();
	chain_params.genesis_address = address(1);
	ServerConfig {
		p2p_config: P2PConfig {
			host: "127.0.0.1".to_string(),
			port: 0,
		},
		chain_params,
		seed_addrs: vec![],
		payout_address: address(9),
		run_test_miner: false,
	}
}

fn wait_until<F: Fn() -> bool>(what: &str, cond: F) {
	let deadline = Instant::now() + Duration::from_secs(10);
	while !cond() {
		assert!(Instant::now() < deadline, "timed out waiting for {}", what);
		thread::sleep(Duration::from_millis(25));
	}
}

// grinds and submits one block through the dispatcher, waiting for it to
// take effect
fn mine_one(server: &Server, miner: Address) {
	let (block, target_height) = {
		let chain = server.core().chain();
		let chain = chain.lock();
		let (parent_id, transactions, target, earliest) = chain.miner_template();
		let parent_ts = chain.get_block(&parent_id).unwrap().timestamp;
		let timestamp = std::cmp::max(parent_ts + 1, earliest);
		let mut b = Block::new(parent_id, transactions, miner, timestamp);
		while !target.meets(&b.id()) {
			b.nonce += 1;
		}
		(b, chain.height() + 1)
	};
	server.core().block_channel().send(block, None);
	let chain = server.core().chain();
	wait_until("mined block to apply", || chain.lock().height() == target_height);
}

fn height_of(server: &Server) -> Height {
	let chain = server.core().chain();
	let height = chain.lock().height();
	height
}

fn tip_of(server: &Server) -> BlockId {
	let chain = server.core().chain();
	let tip = chain.lock().tip().id;
	tip
}

#[test]
fn two_nodes_converge() {
	let mut node_a = Server::start(test_config(), Sinks::default()).unwrap();
	for _ in 0..30 {
		mine_one(&node_a, address(9));
	}
	assert_eq!(height_of(&node_a), 30);

	// node B knows node A, but has no blocks yet
	let mut node_b = Server::start(test_config(), Sinks::default()).unwrap();
	node_b.p2p().connect(node_a.p2p_addr).unwrap();

	// offering B the tip makes it an orphan there and kicks off catch-up
	let tip = {
		let chain = node_a.core().chain();
		let chain = chain.lock();
		let tip_id = chain.tip().id;
		chain.get_block(&tip_id).unwrap().clone()
	};
	node_b.core().block_channel().send(tip, None);

	wait_until("node B to catch up", || height_of(&node_b) == 30);
	assert_eq!(tip_of(&node_a), tip_of(&node_b));

	node_a.stop();
	node_b.stop();
}

#[test]
fn transactions_propagate_to_peers() {
	let mut node_a = Server::start(test_config(), Sinks::default()).unwrap();
	let mut node_b = Server::start(test_config(), Sinks::default()).unwrap();
	node_a.p2p().connect(node_b.p2p_addr).unwrap();

	// a payment of the genesis subsidy, signed by its key
	let subsidy_0 = silo_core::core::block::block_subsidy_output_id({
		let chain = node_a.core().chain();
		let id = chain.lock().genesis_id();
		id
	});
	let mut tx = Transaction {
		arbitrary_data: vec![],
		inputs: vec![silo_core::core::Input {
			output_id: subsidy_0,
			spend_conditions: SpendConditions::standard(Keypair::from_entropy([1; 32]).public),
		}],
		outputs: vec![silo_core::core::Output {
			value: 25_000,
			spend_hash: address(2),
		}],
		miner_fees: vec![],
		file_contracts: vec![],
		storage_proofs: vec![],
		signatures: vec![silo_core::core::TransactionSignature {
			input_id: subsidy_0,
			public_key_index: 0,
			timelock: 0,
			covered_fields: silo_core::core::CoveredFields::whole_transaction(),
			signature: silo_keychain::Signature::zero(),
		}],
	};
	let digest = tx.sighash(0).unwrap();
	tx.signatures[0].signature = Keypair::from_entropy([1; 32]).sign(&digest.0);

	node_a.core().txn_channel().send(tx, None);

	// it lands in A's pool and rides the broadcast into B's
	let chain_a = node_a.core().chain();
	wait_until("pool on node A", || chain_a.lock().pool_size() == 1);
	let chain_b = node_b.core().chain();
	wait_until("pool on node B", || chain_b.lock().pool_size() == 1);

	node_a.stop();
	node_b.stop();
}

#[test]
fn test_miner_extends_the_chain() {
	let mut config = test_config();
	config.run_test_miner = true;
	let mut node = Server::start(config, Sinks::default()).unwrap();

	wait_until("the miner to find blocks", || height_of(&node) >= 3);

	// subsidies pay to the configured address
	let chain = node.core().chain();
	let tip_subsidy = {
		let chain = chain.lock();
		let subsidy_id = silo_core::core::block::block_subsidy_output_id(chain.tip().id);
		*chain.unspent_output(&subsidy_id).unwrap()
	};
	assert_eq!(tip_subsidy.spend_hash, address(9));

	node.stop();
}

#[derive(Default)]
struct Recorder {
	wallet_updates: Mutex<Vec<(usize, usize, Vec<OutputDiff>)>>,
	miner_updates: Mutex<Vec<(BlockId, Target, Address, Stamp)>>,
	host_updates: Mutex<Vec<(Height, usize, usize)>>,
}

impl WalletSink for Recorder {
	fn update(
		&self,
		rewound: &[Block],
		applied: &[Block],
		diffs: &[OutputDiff],
	) -> Result<(), SinkError> {
		self.wallet_updates
			.lock()
			.push((rewound.len(), applied.len(), diffs.to_vec()));
		Ok(())
	}
}

impl MinerSink for Recorder {
	fn update(
		&self,
		parent_id: BlockId,
		_transactions: Vec<Transaction>,
		target: Target,
		payout_address: Address,
		earliest_timestamp: Stamp,
	) {
		self.miner_updates
			.lock()
			.push((parent_id, target, payout_address, earliest_timestamp));
	}
}

impl HostSink for Recorder {
	fn update(&self, initial_height: Height, rewound: &[Block], applied: &[Block]) {
		self.host_updates
			.lock()
			.push((initial_height, rewound.len(), applied.len()));
	}
}

#[test]
fn sinks_hear_about_accepted_blocks() {
	let recorder = Arc::new(Recorder::default());
	let wallet: Arc<dyn WalletSink> = recorder.clone();
	let miner: Arc<dyn MinerSink> = recorder.clone();
	let host: Arc<dyn HostSink> = recorder.clone();
	let sinks = Sinks {
		wallets: vec![wallet],
		miners: vec![miner],
		hosts: vec![host],
	};
	let mut node = Server::start(test_config(), sinks).unwrap();

	mine_one(&node, address(9));
	wait_until("sink notification", || {
		!recorder.wallet_updates.lock().is_empty()
	});

	// the wallet saw one applied block with its subsidy diff
	{
		let updates = recorder.wallet_updates.lock();
		let (rewound, applied, diffs) = &updates[0];
		assert_eq!((*rewound, *applied), (0, 1));
		assert!(diffs.iter().any(|d| d.new && d.output.value == 24_999));
	}

	// the miner was handed a template on top of the new tip
	{
		let updates = recorder.miner_updates.lock();
		let (parent_id, _target, payout, _earliest) = updates.last().unwrap().clone();
		assert_eq!(parent_id, tip_of(&node));
		assert_eq!(payout, address(9));
	}

	// the host heard the same path move
	{
		let updates = recorder.host_updates.lock();
		assert_eq!(updates[0], (0, 0, 1));
	}

	node.stop();
}
