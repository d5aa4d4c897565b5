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

//! Shared helpers for the chain integration tests: deterministic keys, a
//! nonce-grinding test miner against the easy testing target, and simple
//! transaction builders.

#![allow(dead_code)]

use silo_chain::{Chain, ChainUpdate};
use silo_core::consensus::ChainParams;
use silo_core::core::{
	Address, Block, Currency, Output, OutputId, SpendConditions, Transaction,
};
use silo_core::core::transaction::{CoveredFields, TransactionSignature};
use silo_keychain::{Keypair, Signature};

/// A deterministic keypair per single-byte seed.
pub fn keypair(seed: u8) -> Keypair {
	Keypair::from_entropy([seed; 32])
}

/// Single-key, no-timelock spend conditions for the seed's keypair.
pub fn conditions(seed: u8) -> SpendConditions {
	SpendConditions::standard(keypair(seed).public)
}

/// The coin address of those conditions.
pub fn address(seed: u8) -> Address {
	conditions(seed).coin_address()
}

/// A test chain whose genesis subsidy pays to the seed's address.
pub fn testing_chain(genesis_seed: u8) -> Chain {
	let mut params = ChainParams::testing();
	params.genesis_address = address(genesis_seed);
	Chain::new(params)
}

/// Id of the genesis subsidy output of the given chain.
pub fn genesis_subsidy_id(chain: &Chain) -> OutputId {
	silo_core::core::block::block_subsidy_output_id(chain.genesis_id())
}

/// Grinds a block over the current tip carrying the given transactions.
/// Timestamps advance one second per block, keeping the testing chain
/// exactly on its difficulty schedule.
pub fn mine_block(chain: &Chain, transactions: Vec<Transaction>, miner_address: Address) -> Block {
	let (parent_id, _, target, earliest) = chain.miner_template();
	let parent_ts = chain
		.get_block(&parent_id)
		.expect("tip block missing")
		.timestamp;
	let timestamp = std::cmp::max(parent_ts + 1, earliest);
	let mut b = Block::new(parent_id, transactions, miner_address, timestamp);
	while !target.meets(&b.id()) {
		b.nonce += 1;
	}
	b
}

/// Grinds a child of an arbitrary block (for building forks off the path).
/// Only usable with the testing target, which everything meets.
pub fn mine_child(chain: &Chain, parent: &Block, transactions: Vec<Transaction>, miner_address: Address) -> Block {
	let target = chain.params().root_target;
	let mut b = Block::new(parent.id(), transactions, miner_address, parent.timestamp + 1);
	while !target.meets(&b.id()) {
		b.nonce += 1;
	}
	b
}

/// Mines the pending pool onto the tip and accepts the block.
pub fn mine_and_accept(chain: &mut Chain, miner_address: Address) -> ChainUpdate {
	let transactions = chain.dump_pool();
	let b = mine_block(chain, transactions, miner_address);
	let now = b.timestamp;
	chain.accept_block(b, now).expect("mined block refused")
}

/// Builds and fully signs a transaction spending one output held by
/// `key_seed` into the given (value, address) outputs plus a miner fee.
pub fn spend_output(
	output_id: OutputId,
	key_seed: u8,
	outputs: &[(Currency, Address)],
	fee: Currency,
) -> Transaction {
	let mut tx = Transaction {
		arbitrary_data: vec![],
		inputs: vec![silo_core::core::Input {
			output_id,
			spend_conditions: conditions(key_seed),
		}],
		outputs: outputs
			.iter()
			.map(|(value, spend_hash)| Output {
				value: *value,
				spend_hash: *spend_hash,
			})
			.collect(),
		miner_fees: if fee > 0 { vec![fee] } else { vec![] },
		file_contracts: vec![],
		storage_proofs: vec![],
		signatures: vec![],
	};
	sign_whole(&mut tx, &[(output_id, key_seed)]);
	tx
}

/// Appends whole-transaction signatures for the given (input, key) pairs.
/// The whole-transaction digest does not cover signature values, so slots
/// are laid down first and filled afterwards.
pub fn sign_whole(tx: &mut Transaction, signers: &[(OutputId, u8)]) {
	for (input_id, _) in signers {
		tx.signatures.push(TransactionSignature {
			input_id: *input_id,
			public_key_index: 0,
			timelock: 0,
			covered_fields: CoveredFields::whole_transaction(),
			signature: Signature::zero(),
		});
	}
	let base = tx.signatures.len() - signers.len();
	for (i, (_, key_seed)) in signers.iter().enumerate() {
		let digest = tx.sighash(base + i).expect("sighash failed");
		tx.signatures[base + i].signature = keypair(*key_seed).sign(&digest.0);
	}
}
