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

//! The file contract lifecycle: funding, proving possession inside a
//! window, missing windows, termination, and how all of it rewinds.

mod common;

use std::io::Cursor;

use common::*;
use silo_chain::contract::proof_segment_index;
use silo_chain::ErrorKind;
use silo_core::core::merkle::{build_proof, file_merkle_root, num_segments};
use silo_core::core::transaction::{
	contract_termination_output_id, storage_proof_output_id,
};
use silo_core::core::{FileContract, StorageProof, Transaction};

const NOW: i64 = 1_000_000_000;

fn contract_file() -> Vec<u8> {
	(0u32..200).map(|b| (b % 241) as u8).collect()
}

fn funded_contract(file: &[u8], start: u64, end: u64, tolerance: u64) -> FileContract {
	let segments = num_segments(file.len() as u64);
	let root = file_merkle_root(&mut Cursor::new(file), segments).unwrap();
	FileContract {
		fund: 5,
		file_merkle_root: root,
		file_size: file.len() as u64,
		start,
		end,
		challenge_frequency: 1,
		tolerance,
		valid_proof_payout: 1,
		valid_proof_address: address(7),
		missed_proof_payout: 3,
		missed_proof_address: address(8),
	}
}

// spends the genesis subsidy into change plus the contract's fund
fn contract_transaction(chain: &silo_chain::Chain, contract: FileContract) -> Transaction {
	let subsidy_0 = genesis_subsidy_id(chain);
	let mut tx = Transaction {
		arbitrary_data: vec![],
		inputs: vec![silo_core::core::Input {
			output_id: subsidy_0,
			spend_conditions: conditions(1),
		}],
		outputs: vec![silo_core::core::Output {
			value: 25_000 - contract.fund,
			spend_hash: address(1),
		}],
		miner_fees: vec![],
		file_contracts: vec![contract],
		storage_proofs: vec![],
		signatures: vec![],
	};
	sign_whole(&mut tx, &[(subsidy_0, 1)]);
	tx
}

fn proof_transaction(chain: &silo_chain::Chain, file: &[u8], contract_id: silo_core::core::ContractId) -> Transaction {
	let oc = chain.open_contract(&contract_id).unwrap();
	let window = (chain.height() - oc.contract.start) / oc.contract.challenge_frequency;
	let trigger = oc.contract.start + window * oc.contract.challenge_frequency - 1;
	let trigger_id = chain.block_id_at(trigger).unwrap();
	let segment = proof_segment_index(trigger_id, contract_id, oc.contract.file_size);
	let segments = num_segments(oc.contract.file_size);
	let (base, hash_set) = build_proof(&mut Cursor::new(file), segments, segment).unwrap();
	Transaction {
		arbitrary_data: vec![],
		inputs: vec![],
		outputs: vec![],
		miner_fees: vec![],
		file_contracts: vec![],
		storage_proofs: vec![StorageProof {
			contract_id,
			base,
			hash_set,
		}],
		signatures: vec![],
	}
}

#[test]
fn storage_proof_lifecycle() {
	let mut chain = testing_chain(1);
	let file = contract_file();

	// fund a one-window contract: start at 1, expire at 2
	let tx = contract_transaction(&chain, funded_contract(&file, 1, 2, 1));
	let contract_id = tx.contract_id(0);
	chain.accept_transaction(tx).unwrap();
	mine_and_accept(&mut chain, address(9));

	let oc = chain.open_contract(&contract_id).unwrap();
	assert_eq!(oc.funds_remaining, 5);
	assert_eq!(oc.failures, 0);
	assert!(!oc.window_satisfied);

	// prove possession inside the window
	let proof_tx = proof_transaction(&chain, &file, contract_id);
	chain.accept_transaction(proof_tx).unwrap();
	mine_and_accept(&mut chain, address(9));

	// the proof paid one coin to the valid address
	let proof_out = chain
		.unspent_output(&storage_proof_output_id(contract_id, 0, true))
		.unwrap();
	assert_eq!((proof_out.value, proof_out.spend_hash), (1, address(7)));

	// reaching the end height terminated the contract cleanly, returning
	// the remaining four coins to the valid address
	let termination = chain
		.unspent_output(&contract_termination_output_id(contract_id, true))
		.unwrap();
	assert_eq!((termination.value, termination.spend_hash), (4, address(7)));
	assert!(chain.open_contract(&contract_id).is_none());
	assert_eq!(chain.pool_size(), 0);
}

#[test]
fn missed_windows_penalize_and_terminate() {
	let mut chain = testing_chain(1);
	let file = contract_file();

	// two windows, tolerance two, and the host never shows up
	let tx = contract_transaction(&chain, funded_contract(&file, 1, 3, 2));
	let contract_id = tx.contract_id(0);
	chain.accept_transaction(tx).unwrap();
	mine_and_accept(&mut chain, address(9)); // height 1, contract opens
	mine_and_accept(&mut chain, address(9)); // height 2, window 0 missed
	{
		let missed = chain
			.unspent_output(&storage_proof_output_id(contract_id, 0, false))
			.unwrap();
		assert_eq!((missed.value, missed.spend_hash), (3, address(8)));
		let oc = chain.open_contract(&contract_id).unwrap();
		assert_eq!((oc.funds_remaining, oc.failures), (2, 1));
	}
	mine_and_accept(&mut chain, address(9)); // height 3, window 1 missed, end reached

	// second penalty is capped by the remaining funds
	let missed = chain
		.unspent_output(&storage_proof_output_id(contract_id, 1, false))
		.unwrap();
	assert_eq!((missed.value, missed.spend_hash), (2, address(8)));

	// tolerance reached: unsuccessful termination of the drained contract
	let termination = chain
		.unspent_output(&contract_termination_output_id(contract_id, false))
		.unwrap();
	assert_eq!((termination.value, termination.spend_hash), (0, address(8)));
	assert!(chain.open_contract(&contract_id).is_none());
}

#[test]
fn proofs_cannot_repeat_within_a_window() {
	let mut chain = testing_chain(1);
	let file = contract_file();

	// two-block windows so the window outlives the block carrying the proof
	let mut contract = funded_contract(&file, 1, 5, 2);
	contract.challenge_frequency = 2;
	let tx = contract_transaction(&chain, contract);
	let contract_id = tx.contract_id(0);
	chain.accept_transaction(tx).unwrap();
	mine_and_accept(&mut chain, address(9));

	let proof_tx = proof_transaction(&chain, &file, contract_id);
	chain.accept_transaction(proof_tx.clone()).unwrap();

	// while it waits in the pool, resubmission is a duplicate
	let err = chain.accept_transaction(proof_tx.clone()).unwrap_err();
	assert_eq!(err.kind(), ErrorKind::TransactionKnown);

	mine_and_accept(&mut chain, address(9));
	assert!(chain.open_contract(&contract_id).unwrap().window_satisfied);

	// confirmed and out of the pool, the window is already satisfied, so a
	// second proof is refused
	let err = chain.accept_transaction(proof_tx).unwrap_err();
	assert_eq!(err.kind(), ErrorKind::ProofAlreadyComplete);
}

#[test]
fn contract_lifecycle_rewinds_exactly() {
	let mut chain = testing_chain(1);
	let file = contract_file();

	// run the full happy path: fund, prove, terminate
	let tx = contract_transaction(&chain, funded_contract(&file, 1, 2, 1));
	let contract_id = tx.contract_id(0);
	chain.accept_transaction(tx).unwrap();
	mine_and_accept(&mut chain, address(9));
	let proof_tx = proof_transaction(&chain, &file, contract_id);
	chain.accept_transaction(proof_tx).unwrap();
	mine_and_accept(&mut chain, address(9));
	assert!(chain.open_contract(&contract_id).is_none());

	// an empty fork of three blocks from genesis takes over, rewinding the
	// whole contract story
	let genesis = chain.get_block(&chain.genesis_id()).unwrap().clone();
	let f1 = mine_child(&chain, &genesis, vec![], address(0xaa));
	let f2 = mine_child(&chain, &f1, vec![], address(0xaa));
	let f3 = mine_child(&chain, &f2, vec![], address(0xaa));
	chain.accept_block(f1.clone(), NOW).unwrap();
	chain.accept_block(f2.clone(), NOW).unwrap();
	let update = chain.accept_block(f3.clone(), NOW).unwrap();
	assert_eq!(update.rewound.len(), 2);
	assert_eq!(update.applied.len(), 3);

	// no trace of the contract remains
	assert!(chain.open_contract(&contract_id).is_none());
	assert!(chain
		.unspent_output(&storage_proof_output_id(contract_id, 0, true))
		.is_none());
	assert!(chain
		.unspent_output(&contract_termination_output_id(contract_id, true))
		.is_none());

	// and the state matches a chain that only ever saw the fork
	let mut direct = testing_chain(1);
	direct.accept_block(f1, NOW).unwrap();
	direct.accept_block(f2, NOW).unwrap();
	direct.accept_block(f3, NOW).unwrap();
	assert_eq!(chain.tip().id, direct.tip().id);
	assert_eq!(chain.unspent_outputs(), direct.unspent_outputs());
}
