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

//! The pool proper. Two maps: every output id spent by a pending
//! transaction points at the transaction's key, and transactions are keyed
//! by their first input's output id for block assembly. Transactions with
//! no inputs at all (standalone storage proofs) spend nothing, conflict
//! with nothing, and sit in a side table keyed by their own hash.
//! Validation against chain state is the engine's job and must happen
//! before `add`.

use std::collections::HashMap;

use silo_core::core::hash::{Hash, Hashed};
use silo_core::core::{OutputId, Transaction};

use crate::types::PoolError;

/// An indexed set of pending transactions.
#[derive(Default)]
pub struct TransactionPool {
	// every output spent by a pending transaction -> key of the spender
	spent_outputs: HashMap<OutputId, OutputId>,
	// pending transactions keyed by their first input's output id
	transactions: HashMap<OutputId, Transaction>,
	// input-less transactions (storage proofs), keyed by their own hash
	no_input_transactions: HashMap<Hash, Transaction>,
}

impl TransactionPool {
	/// An empty pool.
	pub fn new() -> TransactionPool {
		TransactionPool {
			spent_outputs: HashMap::new(),
			transactions: HashMap::new(),
			no_input_transactions: HashMap::new(),
		}
	}

	/// Whether any input of the transaction collides with a pending spend.
	/// Constant time per input.
	pub fn conflicts(&self, tx: &Transaction) -> bool {
		tx.inputs
			.iter()
			.any(|input| self.spent_outputs.contains_key(&input.output_id))
	}

	/// Adds a fully validated transaction to the pool. Fails if any input
	/// collides with a pending spend or the transaction double-spends
	/// within itself.
	pub fn add(&mut self, tx: Transaction) -> Result<(), PoolError> {
		let first = match tx.inputs.first() {
			Some(input) => input.output_id,
			None => {
				self.no_input_transactions.insert(tx.hash(), tx);
				return Ok(());
			}
		};
		for input in &tx.inputs {
			if self.spent_outputs.contains_key(&input.output_id) {
				return Err(PoolError::Conflict(input.output_id));
			}
		}
		for (i, input) in tx.inputs.iter().enumerate() {
			if tx.inputs[..i]
				.iter()
				.any(|other| other.output_id == input.output_id)
			{
				return Err(PoolError::DuplicateInput(input.output_id));
			}
		}

		for input in &tx.inputs {
			self.spent_outputs.insert(input.output_id, first);
		}
		self.transactions.insert(first, tx);
		Ok(())
	}

	/// Removes a transaction and all of its index entries. Panics on an
	/// internal index inconsistency, which can only be caused by an engine
	/// bug.
	pub fn remove(&mut self, tx: &Transaction) {
		let first = match tx.inputs.first() {
			Some(input) => input.output_id,
			None => {
				self.no_input_transactions
					.remove(&tx.hash())
					.expect("pool index inconsistency: missing input-less transaction");
				return;
			}
		};
		for input in &tx.inputs {
			let key = self
				.spent_outputs
				.remove(&input.output_id)
				.expect("pool index inconsistency: missing spent output entry");
			assert_eq!(
				key, first,
				"pool index inconsistency: spent output entry points elsewhere"
			);
		}
		self.transactions
			.remove(&first)
			.expect("pool index inconsistency: missing transaction entry");
	}

	/// Evicts every pending transaction that conflicts with any input of
	/// the given (newly confirmed) transaction. Returns how many were
	/// evicted.
	pub fn remove_conflicts(&mut self, tx: &Transaction) -> usize {
		let mut evicted = 0;
		for input in &tx.inputs {
			if let Some(key) = self.spent_outputs.get(&input.output_id).cloned() {
				let victim = self.transactions[&key].clone();
				debug!(
					"pool: evicting transaction spending {:?}, confirmed elsewhere",
					input.output_id
				);
				self.remove(&victim);
				evicted += 1;
			}
		}
		evicted
	}

	/// Reconciles the pool with a transaction a block just confirmed: the
	/// transaction itself leaves the pool if it was pending, and so does
	/// everything conflicting with it.
	pub fn remove_confirmed(&mut self, tx: &Transaction) {
		if tx.inputs.is_empty() {
			self.no_input_transactions.remove(&tx.hash());
		} else {
			self.remove_conflicts(tx);
		}
	}

	/// A snapshot of the pending transactions, suitable for block
	/// production. Ordering among unrelated transactions is unspecified.
	pub fn dump(&self) -> Vec<Transaction> {
		self.transactions
			.values()
			.chain(self.no_input_transactions.values())
			.cloned()
			.collect()
	}

	/// Whether this exact transaction is already pending.
	pub fn contains(&self, tx: &Transaction) -> bool {
		match tx.inputs.first() {
			Some(input) => self
				.transactions
				.get(&input.output_id)
				.map(|pending| pending == tx)
				.unwrap_or(false),
			None => self.no_input_transactions.contains_key(&tx.hash()),
		}
	}

	/// Whether a pending transaction spends the given output.
	pub fn spends_output(&self, output_id: &OutputId) -> bool {
		self.spent_outputs.contains_key(output_id)
	}

	/// Number of pending transactions.
	pub fn len(&self) -> usize {
		self.transactions.len() + self.no_input_transactions.len()
	}

	/// Whether the pool is empty.
	pub fn is_empty(&self) -> bool {
		self.transactions.is_empty() && self.no_input_transactions.is_empty()
	}
}
