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

//! Facade and handler for the rest of the blockchain implementation: owns
//! the block tree, the chosen path, the unspent output and open contract
//! sets and the transaction pool, and moves all of them forward (and
//! backward, on forks) as blocks arrive.
//!
//! Everything here assumes exclusive access; the orchestrator holds the one
//! lock. Rewinds are exact mirrors of applies, so a fork switch leaves the
//! maps exactly as if the winning branch had been applied directly.

use std::cmp::min;
use std::collections::{HashMap, HashSet};

use silo_core::consensus::{ChainParams, TIMESTAMP_WINDOW};
use silo_core::core::block::block_subsidy_output_id;
use silo_core::core::transaction::{contract_termination_output_id, storage_proof_output_id};
use silo_core::core::{
	Block, BlockId, ContractId, Currency, Height, Output, OutputId, Stamp, Transaction,
};
use silo_core::genesis::genesis;
use silo_pool::TransactionPool;

use crate::contract;
use crate::error::{Error, ErrorKind};
use crate::pipe;
use crate::types::{BlockNode, ChainUpdate, OpenContract, OutputDiff, Tip};

/// How many blocks a catch-up response carries at most; the requester comes
/// back for the rest.
pub const MAX_CATCH_UP_BLOCKS: usize = 100;

/// How many block ids a catch-up request carries at most: the recent dozen,
/// exponentially spaced older ones, and genesis.
pub const BLOCK_ID_HISTORY_LEN: usize = 32;

/// The consensus engine. One per node, owned by the orchestrator behind its
/// lock.
pub struct Chain {
	params: ChainParams,
	genesis_id: BlockId,
	// append-only arena of every block ever admitted, keyed by id
	block_map: HashMap<BlockId, BlockNode>,
	// blocks that definitively failed validation
	bad_blocks: HashSet<BlockId>,
	// height -> block id on the currently chosen fork
	path: Vec<BlockId>,
	unspent: HashMap<OutputId, Output>,
	spent: HashMap<OutputId, Output>,
	open_contracts: HashMap<ContractId, OpenContract>,
	pool: TransactionPool,
}

impl Chain {
	/// Boots an engine from its parameter set: a single-node tree holding
	/// genesis, whose subsidy output seeds the unspent set.
	pub fn new(params: ChainParams) -> Chain {
		let gen = genesis(&params);
		let genesis_id = gen.id();
		let node = BlockNode {
			height: 0,
			children: vec![],
			recent_timestamps: [gen.timestamp; TIMESTAMP_WINDOW],
			target: params.root_target,
			depth: params.root_depth,
			terminations: vec![],
			missed_proofs: vec![],
			block: gen.clone(),
		};

		let mut block_map = HashMap::new();
		block_map.insert(genesis_id, node);

		let mut unspent = HashMap::new();
		unspent.insert(
			block_subsidy_output_id(genesis_id),
			Output {
				value: params.block_subsidy(0),
				spend_hash: gen.miner_address,
			},
		);

		Chain {
			params,
			genesis_id,
			block_map,
			bad_blocks: HashSet::new(),
			path: vec![genesis_id],
			unspent,
			spent: HashMap::new(),
			open_contracts: HashMap::new(),
			pool: TransactionPool::new(),
		}
	}

	/// The chain parameters this engine runs under.
	pub fn params(&self) -> &ChainParams {
		&self.params
	}

	/// Id of the genesis block.
	pub fn genesis_id(&self) -> BlockId {
		self.genesis_id
	}

	/// Height of the current tip.
	pub fn height(&self) -> Height {
		(self.path.len() - 1) as Height
	}

	/// The current tip of the chosen fork.
	pub fn tip(&self) -> Tip {
		let id = *self.path.last().expect("path lost its genesis entry");
		let node = self.node(&id);
		Tip {
			height: node.height,
			id,
			depth: node.depth,
		}
	}

	/// Id of the path block at the given height, if the path reaches it.
	pub fn block_id_at(&self, height: Height) -> Option<BlockId> {
		self.path.get(height as usize).cloned()
	}

	/// A block from the tree (any fork) by id.
	pub fn get_block(&self, id: &BlockId) -> Option<&Block> {
		self.block_map.get(id).map(|n| &n.block)
	}

	/// The unspent output set, keyed by output id.
	pub fn unspent_outputs(&self) -> &HashMap<OutputId, Output> {
		&self.unspent
	}

	/// An unspent output by id.
	pub fn unspent_output(&self, id: &OutputId) -> Option<&Output> {
		self.unspent.get(id)
	}

	/// An open contract by id.
	pub fn open_contract(&self, id: &ContractId) -> Option<&OpenContract> {
		self.open_contracts.get(id)
	}

	/// Snapshot of the pending transactions for block assembly.
	pub fn dump_pool(&self) -> Vec<Transaction> {
		self.pool.dump()
	}

	/// Number of pending transactions.
	pub fn pool_size(&self) -> usize {
		self.pool.len()
	}

	/// Everything a miner needs to build the next block template: the tip
	/// id, the pending transactions, the target the new block must meet and
	/// the earliest timestamp the median rule will accept.
	pub fn miner_template(&self) -> (BlockId, Vec<Transaction>, silo_core::core::Target, Stamp) {
		let tip = self.tip();
		let node = self.node(&tip.id);
		(
			tip.id,
			self.pool.dump(),
			node.target,
			node.median_timestamp() + 1,
		)
	}

	fn node(&self, id: &BlockId) -> &BlockNode {
		self.block_map
			.get(id)
			.expect("block tree lost a referenced node")
	}

	fn on_path(&self, id: &BlockId) -> bool {
		match self.block_map.get(id) {
			Some(node) => self.path.get(node.height as usize) == Some(id),
			None => false,
		}
	}

	/// Accepts a new block into the tree, switching forks when it makes a
	/// heavier chain. `now` is the local wall clock, for the future
	/// timestamp check. Returns what happened to the chosen path (empty for
	/// a side-fork block).
	pub fn accept_block(&mut self, b: Block, now: Stamp) -> Result<ChainUpdate, Error> {
		let id = b.id();
		if self.bad_blocks.contains(&id) {
			return Err(ErrorKind::KnownBad.into());
		}
		if self.block_map.contains_key(&id) {
			return Err(ErrorKind::BlockKnown.into());
		}
		let parent_id = b.parent_id;
		if !self.block_map.contains_key(&parent_id) {
			return Err(ErrorKind::UnknownOrphan.into());
		}

		let (height, recent_timestamps, target, depth) = {
			let parent = self.node(&parent_id);
			if let Err(e) = pipe::validate_header(&b, parent, &self.params, now) {
				if e.is_bad_data() {
					self.bad_blocks.insert(id);
				}
				return Err(e);
			}

			let height = parent.height + 1;
			let mut recent = parent.recent_timestamps;
			recent.rotate_left(1);
			recent[TIMESTAMP_WINDOW - 1] = b.timestamp;

			let anchor = self.anchor_timestamp(&parent_id, height);
			let target = pipe::child_target(&self.params, &parent.target, height, b.timestamp, anchor);
			let depth = parent.depth.add_inverse(&parent.target);
			(height, recent, target, depth)
		};

		let node = BlockNode {
			block: b,
			height,
			children: vec![],
			recent_timestamps,
			target,
			depth,
			terminations: vec![],
			missed_proofs: vec![],
		};
		self.block_map.insert(id, node);
		self.block_map
			.get_mut(&parent_id)
			.expect("parent vanished during admission")
			.children
			.push(id);

		let tip = self.tip();
		let extends_tip = parent_id == tip.id;
		if extends_tip || depth.surpasses(&tip.depth, self.params.surpass_threshold) {
			debug!("accepting block {:?} at height {} onto the path", id, height);
			self.fork_to(id)
		} else {
			debug!("block {:?} admitted on a side fork at height {}", id, height);
			Ok(ChainUpdate::default())
		}
	}

	/// Validates a transaction against current state and admits it to the
	/// pool. Resubmission of an already-pending transaction is refused as
	/// known; a transaction spending an output a pending transaction
	/// already spends is refused as conflicting.
	pub fn accept_transaction(&mut self, tx: Transaction) -> Result<(), Error> {
		if self.pool.contains(&tx) {
			return Err(ErrorKind::TransactionKnown.into());
		}
		self.validate_transaction(&tx)?;
		if self.pool.conflicts(&tx) {
			return Err(ErrorKind::ConflictingTransaction.into());
		}
		self.pool.add(tx)?;
		Ok(())
	}

	/// History of path block ids for catch-up requests: the 12 most recent,
	/// then exponentially spaced older ones, always ending with genesis.
	pub fn block_id_history(&self) -> Vec<BlockId> {
		let mut ids = vec![];
		let mut height = self.height() as usize;
		for _ in 0..12 {
			ids.push(self.path[height]);
			if height == 0 {
				return ids;
			}
			height -= 1;
		}

		let mut step = 1;
		while height > step && ids.len() < BLOCK_ID_HISTORY_LEN - 1 {
			height -= step;
			step *= 2;
			ids.push(self.path[height]);
		}
		ids.push(self.genesis_id);
		ids
	}

	/// Serves a catch-up request: finds the highest of the presented ids
	/// that sits on the current path and returns up to MAX_CATCH_UP_BLOCKS
	/// of its successors, with a flag for whether more remain. None when no
	/// presented id is on the path.
	pub fn blocks_after(&self, known: &[BlockId]) -> Option<(Vec<Block>, bool)> {
		let mut best: Option<Height> = None;
		for id in known {
			if self.on_path(id) {
				let h = self.node(id).height;
				best = Some(match best {
					Some(b) => b.max(h),
					None => h,
				});
			}
		}
		let start = best?;

		let tip_height = self.height();
		let mut blocks = vec![];
		let mut h = start + 1;
		while h <= tip_height && blocks.len() < MAX_CATCH_UP_BLOCKS {
			let id = self.path[h as usize];
			blocks.push(self.node(&id).block.clone());
			h += 1;
		}
		Some((blocks, h <= tip_height))
	}

	// Timestamp of the block the difficulty window for a child at `height`
	// is measured from: `target_window` links up the child's own ancestry,
	// or genesis when the chain is younger than a full window.
	fn anchor_timestamp(&self, parent_id: &BlockId, child_height: Height) -> Stamp {
		let window = min(self.params.target_window, child_height);
		let mut node = self.node(parent_id);
		let mut steps = window - 1;
		while steps > 0 {
			node = self.node(&node.block.parent_id);
			steps -= 1;
		}
		node.block.timestamp
	}

	// Switches the chosen fork to end at `new_tip`: rewinds to the common
	// ancestor, then applies the new branch. If a block of the new branch
	// fails to apply, it and its descendants are marked bad and the
	// original chain is restored; failure to restore is a fatal internal
	// inconsistency.
	fn fork_to(&mut self, new_tip: BlockId) -> Result<ChainUpdate, Error> {
		// walk up the new branch until we hit the current path
		let mut descent = vec![];
		let mut cursor = new_tip;
		while !self.on_path(&cursor) {
			descent.push(cursor);
			cursor = self.node(&cursor).block.parent_id;
		}
		let common_ancestor = cursor;

		// rewind to the common ancestor
		let mut diffs = vec![];
		let mut rewound = vec![];
		while *self.path.last().expect("path lost its genesis entry") != common_ancestor {
			rewound.push(self.revert_block(&mut diffs));
		}
		if !rewound.is_empty() {
			info!(
				"fork switch: rewound {} blocks to {:?} at height {}",
				rewound.len(),
				common_ancestor,
				self.height()
			);
		}

		// apply the new branch, oldest first
		let mut applied: Vec<Block> = vec![];
		for id in descent.iter().rev() {
			match self.apply_block(*id, &mut diffs) {
				Ok(()) => applied.push(self.node(id).block.clone()),
				Err(e) => {
					warn!("block {:?} failed to apply during fork switch: {}", id, e);
					self.mark_bad_with_descendants(*id);

					// undo the partial switch, then restore the original chain
					let mut scratch = vec![];
					for _ in 0..applied.len() {
						self.revert_block(&mut scratch);
					}
					for original in rewound.iter().rev() {
						let oid = original.id();
						if self.apply_block(oid, &mut scratch).is_err() {
							let fatal = Error::from(ErrorKind::Fatal(format!(
								"once-valid block {:?} no longer applies after rewind",
								oid
							)));
							error!("{}", fatal);
							panic!("{}", fatal);
						}
					}
					for original in rewound.iter().rev() {
						for tx in &original.transactions {
							self.pool.remove_confirmed(tx);
						}
					}
					return Err(e);
				}
			}
		}

		// pending transactions confirmed (or conflicted) by the new branch
		// leave the pool
		for b in &applied {
			for tx in &b.transactions {
				self.pool.remove_confirmed(tx);
			}
		}

		Ok(ChainUpdate {
			rewound,
			applied,
			diffs,
		})
	}

	fn mark_bad_with_descendants(&mut self, id: BlockId) {
		let mut stack = vec![id];
		while let Some(bad) = stack.pop() {
			self.bad_blocks.insert(bad);
			if let Some(node) = self.block_map.get(&bad) {
				stack.extend(node.children.iter().cloned());
			}
		}
	}

	// Applies the block with the given id on top of the current tip. Either
	// the whole block applies or state is left untouched: a transaction
	// failing validation rolls back the ones before it.
	fn apply_block(&mut self, id: BlockId, diffs: &mut Vec<OutputDiff>) -> Result<(), Error> {
		let (block, height) = {
			let node = self.node(&id);
			(node.block.clone(), node.height)
		};
		debug_assert_eq!(
			block.parent_id,
			*self.path.last().expect("path lost its genesis entry"),
			"applying a block that does not extend the tip"
		);

		let mut local = vec![];
		let mut fees: Currency = 0;
		for (k, tx) in block.transactions.iter().enumerate() {
			// state moved since pool admission, so every transaction is
			// validated again at application time
			if let Err(e) = self.validate_transaction(tx) {
				for done in block.transactions[..k].iter().rev() {
					self.revert_transaction(done, height, &mut local, false);
				}
				return Err(e);
			}
			self.apply_transaction(tx, &mut local);
			fees = fees.saturating_add(tx.total_fees());
		}

		self.path.push(id);
		self.contract_maintenance(id, height, &mut local);

		let subsidy_id = block_subsidy_output_id(id);
		let subsidy = Output {
			value: self.params.block_subsidy(height).saturating_add(fees),
			spend_hash: block.miner_address,
		};
		self.unspent.insert(subsidy_id, subsidy);
		local.push(OutputDiff {
			new: true,
			id: subsidy_id,
			output: subsidy,
		});

		diffs.append(&mut local);
		Ok(())
	}

	// Reverses the tip block, restoring the maps to their exact contents
	// before it was applied, and returns it. Mirrors apply_block step by
	// step, in reverse order.
	fn revert_block(&mut self, diffs: &mut Vec<OutputDiff>) -> Block {
		let id = *self.path.last().expect("path lost its genesis entry");
		assert!(self.path.len() > 1, "attempted to rewind genesis");
		let node = self.node(&id).clone();
		let height = node.height;

		// subsidy output
		let subsidy_id = block_subsidy_output_id(id);
		let subsidy = self
			.unspent
			.remove(&subsidy_id)
			.expect("subsidy output missing on rewind");
		diffs.push(OutputDiff {
			new: false,
			id: subsidy_id,
			output: subsidy,
		});

		// terminated contracts come back exactly as recorded
		for oc in &node.terminations {
			let success = oc.failures < oc.contract.tolerance;
			let out_id = contract_termination_output_id(oc.id, success);
			let output = self
				.unspent
				.remove(&out_id)
				.expect("termination output missing on rewind");
			diffs.push(OutputDiff {
				new: false,
				id: out_id,
				output,
			});
			self.open_contracts.insert(oc.id, oc.clone());
		}

		// missed-proof penalties undone
		let mut missed_contracts = HashSet::new();
		for (out_id, contract_id) in &node.missed_proofs {
			missed_contracts.insert(*contract_id);
			let output = self
				.unspent
				.remove(out_id)
				.expect("missed proof output missing on rewind");
			diffs.push(OutputDiff {
				new: false,
				id: *out_id,
				output,
			});
			let oc = self
				.open_contracts
				.get_mut(contract_id)
				.expect("missed proof contract not open on rewind");
			oc.funds_remaining += output.value;
			oc.failures -= 1;
			oc.window_satisfied = false;
		}

		// window boundary flag resets undone: a contract at its boundary
		// that recorded no miss had a satisfied window
		for (contract_id, oc) in self.open_contracts.iter_mut() {
			let c = &oc.contract;
			if height > c.start
				&& (height - c.start) % c.challenge_frequency == 0
				&& !missed_contracts.contains(contract_id)
			{
				oc.window_satisfied = true;
			}
		}

		// transactions in reverse order
		for tx in node.block.transactions.iter().rev() {
			self.revert_transaction(tx, height, diffs, true);
		}

		self.path.pop();
		let stored = self
			.block_map
			.get_mut(&id)
			.expect("block tree lost a referenced node");
		stored.terminations.clear();
		stored.missed_proofs.clear();

		node.block
	}

	// Applies a validated transaction to the maps.
	fn apply_transaction(&mut self, tx: &Transaction, diffs: &mut Vec<OutputDiff>) {
		let height = self.height();

		for input in &tx.inputs {
			let output = self
				.unspent
				.remove(&input.output_id)
				.expect("validated input vanished from the unspent set");
			self.spent.insert(input.output_id, output);
			diffs.push(OutputDiff {
				new: false,
				id: input.output_id,
				output,
			});
		}
		for (i, output) in tx.outputs.iter().enumerate() {
			let out_id = tx.output_id(i);
			self.unspent.insert(out_id, *output);
			diffs.push(OutputDiff {
				new: true,
				id: out_id,
				output: *output,
			});
		}
		for (i, c) in tx.file_contracts.iter().enumerate() {
			let contract_id = tx.contract_id(i);
			self.open_contracts
				.insert(contract_id, OpenContract::new(c.clone(), contract_id));
		}
		for proof in &tx.storage_proofs {
			let oc = self
				.open_contracts
				.get_mut(&proof.contract_id)
				.expect("validated proof contract vanished");
			let window = contract::window_index(&oc.contract, height)
				.expect("validated proof window vanished");
			let payout = min(oc.contract.valid_proof_payout, oc.funds_remaining);
			oc.funds_remaining -= payout;
			oc.window_satisfied = true;
			let out_id = storage_proof_output_id(proof.contract_id, window, true);
			let output = Output {
				value: payout,
				spend_hash: oc.contract.valid_proof_address,
			};
			self.unspent.insert(out_id, output);
			diffs.push(OutputDiff {
				new: true,
				id: out_id,
				output,
			});
		}
	}

	// Reverses one transaction of the block at `block_height`. The windows
	// of its storage proofs are computed against the height the transaction
	// was validated at, the parent's.
	fn revert_transaction(
		&mut self,
		tx: &Transaction,
		block_height: Height,
		diffs: &mut Vec<OutputDiff>,
		re_add_to_pool: bool,
	) {
		let validation_height = block_height - 1;

		for proof in &tx.storage_proofs {
			let oc = self
				.open_contracts
				.get_mut(&proof.contract_id)
				.expect("proof contract not open on rewind");
			let window = contract::window_index(&oc.contract, validation_height)
				.expect("proof window vanished on rewind");
			let out_id = storage_proof_output_id(proof.contract_id, window, true);
			let output = self
				.unspent
				.remove(&out_id)
				.expect("proof output missing on rewind");
			diffs.push(OutputDiff {
				new: false,
				id: out_id,
				output,
			});
			oc.funds_remaining += output.value;
			oc.window_satisfied = false;
		}
		for (i, _) in tx.file_contracts.iter().enumerate() {
			let contract_id = tx.contract_id(i);
			self.open_contracts
				.remove(&contract_id)
				.expect("opened contract missing on rewind");
		}
		for (i, _) in tx.outputs.iter().enumerate().rev() {
			let out_id = tx.output_id(i);
			let output = self
				.unspent
				.remove(&out_id)
				.expect("created output missing on rewind");
			diffs.push(OutputDiff {
				new: false,
				id: out_id,
				output,
			});
		}
		for input in &tx.inputs {
			let output = self
				.spent
				.remove(&input.output_id)
				.expect("spent output missing on rewind");
			self.unspent.insert(input.output_id, output);
			diffs.push(OutputDiff {
				new: true,
				id: input.output_id,
				output,
			});
		}

		if re_add_to_pool {
			if self.pool.conflicts(tx) {
				debug!("rewound transaction conflicts with the pool, dropping");
			} else if let Err(e) = self.pool.add(tx.clone()) {
				debug!("rewound transaction refused by the pool: {}", e);
			}
		}
	}

	// The passive contract transitions of the block at `id`, which has just
	// become the tip at `height`: penalize unsatisfied closed windows, then
	// terminate contracts that ran out of funds, time or tolerance. Records
	// what it did on the node for rewind.
	fn contract_maintenance(&mut self, id: BlockId, height: Height, diffs: &mut Vec<OutputDiff>) {
		let mut contract_ids: Vec<ContractId> = self.open_contracts.keys().cloned().collect();
		contract_ids.sort();

		// missed proof pass
		let mut missed_records = vec![];
		for contract_id in &contract_ids {
			let oc = self
				.open_contracts
				.get_mut(contract_id)
				.expect("maintenance lost an open contract");
			let c = &oc.contract;
			if height > c.start && (height - c.start) % c.challenge_frequency == 0 {
				if !oc.window_satisfied {
					let closed_window = (height - c.start) / c.challenge_frequency - 1;
					let payout = min(c.missed_proof_payout, oc.funds_remaining);
					let out_id = storage_proof_output_id(*contract_id, closed_window, false);
					let output = Output {
						value: payout,
						spend_hash: c.missed_proof_address,
					};
					oc.funds_remaining -= payout;
					oc.failures += 1;
					self.unspent.insert(out_id, output);
					diffs.push(OutputDiff {
						new: true,
						id: out_id,
						output,
					});
					missed_records.push((out_id, *contract_id));
					debug!(
						"contract {:?} missed window {} at height {}",
						contract_id, closed_window, height
					);
				}
				oc.window_satisfied = false;
			}
		}

		// termination pass
		let mut termination_records = vec![];
		for contract_id in &contract_ids {
			let due = match self.open_contracts.get(contract_id) {
				Some(oc) => {
					oc.funds_remaining == 0
						|| oc.contract.end == height
						|| oc.failures == oc.contract.tolerance
				}
				None => false,
			};
			if !due {
				continue;
			}
			let oc = self
				.open_contracts
				.remove(contract_id)
				.expect("terminating contract vanished");
			let success = oc.failures < oc.contract.tolerance;
			let out_id = contract_termination_output_id(*contract_id, success);
			let address = if success {
				oc.contract.valid_proof_address
			} else {
				oc.contract.missed_proof_address
			};
			let output = Output {
				value: oc.funds_remaining,
				spend_hash: address,
			};
			self.unspent.insert(out_id, output);
			diffs.push(OutputDiff {
				new: true,
				id: out_id,
				output,
			});
			debug!(
				"contract {:?} terminated at height {}, {} remaining to {:?}",
				contract_id, height, output.value, address
			);
			termination_records.push(oc);
		}

		let node = self
			.block_map
			.get_mut(&id)
			.expect("block tree lost a referenced node");
		node.missed_proofs = missed_records;
		node.terminations = termination_records;
	}

	/// Validates a transaction against current state: inputs exist and are
	/// mature, values conserve exactly, contracts and storage proofs are
	/// sound, and every input carries its full set of signatures.
	pub fn validate_transaction(&self, tx: &Transaction) -> Result<(), Error> {
		let height = self.height();

		// the canonical encoding bounds every variable field at 255
		let cap = u8::max_value() as usize;
		if tx.arbitrary_data.len() > cap
			|| tx.inputs.len() > cap
			|| tx.outputs.len() > cap
			|| tx.miner_fees.len() > cap
			|| tx.file_contracts.len() > cap
			|| tx.storage_proofs.len() > cap
			|| tx.signatures.len() > cap
		{
			return Err(ErrorKind::OversizedField.into());
		}
		for data in &tx.arbitrary_data {
			if data.len() > cap {
				return Err(ErrorKind::OversizedField.into());
			}
		}

		// inputs: existing, unspent, matching conditions, mature
		let mut seen = HashSet::new();
		let mut input_sum: Currency = 0;
		for input in &tx.inputs {
			if !seen.insert(input.output_id) {
				return Err(ErrorKind::DoubleSpend(input.output_id).into());
			}
			let output = self
				.unspent
				.get(&input.output_id)
				.ok_or_else(|| Error::from(ErrorKind::MissingOutput(input.output_id)))?;
			if input.spend_conditions.coin_address() != output.spend_hash {
				return Err(ErrorKind::WrongSpendConditions.into());
			}
			if input.spend_conditions.timelock > height {
				return Err(ErrorKind::Timelock.into());
			}
			input_sum = input_sum
				.checked_add(output.value)
				.ok_or_else(|| Error::from(ErrorKind::CurrencyOverflow))?;
		}

		// outputs: fresh ids, summed
		let mut output_sum: Currency = 0;
		for (i, output) in tx.outputs.iter().enumerate() {
			let out_id = tx.output_id(i);
			if self.unspent.contains_key(&out_id) || self.spent.contains_key(&out_id) {
				return Err(ErrorKind::OutputAlreadyExists(out_id).into());
			}
			output_sum = output_sum
				.checked_add(output.value)
				.ok_or_else(|| Error::from(ErrorKind::CurrencyOverflow))?;
		}
		for fee in &tx.miner_fees {
			output_sum = output_sum
				.checked_add(*fee)
				.ok_or_else(|| Error::from(ErrorKind::CurrencyOverflow))?;
		}

		// contracts: sane terms, fresh ids, funds accounted
		for (i, c) in tx.file_contracts.iter().enumerate() {
			contract::validate_contract(c, height)?;
			let contract_id = tx.contract_id(i);
			if self.open_contracts.contains_key(&contract_id) {
				return Err(
					ErrorKind::InvalidContract("contract already open".to_string()).into(),
				);
			}
			output_sum = output_sum
				.checked_add(c.fund)
				.ok_or_else(|| Error::from(ErrorKind::CurrencyOverflow))?;
		}

		// storage proofs, one per contract per transaction
		let mut proved = HashSet::new();
		for proof in &tx.storage_proofs {
			if !proved.insert(proof.contract_id) {
				return Err(ErrorKind::ProofAlreadyComplete.into());
			}
			self.validate_storage_proof(proof, height)?;
		}

		// exact conservation; inflation only ever enters via the subsidy
		if input_sum != output_sum {
			return Err(ErrorKind::CurrencyMismatch {
				inputs: input_sum,
				outputs: output_sum,
			}
			.into());
		}

		self.validate_signatures(tx, height)
	}

	fn validate_storage_proof(
		&self,
		proof: &silo_core::core::StorageProof,
		height: Height,
	) -> Result<(), Error> {
		let oc = self
			.open_contracts
			.get(&proof.contract_id)
			.ok_or_else(|| Error::from(ErrorKind::ContractNotOpen(proof.contract_id)))?;
		if oc.window_satisfied {
			return Err(ErrorKind::ProofAlreadyComplete.into());
		}
		let window = contract::window_index(&oc.contract, height)?;
		let trigger = contract::trigger_height(&oc.contract, window);
		let trigger_id = self
			.block_id_at(trigger)
			.ok_or_else(|| Error::from(ErrorKind::ProofOutOfWindow))?;
		let segment =
			contract::proof_segment_index(trigger_id, proof.contract_id, oc.contract.file_size);
		contract::verify_proof(proof, &oc.contract, segment)
	}

	// Every input must collect exactly its required number of signatures,
	// no key index twice, every signature mature and verifying against the
	// digest its covered-fields mask defines.
	fn validate_signatures(&self, tx: &Transaction, height: Height) -> Result<(), Error> {
		let mut remaining: HashMap<OutputId, u64> = HashMap::new();
		for input in &tx.inputs {
			remaining.insert(input.output_id, input.spend_conditions.num_signatures);
		}

		let mut used = HashSet::new();
		for (i, sig) in tx.signatures.iter().enumerate() {
			let left = remaining
				.get_mut(&sig.input_id)
				.ok_or_else(|| Error::from(ErrorKind::InvalidSignature))?;
			if *left == 0 {
				return Err(ErrorKind::FrivolousSignature.into());
			}
			if !used.insert((sig.input_id, sig.public_key_index)) {
				return Err(ErrorKind::InvalidSignature.into());
			}
			if sig.timelock > height {
				return Err(ErrorKind::Timelock.into());
			}

			let input = tx
				.inputs
				.iter()
				.find(|input| input.output_id == sig.input_id)
				.expect("signature map built from inputs");
			let public_key = input
				.spend_conditions
				.public_keys
				.get(sig.public_key_index as usize)
				.ok_or_else(|| Error::from(ErrorKind::InvalidSignature))?;

			let digest = tx.sighash(i)?;
			if let Err(e) = silo_keychain::verify(&digest.0, public_key, &sig.signature) {
				return Err(match e {
					silo_keychain::Error::InvalidSignature => {
						ErrorKind::InvalidSignature.into()
					}
					other => ErrorKind::Keychain(other).into(),
				});
			}
			*left -= 1;
		}

		if remaining.values().any(|left| *left > 0) {
			return Err(ErrorKind::MissingSignatures.into());
		}
		Ok(())
	}
}
