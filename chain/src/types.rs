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

//! Base types the consensus engine is built from.

use silo_core::consensus::TIMESTAMP_WINDOW;
use silo_core::core::target::Target;
use silo_core::core::{
	Block, BlockId, ContractId, Currency, FileContract, Height, Output, OutputId, Stamp,
};

/// A node of the block tree. Nodes live forever in an append-only arena
/// keyed by block id; children are referenced by id so forks form no cycles.
/// The node also carries the undo records (terminations, missed proofs)
/// needed to rewind the passive contract transitions its block performed.
#[derive(Clone, Debug)]
pub struct BlockNode {
	/// The block itself.
	pub block: Block,
	/// Distance from genesis.
	pub height: Height,
	/// Ids of the blocks building on this one.
	pub children: Vec<BlockId>,
	/// Timestamps of this block and its recent ancestors, oldest first.
	/// A child's timestamp must exceed the median of its parent's window.
	pub recent_timestamps: [Stamp; TIMESTAMP_WINDOW],
	/// The target blocks building on this node must meet.
	pub target: Target,
	/// Cumulative weight of the chain ending here, as an inverse: smaller
	/// is heavier.
	pub depth: Target,
	/// Contracts this block terminated, by copy, for rewind.
	pub terminations: Vec<OpenContract>,
	/// Missed-proof outputs this block emitted: (output id, contract id).
	pub missed_proofs: Vec<(OutputId, ContractId)>,
}

impl BlockNode {
	/// Median of the recent timestamp window.
	pub fn median_timestamp(&self) -> Stamp {
		let mut sorted = self.recent_timestamps;
		sorted.sort();
		sorted[TIMESTAMP_WINDOW / 2]
	}
}

/// A file contract while it is open, with the state the engine maintains
/// block by block.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OpenContract {
	/// The contract terms as accepted.
	pub contract: FileContract,
	/// The contract's id.
	pub id: ContractId,
	/// Coins still locked in the contract.
	pub funds_remaining: Currency,
	/// Windows missed so far; the contract fails at the tolerance.
	pub failures: u64,
	/// Whether the current window has seen a valid proof.
	pub window_satisfied: bool,
}

impl OpenContract {
	/// The open-contract state of a freshly accepted contract: all funds in
	/// place, no failures, and the first window still waiting on its proof.
	pub fn new(contract: FileContract, id: ContractId) -> OpenContract {
		let funds_remaining = contract.fund;
		OpenContract {
			contract,
			id,
			funds_remaining,
			failures: 0,
			window_satisfied: false,
		}
	}
}

/// A single change to the unspent output set.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OutputDiff {
	/// True when the output entered the unspent set, false when it left.
	pub new: bool,
	/// The output's id.
	pub id: OutputId,
	/// The output itself.
	pub output: Output,
}

/// What a successful block acceptance did to the chosen chain: blocks
/// rewound (newest first), blocks applied (oldest first), and the resulting
/// unspent set diffs in the order they happened. Empty for a block admitted
/// onto a side fork.
#[derive(Clone, Debug, Default)]
pub struct ChainUpdate {
	/// Blocks removed from the path, newest first.
	pub rewound: Vec<Block>,
	/// Blocks added to the path, in application order.
	pub applied: Vec<Block>,
	/// Unspent set changes, rewinds before applies.
	pub diffs: Vec<OutputDiff>,
}

impl ChainUpdate {
	/// Whether the update moved the path at all.
	pub fn is_empty(&self) -> bool {
		self.rewound.is_empty() && self.applied.is_empty()
	}
}

/// The tip of the currently chosen fork.
#[derive(Clone, Debug)]
pub struct Tip {
	/// Height of the tip.
	pub height: Height,
	/// Id of the tip block.
	pub id: BlockId,
	/// Cumulative (inverse) weight of the chain ending at the tip.
	pub depth: Target,
}
