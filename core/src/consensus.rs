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

//! All the rules required for the network to reach consensus are complex
//! and hard to completely isolate. Some can be simple parameters (like the
//! block subsidy), others complex algorithms (like Merkle trees or reorg
//! rules). As long as they're simple enough, consensus-relevant constants
//! and short functions are kept here, bundled into the parameter set fixed
//! when an engine is instantiated.

use crate::core::hash::ZERO_HASH;
use crate::core::target::Target;
use crate::core::{Address, Currency, Height, Stamp};

/// Number of block timestamps a node keeps for the median-time check. A new
/// block's timestamp must exceed the median of its parent's window.
pub const TIMESTAMP_WINDOW: usize = 11;

/// The consensus parameters an engine runs under. Fixed at instantiation;
/// every node on a network must agree on all of them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainParams {
	/// Target seconds between blocks.
	pub block_frequency: u64,
	/// Number of blocks difficulty is averaged over.
	pub target_window: u64,
	/// Max seconds into the future a block timestamp may be.
	pub future_threshold: i64,
	/// Upper clamp on a single difficulty adjustment, as num/den.
	pub max_adjustment_up: (u64, u64),
	/// Lower clamp on a single difficulty adjustment, as num/den.
	pub max_adjustment_down: (u64, u64),
	/// Fractional margin a fork must be heavier by to trigger a reorg.
	pub surpass_threshold: (u64, u64),
	/// The target blocks building on genesis must meet.
	pub root_target: Target,
	/// Cumulative depth assigned to genesis (inverse weight, so all-FF means
	/// no accumulated work).
	pub root_depth: Target,
	/// Subsidy paid by the genesis block, from which the schedule declines.
	pub initial_subsidy: Currency,
	/// The floor the subsidy schedule never drops below.
	pub min_subsidy: Currency,
	/// Timestamp baked into the genesis block.
	pub genesis_timestamp: Stamp,
	/// Address the genesis subsidy pays out to.
	pub genesis_address: Address,
}

impl Default for ChainParams {
	fn default() -> ChainParams {
		let mut root_target = [0u8; 32];
		root_target[2] = 1;
		ChainParams {
			block_frequency: 600,
			target_window: 1000,
			future_threshold: 3 * 60 * 60,
			max_adjustment_up: (1001, 1000),
			max_adjustment_down: (999, 1000),
			surpass_threshold: (5, 100),
			root_target: Target(root_target),
			root_depth: Target::max_value(),
			initial_subsidy: 300_000,
			min_subsidy: 30_000,
			genesis_timestamp: 1_444_000_000,
			genesis_address: ZERO_HASH,
		}
	}
}

impl ChainParams {
	/// A parameter set for tests: trivial proof of work, short windows,
	/// permissive clocks. Mirrors the easy-pow switch real networks never
	/// run with.
	pub fn testing() -> ChainParams {
		ChainParams {
			block_frequency: 1,
			target_window: 5,
			future_threshold: 1 << 40,
			max_adjustment_up: (3, 1),
			max_adjustment_down: (1, 3),
			surpass_threshold: (5, 100),
			root_target: Target([0xff; 32]),
			root_depth: Target::max_value(),
			initial_subsidy: 25_000,
			min_subsidy: 2_500,
			genesis_timestamp: 1_000_000,
			genesis_address: ZERO_HASH,
		}
	}

	/// The inflation part of a block's subsidy at the given height: declines
	/// one coin per block from the initial subsidy down to the floor.
	pub fn block_subsidy(&self, height: Height) -> Currency {
		let declining = self.initial_subsidy.saturating_sub(height);
		if declining < self.min_subsidy {
			self.min_subsidy
		} else {
			declining
		}
	}
}
