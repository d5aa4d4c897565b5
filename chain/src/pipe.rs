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

//! Header-level block validation and difficulty adjustment: the cheap
//! stateless part of the acceptance pipeline. The checks are ordered by
//! cost to keep the DoS surface small; the engine in `chain` runs them
//! before a block touches any state.

use silo_core::consensus::ChainParams;
use silo_core::core::target::Target;
use silo_core::core::{Block, Height, Stamp};

use crate::error::{Error, ErrorKind};
use crate::types::BlockNode;

/// First level of block validation, acting only on the header against the
/// parent node: timestamp sanity, proof of work, then the transaction
/// merkle commitment.
pub fn validate_header(
	b: &Block,
	parent: &BlockNode,
	params: &ChainParams,
	now: Stamp,
) -> Result<(), Error> {
	if b.timestamp <= parent.median_timestamp() {
		return Err(ErrorKind::TimestampTooEarly.into());
	}
	if b.timestamp > now + params.future_threshold {
		return Err(ErrorKind::TimestampTooFarFuture.into());
	}
	if !parent.target.meets(&b.id()) {
		return Err(ErrorKind::TargetNotMet.into());
	}
	if b.merkle_root != b.transaction_merkle_root() {
		return Err(ErrorKind::MerkleRootMismatch.into());
	}
	Ok(())
}

/// The target a child of `parent` leaves for its own children: the parent
/// target scaled by how far the chain drifted from one block per
/// `block_frequency` seconds over the adjustment window, clamped so a
/// single block can only move difficulty a little. Below a full window the
/// measurement anchors at genesis.
pub fn child_target(
	params: &ChainParams,
	parent_target: &Target,
	child_height: Height,
	child_timestamp: Stamp,
	anchor_timestamp: Stamp,
) -> Target {
	let window = if child_height < params.target_window {
		child_height
	} else {
		params.target_window
	};
	let expected = (params.block_frequency * window) as i64;
	let actual = child_timestamp - anchor_timestamp;

	let (up_num, up_den) = params.max_adjustment_up;
	let (down_num, down_den) = params.max_adjustment_down;

	// adjustment = actual / expected, clamped to [down, up]
	let (num, den) = if actual <= 0
		|| (actual as u128) * (down_den as u128) < (expected as u128) * (down_num as u128)
	{
		(down_num, down_den)
	} else if (actual as u128) * (up_den as u128) > (expected as u128) * (up_num as u128) {
		(up_num, up_den)
	} else {
		(actual as u64, expected as u64)
	};
	parent_target.mul_ratio(num, den)
}

#[cfg(test)]
mod test {
	use super::*;
	use silo_core::consensus::TIMESTAMP_WINDOW;
	use silo_core::core::hash::ZERO_HASH;
	use silo_core::genesis::genesis;

	fn genesis_node(params: &ChainParams) -> BlockNode {
		let g = genesis(params);
		let stamp = g.timestamp;
		BlockNode {
			block: g,
			height: 0,
			children: vec![],
			recent_timestamps: [stamp; TIMESTAMP_WINDOW],
			target: params.root_target,
			depth: params.root_depth,
			terminations: vec![],
			missed_proofs: vec![],
		}
	}

	#[test]
	fn median_gates_old_timestamps() {
		let params = ChainParams::testing();
		let parent = genesis_node(&params);
		let now = params.genesis_timestamp + 1000;

		let b = Block::new(parent.block.id(), vec![], ZERO_HASH, params.genesis_timestamp);
		assert_eq!(
			validate_header(&b, &parent, &params, now).unwrap_err().kind(),
			ErrorKind::TimestampTooEarly
		);

		let b = Block::new(
			parent.block.id(),
			vec![],
			ZERO_HASH,
			params.genesis_timestamp + 1,
		);
		validate_header(&b, &parent, &params, now).unwrap();
	}

	#[test]
	fn future_timestamps_refused() {
		let mut params = ChainParams::testing();
		params.future_threshold = 100;
		let parent = genesis_node(&params);
		let now = params.genesis_timestamp;

		let b = Block::new(parent.block.id(), vec![], ZERO_HASH, now + 101);
		assert_eq!(
			validate_header(&b, &parent, &params, now).unwrap_err().kind(),
			ErrorKind::TimestampTooFarFuture
		);
		let b = Block::new(parent.block.id(), vec![], ZERO_HASH, now + 100);
		validate_header(&b, &parent, &params, now).unwrap();
	}

	#[test]
	fn unmet_target_refused() {
		let mut params = ChainParams::testing();
		// nothing meets an (almost) zero target
		let mut hard = [0u8; 32];
		hard[31] = 1;
		params.root_target = Target(hard);
		let parent = genesis_node(&params);
		let now = params.genesis_timestamp + 10;

		let b = Block::new(parent.block.id(), vec![], ZERO_HASH, now);
		assert_eq!(
			validate_header(&b, &parent, &params, now).unwrap_err().kind(),
			ErrorKind::TargetNotMet
		);
	}

	#[test]
	fn merkle_commitment_checked() {
		let params = ChainParams::testing();
		let parent = genesis_node(&params);
		let now = params.genesis_timestamp + 10;

		let mut b = Block::new(parent.block.id(), vec![], ZERO_HASH, now);
		b.merkle_root = silo_core::core::hash::hash_bytes(b"somewhere else");
		assert_eq!(
			validate_header(&b, &parent, &params, now).unwrap_err().kind(),
			ErrorKind::MerkleRootMismatch
		);
	}

	#[test]
	fn target_adjustment_clamped() {
		let params = ChainParams {
			block_frequency: 10,
			target_window: 100,
			max_adjustment_up: (1001, 1000),
			max_adjustment_down: (999, 1000),
			..ChainParams::testing()
		};
		let mut bytes = [0u8; 32];
		bytes[16] = 1;
		let parent_target = Target(bytes);

		// on schedule at a full window: 100 blocks, 1000 seconds
		let on_pace = child_target(&params, &parent_target, 200, 1000, 0);
		assert_eq!(on_pace, parent_target.mul_ratio(1000, 1000));

		// crawling chain: clamped up
		let slow = child_target(&params, &parent_target, 200, 1_000_000, 0);
		assert_eq!(slow, parent_target.mul_ratio(1001, 1000));

		// racing chain: clamped down, including the nonsense negative case
		let fast = child_target(&params, &parent_target, 200, 1, 0);
		assert_eq!(fast, parent_target.mul_ratio(999, 1000));
		let backwards = child_target(&params, &parent_target, 200, 0, 50);
		assert_eq!(backwards, parent_target.mul_ratio(999, 1000));

		// below a full window the expected time scales with height
		let early = child_target(&params, &parent_target, 4, 40, 0);
		assert_eq!(early, parent_target.mul_ratio(40, 40));
	}
}
