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

//! Definition of the genesis block. Placeholder, will be replaced with
//! mainnet values at network definition time.

use crate::consensus::ChainParams;
use crate::core::hash::ZERO_HASH;
use crate::core::Block;

/// The genesis block of the chain described by the given parameters. Not
/// mined: nodes admit it axiomatically, and its subsidy output seeds the
/// unspent set.
pub fn genesis(params: &ChainParams) -> Block {
	Block {
		parent_id: ZERO_HASH,
		timestamp: params.genesis_timestamp,
		nonce: 0,
		miner_address: params.genesis_address,
		merkle_root: ZERO_HASH,
		transactions: vec![],
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn genesis_is_deterministic() {
		let params = ChainParams::testing();
		assert_eq!(genesis(&params).id(), genesis(&params).id());
		assert_ne!(genesis(&params).id(), genesis(&ChainParams::default()).id());
	}

	#[test]
	fn genesis_commits_to_empty_body() {
		let g = genesis(&ChainParams::testing());
		assert!(g.transactions.is_empty());
		assert_eq!(g.merkle_root, g.transaction_merkle_root());
	}
}
