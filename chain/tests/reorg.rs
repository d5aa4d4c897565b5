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

//! Fork switches: rewind-and-replay must leave the engine exactly where a
//! direct application of the winning branch would have.

mod common;

use common::*;

const NOW: i64 = 1_000_000_000;

#[test]
fn longer_fork_wins() {
	let mut chain = testing_chain(1);

	// a first block everyone agrees on
	mine_and_accept(&mut chain, address(9));
	let t0 = chain.tip().id;

	// two rival children of the same parent
	let fork1a = mine_block(&chain, vec![], address(0xaa));
	let fork2a = mine_block(&chain, vec![], address(0xbb));
	assert_ne!(fork1a.id(), fork2a.id());

	// fork2a arrives first and extends the tip
	chain.accept_block(fork2a.clone(), NOW).unwrap();
	assert_eq!(chain.tip().id, fork2a.id());

	// fork1a is admitted but equal weight moves nothing
	let update = chain.accept_block(fork1a.clone(), NOW).unwrap();
	assert!(update.is_empty());
	assert_eq!(chain.tip().id, fork2a.id());

	// a child of fork1a makes that branch heavier: the tip must flip
	let fork1b = mine_child(&chain, &fork1a, vec![], address(0xcc));
	let update = chain.accept_block(fork1b.clone(), NOW).unwrap();
	assert_eq!(chain.tip().id, fork1b.id());
	assert_eq!(chain.tip().height, 3);

	// the switch rewound fork2a and applied fork1a then fork1b
	assert_eq!(update.rewound, vec![fork2a]);
	assert_eq!(update.applied, vec![fork1a.clone(), fork1b.clone()]);
	// negative diffs (the rewind) come before the positive ones
	assert!(!update.diffs[0].new);

	// a chain that saw only the winning branch has identical state
	let mut direct = testing_chain(1);
	mine_and_accept(&mut direct, address(9));
	direct.accept_block(fork1a, NOW).unwrap();
	direct.accept_block(fork1b, NOW).unwrap();
	assert_eq!(chain.tip().id, direct.tip().id);
	assert_eq!(chain.unspent_outputs(), direct.unspent_outputs());
}

#[test]
fn reorg_rewinds_transactions_into_the_pool() {
	let mut chain = testing_chain(1);
	let subsidy_0 = genesis_subsidy_id(&chain);

	// confirm a payment on the current branch
	let tx = spend_output(subsidy_0, 1, &[(25_000, address(2))], 0);
	let payment_id = tx.output_id(0);
	chain.accept_transaction(tx).unwrap();
	mine_and_accept(&mut chain, address(9));
	assert!(chain.unspent_output(&payment_id).is_some());
	assert_eq!(chain.pool_size(), 0);

	// a heavier empty fork from genesis takes over
	let genesis = chain.get_block(&chain.genesis_id()).unwrap().clone();
	let f1 = mine_child(&chain, &genesis, vec![], address(0xaa));
	let f2 = mine_child(&chain, &f1, vec![], address(0xaa));
	chain.accept_block(f1, NOW).unwrap();
	let update = chain.accept_block(f2, NOW).unwrap();
	assert_eq!(update.rewound.len(), 1);
	assert_eq!(update.applied.len(), 2);

	// the payment was rewound: its output is gone, the subsidy is back,
	// and the transaction waits in the pool again
	assert!(chain.unspent_output(&payment_id).is_none());
	assert!(chain.unspent_output(&subsidy_0).is_some());
	assert_eq!(chain.pool_size(), 1);
}
