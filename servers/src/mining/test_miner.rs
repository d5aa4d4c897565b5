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

//! Mining service for tests and toy networks: grinds nonces against the
//! latest template the orchestrator published and hands any solved block
//! back through the block channel. Kept around mostly for automated
//! testing purposes; real networks point real miners at the template
//! interface instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;

use silo_util::Mutex;

use silo_core::core::target::Target;
use silo_core::core::{Address, Block, BlockId, Stamp, Transaction};

use crate::common::types::MinerSink;
use crate::core::BlockChannel;

// nonces tried between checks of the stop flag and the template
const BATCH: u64 = 10_000;

struct Template {
	parent_id: BlockId,
	transactions: Vec<Transaction>,
	target: Target,
	payout_address: Address,
	earliest_timestamp: Stamp,
}

/// The internal miner. Receives templates as a `MinerSink` and delivers
/// solved blocks to the dispatcher.
pub struct Miner {
	template: Mutex<Option<Template>>,
	block_channel: BlockChannel,
	stop: Arc<AtomicBool>,
}

impl Miner {
	/// Builds a miner delivering into the given channel. `start` spins up
	/// the mining thread.
	pub fn new(block_channel: BlockChannel) -> Arc<Miner> {
		Arc::new(Miner {
			template: Mutex::new(None),
			block_channel,
			stop: Arc::new(AtomicBool::new(false)),
		})
	}

	/// Runs the mining loop on its own thread until `stop`.
	pub fn start(miner: Arc<Miner>) -> thread::JoinHandle<()> {
		thread::Builder::new()
			.name("test-miner".to_string())
			.spawn(move || miner.mining_loop())
			.expect("failed to spawn miner")
	}

	/// Signals the mining loop to wind down.
	pub fn stop(&self) {
		self.stop.store(true, Ordering::Relaxed);
	}

	fn mining_loop(&self) {
		while !self.stop.load(Ordering::Relaxed) {
			let template = {
				let mut held = self.template.lock();
				held.take()
			};
			let template = match template {
				Some(t) => t,
				None => {
					thread::sleep(Duration::from_millis(20));
					continue;
				}
			};

			let timestamp = std::cmp::max(template.earliest_timestamp, Utc::now().timestamp());
			let mut b = Block::new(
				template.parent_id,
				template.transactions.clone(),
				template.payout_address,
				timestamp,
			);

			let mut found = false;
			for _ in 0..BATCH {
				if template.target.meets(&b.id()) {
					found = true;
					break;
				}
				b.nonce += 1;
			}

			if found {
				debug!(
					"mined block {:?} over {:?} after {} nonces",
					b.id(),
					b.parent_id,
					b.nonce
				);
				self.block_channel.send(b, None);
				// wait for the template built on the new tip
			} else {
				// put the template back and keep grinding from a fresh
				// timestamp
				let mut held = self.template.lock();
				if held.is_none() {
					*held = Some(template);
				}
			}
		}
	}
}

impl MinerSink for Miner {
	fn update(
		&self,
		parent_id: BlockId,
		transactions: Vec<Transaction>,
		target: Target,
		payout_address: Address,
		earliest_timestamp: Stamp,
	) {
		let mut held = self.template.lock();
		*held = Some(Template {
			parent_id,
			transactions,
			target,
			payout_address,
			earliest_timestamp,
		});
	}
}
