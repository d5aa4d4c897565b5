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

//! Server-level types: configuration, errors and the sink interfaces the
//! core notifies. Sinks apply updates under their own locks and must never
//! call back into the engine while doing so.

use std::sync::Arc;

use failure::Fail;
use serde_derive::{Deserialize, Serialize};

use silo_chain::OutputDiff;
use silo_core::consensus::ChainParams;
use silo_core::core::target::Target;
use silo_core::core::{Address, Block, BlockId, Height, Stamp, Transaction};
use silo_p2p::P2PConfig;

/// Full server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
	/// The p2p listener configuration.
	pub p2p_config: P2PConfig,
	/// Consensus parameters of the network this node joins.
	pub chain_params: ChainParams,
	/// Addresses of peers to dial at startup.
	pub seed_addrs: Vec<String>,
	/// Address block subsidies mined through this node pay out to.
	pub payout_address: Address,
	/// Whether to run the in-process test miner. Never on in production.
	pub run_test_miner: bool,
}

impl Default for ServerConfig {
	fn default() -> ServerConfig {
		ServerConfig {
			p2p_config: P2PConfig::default(),
			chain_params: ChainParams::default(),
			seed_addrs: vec![],
			payout_address: silo_core::core::hash::ZERO_HASH,
			run_test_miner: false,
		}
	}
}

/// Server-level errors.
#[derive(Debug, Fail)]
pub enum Error {
	/// Trouble in the p2p layer.
	#[fail(display = "p2p error: {}", _0)]
	P2P(silo_p2p::Error),
	/// Trouble in the consensus engine.
	#[fail(display = "chain error: {}", _0)]
	Chain(silo_chain::Error),
}

impl From<silo_p2p::Error> for Error {
	fn from(e: silo_p2p::Error) -> Error {
		Error::P2P(e)
	}
}

impl From<silo_chain::Error> for Error {
	fn from(e: silo_chain::Error) -> Error {
		Error::Chain(e)
	}
}

/// A sink failed to take an update.
#[derive(Clone, Debug, Fail)]
pub enum SinkError {
	/// The sink refused or could not process the update.
	#[fail(display = "sink rejected update: {}", _0)]
	Rejected(String),
}

/// Receives unspent-set changes. Updates arrive in apply order, rewinds
/// (negative diffs) before the winning branch's positive diffs, and must be
/// idempotent with respect to rewind-then-apply of the same block.
pub trait WalletSink: Send + Sync {
	/// A path move: blocks rewound (newest first), blocks applied (oldest
	/// first), and the unspent diffs in order.
	fn update(
		&self,
		rewound: &[Block],
		applied: &[Block],
		diffs: &[OutputDiff],
	) -> Result<(), SinkError>;
}

/// Receives fresh block templates after every successful apply, so the
/// miner always grinds on top of the latest tip.
pub trait MinerSink: Send + Sync {
	/// Rebuild the template: new parent, transactions to include, target to
	/// meet, payout address and the earliest admissible timestamp.
	fn update(
		&self,
		parent_id: BlockId,
		transactions: Vec<Transaction>,
		target: Target,
		payout_address: Address,
		earliest_timestamp: Stamp,
	);
}

/// Receives blocks in the order a host must process them to maintain its
/// contract obligations.
pub trait HostSink: Send + Sync {
	/// A path move starting above `initial_height`.
	fn update(&self, initial_height: Height, rewound: &[Block], applied: &[Block]);
}

/// The collaborators a node notifies.
#[derive(Clone, Default)]
pub struct Sinks {
	/// Wallet-like diff consumers.
	pub wallets: Vec<Arc<dyn WalletSink>>,
	/// Miner template consumers.
	pub miners: Vec<Arc<dyn MinerSink>>,
	/// Host contract-list maintainers.
	pub hosts: Vec<Arc<dyn HostSink>>,
}
