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

//! Assembly of a full node: engine, orchestrator, adapters and p2p server,
//! wired and started together.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;

use silo_p2p as p2p;

use crate::common::adapters::NetToCoreAdapter;
use crate::common::types::{Error, ServerConfig, Sinks};
use crate::core::Core;
use crate::mining::Miner;

/// A running node.
pub struct Server {
	/// The configuration it was built from.
	pub config: ServerConfig,
	core: Arc<Core>,
	p2p_server: Arc<p2p::Server>,
	/// The address the p2p listener actually bound.
	pub p2p_addr: SocketAddr,
	dispatcher: Option<thread::JoinHandle<()>>,
	miner: Option<Arc<Miner>>,
}

impl Server {
	/// Builds and starts a node: boots the engine, starts the dispatcher
	/// and the p2p listener, and dials the seed peers.
	pub fn start(config: ServerConfig, sinks: Sinks) -> Result<Server, Error> {
		let core = Arc::new(Core::new(
			config.chain_params.clone(),
			sinks,
			config.payout_address,
		));

		let adapter = Arc::new(NetToCoreAdapter::new(
			core.chain(),
			core.block_channel(),
			core.txn_channel(),
		));
		let p2p_server = Arc::new(p2p::Server::new(config.p2p_config.clone(), adapter.clone()));

		let peers = p2p_server.peers();
		adapter.init_peers(peers.clone());
		core.init_peers(peers);
		core.init_net_adapter(adapter);

		let miner = if config.run_test_miner {
			let miner = Miner::new(core.block_channel());
			core.add_miner_sink(miner.clone());
			Miner::start(miner.clone());
			Some(miner)
		} else {
			None
		};

		let dispatcher = Core::start(core.clone());
		let (p2p_addr, _accept_handle) = p2p_server.listen()?;

		// hand the miners their first template
		core.rebuild_miner_templates();

		for seed in &config.seed_addrs {
			match seed.parse::<SocketAddr>() {
				Ok(addr) => {
					if let Err(e) = p2p_server.connect(addr) {
						warn!("could not reach seed peer {}: {}", addr, e);
					}
				}
				Err(e) => warn!("ignoring malformed seed address {}: {}", seed, e),
			}
		}

		Ok(Server {
			config,
			core,
			p2p_server,
			p2p_addr,
			dispatcher: Some(dispatcher),
			miner,
		})
	}

	/// The orchestrator, for local producers (a miner delivering blocks, a
	/// wallet submitting transactions).
	pub fn core(&self) -> Arc<Core> {
		self.core.clone()
	}

	/// The p2p server, for connecting to more peers.
	pub fn p2p(&self) -> Arc<p2p::Server> {
		self.p2p_server.clone()
	}

	/// Stops the node: the listener closes and the dispatcher drains its
	/// channels before the call returns.
	pub fn stop(&mut self) {
		if let Some(miner) = &self.miner {
			miner.stop();
		}
		self.p2p_server.stop();
		self.core.shutdown();
		if let Some(handle) = self.dispatcher.take() {
			let _ = handle.join();
		}
		info!("server stopped");
	}
}
