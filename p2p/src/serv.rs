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

//! The p2p server: accepts inbound connections and hands each one to its
//! own handler thread. Peer state lives in the `Peers` directory; engine
//! state is only ever reached through the adapter.

use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::peer::Peer;
use crate::peers::Peers;
use crate::protocol;
use crate::types::{Error, NetAdapter, P2PConfig};

/// The p2p listener and its peer directory.
pub struct Server {
	config: P2PConfig,
	peers: Arc<Peers>,
	adapter: Arc<dyn NetAdapter>,
	stop: Arc<AtomicBool>,
}

impl Server {
	/// Builds a server; `listen` starts it.
	pub fn new(config: P2PConfig, adapter: Arc<dyn NetAdapter>) -> Server {
		Server {
			config,
			peers: Arc::new(Peers::new()),
			adapter,
			stop: Arc::new(AtomicBool::new(false)),
		}
	}

	/// The peer directory, shared with whoever needs to broadcast.
	pub fn peers(&self) -> Arc<Peers> {
		self.peers.clone()
	}

	/// Binds the configured address and accepts connections until `stop`,
	/// one handler thread per connection. Returns the bound address (the
	/// config may ask for an ephemeral port) and the accept-loop handle.
	pub fn listen(&self) -> Result<(SocketAddr, thread::JoinHandle<()>), Error> {
		let listener = TcpListener::bind((self.config.host.as_str(), self.config.port))?;
		listener.set_nonblocking(true)?;
		let local_addr = listener.local_addr()?;
		info!("p2p server listening on {}", local_addr);

		let adapter = self.adapter.clone();
		let stop = self.stop.clone();
		let handle = thread::Builder::new()
			.name("p2p-accept".to_string())
			.spawn(move || loop {
				if stop.load(Ordering::Relaxed) {
					return;
				}
				match listener.accept() {
					Ok((conn, addr)) => {
						debug!("inbound connection from {}", addr);
						// the listener is nonblocking, its connections must
						// not be
						let _ = conn.set_nonblocking(false);
						let adapter = adapter.clone();
						let _ = thread::Builder::new()
							.name(format!("peer-{}", addr))
							.spawn(move || protocol::handle_connection(conn, adapter));
					}
					Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
						thread::sleep(Duration::from_millis(100));
					}
					Err(e) => {
						warn!("accept failed: {}", e);
						thread::sleep(Duration::from_millis(100));
					}
				}
			})
			.map_err(|e| Error::Connection(format!("{}", e)))?;
		Ok((local_addr, handle))
	}

	/// Dials a peer and registers it for broadcasts.
	pub fn connect(&self, addr: SocketAddr) -> Result<Arc<Peer>, Error> {
		let peer = Peer::connect(addr)?;
		info!("connected to peer {}", addr);
		Ok(self.peers.add(peer))
	}

	/// Signals the accept loop to wind down.
	pub fn stop(&self) {
		self.stop.store(true, Ordering::Relaxed);
	}
}
