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

//! The catch-up client: presents our block id history to a peer and feeds
//! the returned blocks into the node, round after round, until the peer
//! has nothing newer. Idempotent, so a dropped or repeated round is
//! harmless.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::msg::CatchUpStatus;
use crate::peer;
use crate::types::NetAdapter;

/// Breather between catch-up rounds when the peer reports more blocks
/// available.
pub const CATCH_UP_DELAY: Duration = Duration::from_secs(2);

/// Walks this node up to the given peer's tip, one bounded batch at a
/// time.
pub fn catch_up(peer_addr: SocketAddr, adapter: Arc<dyn NetAdapter>) {
	loop {
		let known = adapter.block_id_history();
		let resp = match peer::request_catch_up(peer_addr, known) {
			Ok(resp) => resp,
			Err(e) => {
				warn!("catch-up round against {} failed: {}", peer_addr, e);
				return;
			}
		};
		match resp.status {
			CatchUpStatus::NoCommonBlock => {
				warn!("no common block with {}, giving up catch-up", peer_addr);
				return;
			}
			CatchUpStatus::Complete | CatchUpStatus::MoreAvailable => {
				debug!(
					"catch-up: {} blocks from {} (more: {})",
					resp.blocks.len(),
					peer_addr,
					resp.status == CatchUpStatus::MoreAvailable
				);
				for b in resp.blocks {
					adapter.block_received(b, Some(peer_addr));
				}
				if resp.status == CatchUpStatus::Complete {
					return;
				}
			}
		}
		thread::sleep(CATCH_UP_DELAY);
	}
}

/// Runs `catch_up` on its own thread.
pub fn spawn_catch_up(peer_addr: SocketAddr, adapter: Arc<dyn NetAdapter>) {
	let _ = thread::Builder::new()
		.name("catch-up".to_string())
		.spawn(move || catch_up(peer_addr, adapter));
}
