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

//! Base types for the p2p layer: configuration, errors, and the adapter
//! trait the rest of the node implements to receive network events.

use std::io;
use std::net::SocketAddr;

use failure::Fail;

use silo_core::core::{Block, BlockId, Height, Transaction};
use silo_core::ser;

/// Configuration for the p2p server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct P2PConfig {
	/// Interface to bind the listener to.
	pub host: String,
	/// Port to listen on.
	pub port: u16,
}

impl Default for P2PConfig {
	fn default() -> P2PConfig {
		P2PConfig {
			host: "0.0.0.0".to_string(),
			port: 9988,
		}
	}
}

/// Errors the p2p layer can produce.
#[derive(Debug, Fail)]
pub enum Error {
	/// Underlying connection trouble.
	#[fail(display = "connection error: {}", _0)]
	Connection(String),
	/// A peer took too long.
	#[fail(display = "peer timed out")]
	Timeout,
	/// A frame declared a length beyond the protocol maximum; the
	/// connection is dropped.
	#[fail(display = "message too long")]
	MessageTooLong,
	/// A frame carried an unknown type tag or a malformed payload.
	#[fail(display = "bad message")]
	BadMessage,
	/// Payload serialization trouble.
	#[fail(display = "serialization error: {}", _0)]
	Serialization(ser::Error),
	/// Benign: a catch-up peer shares no history with us.
	#[fail(display = "no common block with peer")]
	NoCommonBlock,
	/// Benign: the catch-up peer has more blocks than one response
	/// carries; ask again.
	#[fail(display = "more blocks available")]
	MoreBlocksAvailable,
}

impl From<io::Error> for Error {
	fn from(e: io::Error) -> Error {
		if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut {
			Error::Timeout
		} else {
			Error::Connection(format!("{}", e))
		}
	}
}

impl From<ser::Error> for Error {
	fn from(e: ser::Error) -> Error {
		Error::Serialization(e)
	}
}

/// Bridge between the networking layer and the rest of the node. The p2p
/// code holds no engine state; everything it learns or serves goes through
/// this trait.
pub trait NetAdapter: Send + Sync {
	/// A peer sent us a block.
	fn block_received(&self, b: Block, from: Option<SocketAddr>);
	/// A peer sent us a transaction.
	fn transaction_received(&self, tx: Transaction);
	/// A peer asked for the canonical blocks from the given height up.
	fn blocks_requested(&self, start_height: Height) -> Vec<Block>;
	/// A peer presented its block id history and wants successors; None
	/// when no presented id is on our path.
	fn catch_up_requested(&self, known: Vec<BlockId>) -> Option<(Vec<Block>, bool)>;
	/// Our own block id history, for outgoing catch-up requests.
	fn block_id_history(&self) -> Vec<BlockId>;
	/// A peer asked for other peers' addresses.
	fn peers_requested(&self, count: u8) -> Vec<SocketAddr>;
	/// A peer announced its listening address.
	fn peer_announced(&self, addr: SocketAddr);
}
