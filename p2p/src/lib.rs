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

//! Networking code to connect to other silo nodes: typed message framing,
//! a peer directory, broadcast of blocks and transactions, and the
//! catch-up protocol that walks a lagging node up to the network tip.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![warn(missing_docs)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

pub mod msg;
mod peer;
mod peers;
mod protocol;
mod serv;
pub mod sync;
mod types;

pub use crate::msg::{CatchUpResponse, CatchUpStatus, MAX_MSG_LEN};
pub use crate::peer::{
	announce_self, request_blocks, request_catch_up, request_hostname, request_peers, Peer,
};
pub use crate::peers::Peers;
pub use crate::serv::Server;
pub use crate::types::{Error, NetAdapter, P2PConfig};
