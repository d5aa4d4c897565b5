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

//! The node glue: a single serialization point that owns the consensus
//! engine, drains block and transaction channels on one dispatcher thread,
//! relays state diffs to the wallet, miner and host collaborators, and
//! keeps the p2p layer fed.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![warn(missing_docs)]

#[macro_use]
extern crate log;

pub mod common;
mod core;
pub mod mining;
mod server;

pub use crate::common::adapters::NetToCoreAdapter;
pub use crate::common::types::{
	Error, HostSink, MinerSink, ServerConfig, SinkError, Sinks, WalletSink,
};
pub use crate::core::{BlockChannel, Core, TxnChannel};
pub use crate::server::Server;
