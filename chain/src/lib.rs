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

//! The silo consensus engine: a block tree with longest-weight fork choice,
//! the unspent output and open contract sets that follow the chosen fork,
//! and the per-block contract maintenance (missed proofs, terminations)
//! driven purely by height.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![warn(missing_docs)]

#[macro_use]
extern crate log;

mod chain;
pub mod contract;
mod error;
pub mod pipe;
mod types;

pub use crate::chain::{Chain, BLOCK_ID_HISTORY_LEN, MAX_CATCH_UP_BLOCKS};
pub use crate::error::{Error, ErrorKind};
pub use crate::types::{BlockNode, ChainUpdate, OpenContract, OutputDiff, Tip};
