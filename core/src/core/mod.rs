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

//! Core types

pub mod block;
pub mod hash;
pub mod merkle;
pub mod target;
pub mod transaction;

pub use self::block::Block;
pub use self::hash::{Hash, Hashed, ZERO_HASH};
pub use self::target::Target;
pub use self::transaction::{
	CoveredFields, FileContract, Input, Output, SpendConditions, StorageProof, Transaction,
	TransactionSignature,
};

/// A quantity of coins. Non-negative by construction; arithmetic on it is
/// checked wherever consensus depends on the result.
pub type Currency = u64;

/// The height of a block in the chain, genesis being height zero.
pub type Height = u64;

/// A timestamp, in seconds since the unix epoch. Signed so arithmetic on
/// deltas behaves.
pub type Stamp = i64;

/// A coin address: the Merkle root committing to a set of public keys and a
/// timelock. Hashes are used pervasively as identifiers for blocks,
/// transactions, outputs and contracts; addresses are no different.
pub type Address = Hash;

/// Identifier of a block, the hash of its header fields.
pub type BlockId = Hash;

/// Identifier of a coin output.
pub type OutputId = Hash;

/// Identifier of a file contract.
pub type ContractId = Hash;
