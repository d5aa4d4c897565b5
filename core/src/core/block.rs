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

//! Blocks. The header commits to the parent, a timestamp, the mining nonce,
//! the miner's payout address and the Merkle root of the transaction list;
//! the transactions themselves are outside the header hash, so the block id
//! can be ground by nonce without touching the body.

use crate::core::hash::{Hash, Hashed, HashWriter};
use crate::core::merkle::merkle_root;
use crate::core::transaction::{tagged_hash, Transaction};
use crate::core::{Address, BlockId, OutputId, Stamp};
use crate::ser::{self, read_long_multi, write_long_multi, Readable, Reader, Writeable, Writer};

/// A block in the chain, or on one of its forks.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Block {
	/// Id of the block this one builds on.
	pub parent_id: BlockId,
	/// Seconds since the epoch; checked against the parent's recent median
	/// and the admitting node's clock.
	pub timestamp: Stamp,
	/// The proof-of-work nonce.
	pub nonce: u64,
	/// Address the block subsidy pays out to.
	pub miner_address: Address,
	/// Merkle root over the hashes of the transactions, in order.
	pub merkle_root: Hash,
	/// The transactions confirmed by this block.
	pub transactions: Vec<Transaction>,
}

impl Block {
	/// Assembles a block over the given parent with its transaction Merkle
	/// root precomputed. The nonce starts at zero; mining is the caller's
	/// problem.
	pub fn new(
		parent_id: BlockId,
		transactions: Vec<Transaction>,
		miner_address: Address,
		timestamp: Stamp,
	) -> Block {
		let mut b = Block {
			parent_id,
			timestamp,
			nonce: 0,
			miner_address,
			merkle_root: Hash([0; 32]),
			transactions,
		};
		b.merkle_root = b.transaction_merkle_root();
		b
	}

	/// The block id: a hash of the header fields only. Grinding the nonce
	/// changes the id without re-hashing the transaction list.
	pub fn id(&self) -> BlockId {
		let mut hasher = HashWriter::new();
		self.parent_id
			.write(&mut hasher)
			.expect("oversized field in canonical encoding");
		hasher
			.write_i64(self.timestamp)
			.expect("oversized field in canonical encoding");
		hasher
			.write_u64(self.nonce)
			.expect("oversized field in canonical encoding");
		self.miner_address
			.write(&mut hasher)
			.expect("oversized field in canonical encoding");
		self.merkle_root
			.write(&mut hasher)
			.expect("oversized field in canonical encoding");
		hasher.into_hash()
	}

	/// Merkle root over the transaction hashes, in order. Must match the
	/// header's committed root for the block to be valid.
	pub fn transaction_merkle_root(&self) -> Hash {
		let leaves = map_vec!(self.transactions, |tx| tx.hash());
		merkle_root(&leaves)
	}

	/// Id of this block's subsidy output, paying inflation plus fees to the
	/// miner address.
	pub fn subsidy_output_id(&self) -> OutputId {
		block_subsidy_output_id(self.id())
	}
}

/// Id of the subsidy output of the block with the given id.
pub fn block_subsidy_output_id(block_id: BlockId) -> OutputId {
	tagged_hash(&block_id, "blockreward", None)
}

impl Writeable for Block {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.parent_id.write(writer)?;
		ser_multiwrite!(
			writer,
			[write_i64, self.timestamp],
			[write_u64, self.nonce]
		);
		self.miner_address.write(writer)?;
		self.merkle_root.write(writer)?;
		write_long_multi(writer, &self.transactions)
	}
}

impl Readable for Block {
	fn read(reader: &mut dyn Reader) -> Result<Block, ser::Error> {
		let parent_id = Hash::read(reader)?;
		let (timestamp, nonce) = (reader.read_i64()?, reader.read_u64()?);
		let miner_address = Hash::read(reader)?;
		let merkle_root = Hash::read(reader)?;
		let transactions = read_long_multi(reader)?;
		Ok(Block {
			parent_id,
			timestamp,
			nonce,
			miner_address,
			merkle_root,
			transactions,
		})
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::core::hash::ZERO_HASH;
	use crate::core::transaction::Transaction;
	use crate::ser::{deserialize, ser_vec};

	fn small_tx(fee: u64) -> Transaction {
		Transaction {
			arbitrary_data: vec![],
			inputs: vec![],
			outputs: vec![],
			miner_fees: vec![fee],
			file_contracts: vec![],
			storage_proofs: vec![],
			signatures: vec![],
		}
	}

	#[test]
	fn id_excludes_transactions() {
		let b1 = Block {
			parent_id: ZERO_HASH,
			timestamp: 100,
			nonce: 7,
			miner_address: ZERO_HASH,
			merkle_root: ZERO_HASH,
			transactions: vec![],
		};
		let mut b2 = b1.clone();
		b2.transactions = vec![small_tx(1)];
		// same header, different body, same id
		assert_eq!(b1.id(), b2.id());

		let mut b3 = b1.clone();
		b3.nonce = 8;
		assert_ne!(b1.id(), b3.id());
	}

	#[test]
	fn merkle_root_covers_order() {
		let a = Block::new(ZERO_HASH, vec![small_tx(1), small_tx(2)], ZERO_HASH, 0);
		let b = Block::new(ZERO_HASH, vec![small_tx(2), small_tx(1)], ZERO_HASH, 0);
		assert_ne!(a.merkle_root, b.merkle_root);
	}

	#[test]
	fn block_roundtrip() {
		let b = Block::new(
			ZERO_HASH,
			vec![small_tx(1), small_tx(2)],
			ZERO_HASH,
			123456,
		);
		let ser = ser_vec(&b).unwrap();
		let back: Block = deserialize(&mut &ser[..]).unwrap();
		assert_eq!(back, b);
		assert_eq!(back.id(), b.id());
	}

	#[test]
	fn subsidy_id_depends_on_block() {
		let b1 = Block::new(ZERO_HASH, vec![], ZERO_HASH, 1);
		let b2 = Block::new(ZERO_HASH, vec![], ZERO_HASH, 2);
		assert_ne!(b1.subsidy_output_id(), b2.subsidy_output_id());
	}
}
