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

//! Hash Function
//!
//! Primary hash function used in the protocol
//!

use std::fmt;

use blake2_rfc::blake2b::Blake2b;

use crate::ser::{self, AsFixedBytes, Error, Readable, Reader, Writeable, Writer};

/// A hash to uniquely (or close enough) identify one of the main blockchain
/// constructs. Used pervasively for blocks, transactions, outputs and
/// contracts.
#[derive(Copy, Clone, PartialEq, PartialOrd, Eq, Ord, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl fmt::Display for Hash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for i in self.0.iter() {
			write!(f, "{:02x}", i)?;
		}
		Ok(())
	}
}

impl fmt::Debug for Hash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for i in self.0[..4].iter() {
			write!(f, "{:02x}", i)?;
		}
		Ok(())
	}
}

impl Hash {
	/// Creates a new hash from a vector
	pub fn from_vec(v: Vec<u8>) -> Hash {
		let mut a = [0; 32];
		a.copy_from_slice(&v[..32]);
		Hash(a)
	}
	/// Converts the hash to a byte vector
	pub fn to_vec(&self) -> Vec<u8> {
		self.0.to_vec()
	}
	/// Converts the hash to a byte slice
	pub fn to_slice(&self) -> &[u8] {
		&self.0
	}
}

/// The hash of all zeroes. Root of empty Merkle trees, parent of genesis.
pub const ZERO_HASH: Hash = Hash([0; 32]);

/// Hashes an arbitrary byte slice with the protocol hash function (blake2b,
/// 32 bytes of output).
pub fn hash_bytes(data: &[u8]) -> Hash {
	let mut hasher = Blake2b::new(32);
	hasher.update(data);
	let mut buf = [0; 32];
	buf.copy_from_slice(hasher.finalize().as_bytes());
	Hash(buf)
}

/// Joins two hashes into their parent node hash, the binary operation every
/// Merkle tree in the protocol is built from.
pub fn merkle_join(left: &Hash, right: &Hash) -> Hash {
	let mut hasher = Blake2b::new(32);
	hasher.update(&left.0);
	hasher.update(&right.0);
	let mut buf = [0; 32];
	buf.copy_from_slice(hasher.finalize().as_bytes());
	Hash(buf)
}

/// A Writer that feeds the canonical encoding straight into the protocol
/// hash function. Used to content-address every consensus construct without
/// materializing its encoding.
pub struct HashWriter {
	state: Blake2b,
}

impl HashWriter {
	/// Builds a new hash writer with an empty state.
	pub fn new() -> HashWriter {
		HashWriter {
			state: Blake2b::new(32),
		}
	}

	/// Consumes the writer, producing the hash of everything written to it.
	pub fn into_hash(self) -> Hash {
		let mut buf = [0; 32];
		buf.copy_from_slice(self.state.finalize().as_bytes());
		Hash(buf)
	}
}

impl Writer for HashWriter {
	fn write_u8(&mut self, n: u8) -> Result<(), Error> {
		self.state.update(&[n]);
		Ok(())
	}
	fn write_u16(&mut self, n: u16) -> Result<(), Error> {
		self.state.update(&n.to_le_bytes());
		Ok(())
	}
	fn write_u32(&mut self, n: u32) -> Result<(), Error> {
		self.state.update(&n.to_le_bytes());
		Ok(())
	}
	fn write_u64(&mut self, n: u64) -> Result<(), Error> {
		self.state.update(&n.to_le_bytes());
		Ok(())
	}
	fn write_i64(&mut self, n: i64) -> Result<(), Error> {
		self.state.update(&n.to_le_bytes());
		Ok(())
	}
	fn write_fixed_bytes(&mut self, bytes: &dyn AsFixedBytes) -> Result<(), Error> {
		self.state.update(bytes.as_fixed_bytes());
		Ok(())
	}
}

/// A trait for types that get their hash from their canonical byte
/// serialization. Since the identifiers of blocks, transactions, outputs and
/// contracts are all such hashes, the encoding is part of the consensus
/// rules.
pub trait Hashed {
	/// Hash of the canonical encoding. Panics if the value holds a field too
	/// long for its length prefix; validation rejects such values at every
	/// ingress point.
	fn hash(&self) -> Hash;
}

impl<T: Writeable> Hashed for T {
	fn hash(&self) -> Hash {
		let mut hasher = HashWriter::new();
		self.write(&mut hasher)
			.expect("oversized field in canonical encoding");
		hasher.into_hash()
	}
}

impl AsFixedBytes for Hash {
	fn as_fixed_bytes(&self) -> &[u8] {
		&self.0
	}
}

impl Writeable for Hash {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error> {
		writer.write_fixed_bytes(self)
	}
}

impl Readable for Hash {
	fn read(reader: &mut dyn Reader) -> Result<Hash, ser::Error> {
		let v = reader.read_32_bytes()?;
		Ok(Hash::from_vec(v))
	}
}
