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

//! Key and signature value types. Kept as plain byte wrappers so the
//! consensus crates can order, hash and serialize them without dragging the
//! underlying curve library into their signatures.

use std::fmt;

use failure::Fail;

/// Errors from key handling and signature verification.
#[derive(Clone, Debug, Eq, PartialEq, Fail)]
pub enum Error {
	/// The signature doesn't verify against the public key and message.
	#[fail(display = "invalid signature")]
	InvalidSignature,
	/// The public key bytes don't describe a curve point.
	#[fail(display = "invalid public key")]
	InvalidPublicKey,
	/// The entropy source failed.
	#[fail(display = "entropy source failure: {}", _0)]
	Entropy(String),
}

/// A 32-byte ed25519 public key.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
	/// Builds a public key from raw bytes. Validity against the curve is only
	/// checked at verification time.
	pub fn from_bytes(bytes: [u8; 32]) -> PublicKey {
		PublicKey(bytes)
	}

	/// The raw key bytes.
	pub fn as_bytes(&self) -> &[u8; 32] {
		&self.0
	}
}

impl fmt::Display for PublicKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for b in self.0.iter() {
			write!(f, "{:02x}", b)?;
		}
		Ok(())
	}
}

/// A 32-byte ed25519 secret key.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct SecretKey(pub(crate) [u8; 32]);

impl fmt::Debug for SecretKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		// never print secret material
		write!(f, "SecretKey(..)")
	}
}

/// A 64-byte ed25519 signature (R then S), with a distinguished zero value
/// used for not-yet-signed slots.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct Signature(pub [u8; 64]);

impl Signature {
	/// The zero signature, serialized on the wire as two empty scalars.
	pub fn zero() -> Signature {
		Signature([0; 64])
	}

	/// Whether this is the zero signature.
	pub fn is_zero(&self) -> bool {
		self.0.iter().all(|b| *b == 0)
	}

	/// The R half of the signature.
	pub fn r_bytes(&self) -> &[u8] {
		&self.0[..32]
	}

	/// The S half of the signature.
	pub fn s_bytes(&self) -> &[u8] {
		&self.0[32..]
	}
}

impl fmt::Debug for Signature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Signature(")?;
		for b in self.0[..4].iter() {
			write!(f, "{:02x}", b)?;
		}
		write!(f, "..)")
	}
}

/// A secret/public keypair.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Keypair {
	/// The signing half.
	pub secret: SecretKey,
	/// The verifying half, hashed into coin addresses.
	pub public: PublicKey,
}
