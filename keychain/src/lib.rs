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

//! Keypair generation, signing and signature verification for the silo
//! consensus types. Keys are plain ed25519; entropy comes in through a
//! pluggable source so deterministic derivation (and testing) use the same
//! code path as production key generation.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![warn(missing_docs)]

use rand::rngs::OsRng;
use rand::RngCore;

mod types;
pub use crate::types::{Error, Keypair, PublicKey, SecretKey, Signature};

/// Something that can produce entropy for key generation. The seam exists so
/// tests can inject fixed bytes and get reproducible keys.
pub trait EntropySource {
	/// Fill the provided buffer entirely with entropy.
	fn fill(&mut self, buf: &mut [u8]) -> Result<(), Error>;
}

/// Entropy straight from the operating system.
pub struct OsEntropy;

impl EntropySource for OsEntropy {
	fn fill(&mut self, buf: &mut [u8]) -> Result<(), Error> {
		let mut rng = OsRng::new().map_err(|e| Error::Entropy(format!("{}", e)))?;
		rng.fill_bytes(buf);
		Ok(())
	}
}

impl Keypair {
	/// Generates a fresh keypair from the provided entropy source. Fails only
	/// when the source does.
	pub fn generate(source: &mut dyn EntropySource) -> Result<Keypair, Error> {
		let mut seed = [0u8; 32];
		source.fill(&mut seed)?;
		Ok(Keypair::from_entropy(seed))
	}

	/// Derives a keypair deterministically from 32 bytes of entropy. The same
	/// entropy always yields the same keypair.
	pub fn from_entropy(seed: [u8; 32]) -> Keypair {
		// 32 arbitrary bytes are always a valid ed25519 secret key
		let secret = ed25519_dalek::SecretKey::from_bytes(&seed)
			.expect("32 bytes is a valid ed25519 secret");
		let public = ed25519_dalek::PublicKey::from(&secret);
		Keypair {
			secret: SecretKey(seed),
			public: PublicKey(public.to_bytes()),
		}
	}

	/// Signs a 32-byte message digest.
	pub fn sign(&self, msg: &[u8; 32]) -> Signature {
		let secret = ed25519_dalek::SecretKey::from_bytes(&self.secret.0)
			.expect("32 bytes is a valid ed25519 secret");
		let public = ed25519_dalek::PublicKey::from(&secret);
		let expanded = ed25519_dalek::ExpandedSecretKey::from(&secret);
		Signature(expanded.sign(&msg[..], &public).to_bytes())
	}
}

/// Verifies a signature over a 32-byte message digest against a public key.
/// The zero signature never verifies.
pub fn verify(msg: &[u8; 32], public_key: &PublicKey, sig: &Signature) -> Result<(), Error> {
	use ed25519_dalek::Verifier;
	use std::convert::TryFrom;

	if sig.is_zero() {
		return Err(Error::InvalidSignature);
	}
	let pk = ed25519_dalek::PublicKey::from_bytes(&public_key.0)
		.map_err(|_| Error::InvalidPublicKey)?;
	let dalek_sig =
		ed25519_dalek::Signature::try_from(&sig.0[..]).map_err(|_| Error::InvalidSignature)?;
	pk.verify(&msg[..], &dalek_sig)
		.map_err(|_| Error::InvalidSignature)
}
