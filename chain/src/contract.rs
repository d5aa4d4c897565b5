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

//! File contract rules: window indexing, the chain-coupled challenge
//! segment derivation, and storage proof verification.
//!
//! The challenge index for a window is derived from the id of the block
//! just before the window opened. That couples every outstanding proof to
//! the canonical chain: a reorganization past the trigger block invalidates
//! the proofs computed against it.

use num_bigint::BigUint;

use silo_core::core::hash::HashWriter;
use silo_core::core::merkle;
use silo_core::core::{BlockId, ContractId, FileContract, Height, StorageProof};
use silo_core::ser::Writeable;

use crate::error::{Error, ErrorKind};

/// Which proof window the given height falls into, or an error outside the
/// contract's [start, end) obligation.
pub fn window_index(contract: &FileContract, height: Height) -> Result<u64, Error> {
	if height < contract.start || height >= contract.end {
		return Err(ErrorKind::ProofOutOfWindow.into());
	}
	Ok((height - contract.start) / contract.challenge_frequency)
}

/// Height of the block whose id seeds the challenge for the given window:
/// the block immediately preceding the window.
pub fn trigger_height(contract: &FileContract, window: u64) -> Height {
	contract.start + window * contract.challenge_frequency - 1
}

/// The challenged segment for a window: the trigger block id and the
/// contract id hashed together, reduced modulo the file's segment count.
pub fn proof_segment_index(
	trigger_id: BlockId,
	contract_id: ContractId,
	file_size: u64,
) -> u64 {
	let mut hasher = HashWriter::new();
	trigger_id
		.write(&mut hasher)
		.expect("oversized field in canonical encoding");
	contract_id
		.write(&mut hasher)
		.expect("oversized field in canonical encoding");
	let digest = hasher.into_hash();

	let segments = merkle::num_segments(file_size);
	let index = BigUint::from_bytes_be(&digest.0) % BigUint::from(segments);
	// the modulus fits u64, so the remainder does too
	let bytes = index.to_bytes_le();
	let mut buf = [0u8; 8];
	buf[..bytes.len()].copy_from_slice(&bytes);
	u64::from_le_bytes(buf)
}

/// Verifies a storage proof against the contract's file merkle root at the
/// already-derived segment index.
pub fn verify_proof(
	proof: &StorageProof,
	contract: &FileContract,
	segment_index: u64,
) -> Result<(), Error> {
	let segments = merkle::num_segments(contract.file_size);
	if merkle::verify_proof(
		&proof.base,
		&proof.hash_set,
		segments,
		segment_index,
		contract.file_merkle_root,
	) {
		Ok(())
	} else {
		Err(ErrorKind::InvalidProof.into())
	}
}

/// Sanity checks on a newly submitted contract: it must start in the
/// future, end after it starts, have a nonzero challenge frequency and
/// tolerance, and promise no window more than its fund.
pub fn validate_contract(contract: &FileContract, height: Height) -> Result<(), Error> {
	if contract.start <= height {
		return Err(ErrorKind::InvalidContract("start not in the future".to_string()).into());
	}
	if contract.end <= contract.start {
		return Err(ErrorKind::InvalidContract("end before start".to_string()).into());
	}
	if contract.challenge_frequency == 0 {
		return Err(ErrorKind::InvalidContract("zero challenge frequency".to_string()).into());
	}
	if contract.tolerance == 0 {
		return Err(ErrorKind::InvalidContract("zero tolerance".to_string()).into());
	}
	if contract.valid_proof_payout > contract.fund || contract.missed_proof_payout > contract.fund
	{
		return Err(ErrorKind::InvalidContract("window payout exceeds fund".to_string()).into());
	}
	Ok(())
}
