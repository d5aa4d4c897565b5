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

//! Merkle trees over hashes and over fixed-size file segments, and the
//! possession proofs hosts build from them.
//!
//! The tree is slightly unusual: an unbalanced subtree carries its lone leaf
//! upward unhashed rather than padding. For 5 leaves the shape is
//! `(((0,1),(2,3)),4)`. Proof verification mirrors the same rule by skipping
//! the levels where the proven segment has no sister.

use std::cmp::min;
use std::io::{Read, Seek, SeekFrom};

use crate::core::hash::{hash_bytes, merkle_join, Hash, ZERO_HASH};
use crate::ser::Error;

/// The fixed size of a file segment. Storage proofs reveal exactly one
/// segment of the contracted file.
pub const SEGMENT_SIZE: usize = 64;

/// Number of segments in a file of the given size. A zero-length file still
/// has one (empty) segment so every contract has something to prove.
pub fn num_segments(file_size: u64) -> u64 {
	if file_size == 0 {
		1
	} else {
		(file_size + SEGMENT_SIZE as u64 - 1) / SEGMENT_SIZE as u64
	}
}

/// Number of levels in a proof over `num_segments` segments, sentinel
/// sisters included: the count of doublings strictly below the segment
/// count, i.e. ceil(log2(num_segments)).
pub fn proof_len(num_segments: u64) -> usize {
	let mut size = 1u64;
	let mut levels = 0;
	while size < num_segments {
		size *= 2;
		levels += 1;
	}
	levels
}

// The split point of a tree over `count` leaves: the smallest power of two
// at least half the (rounded up) leaf count. The left subtree always gets a
// full power of two, the right subtree carries the imbalance.
fn split_point(count: u64) -> u64 {
	let half = (count + 1) / 2;
	let mut mid = 1;
	while mid < half {
		mid <<= 1;
	}
	mid
}

/// Root of a Merkle tree over the given leaves. Empty input hashes to the
/// zero hash, a single leaf is its own root.
pub fn merkle_root(leaves: &[Hash]) -> Hash {
	match leaves.len() {
		0 => ZERO_HASH,
		1 => leaves[0],
		n => {
			let mid = split_point(n as u64) as usize;
			merkle_join(&merkle_root(&leaves[..mid]), &merkle_root(&leaves[mid..]))
		}
	}
}

// Reads up to one segment from the reader. Short reads at the tail of a
// file produce a short segment, which hashes as-is.
fn read_segment(reader: &mut dyn Read) -> Result<Vec<u8>, Error> {
	let mut buf = [0u8; SEGMENT_SIZE];
	let mut filled = 0;
	while filled < SEGMENT_SIZE {
		let n = reader.read(&mut buf[filled..])?;
		if n == 0 {
			break;
		}
		filled += n;
	}
	Ok(buf[..filled].to_vec())
}

// Root over `count` sequential segments starting at the reader's current
// position.
fn segments_root(reader: &mut dyn Read, count: u64) -> Result<Hash, Error> {
	if count == 1 {
		let segment = read_segment(reader)?;
		return Ok(hash_bytes(&segment));
	}
	let mid = split_point(count);
	let left = segments_root(reader, mid)?;
	let right = segments_root(reader, count - mid)?;
	Ok(merkle_join(&left, &right))
}

/// Merkle root over a file split into 64-byte segments, each segment hashed
/// as a leaf and the tree assembled with the same split rule as
/// `merkle_root`.
pub fn file_merkle_root<R: Read>(reader: &mut R, num_segments: u64) -> Result<Hash, Error> {
	if num_segments == 0 {
		return Ok(ZERO_HASH);
	}
	segments_root(reader, num_segments)
}

// Root over the segment span [start, start+count), seeking first.
fn range_root<R: Read + Seek>(reader: &mut R, start: u64, count: u64) -> Result<Hash, Error> {
	reader.seek(SeekFrom::Start(start * SEGMENT_SIZE as u64))?;
	segments_root(reader, count)
}

/// Builds a proof of possession for the segment at `index`: the raw segment
/// bytes plus one sister root per tree level. Levels where the segment has
/// no sister (the lone-leaf case) carry the zero hash as a sentinel so the
/// proof length stays a pure function of the segment count.
pub fn build_proof<R: Read + Seek>(
	reader: &mut R,
	num_segments: u64,
	index: u64,
) -> Result<(Vec<u8>, Vec<Hash>), Error> {
	reader.seek(SeekFrom::Start(index * SEGMENT_SIZE as u64))?;
	let base = read_segment(reader)?;

	let mut hash_set = Vec::with_capacity(proof_len(num_segments));
	let mut size = 1u64;
	while size < num_segments {
		let sister_start = if index % (2 * size) < size {
			(index / size + 1) * size
		} else {
			(index / size - 1) * size
		};
		if sister_start >= num_segments {
			hash_set.push(ZERO_HASH);
		} else {
			let count = min(size, num_segments - sister_start);
			hash_set.push(range_root(reader, sister_start, count)?);
		}
		size *= 2;
	}
	Ok((base, hash_set))
}

/// Verifies a proof of possession against the expected file Merkle root.
/// The base hashes to the proven leaf; each level either joins the sister
/// on the correct side or, for a sentinel, carries the running hash up
/// unchanged.
pub fn verify_proof(
	base: &[u8],
	hash_set: &[Hash],
	num_segments: u64,
	index: u64,
	expected_root: Hash,
) -> bool {
	if index >= num_segments || base.len() > SEGMENT_SIZE {
		return false;
	}
	if hash_set.len() != proof_len(num_segments) {
		return false;
	}

	let mut current = hash_bytes(base);
	let mut size = 1u64;
	let mut level = 0;
	while size < num_segments {
		let sister = &hash_set[level];
		if *sister != ZERO_HASH {
			current = if index % (2 * size) < size {
				merkle_join(&current, sister)
			} else {
				merkle_join(sister, &current)
			};
		}
		size *= 2;
		level += 1;
	}
	current == expected_root
}
