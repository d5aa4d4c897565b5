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

//! Difficulty targets and cumulative chain weight.
//!
//! A target is a 256-bit big-endian integer; a block meets it when its id,
//! read the same way, is numerically no greater. Cumulative weight (depth)
//! is kept in the same representation as the *inverse* of the summed
//! per-block work: a smaller depth value means a heavier chain. The
//! arithmetic runs in big integers and truncates back to 32 bytes.

use std::fmt;

use num_bigint::BigUint;

use crate::core::hash::Hash;
use crate::ser::{self, AsFixedBytes, Readable, Reader, Writeable, Writer};

/// A difficulty target, or a cumulative depth, as a 32-byte big-endian
/// integer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Target(pub [u8; 32]);

impl fmt::Display for Target {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for i in self.0.iter() {
			write!(f, "{:02x}", i)?;
		}
		Ok(())
	}
}

impl Target {
	/// The largest representable target: every block meets it, and as a
	/// depth it stands for zero accumulated work.
	pub fn max_value() -> Target {
		Target([0xff; 32])
	}

	/// Whether a block id satisfies this target. Both sides are big-endian
	/// integers, so plain byte comparison is the numeric one.
	pub fn meets(&self, id: &Hash) -> bool {
		id.0 <= self.0
	}

	/// The target as a big integer.
	pub fn to_int(&self) -> BigUint {
		BigUint::from_bytes_be(&self.0)
	}

	/// Builds a target back from a big integer, saturating at the 32-byte
	/// maximum and flooring at one so a depth never degenerates to zero.
	pub fn from_int(n: &BigUint) -> Target {
		let bytes = n.to_bytes_be();
		if bytes.len() > 32 {
			return Target::max_value();
		}
		let mut buf = [0u8; 32];
		buf[32 - bytes.len()..].copy_from_slice(&bytes);
		let t = Target(buf);
		if t.to_int() == BigUint::from(0u64) {
			let mut one = [0u8; 32];
			one[31] = 1;
			Target(one)
		} else {
			t
		}
	}

	/// Multiplies the target by the rational num/den, truncating.
	pub fn mul_ratio(&self, num: u64, den: u64) -> Target {
		let scaled = self.to_int() * BigUint::from(num) / BigUint::from(den);
		Target::from_int(&scaled)
	}

	/// Treating self as an inverse cumulative weight, folds in one block
	/// mined at `target`: the result d' satisfies 1/d' = 1/d + 1/target.
	pub fn add_inverse(&self, target: &Target) -> Target {
		let d = self.to_int();
		let t = target.to_int();
		let sum = &d + &t;
		Target::from_int(&(d * t / sum))
	}

	/// Fork choice: whether a chain at this depth is heavier than the chain
	/// at `tip_depth` by more than the fractional threshold a/b, i.e.
	/// 1/self > (1/tip_depth) * (1 + a/b). Smaller depth values are heavier,
	/// so this cross-multiplies to b * tip_depth > (a + b) * self.
	pub fn surpasses(&self, tip_depth: &Target, threshold: (u64, u64)) -> bool {
		let (a, b) = threshold;
		tip_depth.to_int() * BigUint::from(b) > self.to_int() * BigUint::from(a + b)
	}
}

impl AsFixedBytes for Target {
	fn as_fixed_bytes(&self) -> &[u8] {
		&self.0
	}
}

impl Writeable for Target {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_fixed_bytes(self)
	}
}

impl Readable for Target {
	fn read(reader: &mut dyn Reader) -> Result<Target, ser::Error> {
		let v = reader.read_32_bytes()?;
		let mut buf = [0u8; 32];
		buf.copy_from_slice(&v);
		Ok(Target(buf))
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn target_from_u64(n: u64) -> Target {
		let mut buf = [0u8; 32];
		buf[24..].copy_from_slice(&n.to_be_bytes());
		Target(buf)
	}

	#[test]
	fn meets_compares_big_endian() {
		let t = target_from_u64(1000);
		let mut id = [0u8; 32];
		id[31] = 1;
		assert!(t.meets(&Hash(id)));

		let mut big = [0u8; 32];
		big[0] = 1;
		assert!(!t.meets(&Hash(big)));

		// equality meets
		assert!(t.meets(&Hash(t.0)));
	}

	#[test]
	fn ratio_multiplication() {
		let t = target_from_u64(1000);
		assert_eq!(t.mul_ratio(3, 2), target_from_u64(1500));
		assert_eq!(t.mul_ratio(999, 1000), target_from_u64(999));
		// truncation
		assert_eq!(target_from_u64(5).mul_ratio(1, 2), target_from_u64(2));
	}

	#[test]
	fn ratio_saturates() {
		let t = Target::max_value();
		assert_eq!(t.mul_ratio(3, 1), Target::max_value());
	}

	#[test]
	fn inverse_accumulation() {
		// 1/d' = 1/6 + 1/3 = 1/2
		let d = target_from_u64(6);
		assert_eq!(d.add_inverse(&target_from_u64(3)), target_from_u64(2));
		// truncation keeps the depth at least one
		let tiny = target_from_u64(1);
		assert_eq!(tiny.add_inverse(&tiny), target_from_u64(1));
	}

	#[test]
	fn surpass_threshold() {
		let tip = target_from_u64(1000);
		// 5% margin: candidate must be below 1000 * 100 / 105 ~ 952
		assert!(target_from_u64(900).surpasses(&tip, (5, 100)));
		assert!(!target_from_u64(960).surpasses(&tip, (5, 100)));
		// equal depth never surpasses
		assert!(!tip.surpasses(&tip, (5, 100)));
	}
}
