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

//! Serialization and deserialization layer specialized for binary encoding.
//! Ensures consistency and safety.
//!
//! This encoding is consensus-critical: every content-addressed identifier
//! in the system is a hash of it. Integers are little-endian fixed width.
//! Variable-length byte strings and sequences carry a single-byte length
//! prefix; the only four-byte (little-endian) counts are the transaction
//! list of a block and block lists exchanged during catch-up.
//!
//! To use it simply implement `Writeable` or `Readable` and then use the
//! `serialize` or `deserialize` functions on them as appropriate.

use std::io;
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use failure::Fail;

use silo_keychain::{PublicKey, Signature};

/// The maximum number of entries a four-byte-prefixed list may declare
/// before the reader refuses it. Only for DoS protection.
pub const MAX_LIST_LEN: u32 = 50_000;

/// Possible errors deriving from serializing or deserializing.
#[derive(Clone, Debug, Eq, PartialEq, Fail)]
pub enum Error {
	/// Wraps an io error produced when reading or writing
	#[fail(display = "io error: {}", _0)]
	IOErr(String),
	/// Expected a given value that wasn't found
	#[fail(display = "expected {:?}, got {:?}", expected, received)]
	UnexpectedData {
		/// What was expected
		expected: Vec<u8>,
		/// What was received
		received: Vec<u8>,
	},
	/// Data wasn't in a consumable format
	#[fail(display = "corrupted data")]
	CorruptedData,
	/// When asked to read too much data
	#[fail(display = "too large read: {}", _0)]
	TooLargeReadErr(String),
	/// A field too long for its fixed-width length prefix
	#[fail(display = "field too long for its length prefix")]
	TooLargeWriteErr,
}

impl From<io::Error> for Error {
	fn from(e: io::Error) -> Error {
		Error::IOErr(format!("{}", e))
	}
}

/// Useful trait to implement on types that can be translated to byte slices
/// directly. Allows the use of `write_fixed_bytes` on them.
pub trait AsFixedBytes {
	/// The slice representation of self
	fn as_fixed_bytes(&self) -> &[u8];
}

/// Implementations defined how different numbers and binary structures are
/// written to an underlying stream or container (depending on implementation).
pub trait Writer {
	/// Writes a u8 as bytes
	fn write_u8(&mut self, n: u8) -> Result<(), Error>;
	/// Writes a u16 as little-endian bytes
	fn write_u16(&mut self, n: u16) -> Result<(), Error>;
	/// Writes a u32 as little-endian bytes
	fn write_u32(&mut self, n: u32) -> Result<(), Error>;
	/// Writes a u64 as little-endian bytes
	fn write_u64(&mut self, n: u64) -> Result<(), Error>;
	/// Writes a i64 as little-endian bytes
	fn write_i64(&mut self, n: i64) -> Result<(), Error>;
	/// Writes a fixed number of bytes from something that can turn itself
	/// into a `&[u8]`. The reader is expected to know the actual length on
	/// read.
	fn write_fixed_bytes(&mut self, bytes: &dyn AsFixedBytes) -> Result<(), Error>;

	/// Writes a boolean as a single byte, 0 or 1.
	fn write_bool(&mut self, b: bool) -> Result<(), Error> {
		self.write_u8(if b { 1 } else { 0 })
	}

	/// Writes a variable length byte string, the length encoded as a
	/// single-byte prefix.
	fn write_bytes(&mut self, bytes: &dyn AsFixedBytes) -> Result<(), Error> {
		let len = bytes.as_fixed_bytes().len();
		if len > u8::max_value() as usize {
			return Err(Error::TooLargeWriteErr);
		}
		self.write_u8(len as u8)?;
		self.write_fixed_bytes(bytes)
	}
}

/// Implementations defined how different numbers and binary structures are
/// read from an underlying stream or container (depending on implementation).
pub trait Reader {
	/// Read a u8 from the underlying Read
	fn read_u8(&mut self) -> Result<u8, Error>;
	/// Read a little-endian u16 from the underlying Read
	fn read_u16(&mut self) -> Result<u16, Error>;
	/// Read a little-endian u32 from the underlying Read
	fn read_u32(&mut self) -> Result<u32, Error>;
	/// Read a little-endian u64 from the underlying Read
	fn read_u64(&mut self) -> Result<u64, Error>;
	/// Read a little-endian i64 from the underlying Read
	fn read_i64(&mut self) -> Result<i64, Error>;
	/// Read a fixed number of bytes from the underlying reader.
	fn read_fixed_bytes(&mut self, length: usize) -> Result<Vec<u8>, Error>;

	/// Read a boolean; any nonzero byte reads as true.
	fn read_bool(&mut self) -> Result<bool, Error> {
		Ok(self.read_u8()? != 0)
	}

	/// Read a variable size byte string with a single-byte length prefix.
	fn read_bytes(&mut self) -> Result<Vec<u8>, Error> {
		let len = self.read_u8()?;
		self.read_fixed_bytes(len as usize)
	}

	/// Convenience function to read 32 fixed bytes
	fn read_32_bytes(&mut self) -> Result<Vec<u8>, Error> {
		self.read_fixed_bytes(32)
	}

	/// Consumes a byte from the reader, producing an error if it doesn't
	/// have the expected value
	fn expect_u8(&mut self, val: u8) -> Result<u8, Error> {
		let b = self.read_u8()?;
		if b == val {
			Ok(b)
		} else {
			Err(Error::UnexpectedData {
				expected: vec![val],
				received: vec![b],
			})
		}
	}
}

/// Trait that every type that can be serialized as binary must implement.
/// Writes directly to a Writer, a utility type thinly wrapping an
/// underlying Write implementation.
pub trait Writeable {
	/// Write the data held by this Writeable to the provided writer
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error>;
}

/// Trait that every type that can be deserialized from binary must implement.
/// Reads directly to a Reader, a utility type thinly wrapping an
/// underlying Read implementation.
pub trait Readable
where
	Self: Sized,
{
	/// Reads the data necessary to this Readable from the provided reader
	fn read(reader: &mut dyn Reader) -> Result<Self, Error>;
}

/// Deserializes a Readable from any std::io::Read implementation.
pub fn deserialize<T: Readable>(source: &mut dyn Read) -> Result<T, Error> {
	let mut reader = BinReader { source };
	T::read(&mut reader)
}

/// Serializes a Writeable into any std::io::Write implementation.
pub fn serialize<W: Writeable>(sink: &mut dyn Write, thing: &W) -> Result<(), Error> {
	let mut writer = BinWriter { sink };
	thing.write(&mut writer)
}

/// Utility function to serialize a writeable directly in memory using a
/// Vec<u8>.
pub fn ser_vec<W: Writeable>(thing: &W) -> Result<Vec<u8>, Error> {
	let mut vec = Vec::new();
	serialize(&mut vec, thing)?;
	Ok(vec)
}

/// Writes an optional value: a zero byte for absent, a one byte followed
/// by the value itself.
pub fn write_option<W: Writer, T: Writeable>(writer: &mut W, opt: &Option<T>) -> Result<(), Error> {
	match opt {
		None => writer.write_u8(0),
		Some(value) => {
			writer.write_u8(1)?;
			value.write(writer)
		}
	}
}

/// Reads an optional value written by `write_option`.
pub fn read_option<T: Readable>(reader: &mut dyn Reader) -> Result<Option<T>, Error> {
	if reader.read_u8()? == 0 {
		Ok(None)
	} else {
		Ok(Some(T::read(reader)?))
	}
}

/// Writes a sequence of writeables with a single-byte count prefix.
pub fn write_multi<W: Writer, T: Writeable>(writer: &mut W, elems: &[T]) -> Result<(), Error> {
	if elems.len() > u8::max_value() as usize {
		return Err(Error::TooLargeWriteErr);
	}
	writer.write_u8(elems.len() as u8)?;
	for elem in elems {
		elem.write(writer)?;
	}
	Ok(())
}

/// Reads a sequence of readables with a single-byte count prefix.
pub fn read_multi<T: Readable>(reader: &mut dyn Reader) -> Result<Vec<T>, Error> {
	let count = reader.read_u8()?;
	let mut elems = Vec::with_capacity(count as usize);
	for _ in 0..count {
		elems.push(T::read(reader)?);
	}
	Ok(elems)
}

/// Writes a sequence of writeables with a four-byte little-endian count
/// prefix. Reserved for block transaction lists and catch-up block lists,
/// the only sequences that may outgrow a single-byte count.
pub fn write_long_multi<W: Writer, T: Writeable>(writer: &mut W, elems: &[T]) -> Result<(), Error> {
	if elems.len() > MAX_LIST_LEN as usize {
		return Err(Error::TooLargeWriteErr);
	}
	writer.write_u32(elems.len() as u32)?;
	for elem in elems {
		elem.write(writer)?;
	}
	Ok(())
}

/// Reads a sequence of readables with a four-byte little-endian count prefix.
pub fn read_long_multi<T: Readable>(reader: &mut dyn Reader) -> Result<Vec<T>, Error> {
	let count = reader.read_u32()?;
	if count > MAX_LIST_LEN {
		return Err(Error::TooLargeReadErr(format!(
			"list count too large: {}",
			count
		)));
	}
	let mut elems = Vec::with_capacity(count as usize);
	for _ in 0..count {
		elems.push(T::read(reader)?);
	}
	Ok(elems)
}

struct BinReader<'a> {
	source: &'a mut dyn Read,
}

/// Utility wrapper for an underlying byte Reader. Defines higher level
/// methods to read numbers, byte vectors, hashes, etc.
impl<'a> Reader for BinReader<'a> {
	fn read_u8(&mut self) -> Result<u8, Error> {
		self.source.read_u8().map_err(Error::from)
	}
	fn read_u16(&mut self) -> Result<u16, Error> {
		self.source.read_u16::<LittleEndian>().map_err(Error::from)
	}
	fn read_u32(&mut self) -> Result<u32, Error> {
		self.source.read_u32::<LittleEndian>().map_err(Error::from)
	}
	fn read_u64(&mut self) -> Result<u64, Error> {
		self.source.read_u64::<LittleEndian>().map_err(Error::from)
	}
	fn read_i64(&mut self) -> Result<i64, Error> {
		self.source.read_i64::<LittleEndian>().map_err(Error::from)
	}
	fn read_fixed_bytes(&mut self, length: usize) -> Result<Vec<u8>, Error> {
		// not reading more than 100k in a single read
		if length > 100_000 {
			return Err(Error::TooLargeReadErr(format!(
				"fixed bytes length too large: {}",
				length
			)));
		}
		let mut buf = vec![0; length];
		self.source
			.read_exact(&mut buf)
			.map(move |_| buf)
			.map_err(Error::from)
	}
}

/// Utility wrapper for an underlying byte Writer. Defines higher level
/// methods to write numbers, byte vectors, hashes, etc.
struct BinWriter<'a> {
	sink: &'a mut dyn Write,
}

impl<'a> Writer for BinWriter<'a> {
	fn write_u8(&mut self, n: u8) -> Result<(), Error> {
		self.sink.write_u8(n).map_err(Error::from)
	}
	fn write_u16(&mut self, n: u16) -> Result<(), Error> {
		self.sink.write_u16::<LittleEndian>(n).map_err(Error::from)
	}
	fn write_u32(&mut self, n: u32) -> Result<(), Error> {
		self.sink.write_u32::<LittleEndian>(n).map_err(Error::from)
	}
	fn write_u64(&mut self, n: u64) -> Result<(), Error> {
		self.sink.write_u64::<LittleEndian>(n).map_err(Error::from)
	}
	fn write_i64(&mut self, n: i64) -> Result<(), Error> {
		self.sink.write_i64::<LittleEndian>(n).map_err(Error::from)
	}
	fn write_fixed_bytes(&mut self, bytes: &dyn AsFixedBytes) -> Result<(), Error> {
		self.sink
			.write_all(bytes.as_fixed_bytes())
			.map_err(Error::from)
	}
}

impl Writeable for u64 {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error> {
		writer.write_u64(*self)
	}
}

impl Readable for u64 {
	fn read(reader: &mut dyn Reader) -> Result<u64, Error> {
		reader.read_u64()
	}
}

/// Arbitrary data blobs serialize as single-byte-prefixed byte strings.
impl Writeable for Vec<u8> {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error> {
		writer.write_bytes(self)
	}
}

impl Readable for Vec<u8> {
	fn read(reader: &mut dyn Reader) -> Result<Vec<u8>, Error> {
		reader.read_bytes()
	}
}

macro_rules! impl_slice_bytes {
	($byteable: ty) => {
		impl AsFixedBytes for $byteable {
			fn as_fixed_bytes(&self) -> &[u8] {
				&self[..]
			}
		}
	};
}

impl_slice_bytes!(Vec<u8>);
impl_slice_bytes!([u8; 8]);
impl_slice_bytes!([u8; 32]);
impl_slice_bytes!([u8; 64]);

impl AsFixedBytes for String {
	fn as_fixed_bytes(&self) -> &[u8] {
		self.as_bytes()
	}
}

impl AsFixedBytes for PublicKey {
	fn as_fixed_bytes(&self) -> &[u8] {
		&self.as_bytes()[..]
	}
}

/// Public keys serialize as their raw 32 bytes.
impl Writeable for PublicKey {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error> {
		writer.write_fixed_bytes(self)
	}
}

impl Readable for PublicKey {
	fn read(reader: &mut dyn Reader) -> Result<PublicKey, Error> {
		let bytes = reader.read_32_bytes()?;
		let mut b32 = [0u8; 32];
		b32.copy_from_slice(&bytes);
		Ok(PublicKey::from_bytes(b32))
	}
}

/// Signatures serialize as the R and S scalars, each a single-byte-length-
/// prefixed byte string. The zero signature is two zero-length strings.
impl Writeable for Signature {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error> {
		if self.is_zero() {
			writer.write_u8(0)?;
			writer.write_u8(0)
		} else {
			writer.write_bytes(&self.r_bytes().to_vec())?;
			writer.write_bytes(&self.s_bytes().to_vec())
		}
	}
}

impl Readable for Signature {
	fn read(reader: &mut dyn Reader) -> Result<Signature, Error> {
		let r = reader.read_bytes()?;
		let s = reader.read_bytes()?;
		if r.is_empty() && s.is_empty() {
			return Ok(Signature::zero());
		}
		if r.len() != 32 || s.len() != 32 {
			return Err(Error::CorruptedData);
		}
		let mut b64 = [0u8; 64];
		b64[..32].copy_from_slice(&r);
		b64[32..].copy_from_slice(&s);
		Ok(Signature(b64))
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use silo_keychain::Keypair;

	#[test]
	fn ints_are_little_endian() {
		let mut vec: Vec<u8> = vec![];
		{
			let mut writer = BinWriter { sink: &mut vec };
			writer.write_u16(0x0102).unwrap();
			writer.write_u32(0x01020304).unwrap();
			writer.write_u64(0x0102030405060708).unwrap();
			writer.write_i64(-2).unwrap();
		}
		assert_eq!(
			vec,
			vec![
				2, 1, // u16
				4, 3, 2, 1, // u32
				8, 7, 6, 5, 4, 3, 2, 1, // u64
				254, 255, 255, 255, 255, 255, 255, 255, // i64
			]
		);
	}

	#[test]
	fn bytes_prefix_roundtrip() {
		let data: Vec<u8> = (0..100).collect();
		let ser = ser_vec(&data).unwrap();
		assert_eq!(ser.len(), 101);
		assert_eq!(ser[0], 100);
		let back: Vec<u8> = deserialize(&mut &ser[..]).unwrap();
		assert_eq!(back, data);
	}

	#[test]
	fn oversized_bytes_refused() {
		let data: Vec<u8> = vec![0; 300];
		assert_eq!(ser_vec(&data), Err(Error::TooLargeWriteErr));
	}

	#[test]
	fn signature_roundtrip() {
		let kp = Keypair::from_entropy([5; 32]);
		let sig = kp.sign(&[9; 32]);
		let ser = ser_vec(&sig).unwrap();
		assert_eq!(ser.len(), 66);
		let back: Signature = deserialize(&mut &ser[..]).unwrap();
		assert_eq!(back, sig);
	}

	#[test]
	fn zero_signature_roundtrip() {
		let ser = ser_vec(&Signature::zero()).unwrap();
		assert_eq!(ser, vec![0, 0]);
		let back: Signature = deserialize(&mut &ser[..]).unwrap();
		assert!(back.is_zero());
	}

	#[test]
	fn public_key_roundtrip() {
		let kp = Keypair::from_entropy([5; 32]);
		let ser = ser_vec(&kp.public).unwrap();
		assert_eq!(ser.len(), 32);
		let back: PublicKey = deserialize(&mut &ser[..]).unwrap();
		assert_eq!(back, kp.public);
	}

	#[test]
	fn option_roundtrip() {
		let mut vec: Vec<u8> = vec![];
		{
			let mut writer = BinWriter { sink: &mut vec };
			write_option(&mut writer, &Some(42u64)).unwrap();
			write_option::<_, u64>(&mut writer, &None).unwrap();
		}
		assert_eq!(vec.len(), 10);
		let mut reader = BinReader {
			source: &mut &vec[..],
		};
		assert_eq!(read_option::<u64>(&mut reader).unwrap(), Some(42));
		assert_eq!(read_option::<u64>(&mut reader).unwrap(), None);
	}

	#[test]
	fn long_multi_roundtrip() {
		let elems: Vec<u64> = (0..500).collect();
		let mut vec: Vec<u8> = vec![];
		{
			let mut writer = BinWriter { sink: &mut vec };
			write_long_multi(&mut writer, &elems).unwrap();
		}
		let mut reader = BinReader {
			source: &mut &vec[..],
		};
		let back: Vec<u64> = read_long_multi(&mut reader).unwrap();
		assert_eq!(back, elems);
	}
}
