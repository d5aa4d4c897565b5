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

//! Message types that transit over the network and related serialization
//! code. Every frame is a one-byte type tag, a four-byte little-endian
//! payload length, and that many bytes of canonically encoded payload.

use std::io::{Read, Write};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use silo_core::core::hash::Hash;
use silo_core::core::Block;
use silo_core::ser::{
	self, read_long_multi, read_multi, write_long_multi, write_multi, Readable, Reader,
	Writeable, Writer,
};

use crate::types::Error;

/// Longest payload a frame may declare; anything beyond drops the
/// connection.
pub const MAX_MSG_LEN: u32 = 65_536;

/// Types of messages, one tag byte each.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Type {
	/// A block broadcast.
	Block,
	/// A transaction broadcast.
	Transaction,
	/// A request for canonical blocks from a starting height.
	BlockRange,
	/// A catch-up request carrying a block id history.
	CatchUp,
	/// Hostname echo: tells a peer how its address looks from here.
	Hostname,
	/// A request for known peer addresses.
	PeerRequest,
	/// A peer announcing its own listening address.
	Announce,
}

impl Type {
	/// The tag byte leading frames of this type.
	pub fn as_u8(self) -> u8 {
		match self {
			Type::Block => b'B',
			Type::Transaction => b'T',
			Type::BlockRange => b'R',
			Type::CatchUp => b'C',
			Type::Hostname => b'H',
			Type::PeerRequest => b'P',
			Type::Announce => b'A',
		}
	}

	/// Maps a tag byte back to its message type.
	pub fn from_u8(tag: u8) -> Option<Type> {
		match tag {
			b'B' => Some(Type::Block),
			b'T' => Some(Type::Transaction),
			b'R' => Some(Type::BlockRange),
			b'C' => Some(Type::CatchUp),
			b'H' => Some(Type::Hostname),
			b'P' => Some(Type::PeerRequest),
			b'A' => Some(Type::Announce),
			_ => None,
		}
	}
}

/// Header of any protocol message, used to identify incoming messages.
#[derive(Clone, Copy, Debug)]
pub struct MsgHeader {
	/// The frame's type.
	pub msg_type: Type,
	/// Length of the payload that follows.
	pub msg_len: u32,
}

/// Writes one framed message: tag, length, canonical payload.
pub fn write_message<T: Writeable>(
	stream: &mut dyn Write,
	msg_type: Type,
	body: &T,
) -> Result<(), Error> {
	let payload = ser::ser_vec(body)?;
	if payload.len() > MAX_MSG_LEN as usize {
		return Err(Error::MessageTooLong);
	}
	stream.write_all(&[msg_type.as_u8()])?;
	stream.write_all(&(payload.len() as u32).to_le_bytes())?;
	stream.write_all(&payload)?;
	stream.flush()?;
	Ok(())
}

/// Reads the five header bytes of the next frame. An unknown tag is a
/// protocol violation; an oversize length means the connection must be
/// dropped.
pub fn read_header(stream: &mut dyn Read) -> Result<MsgHeader, Error> {
	let mut head = [0u8; 5];
	stream.read_exact(&mut head)?;
	let msg_type = Type::from_u8(head[0]).ok_or(Error::BadMessage)?;
	let mut len_bytes = [0u8; 4];
	len_bytes.copy_from_slice(&head[1..]);
	let msg_len = u32::from_le_bytes(len_bytes);
	if msg_len > MAX_MSG_LEN {
		return Err(Error::MessageTooLong);
	}
	Ok(MsgHeader { msg_type, msg_len })
}

/// Reads and decodes the payload the header declared.
pub fn read_body<T: Readable>(header: &MsgHeader, stream: &mut dyn Read) -> Result<T, Error> {
	let mut payload = vec![0u8; header.msg_len as usize];
	stream.read_exact(&mut payload)?;
	let body = ser::deserialize(&mut &payload[..])?;
	Ok(body)
}

/// Request for the canonical blocks starting at a height. The wire carries
/// the height in four bytes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RangeRequest {
	/// First height wanted.
	pub start_height: u32,
}

impl Writeable for RangeRequest {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u32(self.start_height)
	}
}

impl Readable for RangeRequest {
	fn read(reader: &mut dyn Reader) -> Result<RangeRequest, ser::Error> {
		Ok(RangeRequest {
			start_height: reader.read_u32()?,
		})
	}
}

/// A list of canonical blocks, the response to both range requests and
/// catch-up requests.
#[derive(Clone, Debug, Default)]
pub struct BlockList {
	/// The blocks, in application order.
	pub blocks: Vec<Block>,
}

impl Writeable for BlockList {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		write_long_multi(writer, &self.blocks)
	}
}

impl Readable for BlockList {
	fn read(reader: &mut dyn Reader) -> Result<BlockList, ser::Error> {
		Ok(BlockList {
			blocks: read_long_multi(reader)?,
		})
	}
}

/// A catch-up request: the ids of blocks the requester already has, most
/// recent first, genesis last.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CatchUpRequest {
	/// Known block ids.
	pub known: Vec<Hash>,
}

impl Writeable for CatchUpRequest {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		write_multi(writer, &self.known)
	}
}

impl Readable for CatchUpRequest {
	fn read(reader: &mut dyn Reader) -> Result<CatchUpRequest, ser::Error> {
		Ok(CatchUpRequest {
			known: read_multi(reader)?,
		})
	}
}

/// Outcome of a catch-up request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CatchUpStatus {
	/// The blocks returned reach the responder's tip.
	Complete,
	/// More blocks remain; request again from the new tip.
	MoreAvailable,
	/// No presented id is on the responder's path.
	NoCommonBlock,
}

/// Response to a catch-up request: a status byte and the successor blocks.
#[derive(Clone, Debug)]
pub struct CatchUpResponse {
	/// What the responder found.
	pub status: CatchUpStatus,
	/// Successors of the highest common block, in application order.
	pub blocks: Vec<Block>,
}

impl Writeable for CatchUpResponse {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		let status = match self.status {
			CatchUpStatus::Complete => 0,
			CatchUpStatus::MoreAvailable => 1,
			CatchUpStatus::NoCommonBlock => 2,
		};
		writer.write_u8(status)?;
		write_long_multi(writer, &self.blocks)
	}
}

impl Readable for CatchUpResponse {
	fn read(reader: &mut dyn Reader) -> Result<CatchUpResponse, ser::Error> {
		let status = match reader.read_u8()? {
			0 => CatchUpStatus::Complete,
			1 => CatchUpStatus::MoreAvailable,
			2 => CatchUpStatus::NoCommonBlock,
			_ => return Err(ser::Error::CorruptedData),
		};
		Ok(CatchUpResponse {
			status,
			blocks: read_long_multi(reader)?,
		})
	}
}

/// A hostname echo: the peer's address as observed from this side.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Hostname {
	/// Rendered address.
	pub name: String,
}

impl Writeable for Hostname {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_bytes(&self.name)
	}
}

impl Readable for Hostname {
	fn read(reader: &mut dyn Reader) -> Result<Hostname, ser::Error> {
		let bytes = reader.read_bytes()?;
		let name = String::from_utf8(bytes).map_err(|_| ser::Error::CorruptedData)?;
		Ok(Hostname { name })
	}
}

/// A request for up to `count` known peer addresses.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PeerRequest {
	/// How many addresses the requester wants.
	pub count: u8,
}

impl Writeable for PeerRequest {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u8(self.count)
	}
}

impl Readable for PeerRequest {
	fn read(reader: &mut dyn Reader) -> Result<PeerRequest, ser::Error> {
		Ok(PeerRequest {
			count: reader.read_u8()?,
		})
	}
}

/// A list of peer addresses.
#[derive(Clone, Debug, Default)]
pub struct PeerList {
	/// The addresses.
	pub peers: Vec<SockAddr>,
}

impl Writeable for PeerList {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		write_multi(writer, &self.peers)
	}
}

impl Readable for PeerList {
	fn read(reader: &mut dyn Reader) -> Result<PeerList, ser::Error> {
		Ok(PeerList {
			peers: read_multi(reader)?,
		})
	}
}

/// Only necessary so we can implement Readable and Writeable. Rust
/// disallows implementing traits when both types are outside of this crate
/// (which is the case for SocketAddr and Readable/Writeable).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SockAddr(pub SocketAddr);

impl Writeable for SockAddr {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		match self.0 {
			SocketAddr::V4(sav4) => {
				writer.write_u8(0)?;
				writer.write_fixed_bytes(&sav4.ip().octets().to_vec())?;
				writer.write_u16(sav4.port())
			}
			SocketAddr::V6(sav6) => {
				writer.write_u8(1)?;
				for seg in &sav6.ip().segments() {
					writer.write_u16(*seg)?;
				}
				writer.write_u16(sav6.port())
			}
		}
	}
}

impl Readable for SockAddr {
	fn read(reader: &mut dyn Reader) -> Result<SockAddr, ser::Error> {
		let v4_or_v6 = reader.read_u8()?;
		if v4_or_v6 == 0 {
			let ip = reader.read_fixed_bytes(4)?;
			let port = reader.read_u16()?;
			Ok(SockAddr(SocketAddr::V4(SocketAddrV4::new(
				Ipv4Addr::new(ip[0], ip[1], ip[2], ip[3]),
				port,
			))))
		} else {
			let mut ip = [0u16; 8];
			for seg in ip.iter_mut() {
				*seg = reader.read_u16()?;
			}
			let port = reader.read_u16()?;
			Ok(SockAddr(SocketAddr::V6(SocketAddrV6::new(
				Ipv6Addr::new(ip[0], ip[1], ip[2], ip[3], ip[4], ip[5], ip[6], ip[7]),
				port,
				0,
				0,
			))))
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use silo_core::core::hash::hash_bytes;
	use std::io::Cursor;

	fn roundtrip<T: Writeable + Readable>(msg_type: Type, body: &T) -> T {
		let mut wire: Vec<u8> = vec![];
		write_message(&mut wire, msg_type, body).unwrap();
		let mut cursor = Cursor::new(wire);
		let header = read_header(&mut cursor).unwrap();
		assert_eq!(header.msg_type, msg_type);
		read_body(&header, &mut cursor).unwrap()
	}

	#[test]
	fn frame_layout() {
		let mut wire: Vec<u8> = vec![];
		write_message(&mut wire, Type::BlockRange, &RangeRequest { start_height: 7 }).unwrap();
		// tag, 4-byte little-endian length, then the payload
		assert_eq!(wire[0], b'R');
		assert_eq!(&wire[1..5], &[4, 0, 0, 0]);
		assert_eq!(&wire[5..], &[7, 0, 0, 0]);
	}

	#[test]
	fn block_roundtrip() {
		let b = Block::new(hash_bytes(b"parent"), vec![], hash_bytes(b"miner"), 42);
		let back: Block = roundtrip(Type::Block, &b);
		assert_eq!(back, b);
	}

	#[test]
	fn catch_up_roundtrip() {
		let req = CatchUpRequest {
			known: vec![hash_bytes(b"a"), hash_bytes(b"b")],
		};
		assert_eq!(roundtrip(Type::CatchUp, &req), req);

		let resp = CatchUpResponse {
			status: CatchUpStatus::MoreAvailable,
			blocks: vec![Block::new(hash_bytes(b"p"), vec![], hash_bytes(b"m"), 1)],
		};
		let back: CatchUpResponse = roundtrip(Type::CatchUp, &resp);
		assert_eq!(back.status, resp.status);
		assert_eq!(back.blocks, resp.blocks);
	}

	#[test]
	fn oversize_frames_refused() {
		let mut wire = vec![];
		wire.push(b'B');
		wire.extend_from_slice(&(MAX_MSG_LEN + 1).to_le_bytes());
		match read_header(&mut Cursor::new(wire)) {
			Err(Error::MessageTooLong) => (),
			other => panic!("expected MessageTooLong, got {:?}", other.map(|h| h.msg_len)),
		}
	}

	#[test]
	fn unknown_tags_refused() {
		let wire = vec![b'Z', 0, 0, 0, 0];
		match read_header(&mut Cursor::new(wire)) {
			Err(Error::BadMessage) => (),
			other => panic!("expected BadMessage, got {:?}", other.map(|h| h.msg_len)),
		}
	}

	#[test]
	fn sock_addr_roundtrip() {
		let v4 = SockAddr("10.0.0.1:9988".parse().unwrap());
		assert_eq!(roundtrip(Type::Announce, &v4), v4);

		let v6 = SockAddr("[2001:db8::1]:9988".parse().unwrap());
		assert_eq!(roundtrip(Type::Announce, &v6), v6);
	}

	#[test]
	fn hostname_roundtrip() {
		let h = Hostname {
			name: "203.0.113.7:9988".to_string(),
		};
		assert_eq!(roundtrip(Type::Hostname, &h), h);
	}
}
