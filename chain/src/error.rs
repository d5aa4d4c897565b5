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

//! Error types for chain
use failure::{Backtrace, Context, Fail};
use std::fmt::{self, Display};

use silo_core::core::{ContractId, Currency, OutputId};
use silo_core::ser;
use silo_keychain as keychain;
use silo_pool::PoolError;

/// Error definition
#[derive(Debug, Fail)]
pub struct Error {
	inner: Context<ErrorKind>,
}

/// Chain error definitions
#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorKind {
	/// This block was already checked and found invalid
	#[fail(display = "block previously marked invalid")]
	KnownBad,
	/// We already have this block
	#[fail(display = "block already known")]
	BlockKnown,
	/// The block's parent isn't in the tree; the caller may catch up
	#[fail(display = "orphan block, parent unknown")]
	UnknownOrphan,
	/// Block timestamp is not after the median of its parent's window
	#[fail(display = "block timestamp below recent median")]
	TimestampTooEarly,
	/// Block timestamp is too far ahead of our clock. The block is refused
	/// but not remembered as bad, it may become acceptable later.
	#[fail(display = "block timestamp too far in the future")]
	TimestampTooFarFuture,
	/// The block id doesn't meet the required target
	#[fail(display = "block id does not meet the target")]
	TargetNotMet,
	/// The header merkle root doesn't match the transaction list
	#[fail(display = "transaction merkle root mismatch")]
	MerkleRootMismatch,
	/// An input references an output that isn't in the unspent set
	#[fail(display = "input spends missing output {:?}", _0)]
	MissingOutput(OutputId),
	/// The revealed spend conditions don't hash to the output's address
	#[fail(display = "spend conditions do not match output address")]
	WrongSpendConditions,
	/// A timelock (input or signature) hasn't expired yet
	#[fail(display = "timelock not expired")]
	Timelock,
	/// The same output is spent twice within one transaction
	#[fail(display = "output {:?} spent twice in one transaction", _0)]
	DoubleSpend(OutputId),
	/// Inputs don't balance outputs, fees and contract funds exactly
	#[fail(display = "currency mismatch: {} in, {} out", inputs, outputs)]
	CurrencyMismatch {
		/// Sum of spent outputs
		inputs: Currency,
		/// Sum of created outputs, fees and contract funds
		outputs: Currency,
	},
	/// A created output would collide with an existing one
	#[fail(display = "output {:?} already exists", _0)]
	OutputAlreadyExists(OutputId),
	/// A field exceeds what its canonical encoding can carry
	#[fail(display = "oversized field")]
	OversizedField,
	/// Summing values overflowed the currency type
	#[fail(display = "currency overflow")]
	CurrencyOverflow,
	/// A file contract fails its sanity checks
	#[fail(display = "invalid contract: {}", _0)]
	InvalidContract(String),
	/// A storage proof names a contract that isn't open
	#[fail(display = "contract {:?} not open", _0)]
	ContractNotOpen(ContractId),
	/// The contract's current window already has a valid proof
	#[fail(display = "storage proof already complete for this window")]
	ProofAlreadyComplete,
	/// The chain height is outside the contract's proof obligation
	#[fail(display = "height outside any proof window")]
	ProofOutOfWindow,
	/// The storage proof doesn't verify against the file merkle root
	#[fail(display = "invalid storage proof")]
	InvalidProof,
	/// A signature is malformed, misdirected or doesn't verify
	#[fail(display = "invalid signature")]
	InvalidSignature,
	/// More signatures than the spend conditions call for
	#[fail(display = "frivolous signature")]
	FrivolousSignature,
	/// Not every input collected its required signatures
	#[fail(display = "missing signatures")]
	MissingSignatures,
	/// The transaction conflicts with a pending pool transaction
	#[fail(display = "conflicting transaction")]
	ConflictingTransaction,
	/// The exact transaction is already pending in the pool
	#[fail(display = "transaction already known")]
	TransactionKnown,
	/// Error from the underlying key handling
	#[fail(display = "keychain error: {}", _0)]
	Keychain(keychain::Error),
	/// Error serializing or deserializing a type
	#[fail(display = "serialization error")]
	Ser(ser::Error),
	/// Internal consistency breach: state is unknown and the process must
	/// abort
	#[fail(display = "fatal chain inconsistency: {}", _0)]
	Fatal(String),
}

impl Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		Display::fmt(&self.inner, f)
	}
}

impl Error {
	/// get kind
	pub fn kind(&self) -> ErrorKind {
		self.inner.get_context().clone()
	}
	/// get cause
	pub fn cause(&self) -> Option<&dyn Fail> {
		self.inner.cause()
	}
	/// get backtrace
	pub fn backtrace(&self) -> Option<&Backtrace> {
		self.inner.backtrace()
	}

	/// Whether the error is due to a block that is intrinsically wrong and
	/// should be remembered as bad. Shorter to match on the errors that are
	/// not the block's own fault: being known, being an orphan, or carrying
	/// a timestamp our clock will catch up with.
	pub fn is_bad_data(&self) -> bool {
		match self.kind() {
			ErrorKind::KnownBad
			| ErrorKind::BlockKnown
			| ErrorKind::UnknownOrphan
			| ErrorKind::TimestampTooFarFuture
			| ErrorKind::ConflictingTransaction
			| ErrorKind::TransactionKnown
			| ErrorKind::Fatal(_) => false,
			_ => true,
		}
	}
}

impl From<ErrorKind> for Error {
	fn from(kind: ErrorKind) -> Error {
		Error {
			inner: Context::new(kind),
		}
	}
}

impl From<Context<ErrorKind>> for Error {
	fn from(inner: Context<ErrorKind>) -> Error {
		Error { inner }
	}
}

impl From<ser::Error> for Error {
	fn from(error: ser::Error) -> Error {
		Error {
			inner: Context::new(ErrorKind::Ser(error)),
		}
	}
}

impl From<keychain::Error> for Error {
	fn from(error: keychain::Error) -> Error {
		Error {
			inner: Context::new(ErrorKind::Keychain(error)),
		}
	}
}

impl From<PoolError> for Error {
	fn from(_error: PoolError) -> Error {
		Error {
			inner: Context::new(ErrorKind::ConflictingTransaction),
		}
	}
}
