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

//! Transactions and their building blocks: coin inputs and outputs, spend
//! conditions, file contracts, storage proofs and covered-field signatures.
//!
//! Every identifier here is a content hash of the canonical encoding, which
//! makes the encoding itself part of the consensus rules. Outputs and
//! contracts are addressed by the transaction that creates them plus a
//! domain tag and their index, so identical payloads at different positions
//! still get distinct ids.

use silo_keychain::{PublicKey, Signature};

use crate::core::hash::{Hash, Hashed, HashWriter};
use crate::core::merkle::merkle_root;
use crate::core::{Address, ContractId, Currency, Height, OutputId};
use crate::ser::{self, read_multi, write_multi, Readable, Reader, Writeable, Writer};

/// The conditions an input must satisfy to spend an output: a timelock and
/// a set of public keys of which `num_signatures` many must sign.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SpendConditions {
	/// Height before which the output cannot be spent.
	pub timelock: Height,
	/// How many of the public keys must provide a signature.
	pub num_signatures: u64,
	/// The keys allowed to sign.
	pub public_keys: Vec<PublicKey>,
}

impl SpendConditions {
	/// Convenience for the common single-key, no-timelock case.
	pub fn standard(public_key: PublicKey) -> SpendConditions {
		SpendConditions {
			timelock: 0,
			num_signatures: 1,
			public_keys: vec![public_key],
		}
	}

	/// The coin address these conditions hash to: a Merkle root over the
	/// timelock, the signature count and each public key. An output commits
	/// to the address; the spender reveals the conditions.
	pub fn coin_address(&self) -> Address {
		let mut leaves = vec![self.timelock.hash(), self.num_signatures.hash()];
		for pk in &self.public_keys {
			leaves.push(pk.hash());
		}
		merkle_root(&leaves)
	}
}

impl Writeable for SpendConditions {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		ser_multiwrite!(
			writer,
			[write_u64, self.timelock],
			[write_u64, self.num_signatures]
		);
		write_multi(writer, &self.public_keys)
	}
}

impl Readable for SpendConditions {
	fn read(reader: &mut dyn Reader) -> Result<SpendConditions, ser::Error> {
		let (timelock, num_signatures) = ser_multiread!(reader, read_u64, read_u64);
		let public_keys = read_multi(reader)?;
		Ok(SpendConditions {
			timelock,
			num_signatures,
			public_keys,
		})
	}
}

/// A coin output: an amount locked to an address.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Output {
	/// The amount carried by the output.
	pub value: Currency,
	/// Address of the spend conditions that can consume it.
	pub spend_hash: Address,
}

impl Writeable for Output {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u64(self.value)?;
		self.spend_hash.write(writer)
	}
}

impl Readable for Output {
	fn read(reader: &mut dyn Reader) -> Result<Output, ser::Error> {
		let value = reader.read_u64()?;
		let spend_hash = Hash::read(reader)?;
		Ok(Output { value, spend_hash })
	}
}

/// A coin input: a reference to an unspent output together with the spend
/// conditions whose address the output committed to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Input {
	/// Which output is being spent.
	pub output_id: OutputId,
	/// The revealed conditions; must hash to the output's address.
	pub spend_conditions: SpendConditions,
}

impl Writeable for Input {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.output_id.write(writer)?;
		self.spend_conditions.write(writer)
	}
}

impl Readable for Input {
	fn read(reader: &mut dyn Reader) -> Result<Input, ser::Error> {
		let output_id = Hash::read(reader)?;
		let spend_conditions = SpendConditions::read(reader)?;
		Ok(Input {
			output_id,
			spend_conditions,
		})
	}
}

/// A file contract: funds committed against a host's obligation to prove
/// possession of a file once per challenge window.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileContract {
	/// Total coins locked into the contract.
	pub fund: Currency,
	/// Merkle root of the contracted file, 64-byte segments.
	pub file_merkle_root: Hash,
	/// Size of the file in bytes.
	pub file_size: u64,
	/// First height of the proof obligation; must be in the future when the
	/// contract is accepted.
	pub start: Height,
	/// Height at which the contract expires.
	pub end: Height,
	/// Blocks per challenge window.
	pub challenge_frequency: Height,
	/// Missed proofs allowed before the contract fails outright.
	pub tolerance: u64,
	/// Payout per window with a valid proof.
	pub valid_proof_payout: Currency,
	/// Where valid-proof payouts (and a clean termination) go.
	pub valid_proof_address: Address,
	/// Penalty paid out per missed window.
	pub missed_proof_payout: Currency,
	/// Where missed-proof payouts (and a failed termination) go.
	pub missed_proof_address: Address,
}

impl Writeable for FileContract {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u64(self.fund)?;
		self.file_merkle_root.write(writer)?;
		ser_multiwrite!(
			writer,
			[write_u64, self.file_size],
			[write_u64, self.start],
			[write_u64, self.end],
			[write_u64, self.challenge_frequency],
			[write_u64, self.tolerance],
			[write_u64, self.valid_proof_payout]
		);
		self.valid_proof_address.write(writer)?;
		writer.write_u64(self.missed_proof_payout)?;
		self.missed_proof_address.write(writer)
	}
}

impl Readable for FileContract {
	fn read(reader: &mut dyn Reader) -> Result<FileContract, ser::Error> {
		let fund = reader.read_u64()?;
		let file_merkle_root = Hash::read(reader)?;
		let (file_size, start, end, challenge_frequency, tolerance, valid_proof_payout) =
			ser_multiread!(reader, read_u64, read_u64, read_u64, read_u64, read_u64, read_u64);
		let valid_proof_address = Hash::read(reader)?;
		let missed_proof_payout = reader.read_u64()?;
		let missed_proof_address = Hash::read(reader)?;
		Ok(FileContract {
			fund,
			file_merkle_root,
			file_size,
			start,
			end,
			challenge_frequency,
			tolerance,
			valid_proof_payout,
			valid_proof_address,
			missed_proof_payout,
			missed_proof_address,
		})
	}
}

/// A storage proof: the base segment selected by the challenge plus the
/// sister hashes climbing back to the contract's file Merkle root.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StorageProof {
	/// The contract being proven.
	pub contract_id: ContractId,
	/// The raw bytes of the challenged segment, at most 64.
	pub base: Vec<u8>,
	/// Sister subtree roots, one per tree level.
	pub hash_set: Vec<Hash>,
}

impl Writeable for StorageProof {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.contract_id.write(writer)?;
		writer.write_bytes(&self.base)?;
		write_multi(writer, &self.hash_set)
	}
}

impl Readable for StorageProof {
	fn read(reader: &mut dyn Reader) -> Result<StorageProof, ser::Error> {
		let contract_id = Hash::read(reader)?;
		let base = reader.read_bytes()?;
		let hash_set = read_multi(reader)?;
		Ok(StorageProof {
			contract_id,
			base,
			hash_set,
		})
	}
}

/// The mask of transaction fields a signature commits to. Either the whole
/// transaction, or explicit index lists into each field.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CoveredFields {
	/// Covers every field; the index lists are ignored when set.
	pub whole_transaction: bool,
	/// Covered arbitrary data entries.
	pub arbitrary_data: Vec<u64>,
	/// Covered inputs.
	pub inputs: Vec<u64>,
	/// Covered outputs.
	pub outputs: Vec<u64>,
	/// Covered miner fees.
	pub miner_fees: Vec<u64>,
	/// Covered file contracts.
	pub file_contracts: Vec<u64>,
	/// Covered storage proofs.
	pub storage_proofs: Vec<u64>,
	/// Covered signatures of other parties.
	pub signatures: Vec<u64>,
}

impl CoveredFields {
	/// The usual mask: sign everything.
	pub fn whole_transaction() -> CoveredFields {
		CoveredFields {
			whole_transaction: true,
			..Default::default()
		}
	}
}

impl Writeable for CoveredFields {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_bool(self.whole_transaction)?;
		write_multi(writer, &self.arbitrary_data)?;
		write_multi(writer, &self.inputs)?;
		write_multi(writer, &self.outputs)?;
		write_multi(writer, &self.miner_fees)?;
		write_multi(writer, &self.file_contracts)?;
		write_multi(writer, &self.storage_proofs)?;
		write_multi(writer, &self.signatures)
	}
}

impl Readable for CoveredFields {
	fn read(reader: &mut dyn Reader) -> Result<CoveredFields, ser::Error> {
		let whole_transaction = reader.read_bool()?;
		let arbitrary_data = read_multi(reader)?;
		let inputs = read_multi(reader)?;
		let outputs = read_multi(reader)?;
		let miner_fees = read_multi(reader)?;
		let file_contracts = read_multi(reader)?;
		let storage_proofs = read_multi(reader)?;
		let signatures = read_multi(reader)?;
		Ok(CoveredFields {
			whole_transaction,
			arbitrary_data,
			inputs,
			outputs,
			miner_fees,
			file_contracts,
			storage_proofs,
			signatures,
		})
	}
}

/// A signature authorizing one input, binding a public key index, an
/// optional timelock and the mask of fields it commits to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransactionSignature {
	/// The input (by spent output id) this signature authorizes.
	pub input_id: OutputId,
	/// Index into the spend conditions' public key set.
	pub public_key_index: u64,
	/// Height before which this signature is not valid.
	pub timelock: Height,
	/// The fields the signature covers.
	pub covered_fields: CoveredFields,
	/// The signature itself.
	pub signature: Signature,
}

impl Writeable for TransactionSignature {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.input_id.write(writer)?;
		ser_multiwrite!(
			writer,
			[write_u64, self.public_key_index],
			[write_u64, self.timelock]
		);
		self.covered_fields.write(writer)?;
		self.signature.write(writer)
	}
}

impl Readable for TransactionSignature {
	fn read(reader: &mut dyn Reader) -> Result<TransactionSignature, ser::Error> {
		let input_id = Hash::read(reader)?;
		let (public_key_index, timelock) = ser_multiread!(reader, read_u64, read_u64);
		let covered_fields = CoveredFields::read(reader)?;
		let signature = Signature::read(reader)?;
		Ok(TransactionSignature {
			input_id,
			public_key_index,
			timelock,
			covered_fields,
			signature,
		})
	}
}

/// A transaction: spends a set of outputs into new outputs, miner fees and
/// file contract funds, optionally carrying storage proofs and arbitrary
/// data.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Transaction {
	/// Free-form data riding along, ignored by consensus.
	pub arbitrary_data: Vec<Vec<u8>>,
	/// The outputs being spent.
	pub inputs: Vec<Input>,
	/// The outputs being created.
	pub outputs: Vec<Output>,
	/// Fees offered to the miner that confirms the transaction.
	pub miner_fees: Vec<Currency>,
	/// New file contracts being opened.
	pub file_contracts: Vec<FileContract>,
	/// Storage proofs against open contracts.
	pub storage_proofs: Vec<StorageProof>,
	/// Signatures authorizing the inputs.
	pub signatures: Vec<TransactionSignature>,
}

impl Default for Transaction {
	fn default() -> Transaction {
		Transaction {
			arbitrary_data: vec![],
			inputs: vec![],
			outputs: vec![],
			miner_fees: vec![],
			file_contracts: vec![],
			storage_proofs: vec![],
			signatures: vec![],
		}
	}
}

// Hashes the canonical encoding of `value` followed by a raw domain tag and
// an optional index. The id-generating formulas all take this shape.
pub(crate) fn tagged_hash<T: Writeable>(value: &T, tag: &str, index: Option<u64>) -> Hash {
	let mut hasher = HashWriter::new();
	value
		.write(&mut hasher)
		.expect("oversized field in canonical encoding");
	hasher
		.write_fixed_bytes(&tag.as_bytes().to_vec())
		.expect("oversized field in canonical encoding");
	if let Some(i) = index {
		hasher
			.write_u64(i)
			.expect("oversized field in canonical encoding");
	}
	hasher.into_hash()
}

impl Transaction {
	/// Id of the output created at the given index.
	pub fn output_id(&self, index: usize) -> OutputId {
		tagged_hash(self, "coinsend", Some(index as u64))
	}

	/// Id of the file contract created at the given index.
	pub fn contract_id(&self, index: usize) -> ContractId {
		tagged_hash(self, "contract", Some(index as u64))
	}

	/// Sum of the miner fees.
	pub fn total_fees(&self) -> Currency {
		self.miner_fees
			.iter()
			.fold(0u64, |acc, fee| acc.saturating_add(*fee))
	}

	/// The digest the signature at `sig_index` must have signed. With the
	/// whole-transaction mask, covers every consensus field plus the
	/// signature's own binding (input id, key index, timelock). Otherwise
	/// covers exactly the elements whose indices are listed, in list order.
	pub fn sighash(&self, sig_index: usize) -> Result<Hash, ser::Error> {
		let sig = self
			.signatures
			.get(sig_index)
			.ok_or(ser::Error::CorruptedData)?;
		let cf = &sig.covered_fields;
		let mut hasher = HashWriter::new();
		if cf.whole_transaction {
			write_multi(&mut hasher, &self.arbitrary_data)?;
			write_multi(&mut hasher, &self.inputs)?;
			write_multi(&mut hasher, &self.outputs)?;
			write_multi(&mut hasher, &self.miner_fees)?;
			write_multi(&mut hasher, &self.file_contracts)?;
			write_multi(&mut hasher, &self.storage_proofs)?;
			sig.input_id.write(&mut hasher)?;
			hasher.write_u64(sig.public_key_index)?;
			hasher.write_u64(sig.timelock)?;
		} else {
			for &i in &cf.arbitrary_data {
				self.arbitrary_data
					.get(i as usize)
					.ok_or(ser::Error::CorruptedData)?
					.write(&mut hasher)?;
			}
			for &i in &cf.inputs {
				self.inputs
					.get(i as usize)
					.ok_or(ser::Error::CorruptedData)?
					.write(&mut hasher)?;
			}
			for &i in &cf.outputs {
				self.outputs
					.get(i as usize)
					.ok_or(ser::Error::CorruptedData)?
					.write(&mut hasher)?;
			}
			for &i in &cf.miner_fees {
				self.miner_fees
					.get(i as usize)
					.ok_or(ser::Error::CorruptedData)?
					.write(&mut hasher)?;
			}
			for &i in &cf.file_contracts {
				self.file_contracts
					.get(i as usize)
					.ok_or(ser::Error::CorruptedData)?
					.write(&mut hasher)?;
			}
			for &i in &cf.storage_proofs {
				self.storage_proofs
					.get(i as usize)
					.ok_or(ser::Error::CorruptedData)?
					.write(&mut hasher)?;
			}
			for &i in &cf.signatures {
				self.signatures
					.get(i as usize)
					.ok_or(ser::Error::CorruptedData)?
					.write(&mut hasher)?;
			}
		}
		Ok(hasher.into_hash())
	}
}

/// Id of the output emitted for a storage proof window, valid or missed.
pub fn storage_proof_output_id(
	contract_id: ContractId,
	window_index: u64,
	proof_valid: bool,
) -> OutputId {
	let tag = if proof_valid {
		"validproof"
	} else {
		"missedproof"
	};
	tagged_hash(&contract_id, tag, Some(window_index))
}

/// Id of the output emitted when a contract terminates, successfully or not.
pub fn contract_termination_output_id(contract_id: ContractId, success: bool) -> OutputId {
	let tag = if success {
		"successfultermination"
	} else {
		"unsuccessfultermination"
	};
	tagged_hash(&contract_id, tag, None)
}

impl Writeable for Transaction {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		write_multi(writer, &self.arbitrary_data)?;
		write_multi(writer, &self.inputs)?;
		write_multi(writer, &self.outputs)?;
		write_multi(writer, &self.miner_fees)?;
		write_multi(writer, &self.file_contracts)?;
		write_multi(writer, &self.storage_proofs)?;
		write_multi(writer, &self.signatures)
	}
}

impl Readable for Transaction {
	fn read(reader: &mut dyn Reader) -> Result<Transaction, ser::Error> {
		let arbitrary_data = read_multi(reader)?;
		let inputs = read_multi(reader)?;
		let outputs = read_multi(reader)?;
		let miner_fees = read_multi(reader)?;
		let file_contracts = read_multi(reader)?;
		let storage_proofs = read_multi(reader)?;
		let signatures = read_multi(reader)?;
		Ok(Transaction {
			arbitrary_data,
			inputs,
			outputs,
			miner_fees,
			file_contracts,
			storage_proofs,
			signatures,
		})
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::core::hash::{Hashed, ZERO_HASH};
	use crate::ser::{deserialize, ser_vec};
	use silo_keychain::Keypair;

	fn sample_conditions() -> SpendConditions {
		SpendConditions::standard(Keypair::from_entropy([1; 32]).public)
	}

	fn sample_transaction() -> Transaction {
		let conditions = sample_conditions();
		Transaction {
			arbitrary_data: vec![b"hello".to_vec()],
			inputs: vec![Input {
				output_id: ZERO_HASH,
				spend_conditions: conditions.clone(),
			}],
			outputs: vec![Output {
				value: 90,
				spend_hash: conditions.coin_address(),
			}],
			miner_fees: vec![10],
			file_contracts: vec![],
			storage_proofs: vec![],
			signatures: vec![TransactionSignature {
				input_id: ZERO_HASH,
				public_key_index: 0,
				timelock: 0,
				covered_fields: CoveredFields::whole_transaction(),
				signature: Signature::zero(),
			}],
		}
	}

	#[test]
	fn transaction_roundtrip() {
		let tx = sample_transaction();
		let ser = ser_vec(&tx).unwrap();
		let back: Transaction = deserialize(&mut &ser[..]).unwrap();
		assert_eq!(back, tx);
		assert_eq!(back.hash(), tx.hash());
	}

	#[test]
	fn ids_are_position_dependent() {
		let tx = sample_transaction();
		assert_ne!(tx.output_id(0), tx.output_id(1));
		assert_ne!(tx.output_id(0), tx.contract_id(0));
		assert_ne!(
			storage_proof_output_id(ZERO_HASH, 0, true),
			storage_proof_output_id(ZERO_HASH, 0, false)
		);
		assert_ne!(
			storage_proof_output_id(ZERO_HASH, 0, true),
			storage_proof_output_id(ZERO_HASH, 1, true)
		);
		assert_ne!(
			contract_termination_output_id(ZERO_HASH, true),
			contract_termination_output_id(ZERO_HASH, false)
		);
	}

	#[test]
	fn ids_depend_on_content() {
		let tx = sample_transaction();
		let mut tx2 = tx.clone();
		tx2.miner_fees[0] = 11;
		assert_ne!(tx.output_id(0), tx2.output_id(0));
	}

	#[test]
	fn coin_address_commits_to_conditions() {
		let base = sample_conditions();
		let mut locked = base.clone();
		locked.timelock = 100;
		assert_ne!(base.coin_address(), locked.coin_address());

		let mut multi = base.clone();
		multi.public_keys.push(Keypair::from_entropy([2; 32]).public);
		assert_ne!(base.coin_address(), multi.coin_address());
	}

	#[test]
	fn sighash_whole_transaction_excludes_signatures() {
		let tx = sample_transaction();
		let mut signed = tx.clone();
		signed.signatures[0].signature = Keypair::from_entropy([1; 32]).sign(&[0; 32]);
		// the signature value itself is not covered
		assert_eq!(tx.sighash(0).unwrap(), signed.sighash(0).unwrap());

		// but consensus fields are
		let mut altered = tx.clone();
		altered.outputs[0].value = 91;
		assert_ne!(tx.sighash(0).unwrap(), altered.sighash(0).unwrap());
	}

	#[test]
	fn sighash_fragment_mode() {
		let mut tx = sample_transaction();
		tx.signatures[0].covered_fields = CoveredFields {
			whole_transaction: false,
			inputs: vec![0],
			outputs: vec![0],
			..Default::default()
		};

		// arbitrary data is not covered by this mask
		let digest = tx.sighash(0).unwrap();
		let mut altered = tx.clone();
		altered.arbitrary_data[0] = b"other".to_vec();
		assert_eq!(digest, altered.sighash(0).unwrap());

		// but the listed output is
		let mut altered = tx.clone();
		altered.outputs[0].value = 1;
		assert_ne!(digest, altered.sighash(0).unwrap());

		// out-of-range indices are an error
		let mut bad = tx.clone();
		bad.signatures[0].covered_fields.outputs = vec![7];
		assert!(bad.sighash(0).is_err());
	}

	#[test]
	fn spend_conditions_roundtrip() {
		let mut conditions = sample_conditions();
		conditions.timelock = 42;
		conditions
			.public_keys
			.push(Keypair::from_entropy([9; 32]).public);
		conditions.num_signatures = 2;
		let ser = ser_vec(&conditions).unwrap();
		let back: SpendConditions = deserialize(&mut &ser[..]).unwrap();
		assert_eq!(back, conditions);
	}

	#[test]
	fn contract_roundtrip() {
		let contract = FileContract {
			fund: 500,
			file_merkle_root: ZERO_HASH,
			file_size: 300,
			start: 10,
			end: 50,
			challenge_frequency: 5,
			tolerance: 2,
			valid_proof_payout: 10,
			valid_proof_address: sample_conditions().coin_address(),
			missed_proof_payout: 20,
			missed_proof_address: ZERO_HASH,
		};
		let ser = ser_vec(&contract).unwrap();
		let back: FileContract = deserialize(&mut &ser[..]).unwrap();
		assert_eq!(back, contract);
	}
}
