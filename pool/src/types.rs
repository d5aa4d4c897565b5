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

//! Base types for the transaction pool implementation.

use failure::Fail;

use silo_core::core::OutputId;

/// Pool rejection reasons.
#[derive(Clone, Debug, Eq, PartialEq, Fail)]
pub enum PoolError {
	/// An input of the transaction is already spent by a pending
	/// transaction.
	#[fail(display = "conflicting transaction, output {:?} already spent in pool", _0)]
	Conflict(OutputId),
	/// The transaction spends the same output twice.
	#[fail(display = "duplicate input, output {:?} spent twice", _0)]
	DuplicateInput(OutputId),
}
