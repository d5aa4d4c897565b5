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

//! Generic macros used here and there to simplify and make code more
//! readable.

/// Eliminates some of the verbosity in having iter and collect
/// around every map call.
#[macro_export]
macro_rules! map_vec {
	($thing:expr, $mapfn:expr) => {
		$thing.iter().map($mapfn).collect::<Vec<_>>()
	};
}

/// Eliminate some of the boilerplate of deserialization (package ser) by
/// passing just the list of reader functions.
/// Example before:
///   let foo = reader.read_u64()?;
///   let bar = reader.read_u32()?;
/// Example after:
///   let (foo, bar) = ser_multiread!(reader, read_u64, read_u32);
#[macro_export]
macro_rules! ser_multiread {
	($rdr:ident, $($read_call:ident),*) => {
		( $($rdr.$read_call()?),* )
	}
}

/// Eliminate some of the boilerplate of serialization (package ser) by
/// passing directly pairs of writer function and data to write.
/// Example before:
///   writer.write_u64(42)?;
///   writer.write_u32(100)?;
/// Example after:
///   ser_multiwrite!(writer, [write_u64, 42], [write_u32, 100]);
#[macro_export]
macro_rules! ser_multiwrite {
	($wrtr:ident, $([ $write_call:ident, $val:expr ]),*) => {
		$( $wrtr.$write_call($val)? );*
	}
}
