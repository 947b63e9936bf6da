// Copyright 2026 The swim Authors.
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

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("invalid member id (expected in range [0, {}))", std::u64::MAX)]
    InvalidMemberId(u64),

    /// A tunable in `SwimOption` violates the relations required by the
    /// protocol, eg: the ack timeout must be shorter than the protocol
    /// period.
    #[error("invalid option: {0}")]
    InvalidOption(&'static str),
}
