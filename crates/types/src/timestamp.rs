// This file is part of Opflow.
//
// Opflow is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// Opflow is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with Opflow.
// If not, see https://www.gnu.org/licenses/.

//! Creation timestamps for user operation metadata.

use std::{
    fmt,
    fmt::{Debug, Display, Formatter},
    ops::{Add, Sub},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A wall-clock timestamp expressed as milliseconds since the epoch.
///
/// Used for the creation time of an operation, for display ordering and for
/// poll bookkeeping. Serializes as a plain integer so persisted state stays
/// readable.
#[derive(Clone, Copy, Default, Eq, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a new timestamp from milliseconds since the epoch.
    pub fn new(millis_since_epoch: u64) -> Self {
        Self(millis_since_epoch)
    }

    /// Create a new timestamp representing the current time.
    pub fn now() -> Self {
        Self(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_millis() as u64,
        )
    }

    /// Returns the number of milliseconds since the epoch of this timestamp.
    pub fn millis_since_epoch(self) -> u64 {
        self.0
    }
}

impl From<u64> for Timestamp {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Add<Duration> for Timestamp {
    type Output = Self;

    fn add(self, duration: Duration) -> Self::Output {
        Self(self.0 + duration.as_millis() as u64)
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Self;

    fn sub(self, duration: Duration) -> Self::Output {
        Self(self.0 - duration.as_millis() as u64)
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match DateTime::<Utc>::from_timestamp_millis(self.0 as i64) {
            Some(datetime) => Display::fmt(&datetime, f),
            None => write!(f, "later than {}", DateTime::<Utc>::MAX_UTC),
        }
    }
}

impl Debug for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({} = {})", self.0, self)
    }
}
