//! Module for working with snowflake IDs.
//!
//! A snowflake packs a millisecond timestamp, the id of the node that minted
//! it and a per-node increment into a single `u64`:
//!
//! ```text
//! | 42 bit timestamp | 10 bit node id | 12 bit increment |
//! ```
//!
//! See <https://discord.com/developers/docs/reference#snowflakes>

use derive_where::derive_where;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::{
    fmt::{Debug, Display, Formatter},
    marker::PhantomData,
};
use thiserror::Error;
use time::{Duration, UtcDateTime};

pub const TIMESTAMP_OFFSET: u64 = 22;
pub const TIMESTAMP_LENGTH: u64 = 42;
pub const TIMESTAMP_BITMASK: u64 = ((1 << TIMESTAMP_LENGTH) - 1) << TIMESTAMP_OFFSET;

pub const NODE_ID_OFFSET: u64 = 12;
pub const NODE_ID_LENGTH: u64 = 10;
pub const NODE_ID_BITMASK: u64 = ((1 << NODE_ID_LENGTH) - 1) << NODE_ID_OFFSET;

pub const INCREMENT_OFFSET: u64 = 0;
pub const INCREMENT_LENGTH: u64 = 12;
pub const INCREMENT_BITMASK: u64 = (1 << INCREMENT_LENGTH) - 1;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum SnowflakeTimestampFromDateTimeError {
    #[error("Specified time was before the snowflake epoch.")]
    TimeBeforeEpoch,
    #[error("Resulting timestamp uses too many bits.")]
    TimestampTooLarge,
}

pub trait Epoch {
    const EPOCH_TIME: UtcDateTime;
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Snowflake part was out of range: {0}")]
pub struct SnowflakePartOutOfRangeError(u64);

/// Declares a bounded integer newtype stored in a fixed bit range of a snowflake.
macro_rules! snowflake_part {
    ($(#[$meta:meta])* $name:ident: $repr:ty, mask = $bitmask:ident, offset = $offset:ident,
        len = $length:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
        pub struct $name($repr);

        impl $name {
            #[must_use]
            pub fn new(value: $repr) -> Option<Self> {
                (u64::from(value) < 1 << $length).then_some(Self(value))
            }

            #[must_use]
            pub fn get(self) -> $repr {
                self.0
            }
        }

        impl<SnowflakeEpoch> From<Snowflake<SnowflakeEpoch>> for $name {
            fn from(value: Snowflake<SnowflakeEpoch>) -> Self {
                #[allow(clippy::cast_possible_truncation)]
                Self(((value.get() & $bitmask) >> $offset) as $repr)
            }
        }

        impl TryFrom<$repr> for $name {
            type Error = SnowflakePartOutOfRangeError;

            fn try_from(value: $repr) -> Result<Self, Self::Error> {
                Self::new(value).ok_or(SnowflakePartOutOfRangeError(value.into()))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let inner = <$repr as Deserialize<'de>>::deserialize(deserializer)?;
                Self::new(inner).ok_or_else(|| {
                    Error::invalid_value(Unexpected::Unsigned(inner.into()), &stringify!($name))
                })
            }
        }
    };
}

snowflake_part!(
    /// Identifies the process that minted a snowflake.
    NodeId: u16, mask = NODE_ID_BITMASK, offset = NODE_ID_OFFSET, len = NODE_ID_LENGTH
);
snowflake_part!(
    SnowflakeIncrement: u16, mask = INCREMENT_BITMASK, offset = INCREMENT_OFFSET,
    len = INCREMENT_LENGTH
);

impl SnowflakeIncrement {
    pub const ZERO: Self = Self(0);

    /// The following increment, wrapping around to zero.
    #[must_use]
    pub fn next(self) -> Self {
        Self((self.0 + 1) % (1 << INCREMENT_LENGTH))
    }
}

/// Milliseconds since `SnowflakeEpoch`.
#[derive_where(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct SnowflakeTimestamp<SnowflakeEpoch>(u64, PhantomData<SnowflakeEpoch>);

impl<SnowflakeEpoch> SnowflakeTimestamp<SnowflakeEpoch> {
    #[must_use]
    pub fn new(millis: u64) -> Option<Self> {
        (millis < 1 << TIMESTAMP_LENGTH).then_some(Self(millis, PhantomData))
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    fn next(self) -> Option<Self> {
        Self::new(self.0 + 1)
    }
}

impl<SnowflakeEpoch: Epoch> TryFrom<UtcDateTime> for SnowflakeTimestamp<SnowflakeEpoch> {
    type Error = SnowflakeTimestampFromDateTimeError;

    fn try_from(value: UtcDateTime) -> Result<Self, Self::Error> {
        let millis = (value - SnowflakeEpoch::EPOCH_TIME).whole_milliseconds();
        if millis < 0 {
            return Err(Self::Error::TimeBeforeEpoch);
        }
        let millis = u64::try_from(millis).map_err(|_| Self::Error::TimestampTooLarge)?;
        Self::new(millis).ok_or(Self::Error::TimestampTooLarge)
    }
}

impl<SnowflakeEpoch: Epoch> From<SnowflakeTimestamp<SnowflakeEpoch>> for UtcDateTime {
    fn from(value: SnowflakeTimestamp<SnowflakeEpoch>) -> Self {
        // 42 bits always fit into an i64.
        SnowflakeEpoch::EPOCH_TIME + Duration::milliseconds(value.0.cast_signed())
    }
}

#[derive_where(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Debug,
    Default,
    Hash,
    Serialize,
    Deserialize
)]
#[serde(transparent)]
pub struct Snowflake<SnowflakeEpoch>(u64, #[serde(skip)] PhantomData<SnowflakeEpoch>);

impl<SnowflakeEpoch> Snowflake<SnowflakeEpoch> {
    #[must_use]
    pub fn new(inner: u64) -> Self {
        Self(inner, PhantomData)
    }

    #[must_use]
    pub fn from_parts(
        timestamp: SnowflakeTimestamp<SnowflakeEpoch>,
        node_id: NodeId,
        increment: SnowflakeIncrement,
    ) -> Self {
        let snowflake = timestamp.get() << TIMESTAMP_OFFSET
            | u64::from(node_id.get()) << NODE_ID_OFFSET
            | u64::from(increment.get()) << INCREMENT_OFFSET;

        Self::new(snowflake)
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn timestamp(self) -> SnowflakeTimestamp<SnowflakeEpoch> {
        SnowflakeTimestamp((self.0 & TIMESTAMP_BITMASK) >> TIMESTAMP_OFFSET, PhantomData)
    }

    #[must_use]
    pub fn node_id(self) -> NodeId {
        self.into()
    }

    #[must_use]
    pub fn increment(self) -> SnowflakeIncrement {
        self.into()
    }

    /// Wall-clock time encoded in the snowflake.
    #[must_use]
    pub fn created_at(self) -> UtcDateTime
    where
        SnowflakeEpoch: Epoch,
    {
        self.timestamp().into()
    }
}

impl<SnowflakeEpoch> Display for Snowflake<SnowflakeEpoch> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<SnowflakeEpoch> From<u64> for Snowflake<SnowflakeEpoch> {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl<SnowflakeEpoch> From<Snowflake<SnowflakeEpoch>> for u64 {
    fn from(value: Snowflake<SnowflakeEpoch>) -> Self {
        value.get()
    }
}

/// Mints strictly increasing snowflakes for one node.
///
/// When the clock stalls or goes backwards the last timestamp is reused, and
/// when the increment space of a millisecond is exhausted the timestamp is
/// pushed one millisecond ahead.
#[derive_where(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct SnowflakeGenerator<SnowflakeEpoch> {
    node_id: NodeId,
    last: Option<(SnowflakeTimestamp<SnowflakeEpoch>, SnowflakeIncrement)>,
}

impl<SnowflakeEpoch> SnowflakeGenerator<SnowflakeEpoch> {
    #[must_use]
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            last: None,
        }
    }

    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn generate_at(
        &mut self,
        time: UtcDateTime,
    ) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeTimestampFromDateTimeError>
    where
        SnowflakeEpoch: Epoch,
    {
        let requested = SnowflakeTimestamp::try_from(time)?;

        let (timestamp, increment) = match self.last {
            Some((last_timestamp, last_increment)) if requested <= last_timestamp => {
                let increment = last_increment.next();
                if increment == SnowflakeIncrement::ZERO {
                    let timestamp = last_timestamp
                        .next()
                        .ok_or(SnowflakeTimestampFromDateTimeError::TimestampTooLarge)?;
                    (timestamp, increment)
                } else {
                    (last_timestamp, increment)
                }
            }
            _ => (requested, SnowflakeIncrement::ZERO),
        };

        self.last = Some((timestamp, increment));
        Ok(Snowflake::from_parts(timestamp, self.node_id, increment))
    }

    pub fn generate(
        &mut self,
    ) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeTimestampFromDateTimeError>
    where
        SnowflakeEpoch: Epoch,
    {
        self.generate_at(UtcDateTime::now())
    }
}

#[cfg(test)]
mod tests {
    use crate::snowflake::{
        Epoch, NodeId, Snowflake, SnowflakeGenerator, SnowflakeIncrement, SnowflakeTimestamp,
        SnowflakeTimestampFromDateTimeError,
    };
    use time::{Duration, UtcDateTime, macros::utc_datetime};

    struct MillennialEpoch;
    impl Epoch for MillennialEpoch {
        const EPOCH_TIME: UtcDateTime = utc_datetime!(2000-1-1 00:00);
    }

    #[test]
    fn legal_values() {
        for legal in [0, 0xFFFF, 0x03FF_FFFF_FFFF] {
            assert!(SnowflakeTimestamp::<MillennialEpoch>::new(legal).is_some());
        }
        for illegal in [0x0400_0000_0000, u64::MAX] {
            assert!(SnowflakeTimestamp::<MillennialEpoch>::new(illegal).is_none());
        }

        for legal in [0, 0x1F, 0x3FF] {
            assert!(NodeId::new(legal).is_some());
        }
        for illegal in [0x400, u16::MAX] {
            assert!(NodeId::new(illegal).is_none());
        }

        for legal in [0, 0xFF, 0xFFF] {
            assert!(SnowflakeIncrement::new(legal).is_some());
        }
        for illegal in [0x1000, u16::MAX] {
            assert!(SnowflakeIncrement::new(illegal).is_none());
        }
    }

    #[test]
    fn snowflake_timestamp() {
        let legal_date_times = [
            MillennialEpoch::EPOCH_TIME,
            utc_datetime!(2025-10-24 10:00),
            MillennialEpoch::EPOCH_TIME + Duration::milliseconds(0x03FF_FFFF_FFFF),
        ];

        for legal_date_time in legal_date_times {
            let timestamp =
                SnowflakeTimestamp::<MillennialEpoch>::try_from(legal_date_time).unwrap();
            assert_eq!(UtcDateTime::from(timestamp), legal_date_time);
        }

        assert_eq!(
            SnowflakeTimestamp::<MillennialEpoch>::try_from(
                MillennialEpoch::EPOCH_TIME - Duration::milliseconds(1)
            ),
            Err(SnowflakeTimestampFromDateTimeError::TimeBeforeEpoch)
        );
        assert_eq!(
            SnowflakeTimestamp::<MillennialEpoch>::try_from(
                MillennialEpoch::EPOCH_TIME + Duration::milliseconds(0x0400_0000_0000)
            ),
            Err(SnowflakeTimestampFromDateTimeError::TimestampTooLarge)
        );
    }

    #[test]
    fn snowflake_increment_wraps() {
        assert_eq!(
            SnowflakeIncrement::new(100).unwrap().next(),
            SnowflakeIncrement::new(101).unwrap()
        );
        assert_eq!(
            SnowflakeIncrement::new(0xFFF).unwrap().next(),
            SnowflakeIncrement::ZERO
        );
    }

    #[test]
    fn snowflake_from_into_parts() {
        let timestamp = SnowflakeTimestamp::new(5).unwrap();
        let node_id = NodeId::new(0b10_1010_1010).unwrap();
        let increment = SnowflakeIncrement::new(100).unwrap();

        let snowflake = Snowflake::<MillennialEpoch>::from_parts(timestamp, node_id, increment);

        assert_eq!(snowflake.get(), (5 << 22) | (0b10_1010_1010 << 12) | 100);
        assert_eq!(snowflake.timestamp(), timestamp);
        assert_eq!(snowflake.node_id(), node_id);
        assert_eq!(snowflake.increment(), increment);
    }

    #[test]
    fn generator_is_strictly_increasing_within_one_millisecond() {
        let node_id = NodeId::new(10).unwrap();
        let time = utc_datetime!(2025-10-24 10:55);
        let mut generator = SnowflakeGenerator::<MillennialEpoch>::new(node_id);

        let first = generator.generate_at(time).unwrap();
        let second = generator.generate_at(time).unwrap();

        assert_eq!(first.increment(), SnowflakeIncrement::ZERO);
        assert_eq!(second.increment(), SnowflakeIncrement::new(1).unwrap());
        assert_eq!(first.timestamp(), second.timestamp());
        assert!(second > first);
        assert_eq!(UtcDateTime::from(first.timestamp()), time);
    }

    #[test]
    fn generator_survives_clock_going_backwards() {
        let mut generator = SnowflakeGenerator::<MillennialEpoch>::new(NodeId::new(1).unwrap());
        let time = utc_datetime!(2025-10-24 10:55);

        let first = generator.generate_at(time).unwrap();
        let second = generator
            .generate_at(time - Duration::seconds(3))
            .unwrap();

        assert!(second > first);
        assert_eq!(second.timestamp(), first.timestamp());
    }

    #[test]
    fn generator_moves_to_next_millisecond_when_increments_run_out() {
        let mut generator = SnowflakeGenerator::<MillennialEpoch>::new(NodeId::new(1).unwrap());
        let time = utc_datetime!(2025-10-24 10:55);

        let first = generator.generate_at(time).unwrap();
        let mut last = first;
        for _ in 0..0x1000 {
            let next = generator.generate_at(time).unwrap();
            assert!(next > last);
            last = next;
        }

        assert_eq!(last.timestamp().get(), first.timestamp().get() + 1);
        assert_eq!(last.increment(), SnowflakeIncrement::ZERO);
    }
}
