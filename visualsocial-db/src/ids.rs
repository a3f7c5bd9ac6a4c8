use std::sync::{Mutex, PoisonError};
use time::OffsetDateTime;
use visualsocial_common::{
    model::{Id, VisualSocialSnowflakeGenerator},
    snowflake::{NodeId, SnowflakeTimestampFromDateTimeError},
};

/// Mints ids for records that only exist in this process.
#[derive(Debug)]
pub struct LocalIds {
    generator: Mutex<VisualSocialSnowflakeGenerator>,
}

impl LocalIds {
    #[must_use]
    pub fn new(node_id: NodeId) -> Self {
        Self {
            generator: Mutex::new(VisualSocialSnowflakeGenerator::new(node_id)),
        }
    }

    /// A fresh id and the creation time it encodes.
    pub fn next<Marker>(
        &self,
    ) -> Result<(Id<Marker>, OffsetDateTime), SnowflakeTimestampFromDateTimeError> {
        let snowflake = self
            .generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()?;

        Ok((Id::new(snowflake), snowflake.created_at().into()))
    }
}
