pub mod codec;
pub mod model;
pub mod pin;
pub mod review;
pub mod snowflake;
