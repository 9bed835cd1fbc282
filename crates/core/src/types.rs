/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// `parent_id` value marking a record as a tree root.
pub const ROOT_PARENT_ID: DbId = 0;
