/// Application name
pub const APP_NAME: &str = "SynergySphere";

/// Document collection names
pub const COLLECTION_USERS: &str = "users";
pub const COLLECTION_PROJECTS: &str = "projects";
pub const COLLECTION_TASKS: &str = "tasks";
pub const COLLECTION_DISCUSSIONS: &str = "discussions";
pub const COLLECTION_CHATS: &str = "chats";
pub const COLLECTION_MESSAGES: &str = "messages";

/// Store-managed document fields
pub const FIELD_ID: &str = "id";
pub const FIELD_CREATED_AT: &str = "createdAt";
pub const FIELD_UPDATED_AT: &str = "updatedAt";

/// Prefix of deterministic direct-chat document ids
pub const DIRECT_CHAT_PREFIX: &str = "dm";

/// Minimum password length accepted by the identity provider
pub const DEFAULT_MIN_PASSWORD_LEN: usize = 6;

/// Local hour at which the daily reminder fires
pub const DEFAULT_DAILY_REMINDER_HOUR: u32 = 9;

/// Look-ahead window for "due soon" deadline alerts, in hours
pub const DEFAULT_DEADLINE_WINDOW_HOURS: i64 = 24;

/// Delay applied to "immediate" alerts, in seconds
pub const DEFAULT_ALERT_DELAY_SECS: i64 = 1;

/// Upper bound of project progress (percent)
pub const PROGRESS_MAX: u8 = 100;

/// Capacity of the store change feed before slow listeners lag
pub const CHANGE_FEED_CAPACITY: usize = 256;
