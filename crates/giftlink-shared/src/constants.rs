/// Application name
pub const APP_NAME: &str = "Giftlink";

/// Key used to derive the launch-data secret from the bot token
pub const WEB_APP_DATA_KEY: &[u8] = b"WebAppData";

/// Launch-data field carrying the signature
pub const HASH_FIELD: &str = "hash";

/// Launch-data field carrying the JSON-encoded user object
pub const USER_FIELD: &str = "user";

/// Launch-data field carrying the unix timestamp of the launch
pub const AUTH_DATE_FIELD: &str = "auth_date";

/// Launch-data field carrying the `startapp` deep-link parameter
pub const START_PARAM_FIELD: &str = "start_param";

/// Prefix of the `/start` parameter inside a shared invitation link
pub const INVITE_PREFIX: &str = "invite_";

/// Name given to an invited user's close-person entry when they have no first name
pub const DEFAULT_INVITED_NAME: &str = "User";

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8000;

/// Upper bound accepted for a close person's age
pub const MAX_AGE_YEARS: i32 = 150;
