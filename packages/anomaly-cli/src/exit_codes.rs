pub const SUCCESS: i32 = 0;
pub const EXECUTION_ERROR: i32 = 1;
/// Bad arguments, unreadable input or invalid configuration
pub const INPUT_ERROR: i32 = 2;
/// The detection service could not be reached or dropped the connection
pub const CONNECTION_ERROR: i32 = 3;
