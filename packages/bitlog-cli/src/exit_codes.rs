pub const SUCCESS: i32 = 0;
pub const EXECUTION_ERROR: i32 = 1;
pub const INPUT_ERROR: i32 = 2;
pub const CONNECTION_ERROR: i32 = 3;
pub const EXPORT_ERROR: i32 = 4;
/// Nothing was recorded (or found), so there is nothing to export
pub const NO_DATA: i32 = 5;
