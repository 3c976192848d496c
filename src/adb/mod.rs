// Host-side adb plumbing: the process executor, the adb-specific
// wrapper around it, the shared device link, and the bridge error type.

pub mod command;
pub mod connection;
pub mod error;
pub mod executor;


pub use command::{DEFAULT_RUN_TIMEOUT, HostCommand};
pub use connection::{
    DELAY_FAST, DELAY_INFINITE, DELAY_MAX, DELAY_MINI, DELAY_NORMAL, DELAY_SLOW, DELAY_STEP,
    DeviceLink,
};
pub use error::{AdbError, AdbResult};
pub use executor::{AdbExecutor, adb_program, ensure_adb_available, repair_crlf};
