// Library surface for the binary, headless runs and integration tests.
pub mod app;
pub mod app_dirs;
pub mod config;
pub mod error;
pub mod export;
pub mod result;
pub mod runtime;
pub mod session;
pub mod stats;
pub mod storage;
pub mod test_type;
pub mod timer;
pub mod ui;
pub mod user_stats;
pub mod util;

pub use app::{App, AppState};
pub use session::{SessionState, TestSession};
pub use storage::ResultStore;
pub use test_type::TestType;
