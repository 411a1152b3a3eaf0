pub mod api;
pub mod classroom;
pub mod config;
pub mod directory;
pub mod error;

pub use classroom::ClassroomHandle;
pub use config::Config;
pub use error::{ClassroomError, Result};
