//! One module per subcommand.

pub mod aicheck;
pub mod download;
pub mod init;
pub mod search;
