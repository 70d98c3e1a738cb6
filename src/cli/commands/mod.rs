//! One module per subcommand.

pub mod audit_cmd;
pub mod bootstrap;
pub mod create;
pub mod keygen;
pub mod list;
pub mod remove;
pub mod required;
pub mod reveal;
pub mod scan;
pub mod status;
pub mod sync;
pub mod update;
