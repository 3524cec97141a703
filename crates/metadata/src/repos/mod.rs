//! Repository traits for account metadata operations.

pub mod accounts;
pub mod insts;
pub mod open_insts;

pub use accounts::AccountRepo;
pub use insts::InstRepo;
pub use open_insts::OpenInstRepo;

/// Upper bound on rows returned by the listing operations.
pub const LIST_LIMIT: u32 = 1000;
