//! Common test utilities and fixtures.

pub mod accounts;
pub mod fixtures;
pub mod mocks;

#[allow(unused_imports)]
pub use accounts::*;
#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use mocks::*;
