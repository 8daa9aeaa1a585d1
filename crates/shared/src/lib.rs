//! Wire-level types shared by the host and the embedded component.

pub mod domain;
pub mod error;
pub mod protocol;
