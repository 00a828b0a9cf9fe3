pub(crate) mod bytes;
pub(crate) mod core;
pub(crate) mod error;
pub(crate) mod hash;
pub(crate) mod math;
