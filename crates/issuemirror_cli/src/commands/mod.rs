pub(crate) mod categories;
pub(crate) mod migrate;

#[cfg(feature = "github")]
pub(crate) mod shared;

#[cfg(feature = "github")]
pub(crate) mod sync;

#[cfg(feature = "github")]
pub(crate) mod mirror;
