//! Scalar foundation for the hmma matrix library.
//!
//! Every matrix, decomposition and expression in `hmma-la` is generic over
//! [`Scalar`], so the same code runs for f32 and f64.
//!
//! # Design principles
//! - `no_std` compatible: enable `std` for inherent float methods or `libm`
//!   for bare-metal targets
//! - No external linear-algebra dependency

#![no_std]

#[cfg(feature = "std")]
extern crate std;

mod scalar;

pub use scalar::Scalar;
