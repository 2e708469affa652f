//! Request-side middleware the plain `tower-http` response layers don't
//! cover: RSA payload decryption and trusted-subnet admission. Gzip
//! (both directions), request tracing, and panic recovery are stock
//! `tower-http` layers wired directly in [`crate::router`].

mod decrypt;
mod trusted_subnet;

pub use decrypt::decrypt_layer;
pub use trusted_subnet::trusted_subnet_layer;
