//! Caching layers: the JWKS body cache (with single-flight fetch
//! coordination), its ALB PEM-backed variant, and the derived
//! key-object cache.

mod alb;
mod jwks;
mod key_object;

pub use alb::AlbJwksCache;
pub use jwks::JwksCache;
pub use key_object::{KeyObjectCache, DEFAULT_CAPACITY};
