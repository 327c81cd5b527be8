//! Bearer-token authentication. Identity lives outside this service; tokens
//! are only verified here.

pub mod jwt;

pub use jwt::AuthUser;
