//! HUD agent: an assistive heads-up display session and its HTTP relay.
//!
//! The session side ([`session::Session`]) drives voice search, gesture
//! polling and scene description against shared camera/microphone handles
//! and speaks every status change.  The relay side ([`server`]) answers price
//! questions from the FTSO oracle (with a CoinGecko fallback) and forwards
//! everything else to the search and gesture services.

pub mod announce;
pub mod audio;
pub mod client;
pub mod config;
pub mod device;
pub mod frame;
pub mod recognize;
pub mod relay;
pub mod server;
pub mod session;
