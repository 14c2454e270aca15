//! Hand landmarks in, mouse actions out.
//!
//! The core is [`session::Session`]: per frame it smooths the palm position
//! into a screen point ([`motion`]), classifies the pinch ([`geometry`]) and
//! advances the click/drag machine ([`gestures`]). Everything else feeds it
//! frames or carries its actions to the OS.

pub mod actions;
pub mod config;
pub mod feedback;
pub mod geometry;
pub mod gestures;
pub mod ipc;
pub mod landmarks;
pub mod logging;
pub mod motion;
pub mod replay;
pub mod session;
