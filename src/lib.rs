//! Renju over WebSockets: two players race to five in a row on an unbounded
//! board while anyone else may watch.

pub mod cache;
pub mod config;
pub mod error;
pub mod game;
pub mod models;
pub mod routes;
pub mod store;
pub mod websocket;
