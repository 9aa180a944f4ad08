pub mod groups;
pub mod handler;

pub use groups::Groups;
pub use handler::{ws_index, RenjuWebSocket};
