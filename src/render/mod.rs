pub mod cancel;
pub mod composite;
pub mod compositor;
pub mod frame;
pub mod geometry;
pub mod session;
