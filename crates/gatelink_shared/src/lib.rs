pub mod frame;
pub mod transform;
pub mod viewport;
pub mod volume;
