pub mod edge;
pub mod entry;
pub mod sync;
