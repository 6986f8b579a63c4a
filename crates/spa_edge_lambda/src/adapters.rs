pub mod application;
pub mod invalidation;
pub mod object_store;
pub mod warm_cache;
