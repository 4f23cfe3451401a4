pub mod identity;
pub mod merge;
pub mod session_store;
pub mod staging_service;
pub mod storage;
