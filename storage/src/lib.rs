pub mod file_storage;
pub mod integrity;
pub mod storage;
