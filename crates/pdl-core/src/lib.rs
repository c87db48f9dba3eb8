pub mod config;
pub mod control;
pub mod downloader;
pub mod fetch_head;
pub mod logging;
pub mod scheduler;
pub mod segmenter;
pub mod storage;
pub mod transport;
pub mod url_model;
