pub mod alt_text;
pub mod audit;
pub mod content_cache;
pub mod poller;
pub mod scanner;
pub mod signing;
