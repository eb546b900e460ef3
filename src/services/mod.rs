pub mod blueprints;
pub mod cache;
pub mod poller;
pub mod providers;
