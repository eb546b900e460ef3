pub mod blueprints;
pub mod health;
pub mod metrics;
