pub mod action;
pub mod analytics;
pub mod event;
pub mod holding;
pub mod market;
pub mod portfolio;
pub mod price;
pub mod settings;
