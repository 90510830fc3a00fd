//! # Price Bot
//!
//! A Telegram bot that publishes car and mobile prices from two sources (an
//! AI provider and uploaded spreadsheets), estimates used-car prices and
//! exposes a small REST API for the admin dashboard.

pub mod ai;
pub mod bot;
pub mod calendar;
pub mod catalog;
pub mod config;
pub mod context;
pub mod dialogue;
pub mod errors;
pub mod estimate;
pub mod localization;
pub mod menu;
pub mod models;
pub mod scheduler;
pub mod server;
pub mod settings;
pub mod spreadsheet;
pub mod store;
