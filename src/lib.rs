#![forbid(unsafe_code)]

pub mod catalog;
pub mod cli;
pub mod config;
pub mod driver;
pub mod ledger;
pub mod logging;
pub mod normalize;
pub mod run;
pub mod sanitize;
pub mod session;
pub mod store;
pub mod views;
