#[macro_use]
extern crate rocket;

pub mod adapter;
pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod common;
pub mod config;
pub mod monitor;
pub mod utils;
pub mod workflow;
pub mod workspace;
