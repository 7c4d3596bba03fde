pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod legacy;
pub mod navigator;
pub mod output;
pub mod sample_search;
pub mod sample_set;
pub mod selector;
pub mod set_interface;
pub mod workspace;
