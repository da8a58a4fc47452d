#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod clean;
pub mod config;
pub mod data;
pub mod design;
pub mod estimate;
pub mod evaluate;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod split;
pub mod stats;
pub mod synthetic;
