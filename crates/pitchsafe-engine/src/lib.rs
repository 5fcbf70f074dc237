// Library root: feature-row synthesis for recorded outings and the injury
// risk prediction trigger that follows it.

pub mod config;
pub mod engine;
pub mod outing;
pub mod player;
pub mod predict;
pub mod risk;
pub mod roster;
pub mod service;
pub mod synth;
pub mod table;
