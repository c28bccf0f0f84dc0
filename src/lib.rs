//! Isengard keeps running containers on the newest image their tag points at
//!
//! Each cycle lists the running containers, asks each image's registry which
//! manifest the tag now resolves to, and replaces any container whose image
//! moved with an identical container running the new image. The updater's
//! own container can be included, in which case it is replaced last and in
//! an order that keeps this process alive until its replacement runs.

#[macro_use] extern crate lazy_static;
#[macro_use] extern crate serde;

pub mod config;
pub mod container;
pub mod engine;
pub mod errors;
pub mod identity;
pub mod image;
pub mod registry;
pub mod updater;

pub use crate::{
    config::Config,
    engine::{DockerEngine, Engine},
    identity::SelfId,
    image::ImageReference,
    registry::RegistryClient,
    updater::{CycleReport, UpdateOutcome, Updater},
};
