//! Installable cluster add-ons for tackle
//!
//! Each add-on is a [`ManifestComponent`] exposing the [`Component`] contract:
//! install, uninstall and existence checks over embedded manifests.

#![deny(missing_docs)]

pub mod catalog;
pub mod cert_manager;
pub mod component;
pub mod flux;
pub mod helm_controller;
pub mod webhook;

pub use component::{
    Component, ComponentSettings, ComponentSpec, ExistenceProbe, ManifestComponent,
};
pub use tackle_common::{Error, Result};
