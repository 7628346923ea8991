/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */
#![allow(unused)]

//! slaving a pan/tilt/zoom camera to aircraft that are observed through an ADS-B SBS feed.
//!
//! The feed is read by [`reader::SbsReader`], decoded by [`sbs::parse_msg`] and applied to the shared
//! [`tracker::Tracker`], which keeps an [`observation::Observation`] per aircraft and selects the single
//! aircraft to point the camera at. The [`publisher::Publisher`] periodically sends the predicted state of
//! that target through a [`pubsub::PubSub`] transport, from which we also receive camera position and
//! tracking parameter updates ([`intake`])

use std::{fs, path::Path};
use serde::de::DeserializeOwned;

pub mod errors;
use errors::Result;

pub mod geo;
pub mod sbs;
pub mod reader;
pub mod registry;
pub mod config;
pub mod observation;
pub mod tracker;
pub mod pubsub;
pub mod ws_pubsub;
pub mod intake;
pub mod publisher;
pub mod status_service;
pub mod service;

pub use config::{PtzConfig, CameraPosition, TrackingParams, ConfigUpdate};
pub use observation::Observation;
pub use tracker::{Tracker, TrackerState};

/// load a RON config file
pub fn load_config<T,P> (path: P)->Result<T> where T: DeserializeOwned, P: AsRef<Path> {
    let src = fs::read_to_string( path)?;
    Ok( ron::from_str( &src)? )
}
