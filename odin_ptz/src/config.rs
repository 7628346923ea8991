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

use std::{fmt, net::SocketAddr, path::PathBuf, time::Duration};
use chrono_tz::Tz;
use serde::{Serialize,Deserialize,Deserializer,de::Error as DeError};
use serde_json::Value;
use crate::geo::GeoPos;

/// process configuration of a ptz tracker, normally loaded from a RON file (see `configs/ptz_tracker.ron`)
#[derive(Deserialize,Serialize,Debug,Clone)]
pub struct PtzConfig {
    pub name: String, // used for heartbeat and registration messages

    pub feed_host: String,
    #[serde(default="default_feed_port")]
    pub feed_port: u16,
    #[serde(default="default_read_timeout")]
    pub read_timeout: Duration,
    #[serde(default="default_reconnect_delay")]
    pub reconnect_delay: Duration,
    pub timezone: Tz, // timezone of the SBS source (dump1090 reports local time)

    #[serde(default="default_interval")]
    pub cleanup_interval: Duration, // also the max age of observations
    #[serde(default="default_interval")]
    pub heartbeat_interval: Duration,

    #[serde(default)]
    pub camera: Option<CameraPosition>, // if not set it has to be provided on the command line
    #[serde(default)]
    pub tracking: TrackingParams,

    #[serde(default)]
    pub registry_path: Option<PathBuf>,

    #[serde(default)]
    pub broker_url: Option<String>,
    #[serde(default)]
    pub topics: PtzTopics,

    #[serde(default)]
    pub status_addr: Option<SocketAddr>,
}

fn default_feed_port()->u16 { 30003 }
fn default_read_timeout()->Duration { Duration::from_secs(60) }
fn default_reconnect_delay()->Duration { Duration::from_secs(5) }
fn default_interval()->Duration { Duration::from_secs(10) }

impl PtzConfig {
    /// a config with default values for the given feed and camera
    pub fn new (feed_host: &str, camera: Option<CameraPosition>)->Self {
        PtzConfig {
            name: "ptz-tracker".to_string(),
            feed_host: feed_host.to_string(),
            feed_port: default_feed_port(),
            read_timeout: default_read_timeout(),
            reconnect_delay: default_reconnect_delay(),
            timezone: Tz::UTC,
            cleanup_interval: default_interval(),
            heartbeat_interval: default_interval(),
            camera,
            tracking: TrackingParams::default(),
            registry_path: None,
            broker_url: None,
            topics: PtzTopics::default(),
            status_addr: None,
        }
    }
}

#[derive(Deserialize,Serialize,Debug,Clone)]
#[serde(default)]
pub struct PtzTopics {
    pub flight: String,
    pub heartbeat: String,
    pub registration: String,
    pub camera: String,
    pub config: String,
}

impl Default for PtzTopics {
    fn default()->Self {
        PtzTopics {
            flight: "skyscan/flight/json".to_string(),
            heartbeat: "skyscan/heartbeat".to_string(),
            registration: "skyscan/registration".to_string(),
            camera: "skyscan/egi".to_string(),
            config: "skyscan/config/json".to_string(),
        }
    }
}

/// camera location as reported by camera telemetry.
/// The field aliases accept both the long names and the short "lat"/"long"/"alt" names used by EGI units
#[derive(Deserialize,Serialize,Debug,Clone,Copy,PartialEq)]
pub struct CameraPosition {
    #[serde(alias="lat", deserialize_with="de_lenient_f64")]
    pub latitude: f64,
    #[serde(alias="lon", alias="long", deserialize_with="de_lenient_f64")]
    pub longitude: f64,
    #[serde(alias="alt", deserialize_with="de_lenient_f64")]
    pub altitude: f64, // meters
}

impl CameraPosition {
    pub fn new (latitude: f64, longitude: f64, altitude: f64)->Self { CameraPosition{ latitude, longitude, altitude } }
    pub fn as_geo_pos (&self)->GeoPos { GeoPos::new( self.latitude, self.longitude, self.altitude) }
}

impl fmt::Display for CameraPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!( f, "{}", self.as_geo_pos())
    }
}

/// the thresholds that decide if an aircraft can be tracked.
/// This is an immutable snapshot - updates create a new instance that replaces the old one as a whole
#[derive(Deserialize,Serialize,Debug,Clone,PartialEq)]
#[serde(default)]
pub struct TrackingParams {
    pub camera_lead: f64, // seconds to project positions ahead
    pub min_elevation: f64, // degrees, always enforced
    pub min_altitude: Option<f64>, // meters
    pub max_altitude: Option<f64>,
    pub min_distance: Option<f64>, // meters
    pub max_distance: Option<f64>,
}

impl Default for TrackingParams {
    fn default()->Self {
        TrackingParams { camera_lead: 0.25, min_elevation: 0.0, min_altitude: None, max_altitude: None, min_distance: None, max_distance: None }
    }
}

impl TrackingParams {
    /// a new snapshot with all values set in `update`
    pub fn with_update (&self, update: &ConfigUpdate)->TrackingParams {
        let mut params = self.clone();
        if let Some(v) = update.camera_lead { params.camera_lead = v }
        if let Some(v) = update.min_elevation { params.min_elevation = v }
        if let Some(v) = update.min_altitude { params.min_altitude = Some(v) }
        if let Some(v) = update.max_altitude { params.max_altitude = Some(v) }
        if let Some(v) = update.min_distance { params.min_distance = Some(v) }
        if let Some(v) = update.max_distance { params.max_distance = Some(v) }
        params
    }
}

/// a configuration delta as received on the config topic. Only present keys are applied.
/// `aircraft_pinned` distinguishes between an absent key (`None`), which leaves the pin alone, and an
/// explicit null or empty string (`Some(None)`), which clears it
#[derive(Deserialize,Debug,Default,Clone,PartialEq)]
#[serde(rename_all="camelCase")]
pub struct ConfigUpdate {
    #[serde(default, deserialize_with="de_opt_lenient_f64")]
    pub camera_lead: Option<f64>,
    #[serde(default, deserialize_with="de_opt_lenient_f64")]
    pub min_elevation: Option<f64>,
    #[serde(default, deserialize_with="de_opt_lenient_f64")]
    pub min_distance: Option<f64>,
    #[serde(default, deserialize_with="de_opt_lenient_f64")]
    pub max_distance: Option<f64>,
    #[serde(default, deserialize_with="de_opt_lenient_f64")]
    pub min_altitude: Option<f64>,
    #[serde(default, deserialize_with="de_opt_lenient_f64")]
    pub max_altitude: Option<f64>,
    #[serde(default, with="::serde_with::rust::double_option")]
    pub aircraft_pinned: Option<Option<String>>,
}

impl ConfigUpdate {
    /// the normalized pin request: `Some(Some(id))` pins, `Some(None)` unpins, `None` leaves the pin alone
    pub fn pin_request (&self)->Option<Option<String>> {
        self.aircraft_pinned.as_ref().map( |pin| {
            pin.as_ref()
               .map( |id| id.trim().to_lowercase())
               .filter( |id| !id.is_empty())
        })
    }
}

// control clients are not consistent about sending numbers or numeric strings
fn lenient_f64<E: DeError> (v: &Value)->Result<f64,E> {
    match v {
        Value::Number(n) => n.as_f64().ok_or_else( || E::custom( format!("not a f64: {n}"))),
        Value::String(s) => s.trim().parse::<f64>().map_err( |_| E::custom( format!("not a number: '{s}'"))),
        other => Err( E::custom( format!("not a number: {other}")))
    }
}

fn de_lenient_f64<'de,D> (deserializer: D)->Result<f64,D::Error> where D: Deserializer<'de> {
    let v = Value::deserialize( deserializer)?;
    lenient_f64( &v)
}

fn de_opt_lenient_f64<'de,D> (deserializer: D)->Result<Option<f64>,D::Error> where D: Deserializer<'de> {
    match Value::deserialize( deserializer)? {
        Value::Null => Ok(None),
        v => lenient_f64( &v).map( Some)
    }
}
