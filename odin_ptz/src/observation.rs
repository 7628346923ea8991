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

use std::fmt;
use chrono::{DateTime,Utc};
use serde::Serialize;
use crate::{config::CameraPosition, geo::{self,GeoPos}, registry::AircraftInfo, sbs::SbsReport};

/// the tracker model for a single aircraft, created from the first report of an icao24 and updated by
/// all subsequent ones.
/// Derived geometry (distance, bearing, elevation) is recomputed on each update and exists if and only if
/// lat, lon and altitude are known. The serialized form is the JSON that gets published for tracked aircraft
#[derive(Debug,Clone,Serialize)]
#[serde(rename_all="camelCase")]
pub struct Observation {
    icao24: String,
    callsign: Option<String>,

    // static metadata from the aircraft registry, set on creation
    registration: Option<String>,
    #[serde(rename="type")]
    aircraft_type: Option<String>,
    manufacturer: Option<String>,
    model: Option<String>,
    operator: Option<String>,

    #[serde(rename="lat")]
    latitude: Option<f64>,
    #[serde(rename="lon")]
    longitude: Option<f64>,
    lat_lon_time: Option<DateTime<Utc>>,
    altitude: Option<f64>, // meters
    altitude_time: Option<DateTime<Utc>>,

    track: Option<f64>, // degrees
    ground_speed: Option<f64>, // m/s
    vertical_rate: f64, // m/s
    on_ground: bool,

    #[serde(rename="loggedDate")]
    logged_at: DateTime<Utc>,

    distance: Option<f64>, // 3D slant range from camera in meters
    bearing: Option<f64>,
    elevation: Option<f64>,

    #[serde(skip)]
    changed: bool,
}

#[inline]
fn set<T: PartialEq> (field: &mut T, v: T)->bool {
    if *field != v { *field = v; true } else { false }
}

impl Observation {
    pub fn new (report: &SbsReport, info: Option<AircraftInfo>, camera: &CameraPosition, now: DateTime<Utc>)->Self {
        let info = info.unwrap_or_default();
        let mut obs = Observation {
            icao24: report.icao24.to_lowercase(),
            callsign: None,
            aircraft_type: info.aircraft_type(),
            registration: info.registration,
            manufacturer: info.manufacturer,
            model: info.model,
            operator: info.operator,
            latitude: None,
            longitude: None,
            lat_lon_time: None,
            altitude: None,
            altitude_time: None,
            track: None,
            ground_speed: None,
            vertical_rate: 0.0,
            on_ground: false,
            logged_at: now,
            distance: None,
            bearing: None,
            elevation: None,
            changed: true
        };
        obs.update( report, camera, now);
        obs.changed = true;
        obs
    }

    /// apply all fields that are set in `report` and recompute derived geometry.
    /// Returns true if any field value changed
    pub fn update (&mut self, report: &SbsReport, camera: &CameraPosition, now: DateTime<Utc>)->bool {
        let mut changed = false;
        self.logged_at = now;

        if let Some(cs) = &report.callsign {
            let cs = cs.trim_end();
            if !cs.is_empty() { changed |= set( &mut self.callsign, Some(cs.to_string())); }
        }
        if let Some(gnd) = report.on_ground { changed |= set( &mut self.on_ground, gnd); }
        if let Some(alt) = report.altitude {
            if !self.on_ground { // ground altitude comes from the camera
                changed |= set( &mut self.altitude, Some(alt));
                self.altitude_time = Some(report.generated);
            }
        }
        if let Some(gs) = report.ground_speed { changed |= set( &mut self.ground_speed, Some(gs)); }
        if let Some(trk) = report.track { changed |= set( &mut self.track, Some(trk)); }
        if let Some(lat) = report.latitude {
            changed |= set( &mut self.latitude, Some(lat));
            self.lat_lon_time = Some(report.generated);
        }
        if let Some(lon) = report.longitude {
            changed |= set( &mut self.longitude, Some(lon));
            self.lat_lon_time = Some(report.generated);
        }
        if let Some(vr) = report.vertical_rate { changed |= set( &mut self.vertical_rate, vr); }

        changed |= self.update_geometry( camera);
        self.changed = changed;
        changed
    }

    /// recompute derived values from the current camera position. Aircraft on the ground are reported
    /// at camera altitude. Returns true if any value changed
    pub fn update_geometry (&mut self, camera: &CameraPosition)->bool {
        let mut changed = false;

        if self.on_ground {
            changed |= set( &mut self.altitude, Some(camera.altitude));
        }

        let (distance,bearing,elevation) = if let (Some(lat),Some(lon),Some(alt)) = (self.latitude,self.longitude,self.altitude) {
            let d2 = geo::distance_2d( camera.latitude, camera.longitude, lat, lon);
            ( Some( geo::distance_3d( camera.latitude, camera.longitude, camera.altitude, lat, lon, alt)),
              Some( geo::bearing( camera.latitude, camera.longitude, lat, lon)),
              Some( geo::elevation_angle( d2, camera.altitude, alt)) )
        } else {
            (None,None,None)
        };

        changed |= set( &mut self.distance, distance);
        changed |= set( &mut self.bearing, bearing);
        changed |= set( &mut self.elevation, elevation);
        changed
    }

    pub fn icao24 (&self)->&str { self.icao24.as_str() }
    pub fn callsign (&self)->Option<&str> { self.callsign.as_deref() }
    pub fn registration (&self)->Option<&str> { self.registration.as_deref() }
    pub fn aircraft_type (&self)->Option<&str> { self.aircraft_type.as_deref() }
    pub fn manufacturer (&self)->Option<&str> { self.manufacturer.as_deref() }
    pub fn model (&self)->Option<&str> { self.model.as_deref() }
    pub fn operator (&self)->Option<&str> { self.operator.as_deref() }

    pub fn latitude (&self)->Option<f64> { self.latitude }
    pub fn longitude (&self)->Option<f64> { self.longitude }
    pub fn altitude (&self)->Option<f64> { self.altitude }
    pub fn lat_lon_time (&self)->Option<DateTime<Utc>> { self.lat_lon_time }
    pub fn altitude_time (&self)->Option<DateTime<Utc>> { self.altitude_time }
    pub fn track (&self)->Option<f64> { self.track }
    pub fn ground_speed (&self)->Option<f64> { self.ground_speed }
    pub fn vertical_rate (&self)->f64 { self.vertical_rate }
    pub fn on_ground (&self)->bool { self.on_ground }
    pub fn logged_at (&self)->DateTime<Utc> { self.logged_at }

    pub fn distance (&self)->Option<f64> { self.distance }
    pub fn bearing (&self)->Option<f64> { self.bearing }
    pub fn elevation (&self)->Option<f64> { self.elevation }

    pub fn is_changed (&self)->bool { self.changed }

    pub fn position (&self)->Option<GeoPos> {
        match (self.latitude, self.longitude, self.altitude) {
            (Some(lat),Some(lon),Some(alt)) => Some( GeoPos::new( lat, lon, alt)),
            _ => None
        }
    }

    /// do we have enough data to show this aircraft to external consumers
    pub fn is_presentable (&self)->bool {
        self.altitude.is_some() && self.ground_speed.is_some() && self.track.is_some() && self.latitude.is_some() && self.longitude.is_some()
    }

    pub fn is_stale (&self, now: DateTime<Utc>, max_age: chrono::Duration)->bool {
        self.logged_at + max_age < now
    }

    /// where we expect the aircraft to be `lead_secs` after `now`, extrapolated from the last lat/lon and
    /// altitude updates. Returns `None` if the observation is not presentable
    pub fn predict (&self, camera: &CameraPosition, now: DateTime<Utc>, lead_secs: f64)->Option<Prediction> {
        let (lat, lon, alt) = (self.latitude?, self.longitude?, self.altitude?);
        let (track, ground_speed) = (self.track?, self.ground_speed?);

        let dt_lat_lon = elapsed_secs( self.lat_lon_time, now) + lead_secs;
        let dt_alt = elapsed_secs( self.altitude_time, now) + lead_secs;
        let (lat, lon, alt) = geo::project_forward( lat, lon, alt, track, ground_speed, self.vertical_rate, dt_lat_lon, dt_alt);

        let d2 = geo::distance_2d( camera.latitude, camera.longitude, lat, lon);
        Some( Prediction {
            lat, lon, altitude: alt,
            distance: geo::distance_3d( camera.latitude, camera.longitude, camera.altitude, lat, lon, alt),
            bearing: geo::bearing( camera.latitude, camera.longitude, lat, lon),
            elevation: geo::elevation_angle( d2, camera.altitude, alt),
        })
    }
}

fn elapsed_secs (t: Option<DateTime<Utc>>, now: DateTime<Utc>)->f64 {
    match t {
        Some(t) => ((now - t).num_milliseconds() as f64 / 1000.0).max(0.0), // clock skew is not a reason to go backwards
        None => 0.0
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!( f, "Observation( icao24: {}", self.icao24)?;
        if let Some(cs) = &self.callsign { write!( f, ", cs: \"{cs}\"")?; }
        if let Some(p) = self.position() { write!( f, ", pos: {p}")?; }
        if let Some(trk) = self.track { write!( f, ", trk: {trk:.0}")?; }
        if let Some(gs) = self.ground_speed { write!( f, ", spd: {gs:.1}")?; }
        if let Some(d) = self.distance { write!( f, ", dist: {d:.0}")?; }
        if let Some(e) = self.elevation { write!( f, ", elev: {e:.1}")?; }
        if self.on_ground { write!( f, ", on ground")?; }
        write!( f, ")")
    }
}

/// projected position and camera geometry of an observation
#[derive(Debug,Clone,Copy,PartialEq,Serialize)]
pub struct Prediction {
    pub lat: f64,
    pub lon: f64,
    pub altitude: f64,
    pub distance: f64,
    pub bearing: f64,
    pub elevation: f64,
}
