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

//! spherical earth geometry for camera-to-aircraft computations.
//! All angles are in degrees and all lengths in meters.
//! Surface distances, bearings and destinations use the haversine metric space of the `geo` crate.

use ::geo::{Bearing, Destination, Distance, Haversine, Point};
use serde::{Serialize,Deserialize};
use std::fmt;

/// mean earth radius in meters (the radius used by [`Haversine`])
pub const EARTH_RADIUS: f64 = 6_371_008.8;

/// a geodetic position in degrees and (altitude) meters
#[derive(Debug,Clone,Copy,PartialEq,Serialize,Deserialize)]
pub struct GeoPos {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

impl GeoPos {
    pub fn new (lat: f64, lon: f64, alt: f64)->Self { GeoPos{ lat, lon, alt } }

    pub fn distance_2d_to (&self, other: &GeoPos)->f64 { distance_2d( self.lat, self.lon, other.lat, other.lon) }
    pub fn distance_3d_to (&self, other: &GeoPos)->f64 { distance_3d( self.lat, self.lon, self.alt, other.lat, other.lon, other.alt) }
    pub fn bearing_to (&self, other: &GeoPos)->f64 { bearing( self.lat, self.lon, other.lat, other.lon) }
}

impl fmt::Display for GeoPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!( f, "[{:.5},{:.5},{:.0}m]", self.lat, self.lon, self.alt)
    }
}

#[inline] fn point (lat: f64, lon: f64)->Point { Point::new( lon, lat) }

/// great circle (haversine) surface distance
pub fn distance_2d (lat1: f64, lon1: f64, lat2: f64, lon2: f64)->f64 {
    Haversine.distance( point( lat1, lon1), point( lat2, lon2))
}

/// slant range combining surface distance and altitude difference
pub fn distance_3d (lat1: f64, lon1: f64, alt1: f64, lat2: f64, lon2: f64, alt2: f64)->f64 {
    distance_2d( lat1, lon1, lat2, lon2).hypot( alt2 - alt1)
}

/// initial great circle bearing from (lat1,lon1) to (lat2,lon2), normalized to [0,360)
pub fn bearing (lat1: f64, lon1: f64, lat2: f64, lon2: f64)->f64 {
    normalize_360( Haversine.bearing( point( lat1, lon1), point( lat2, lon2)))
}

/// angle above the horizon of a target at `surface_distance`
pub fn elevation_angle (surface_distance: f64, cam_alt: f64, target_alt: f64)->f64 {
    (target_alt - cam_alt).atan2( surface_distance).to_degrees()
}

/// dead-reckoning of a position over `dt` seconds assuming constant track, ground speed (m/s) and
/// vertical rate (m/s). Horizontal and vertical extrapolation intervals can differ since lat/lon and
/// altitude are reported independently.
pub fn project_forward (lat: f64, lon: f64, alt: f64, track: f64, ground_speed: f64, vertical_rate: f64, dt_lat_lon: f64, dt_alt: f64)->(f64,f64,f64) {
    let p = Haversine.destination( point( lat, lon), normalize_360(track), ground_speed * dt_lat_lon);
    let alt2 = alt + vertical_rate * dt_alt;
    ( p.y(), normalize_180( p.x()), alt2 )
}

/// normalize angle in degrees to [0,360)
pub fn normalize_360 (d: f64)->f64 {
    let d = d.rem_euclid(360.0);
    if d >= 360.0 { 0.0 } else { d }
}

/// normalize longitude in degrees to [-180,180)
pub fn normalize_180 (d: f64)->f64 {
    if d >= -180.0 && d < 180.0 { d } else { normalize_360( d + 180.0) - 180.0 }
}
