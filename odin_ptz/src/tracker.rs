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

use std::{collections::HashMap, sync::{Arc,Mutex,MutexGuard}, time::Duration};
use chrono::{DateTime,TimeDelta,Utc};
use serde::Serialize;
use tracing::{debug,info,warn};
use crate::{
    config::{CameraPosition, ConfigUpdate, PtzConfig, TrackingParams},
    observation::{Observation, Prediction},
    registry::AircraftRegistry,
    sbs::SbsReport
};

/// tracked distance if there is no target
pub const NO_TARGET_DISTANCE: f64 = 999_999_999.0;

/// the shared tracker state: all live observations, the current target and pin, and the parameters
/// (thresholds and camera position) that determine trackability.
/// All methods assume exclusive access - concurrent use has to go through [`Tracker`]
pub struct TrackerState {
    observations: HashMap<String,Observation>,
    tracked_id: Option<String>,
    tracked_distance: f64,
    pinned_id: Option<String>,
    pin_observed: bool, // has the pinned aircraft been in observations since the pin was set

    params: Arc<TrackingParams>,
    camera: CameraPosition,

    cleanup_interval: TimeDelta,
    next_clean: DateTime<Utc>,

    registry: Arc<dyn AircraftRegistry>,
}

impl TrackerState {
    pub fn new (camera: CameraPosition, params: TrackingParams, cleanup_interval: Duration, registry: Arc<dyn AircraftRegistry>, now: DateTime<Utc>)->Self {
        let cleanup_interval = TimeDelta::from_std( cleanup_interval).unwrap_or( TimeDelta::seconds(10));
        TrackerState {
            observations: HashMap::new(),
            tracked_id: None,
            tracked_distance: NO_TARGET_DISTANCE,
            pinned_id: None,
            pin_observed: false,
            params: Arc::new(params),
            camera,
            cleanup_interval,
            next_clean: now + cleanup_interval,
            registry
        }
    }

    pub fn observations (&self)->&HashMap<String,Observation> { &self.observations }
    pub fn observation (&self, icao24: &str)->Option<&Observation> { self.observations.get( icao24) }
    pub fn tracked_id (&self)->Option<&str> { self.tracked_id.as_deref() }
    pub fn tracked_distance (&self)->f64 { self.tracked_distance }
    pub fn pinned_id (&self)->Option<&str> { self.pinned_id.as_deref() }

    /// a pin is active once its aircraft was observed. Before that it is pending and automatic selection continues
    pub fn is_pin_active (&self)->bool { self.pinned_id.is_some() && self.pin_observed }
    pub fn params (&self)->Arc<TrackingParams> { self.params.clone() }
    pub fn camera (&self)->CameraPosition { self.camera }
    pub fn next_clean (&self)->DateTime<Utc> { self.next_clean }

    pub fn target (&self)->Option<&Observation> {
        self.tracked_id.as_ref().and_then( |id| self.observations.get(id))
    }

    //--- ingest

    /// add or update the observation for the aircraft of `report` and re-evaluate the target selection
    pub fn on_message (&mut self, report: &SbsReport, now: DateTime<Utc>) {
        let icao24 = report.icao24.to_lowercase();

        if let Some(obs) = self.observations.get_mut( &icao24) {
            obs.update( report, &self.camera, now);
        } else {
            let info = self.registry.lookup( &icao24);
            match &info {
                Some(ai) => info!("{}\t[ADDED]\t\t{} {} {} {}", icao24,
                                  opt_str(&ai.registration), opt_str(&ai.manufacturer), opt_str(&ai.model), opt_str(&ai.operator)),
                None => warn!("{}\tnot found in aircraft registry", icao24)
            }
            let obs = Observation::new( report, info, &self.camera, now);
            self.observations.insert( icao24.clone(), obs);
        }

        self.select( &icao24);
    }

    fn select (&mut self, icao24: &str) {
        // a pin for an aircraft we have not seen yet stays pending, one that disappeared is dropped
        let pin_present = match &self.pinned_id {
            Some(pin) if self.observations.contains_key( pin) => {
                self.pin_observed = true;
                true
            }
            Some(pin) if self.pin_observed => {
                debug!("{}\tpinned aircraft no longer observed, reverting to automatic selection", pin);
                self.clear_pin();
                false
            }
            _ => false
        };

        if pin_present {
            let is_new = self.tracked_id != self.pinned_id;
            self.tracked_id = self.pinned_id.clone();
            self.update_tracking_distance();
            if is_new {
                info!("{}\t[PINNED AIRCRAFT TRACKING]\tDist: {:.0}\tElev: {}", self.tracked_id.as_deref().unwrap_or_default(),
                      self.tracked_distance, opt_f64( self.target().and_then(|o| o.elevation())));
            }
            return
        }

        let Some(obs) = self.observations.get( icao24) else { return };

        if self.is_trackable( obs) {
            let distance = obs.distance().unwrap_or( NO_TARGET_DISTANCE);
            let elevation = obs.elevation().unwrap_or_default();

            match &self.tracked_id {
                None => {
                    self.tracked_id = Some( icao24.to_string());
                    self.tracked_distance = distance;
                    info!("{}\t[TRACKING]\tDist: {:.0}\tElev: {:.1}", icao24, distance, elevation);
                }
                Some(id) if id == icao24 => {
                    self.tracked_distance = distance;
                }
                Some(_) => {
                    if distance < self.tracked_distance {
                        self.tracked_id = Some( icao24.to_string());
                        self.tracked_distance = distance;
                        info!("{}\t[TRACKING]\tDist: {:.0}\tElev: {:.1}\t - switched to closer aircraft", icao24, distance, elevation);
                    }
                }
            }

        } else if self.tracked_id.as_deref() == Some(icao24) {
            info!("{}\t[NOT TRACKING]\t - observation is no longer trackable ({})", icao24, self.why_trackable( obs));
            self.clear_target();
        }
    }

    fn update_tracking_distance (&mut self) {
        self.tracked_distance = self.target().and_then( |obs| obs.distance()).unwrap_or( NO_TARGET_DISTANCE);
    }

    fn clear_pin (&mut self) {
        self.pinned_id = None;
        self.pin_observed = false;
    }

    fn clear_target (&mut self) {
        self.tracked_id = None;
        self.tracked_distance = NO_TARGET_DISTANCE;
    }

    //--- trackability

    /// does this observation meet all requirements to be tracked
    pub fn is_trackable (&self, obs: &Observation)->bool {
        is_trackable( obs, &self.params)
    }

    /// human readable per-criterion explanation of trackability
    pub fn why_trackable (&self, obs: &Observation)->String {
        why_trackable( obs, &self.params)
    }

    //--- sweep

    /// remove stale observations and re-select the target if required. This is a no-op until the
    /// next cleanup is due. Returns the number of removed observations
    pub fn cleanup (&mut self, now: DateTime<Utc>)->usize {
        if now < self.next_clean { return 0 }

        let stale: Vec<String> = self.observations.iter()
            .filter( |(_,obs)| obs.is_stale( now, self.cleanup_interval))
            .map( |(id,_)| id.clone())
            .collect();

        for id in &stale {
            info!("{}\t[REMOVED]", id);
            if self.pinned_id.as_ref() == Some(id) {
                info!("{}\t[REMOVED PINNED AIRCRAFT - REVERTING TO NORMAL TRACKING]", id);
                self.clear_pin();
            }
            if self.tracked_id.as_ref() == Some(id) {
                self.clear_target();
            }
            self.observations.remove( id);
        }

        if !self.is_pin_active() {
            if let Some(obs) = self.target() {
                if !self.is_trackable( obs) {
                    info!("{}\t[NOT TRACKING]\t - observation is no longer trackable ({})", obs.icao24(), self.why_trackable( obs));
                    self.clear_target();
                }
            } else if self.tracked_id.is_some() {
                self.clear_target();
            }
        }

        if self.tracked_id.is_none() {
            self.select_nearest();
        }

        self.next_clean = now + self.cleanup_interval;
        stale.len()
    }

    /// make the closest trackable observation the target (first one found wins on ties)
    pub fn select_nearest (&mut self) {
        self.clear_target();

        let mut nearest: Option<(&str,f64)> = None;
        for (id,obs) in &self.observations {
            if !self.is_trackable( obs) { continue }
            let distance = obs.distance().unwrap_or( NO_TARGET_DISTANCE);
            if nearest.map_or( true, |(_,d)| distance < d) {
                nearest = Some( (id.as_str(), distance));
            }
        }

        if let Some((id,distance)) = nearest {
            let id = id.to_string();
            info!("{}\t[TRACKING]\tDist: {:.0}\t - selected nearest observation", id, distance);
            self.tracked_id = Some(id);
            self.tracked_distance = distance;
        }
    }

    //--- external updates

    /// apply a configuration delta. The tracking parameters are replaced as a whole
    pub fn apply_config (&mut self, update: &ConfigUpdate) {
        let params = self.params.with_update( update);
        if params != *self.params {
            info!("setting tracking parameters to {:?}", params);
            self.params = Arc::new(params);
        }

        match update.pin_request() {
            Some(Some(id)) => {
                info!("pinning aircraft to: {}", id);
                self.pin_observed = self.observations.contains_key( &id);
                self.pinned_id = Some(id);
            }
            Some(None) => {
                if let Some(id) = &self.pinned_id { info!("unpinning aircraft {}", id); }
                self.clear_pin();
            }
            None => {}
        }
    }

    /// new camera location, which changes the derived geometry of all observations
    pub fn set_camera (&mut self, camera: CameraPosition) {
        if camera != self.camera {
            debug!("camera position set to {}", camera);
            self.camera = camera;
            for obs in self.observations.values_mut() {
                obs.update_geometry( &camera);
            }
            if self.tracked_id.is_some() { self.update_tracking_distance(); }
        }
    }

    //--- queries

    /// the current target with its predicted position
    pub fn target_state (&self, now: DateTime<Utc>)->Option<TargetState> {
        self.target().map( |obs| {
            TargetState {
                observation: obs.clone(),
                time: now.timestamp_millis() as f64 / 1000.0,
                predicted: obs.predict( &self.camera, now, self.params.camera_lead)
            }
        })
    }

    /// a read-only view of the tracker for status displays
    pub fn snapshot (&self)->StatusSnapshot {
        let mut observations: Vec<Observation> = self.observations.values().filter( |obs| obs.is_presentable()).cloned().collect();
        observations.sort_by( |a,b| {
            a.distance().unwrap_or( f64::MAX).total_cmp( &b.distance().unwrap_or( f64::MAX))
        });

        StatusSnapshot {
            tracking: self.tracked_id.clone(),
            pinned: self.pinned_id.clone(),
            observations,
            camera: self.camera,
            config: (*self.params).clone()
        }
    }
}

pub fn is_trackable (obs: &Observation, params: &TrackingParams)->bool {
    let Some(altitude) = obs.altitude() else { return false };
    if obs.ground_speed().is_none() || obs.track().is_none() || obs.latitude().is_none() || obs.longitude().is_none() {
        return false
    }
    if obs.on_ground() { return false }

    if let Some(max_alt) = params.max_altitude { if altitude > max_alt { return false } }
    if let Some(min_alt) = params.min_altitude { if altitude < min_alt { return false } }

    let (Some(distance), Some(elevation)) = (obs.distance(), obs.elevation()) else { return false };

    if let Some(min_dist) = params.min_distance { if distance < min_dist { return false } }
    if let Some(max_dist) = params.max_distance { if distance > max_dist { return false } }

    elevation >= params.min_elevation
}

pub fn why_trackable (obs: &Observation, params: &TrackingParams)->String {
    fn check (ok: bool)->&'static str { if ok { "ok" } else { "FAIL" } }

    let has_loc = obs.altitude().is_some() && obs.ground_speed().is_some() && obs.track().is_some()
                  && obs.latitude().is_some() && obs.longitude().is_some();
    let alt = obs.altitude().unwrap_or_default();
    let max_alt = params.max_altitude.map_or( true, |max| alt <= max);
    let min_alt = params.min_altitude.map_or( true, |min| alt >= min);

    let mut reason = format!("loc: {}, gnd: {}, max alt: {}, min alt: {}", check(has_loc), check(!obs.on_ground()), check(max_alt), check(min_alt));

    if let (Some(dist),Some(elev)) = (obs.distance(),obs.elevation()) {
        let min_dist = params.min_distance.map_or( true, |min| dist >= min);
        let max_dist = params.max_distance.map_or( true, |max| dist <= max);
        reason.push_str( &format!(", min dist: {}, max dist: {}, min elev: {}", check(min_dist), check(max_dist), check(elev >= params.min_elevation)));
    } else {
        reason.push_str( ", geometry: FAIL");
    }
    reason
}

fn opt_str (s: &Option<String>)->&str { s.as_deref().unwrap_or("-") }

fn opt_f64 (v: Option<f64>)->String { v.map_or( "-".to_string(), |v| format!("{v:.1}")) }

/// published state of the tracked aircraft
#[derive(Debug,Clone,Serialize)]
pub struct TargetState {
    #[serde(flatten)]
    pub observation: Observation,
    pub time: f64, // epoch seconds
    pub predicted: Option<Prediction>,
}

/// read-only tracker view
#[derive(Debug,Clone,Serialize)]
pub struct StatusSnapshot {
    pub tracking: Option<String>,
    pub pinned: Option<String>,
    pub observations: Vec<Observation>, // presentable observations, closest first
    pub camera: CameraPosition,
    pub config: TrackingParams,
}

/// cloneable handle for the shared tracker state. There is exactly one lock around the whole state and
/// every access (ingest, sweep, publishing and config updates) goes through it
#[derive(Clone)]
pub struct Tracker {
    state: Arc<Mutex<TrackerState>>
}

impl Tracker {
    pub fn new (state: TrackerState)->Self {
        Tracker { state: Arc::new( Mutex::new( state)) }
    }

    pub fn from_config (config: &PtzConfig, camera: CameraPosition, registry: Arc<dyn AircraftRegistry>)->Self {
        Tracker::new( TrackerState::new( camera, config.tracking.clone(), config.cleanup_interval, registry, Utc::now()))
    }

    // a panic while holding the lock leaves a consistent state since no mutation spans an await
    fn lock (&self)->MutexGuard<'_,TrackerState> {
        self.state.lock().unwrap_or_else( |poisoned| poisoned.into_inner())
    }

    /// execute `f` while holding the state lock
    pub fn with_state<R> (&self, f: impl FnOnce(&mut TrackerState)->R)->R {
        let mut state = self.lock();
        f( &mut state)
    }

    pub fn on_message (&self, report: &SbsReport, now: DateTime<Utc>) { self.lock().on_message( report, now) }

    pub fn cleanup (&self, now: DateTime<Utc>)->usize { self.lock().cleanup( now) }

    pub fn apply_config (&self, update: &ConfigUpdate) { self.lock().apply_config( update) }

    pub fn set_camera (&self, camera: CameraPosition) { self.lock().set_camera( camera) }

    pub fn target_state (&self, now: DateTime<Utc>)->Option<TargetState> { self.lock().target_state( now) }

    pub fn tracked_id (&self)->Option<String> { self.lock().tracked_id().map( |id| id.to_string()) }

    pub fn tracked_distance (&self)->f64 { self.lock().tracked_distance() }

    pub fn snapshot (&self)->StatusSnapshot { self.lock().snapshot() }
}
