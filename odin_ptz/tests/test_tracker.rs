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

use std::{collections::HashMap, sync::Arc, time::Duration as StdDuration, thread};
use chrono::{DateTime, Duration, TimeZone, Utc};
use odin_ptz::{
    config::{CameraPosition, ConfigUpdate, TrackingParams},
    geo::EARTH_RADIUS,
    registry::{AircraftInfo, NoRegistry},
    sbs::SbsReport,
    tracker::{Tracker, TrackerState, NO_TARGET_DISTANCE, is_trackable}
};

const M_PER_DEG: f64 = EARTH_RADIUS * std::f64::consts::PI / 180.0;

fn t0 ()->DateTime<Utc> { Utc.with_ymd_and_hms( 2025, 6, 1, 12, 0, 0).unwrap() }
fn at (secs: i64)->DateTime<Utc> { t0() + Duration::seconds(secs) }

fn camera ()->CameraPosition { CameraPosition::new( 37.0, -122.0, 0.0) }

fn tracker_state (params: TrackingParams)->TrackerState {
    TrackerState::new( camera(), params, StdDuration::from_secs(10), Arc::new(NoRegistry), t0())
}

/// a complete report for an aircraft `north` meters north of the camera
fn report (icao24: &str, north: f64, alt: f64, t: DateTime<Utc>)->SbsReport {
    let mut r = SbsReport::empty( icao24, t);
    r.latitude = Some( 37.0 + north / M_PER_DEG);
    r.longitude = Some( -122.0);
    r.altitude = Some( alt);
    r.ground_speed = Some( 100.0);
    r.track = Some( 90.0);
    r.vertical_rate = Some( 0.0);
    r.on_ground = Some( false);
    r
}

fn config (json: &str)->ConfigUpdate { serde_json::from_str( json).unwrap() }

// run with "cargo test --test test_tracker -- --nocapture"

#[test]
fn test_first_trackable_becomes_target () {
    let mut state = tracker_state( TrackingParams::default());
    assert_eq!( state.tracked_distance(), NO_TARGET_DISTANCE);

    // incomplete observations are not trackable
    let mut r = SbsReport::empty( "AAAAAA", t0());
    r.callsign = Some("TEST1".to_string());
    state.on_message( &r, t0());
    assert!( state.tracked_id().is_none());

    state.on_message( &report( "AAAAAA", 2300.0, 1000.0, t0()), t0());
    assert_eq!( state.tracked_id(), Some("aaaaaa"));
    let d = state.observation("aaaaaa").unwrap().distance().unwrap();
    assert_eq!( state.tracked_distance(), d);
}

#[test]
fn test_switch_to_closer () {
    println!("\n--- test_switch_to_closer");
    let mut state = tracker_state( TrackingParams::default());

    state.on_message( &report( "AAAAAA", 2300.0, 1000.0, t0()), t0()); // ~2508m
    assert_eq!( state.tracked_id(), Some("aaaaaa"));
    println!("A at {:.0}m", state.tracked_distance());

    state.on_message( &report( "BBBBBB", 1500.0, 1000.0, at(1)), at(1)); // ~1803m
    assert_eq!( state.tracked_id(), Some("bbbbbb"));
    println!("B at {:.0}m", state.tracked_distance());

    // farther aircraft never replace the target
    state.on_message( &report( "CCCCCC", 4000.0, 1000.0, at(2)), at(2));
    assert_eq!( state.tracked_id(), Some("bbbbbb"));
}

#[test]
fn test_no_switch_on_tie () {
    let mut state = tracker_state( TrackingParams::default());

    state.on_message( &report( "AAAAAA", 2300.0, 1000.0, t0()), t0());
    state.on_message( &report( "CCCCCC", 2300.0, 1000.0, at(1)), at(1)); // same distance
    assert_eq!( state.observation("aaaaaa").unwrap().distance(), state.observation("cccccc").unwrap().distance());
    assert_eq!( state.tracked_id(), Some("aaaaaa"));
}

#[test]
fn test_target_refreshes_distance () {
    let mut state = tracker_state( TrackingParams::default());
    state.on_message( &report( "AAAAAA", 2300.0, 1000.0, t0()), t0());
    state.on_message( &report( "AAAAAA", 5000.0, 1000.0, at(1)), at(1));
    assert_eq!( state.tracked_distance(), state.observation("aaaaaa").unwrap().distance().unwrap());

    // now a closer aircraft takes over even though it is farther than A was initially
    state.on_message( &report( "BBBBBB", 3000.0, 1000.0, at(2)), at(2));
    assert_eq!( state.tracked_id(), Some("bbbbbb"));
}

#[test]
fn test_untrackable_target () {
    println!("\n--- test_untrackable_target");
    let params = TrackingParams { min_altitude: Some(500.0), ..TrackingParams::default() };
    let mut state = tracker_state( params);

    state.on_message( &report( "AAAAAA", 1000.0, 1000.0, t0()), t0());
    state.on_message( &report( "BBBBBB", 3000.0, 1000.0, t0()), t0());
    assert_eq!( state.tracked_id(), Some("aaaaaa"));

    // A descends below min altitude
    state.on_message( &report( "AAAAAA", 1000.0, 300.0, at(1)), at(1));
    println!("{}", state.why_trackable( state.observation("aaaaaa").unwrap()));
    assert!( state.tracked_id().is_none());
    assert_eq!( state.tracked_distance(), NO_TARGET_DISTANCE);

    // the next sweep picks the nearest trackable one
    assert_eq!( state.cleanup( at(10)), 0);
    assert_eq!( state.tracked_id(), Some("bbbbbb"));
}

#[test]
fn test_thresholds () {
    let params = TrackingParams {
        min_elevation: 10.0,
        max_altitude: Some(5000.0),
        min_distance: Some(1000.0),
        max_distance: Some(10000.0),
        ..TrackingParams::default()
    };
    let mut state = tracker_state( params.clone());

    let cases = [
        ("000001", 3000.0, 1000.0, true),
        ("000002", 3000.0, 6000.0, false), // too high
        ("000003", 500.0, 300.0, false),   // too close
        ("000004", 12000.0, 4000.0, false), // too far
        ("000005", 8000.0, 1000.0, false), // elevation below 10deg
    ];
    for (id, north, alt, expected) in cases {
        state.on_message( &report( id, north, alt, t0()), t0());
        let obs = state.observation( id).unwrap();
        println!("{id}: {}", state.why_trackable( obs));
        assert_eq!( is_trackable( obs, &params), expected);
    }

    let mut r = report( "000006", 3000.0, 1000.0, t0());
    r.on_ground = Some(true);
    state.on_message( &r, t0());
    assert!( !state.is_trackable( state.observation("000006").unwrap()));
}

#[test]
fn test_pending_pin () {
    println!("\n--- test_pending_pin");
    let mut state = tracker_state( TrackingParams { max_distance: Some(10000.0), ..TrackingParams::default() });

    state.apply_config( &config( r#"{"aircraftPinned": "ABC123"}"#));
    assert_eq!( state.pinned_id(), Some("abc123"));
    assert!( !state.is_pin_active());

    // automatic selection continues while the pinned aircraft is not observed
    state.on_message( &report( "AAAAAA", 2000.0, 1000.0, t0()), t0());
    assert_eq!( state.tracked_id(), Some("aaaaaa"));
    assert_eq!( state.pinned_id(), Some("abc123"));

    // far away and on the ground, but pinned
    let mut r = report( "ABC123", 50000.0, 0.0, at(1));
    r.on_ground = Some(true);
    state.on_message( &r, at(1));
    assert!( state.is_pin_active());
    assert_eq!( state.tracked_id(), Some("abc123"));
    assert_eq!( state.tracked_distance(), state.observation("abc123").unwrap().distance().unwrap());
}

#[test]
fn test_pin_precedence () {
    let mut state = tracker_state( TrackingParams::default());

    state.on_message( &report( "AAAAAA", 8000.0, 1000.0, t0()), t0());
    state.apply_config( &config( r#"{"aircraftPinned": "aaaaaa"}"#));
    state.on_message( &report( "BBBBBB", 1000.0, 1000.0, at(1)), at(1)); // closer, but A is pinned
    assert_eq!( state.tracked_id(), Some("aaaaaa"));

    // pinned targets stay even if they become untrackable, also in the sweep
    let mut r = report( "AAAAAA", 8000.0, 1000.0, at(2));
    r.on_ground = Some(true);
    state.on_message( &r, at(2));
    state.on_message( &report( "BBBBBB", 900.0, 1000.0, at(3)), at(3));
    assert_eq!( state.cleanup( at(10)), 0);
    assert_eq!( state.tracked_id(), Some("aaaaaa"));

    // unpinning with an empty string reverts to automatic selection
    state.apply_config( &config( r#"{"aircraftPinned": ""}"#));
    assert!( state.pinned_id().is_none());
    let mut r = report( "AAAAAA", 8000.0, 1000.0, at(11));
    r.on_ground = Some(true);
    state.on_message( &r, at(11)); // still on the ground, hence dropped
    assert!( state.tracked_id().is_none());
    state.on_message( &report( "BBBBBB", 900.0, 1000.0, at(11)), at(11));
    assert_eq!( state.tracked_id(), Some("bbbbbb"));
}

#[test]
fn test_pin_keys () {
    let mut state = tracker_state( TrackingParams::default());
    state.apply_config( &config( r#"{"aircraftPinned": " AbC123 "}"#));
    assert_eq!( state.pinned_id(), Some("abc123"));

    state.apply_config( &config( r#"{"minElevation": 5}"#)); // absent key leaves pin alone
    assert_eq!( state.pinned_id(), Some("abc123"));

    state.apply_config( &config( r#"{"aircraftPinned": null}"#));
    assert!( state.pinned_id().is_none());
}

#[test]
fn test_sweep () {
    println!("\n--- test_sweep");
    let mut state = tracker_state( TrackingParams::default());

    state.on_message( &report( "AAAAAA", 1000.0, 1000.0, t0()), t0());
    state.apply_config( &config( r#"{"aircraftPinned": "aaaaaa"}"#));
    state.on_message( &report( "AAAAAA", 1000.0, 1000.0, t0()), t0());
    assert!( state.is_pin_active());

    state.on_message( &report( "BBBBBB", 3000.0, 1000.0, at(8)), at(8));
    state.on_message( &report( "CCCCCC", 2000.0, 1000.0, at(8)), at(8));

    // not due yet
    assert_eq!( state.cleanup( at(5)), 0);
    assert_eq!( state.observations().len(), 3);
    assert_eq!( state.next_clean(), at(10));

    let now = t0() + Duration::milliseconds(10_500);
    assert_eq!( state.cleanup( now), 1);
    assert!( state.observation("aaaaaa").is_none());
    assert!( state.pinned_id().is_none());
    assert_eq!( state.tracked_id(), Some("cccccc")); // nearest of the remaining
    assert_eq!( state.next_clean(), now + Duration::seconds(10));

    // sweep runs at most once per interval
    assert_eq!( state.cleanup( at(19)), 0);
    assert_eq!( state.observations().len(), 2);
    assert_eq!( state.cleanup( at(25)), 2);
    assert!( state.observations().is_empty());
    assert!( state.tracked_id().is_none());
    assert_eq!( state.tracked_distance(), NO_TARGET_DISTANCE);
}

#[test]
fn test_config_snapshot () {
    let mut state = tracker_state( TrackingParams::default());
    let before = state.params();

    state.apply_config( &config( r#"{"cameraLead": "0.5", "minElevation": 12, "maxDistance": 20000, "bogus": 1}"#));
    let after = state.params();

    assert_eq!( before.camera_lead, 0.25); // old snapshot is unchanged
    assert_eq!( after.camera_lead, 0.5);
    assert_eq!( after.min_elevation, 12.0);
    assert_eq!( after.max_distance, Some(20000.0));
    assert!( after.min_distance.is_none());
}

#[test]
fn test_set_camera () {
    let mut state = tracker_state( TrackingParams::default());
    state.on_message( &report( "AAAAAA", 2000.0, 1000.0, t0()), t0());
    let d0 = state.tracked_distance();

    state.set_camera( CameraPosition::new( 37.0, -122.0, 1000.0)); // level with the aircraft
    let obs = state.observation("aaaaaa").unwrap();
    assert!( (obs.distance().unwrap() - 2000.0).abs() < 0.05);
    assert!( obs.elevation().unwrap().abs() < 1e-9);
    assert_eq!( state.tracked_distance(), obs.distance().unwrap());
    assert!( state.tracked_distance() < d0);
}

#[test]
fn test_registry_lookup () {
    let mut registry = HashMap::new();
    registry.insert( "aaaaaa".to_string(), AircraftInfo { manufacturer: Some("Cessna".into()), model: Some("172".into()), ..AircraftInfo::default() });
    let mut state = TrackerState::new( camera(), TrackingParams::default(), StdDuration::from_secs(10), Arc::new(registry), t0());

    state.on_message( &report( "AAAAAA", 2000.0, 1000.0, t0()), t0());
    state.on_message( &report( "BBBBBB", 3000.0, 1000.0, t0()), t0());
    assert_eq!( state.observation("aaaaaa").unwrap().aircraft_type(), Some("Cessna 172"));
    assert!( state.observation("bbbbbb").unwrap().aircraft_type().is_none());
}

#[test]
fn test_snapshot () {
    let mut state = tracker_state( TrackingParams::default());
    state.on_message( &report( "AAAAAA", 5000.0, 1000.0, t0()), t0());
    state.on_message( &report( "BBBBBB", 1000.0, 1000.0, t0()), t0());
    state.on_message( &report( "CCCCCC", 3000.0, 1000.0, t0()), t0());
    state.on_message( &SbsReport::empty( "DDDDDD", t0()), t0()); // not presentable

    let snapshot = state.snapshot();
    let ids: Vec<&str> = snapshot.observations.iter().map( |o| o.icao24()).collect();
    assert_eq!( ids, vec!["bbbbbb", "cccccc", "aaaaaa"]);
    assert_eq!( snapshot.tracking.as_deref(), Some("bbbbbb"));

    let json = serde_json::to_value( &snapshot).unwrap();
    assert_eq!( json["config"]["camera_lead"], 0.25);
}

#[test]
fn test_target_state () {
    let mut state = tracker_state( TrackingParams::default());
    assert!( state.target_state( t0()).is_none());

    state.on_message( &report( "AAAAAA", 2000.0, 1000.0, t0()), t0());
    let target = state.target_state( at(1)).unwrap();
    let json = serde_json::to_value( &target).unwrap();
    println!("{json}");
    assert_eq!( json["icao24"], "aaaaaa");
    assert!( json["time"].is_number());
    assert!( json["predicted"]["lat"].is_number());
    assert!( json["predicted"]["bearing"].is_number());
}

#[test]
fn test_concurrent_access () {
    let tracker = Tracker::new( tracker_state( TrackingParams::default()));

    let handles: Vec<_> = (0..4).map( |i| {
        let tracker = tracker.clone();
        thread::spawn( move || {
            for j in 0..200 {
                let id = format!("{:06x}", i*1000 + j % 20);
                let t = at( (j / 20) as i64);
                tracker.on_message( &report( &id, 1000.0 + (j*37 % 5000) as f64, 1000.0, t), t);
                tracker.cleanup( t);
                if j % 50 == 0 { tracker.apply_config( &config( r#"{"minElevation": 1}"#)); }
            }
        })
    }).collect();
    for h in handles { h.join().unwrap(); }

    // whatever the interleaving, the target is the tracked observation and its distance is current
    tracker.with_state( |state| {
        let target = state.target().unwrap();
        assert_eq!( state.tracked_distance(), target.distance().unwrap());
        assert!( state.is_trackable( target));
    });
}
