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

use std::{fmt, str::FromStr};
use chrono::{DateTime, Utc, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;
use uom::si::{f64::{Length,Velocity}, length::{foot,meter}, velocity::{foot_per_minute,knot,meter_per_second}};
use crate::errors::{Result, OdinPtzError, parse_error};

/// a normalized position/identity report decoded from a single SBS line.
/// Values are converted to SI units: altitude in meters, ground speed and vertical rate in m/s.
/// All payload fields are optional since SBS transmission types only carry subsets of them.
#[derive(Debug,Clone,PartialEq)]
pub struct SbsReport {
    pub msg_type: u8, // SBS transmission type 1..8
    pub icao24: String,
    pub callsign: Option<String>,
    pub altitude: Option<f64>,
    pub ground_speed: Option<f64>,
    pub track: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub vertical_rate: Option<f64>,
    pub on_ground: Option<bool>,
    pub generated: DateTime<Utc>,
}

impl SbsReport {
    /// a report that only carries identity and time
    pub fn empty (icao24: impl ToString, generated: DateTime<Utc>)->Self {
        SbsReport {
            msg_type: 0, icao24: icao24.to_string(), callsign: None, altitude: None, ground_speed: None, track: None,
            latitude: None, longitude: None, vertical_rate: None, on_ground: None, generated
        }
    }
}

impl fmt::Display for SbsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!( f, "SbsReport( type: {}, icao24: {}", self.msg_type, self.icao24)?;
        if let Some(cs) = &self.callsign { write!( f, ", cs: \"{cs}\"")?; }
        if let (Some(lat),Some(lon)) = (self.latitude,self.longitude) { write!( f, ", pos: [{lat:.5},{lon:.5}]")?; }
        if let Some(alt) = self.altitude { write!( f, ", alt: {alt:.0}m")?; }
        if let Some(gs) = self.ground_speed { write!( f, ", spd: {gs:.1}m/s")?; }
        if let Some(trk) = self.track { write!( f, ", trk: {trk:.0}")?; }
        if let Some(vr) = self.vertical_rate { write!( f, ", vr: {vr:.1}m/s")?; }
        if let Some(gnd) = self.on_ground { write!( f, ", gnd: {gnd}")?; }
        write!( f, ", time: {})", self.generated)
    }
}

/// SBS as documented on http://woodair.net/SBS/Article/Barebones42_Socket_Data.htm
///
/// Message examples:
///  MSG,1,111,11111,AA2BC2,111111,2016/03/11,13:07:16.663,2016/03/11,13:07:16.626,UAL814  ,,,,,,,,,,,0
///  MSG,3,111,11111,A04424,111111,2016/03/11,13:07:05.343,2016/03/11,13:07:05.288,,11025,,,37.17274,-122.03935,,,,,,0
///  MSG,4,111,11111,AC1FCC,111111,2016/03/11,13:07:07.777,2016/03/11,13:07:07.713,,,316,106,,,1536,,,,,0
///
/// fields:
///   0: message type (MSG, SEL, ID, AIR, STA, CLK)
///   1: transmission type (MSG only: 1-8, 3: ES Airborne Position Message)
///   4: ICAO 24 bit id (mode S transponder code)
///   6: date generated
///   7: time generated
///  10: callsign
///  11: mode-C altitude in ft (relative to 1013.2mb (Flight Level), *not* AMSL)
///  12: ground speed in kn
///  13: track (from vx,vy, *not* heading)
///  14: latitude
///  15: longitude
///  16: vertical rate (ft/min - 64ft resolution)
///  21: on ground (flag, dump1090 reports -1 for true)
///
/// Only MSG lines carry aircraft state, other message types are ignored (`Ok(None)`).
/// Lines that are truncated or have unparsable values are errors - callers skip them.
pub fn parse_msg (line: &str, source_tz: &Tz)->Result<Option<SbsReport>> {
    let fields: Vec<&str> = line.trim_end_matches(['\r','\n']).split(',').collect();

    if fields[0] != "MSG" {
        return if fields.len() > 1 { Ok(None) } else { Err( parse_error!( "not a SBS message: '{}'", line)) }
    }
    if fields.len() < 10 {
        return Err( parse_error!( "missing common fields in SBS message: '{}'", line))
    }

    let msg_type: u8 = parse_field( &fields, 1)?.ok_or_else( || parse_error!( "missing transmission type: '{}'", line))?;
    let icao24 = field( &fields, 4).ok_or_else( || parse_error!( "missing icao24: '{}'", line))?.to_string();
    let (date,time) = match (field(&fields,6), field(&fields,7)) {
        (Some(date),Some(time)) => (date,time),
        _ => return Err( parse_error!( "missing generated date/time: '{}'", line))
    };
    let generated = get_utc_datetime( date, time, source_tz)?;

    let callsign = field( &fields, 10).map( |cs| cs.trim_end().to_string());
    let altitude = parse_field::<f64>( &fields, 11)?.map( |alt| Length::new::<foot>(alt).get::<meter>());
    let ground_speed = parse_field::<f64>( &fields, 12)?.map( |gs| Velocity::new::<knot>(gs).get::<meter_per_second>());
    let track = parse_field::<f64>( &fields, 13)?;
    let latitude = parse_field::<f64>( &fields, 14)?;
    let longitude = parse_field::<f64>( &fields, 15)?;
    let vertical_rate = parse_field::<f64>( &fields, 16)?.map( |vr| Velocity::new::<foot_per_minute>(vr).get::<meter_per_second>());
    let on_ground = parse_field::<i32>( &fields, 21)?.map( |v| v != 0);

    if let Some(lat) = latitude { if !(-90.0..=90.0).contains(&lat) { return Err( parse_error!( "latitude out of range: {}", lat)) } }
    if let Some(lon) = longitude { if !(-180.0..=180.0).contains(&lon) { return Err( parse_error!( "longitude out of range: {}", lon)) } }

    Ok( Some( SbsReport{ msg_type, icao24, callsign, altitude, ground_speed, track, latitude, longitude, vertical_rate, on_ground, generated }))
}

/// non-empty (trimmed) field value
fn field<'a> (fields: &[&'a str], idx: usize)->Option<&'a str> {
    fields.get(idx).map( |s| s.trim()).filter( |s| !s.is_empty())
}

fn parse_field<T: FromStr> (fields: &[&str], idx: usize)->Result<Option<T>> {
    match field( fields, idx) {
        Some(s) => s.parse::<T>().map( Some).map_err( |_| parse_error!( "invalid value in field {}: '{}'", idx, s)),
        None => Ok(None)
    }
}

// note that dump1090 does report time in local timezone, i.e. we have to convert to UTC
pub fn get_utc_datetime (date: &str, time: &str, tz: &Tz)->Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str( date, "%Y/%m/%d")?;
    let time = NaiveTime::parse_from_str( time, "%H:%M:%S%.f")?;

    let dt = match tz.from_local_datetime( &date.and_time(time)) {
        chrono::offset::LocalResult::Single(dt) => dt,
        chrono::offset::LocalResult::Ambiguous(_, dt2) => dt2, // we don't care about that precision
        chrono::offset::LocalResult::None => return Err( OdinPtzError::OpFailedError("forward time jump cannot be mapped to UTC".into())),
    };
    Ok( dt.with_timezone( &Utc) )
}
