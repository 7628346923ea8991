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

use std::{collections::HashMap, io::Read, path::Path, fs::File};
use serde::{Serialize,Deserialize};
use tracing::info;
use crate::errors::Result;

/// static aircraft metadata
#[derive(Debug,Clone,Default,PartialEq,Serialize,Deserialize)]
pub struct AircraftInfo {
    pub registration: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub operator: Option<String>,
}

impl AircraftInfo {
    /// "<manufacturer> <model>"
    pub fn aircraft_type (&self)->Option<String> {
        match (&self.manufacturer, &self.model) {
            (Some(mfr),Some(model)) => Some( format!("{mfr} {model}")),
            (Some(mfr),None) => Some( mfr.clone()),
            (None,Some(model)) => Some( model.clone()),
            (None,None) => None
        }
    }
}

/// synchronous lookup of aircraft metadata by (lower case) icao24
pub trait AircraftRegistry: Send + Sync {
    fn lookup (&self, icao24: &str)->Option<AircraftInfo>;
}

/// registry that doesn't know any aircraft
pub struct NoRegistry;

impl AircraftRegistry for NoRegistry {
    fn lookup (&self, _icao24: &str)->Option<AircraftInfo> { None }
}

impl AircraftRegistry for HashMap<String,AircraftInfo> {
    fn lookup (&self, icao24: &str)->Option<AircraftInfo> { self.get( icao24).cloned() }
}

#[derive(Deserialize)]
struct RegistryRecord {
    icao24: String,
    #[serde(default)] registration: String,
    #[serde(default)] manufacturername: String,
    #[serde(default)] model: String,
    #[serde(default)] operator: String,
}

fn non_empty (s: String)->Option<String> {
    let s = s.trim();
    if s.is_empty() { None } else { Some(s.to_string()) }
}

/// registry loaded from an OpenSky style `aircraftDatabase.csv` (header row required, extra columns ignored)
pub struct CsvRegistry {
    aircraft: HashMap<String,AircraftInfo>
}

impl CsvRegistry {
    pub fn load<P: AsRef<Path>> (path: P)->Result<Self> {
        let file = File::open( path.as_ref())?;
        let registry = Self::from_reader( file)?;
        info!("loaded {} aircraft from registry {:?}", registry.len(), path.as_ref());
        Ok(registry)
    }

    pub fn from_reader<R: Read> (rdr: R)->Result<Self> {
        let mut csv = csv::ReaderBuilder::new().flexible(true).from_reader( rdr);
        let mut aircraft = HashMap::new();

        for rec in csv.deserialize::<RegistryRecord>() {
            let rec = rec?;
            let icao24 = rec.icao24.trim().to_lowercase();
            if icao24.is_empty() { continue }

            let info = AircraftInfo {
                registration: non_empty( rec.registration),
                manufacturer: non_empty( rec.manufacturername),
                model: non_empty( rec.model),
                operator: non_empty( rec.operator),
            };
            aircraft.insert( icao24, info);
        }

        Ok( CsvRegistry{ aircraft })
    }

    pub fn len (&self)->usize { self.aircraft.len() }
    pub fn is_empty (&self)->bool { self.aircraft.is_empty() }
}

impl AircraftRegistry for CsvRegistry {
    fn lookup (&self, icao24: &str)->Option<AircraftInfo> { self.aircraft.get( icao24).cloned() }
}
