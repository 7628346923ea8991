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

use std::{path::PathBuf, sync::Arc};
use anyhow::Result;
use clap::Parser;
use tokio;
use tokio_util::sync::CancellationToken;
use tracing::{info,warn};
use tracing_subscriber::EnvFilter;
use odin_ptz::{
    load_config, CameraPosition, PtzConfig,
    pubsub::{channel_pubsub, PubSub},
    registry::{AircraftRegistry, CsvRegistry, NoRegistry},
    service::spawn_tracker,
    ws_pubsub::WsPubSub
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = "point a PTZ camera at the closest trackable aircraft of an ADS-B SBS feed")]
pub struct Args {
    /// RON config file
    #[arg(short,long)]
    pub config: Option<PathBuf>,

    /// camera latitude in degrees
    #[arg(long, allow_hyphen_values=true)]
    pub lat: Option<f64>,

    /// camera longitude in degrees
    #[arg(long, allow_hyphen_values=true)]
    pub lon: Option<f64>,

    /// camera altitude in meters
    #[arg(long, allow_hyphen_values=true)]
    pub alt: Option<f64>,

    /// seconds to project aircraft positions ahead
    #[arg(long)]
    pub camera_lead: Option<f64>,

    /// minimum elevation angle in degrees
    #[arg(long, allow_hyphen_values=true)]
    pub min_elevation: Option<f64>,

    /// SBS feed host (e.g. dump1090)
    #[arg(long)]
    pub feed_host: Option<String>,

    /// SBS feed port
    #[arg(long)]
    pub feed_port: Option<u16>,

    #[arg(short,long)]
    pub verbose: bool,
}

impl Args {
    fn camera (&self)->Option<CameraPosition> {
        match (self.lat, self.lon) {
            (Some(lat),Some(lon)) => Some( CameraPosition::new( lat, lon, self.alt.unwrap_or_default())),
            _ => None
        }
    }

    fn apply_to (&self, config: &mut PtzConfig) {
        if let Some(host) = &self.feed_host { config.feed_host = host.clone() }
        if let Some(port) = self.feed_port { config.feed_port = port }
        if let Some(lead) = self.camera_lead { config.tracking.camera_lead = lead }
        if let Some(elev) = self.min_elevation { config.tracking.min_elevation = elev }
    }
}

fn init_logging (verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else( |_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter( filter).init();
}

#[tokio::main]
async fn main()->Result<()> {
    let args = Args::parse();
    init_logging( args.verbose);

    let mut config: PtzConfig = match &args.config {
        Some(path) => load_config( path)?,
        None => PtzConfig::new( "localhost", None)
    };
    args.apply_to( &mut config);

    let registry: Arc<dyn AircraftRegistry> = match &config.registry_path {
        Some(path) => Arc::new( CsvRegistry::load( path)?),
        None => {
            warn!("no aircraft registry configured");
            Arc::new( NoRegistry)
        }
    };

    let cancel = CancellationToken::new();

    let (pubsub, inbound, ws_task): (Arc<dyn PubSub>, _, _) = match &config.broker_url {
        Some(url) => {
            let (pubsub, inbound, task) = WsPubSub::spawn( url.clone(), config.reconnect_delay, 64, cancel.clone());
            let pubsub: Arc<dyn PubSub> = Arc::new(pubsub);
            (pubsub, inbound, Some(task))
        }
        None => {
            info!("no broker configured, logging published messages");
            let (pubsub, mut endpoint, inbound) = channel_pubsub( 64);
            tokio::spawn( async move {
                while let Some(msg) = endpoint.recv().await {
                    info!("{}: {}", msg.topic, msg.payload);
                }
            });
            let pubsub: Arc<dyn PubSub> = Arc::new(pubsub);
            (pubsub, inbound, None)
        }
    };

    let mut handle = spawn_tracker( &config, args.camera(), registry, pubsub, inbound, cancel)?;
    if let Some(task) = ws_task { handle.add_task( task) } // shutdown waits for the websocket close

    tokio::signal::ctrl_c().await?;
    handle.shutdown().await;

    Ok(())
}
