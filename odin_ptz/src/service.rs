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

//! wiring of the concurrent tracker activities: the ingest loop (feed -> decoder -> tracker), the publish
//! loop and the intake of external config/camera updates, plus the optional status server.
//! All of them share a single [`Tracker`] handle and terminate when the [`CancellationToken`] is triggered

use std::sync::Arc;
use chrono::Utc;
use chrono_tz::Tz;
use tokio::{select, sync::mpsc::Receiver, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug,info,warn,error};
use crate::{
    config::{CameraPosition, PtzConfig},
    errors::{Result, config_error},
    intake::run_intake,
    publisher::{Publisher, client_id},
    pubsub::{InboundMsg, PubSub},
    reader::SbsReader,
    registry::AircraftRegistry,
    sbs::parse_msg,
    status_service::serve_status,
    tracker::Tracker
};

/// read the feed and apply decoded reports to the tracker until cancelled. Malformed lines are skipped,
/// connection failures are retried by the reader. The sweep is triggered for each received line and each
/// failed connect so that stale aircraft are removed even if the feed is down
pub async fn run_ingest (tracker: Tracker, mut reader: SbsReader, tz: Tz, cancel: CancellationToken) {
    let mut n_errors: u64 = 0;

    while !cancel.is_cancelled() {
        if !reader.connect( &cancel).await {
            tracker.cleanup( Utc::now());
            continue
        }

        let maybe_line = select! {
            line = reader.next_line() => line,
            _ = cancel.cancelled() => break
        };

        let now = Utc::now();
        tracker.cleanup( now);

        if let Some(line) = maybe_line {
            match parse_msg( &line, &tz) {
                Ok(Some(report)) => tracker.on_message( &report, now),
                Ok(None) => {} // not a MSG line
                Err(e) => {
                    n_errors += 1;
                    debug!("skipping line {:?}: {} ({} total)", line, e, n_errors);
                }
            }
        }
    }

    reader.close();
    debug!("ingest loop terminated");
}

/// the camera position to start with: command line values take precedence over the config file.
/// Without a camera position the tracker cannot start
pub fn initial_camera (config: &PtzConfig, cli_camera: Option<CameraPosition>)->Result<CameraPosition> {
    cli_camera.or( config.camera).ok_or_else( || config_error!("no camera position (set 'camera' in config or --lat/--lon/--alt)"))
}

/// the running tracker tasks
pub struct PtzTrackerHandle {
    tracker: Tracker,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl PtzTrackerHandle {
    pub fn tracker (&self)->&Tracker { &self.tracker }

    pub fn cancel_token (&self)->CancellationToken { self.cancel.clone() }

    /// join `task` on shutdown after all tracker tasks. This is used for transport connection tasks that
    /// terminate with the cancel token of this handle
    pub fn add_task (&mut self, task: JoinHandle<()>) { self.tasks.push( task) }

    /// signal all tasks to terminate and wait for them
    pub async fn shutdown (self) {
        info!("shutting down tracker");
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                error!("tracker task failed: {}", e);
            }
        }
    }
}

/// start all tracker tasks. This fails without spawning anything if there is no camera position.
/// `inbound` is the receiver that belongs to `pubsub`
pub fn spawn_tracker (config: &PtzConfig, cli_camera: Option<CameraPosition>, registry: Arc<dyn AircraftRegistry>,
                      pubsub: Arc<dyn PubSub>, inbound: Receiver<InboundMsg>, cancel: CancellationToken)->Result<PtzTrackerHandle> {
    let camera = initial_camera( config, cli_camera)?;
    info!("starting tracker '{}' with camera at {}", config.name, camera);

    let tracker = Tracker::from_config( config, camera, registry);
    let mut tasks = Vec::new();

    let reader = SbsReader::from_config( config);
    tasks.push( tokio::spawn( run_ingest( tracker.clone(), reader, config.timezone, cancel.clone())));

    let publisher = Publisher::new( tracker.clone(), pubsub.clone(), config.topics.clone(), client_id( &config.name), config.heartbeat_interval);
    tasks.push( tokio::spawn( publisher.run( cancel.clone())));

    {
        let tracker = tracker.clone();
        let topics = config.topics.clone();
        let cancel = cancel.clone();
        tasks.push( tokio::spawn( async move {
            if let Err(e) = run_intake( tracker, pubsub.as_ref(), topics, inbound, cancel).await {
                error!("config intake failed: {}", e);
            }
        }));
    }

    if let Some(addr) = config.status_addr {
        let tracker = tracker.clone();
        let cancel = cancel.clone();
        tasks.push( tokio::spawn( async move {
            if let Err(e) = serve_status( addr, tracker, cancel).await {
                warn!("status server terminated: {}", e);
            }
        }));
    }

    Ok( PtzTrackerHandle { tracker, cancel, tasks })
}
