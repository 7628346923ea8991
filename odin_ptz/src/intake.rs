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

use tokio::{select, sync::mpsc::Receiver};
use tokio_util::sync::CancellationToken;
use tracing::{debug,info,warn};
use crate::{
    config::{CameraPosition, ConfigUpdate, PtzTopics},
    errors::{Result, parse_error},
    pubsub::{InboundMsg, PubSub},
    tracker::Tracker
};

/// what an inbound message did to the tracker
#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum IntakeResult {
    ConfigApplied,
    CameraUpdated,
    Ignored
}

/// apply a single inbound message. Unparsable payloads return an error and leave the tracker unchanged
pub fn handle_inbound (tracker: &Tracker, topics: &PtzTopics, msg: &InboundMsg)->Result<IntakeResult> {
    if msg.topic == topics.config {
        let update: ConfigUpdate = serde_json::from_str( &msg.payload)?;
        debug!("config update: {:?}", update);
        tracker.apply_config( &update);
        Ok( IntakeResult::ConfigApplied)

    } else if msg.topic == topics.camera {
        let camera: CameraPosition = serde_json::from_str( &msg.payload)?;
        if !(-90.0..=90.0).contains( &camera.latitude) || !(-180.0..=180.0).contains( &camera.longitude) {
            return Err( parse_error!("camera position out of range: {}", camera))
        }
        tracker.set_camera( camera);
        Ok( IntakeResult::CameraUpdated)

    } else {
        Ok( IntakeResult::Ignored)
    }
}

/// subscribe to the config and camera topics and process inbound messages until cancelled or the
/// transport closes the channel
pub async fn run_intake (tracker: Tracker, pubsub: &dyn PubSub, topics: PtzTopics, mut rx: Receiver<InboundMsg>, cancel: CancellationToken)->Result<()> {
    pubsub.subscribe( &topics.config).await?;
    pubsub.subscribe( &topics.camera).await?;
    info!("listening for config on '{}' and camera telemetry on '{}'", topics.config, topics.camera);

    loop {
        let msg = select! {
            msg = rx.recv() => msg,
            _ = cancel.cancelled() => break
        };

        match msg {
            Some(msg) => {
                match handle_inbound( &tracker, &topics, &msg) {
                    Ok(IntakeResult::Ignored) => debug!("ignoring message on topic '{}'", msg.topic),
                    Ok(_) => {}
                    Err(e) => warn!("discarding message on '{}': {}", msg.topic, e)
                }
            }
            None => {
                debug!("inbound channel closed");
                break
            }
        }
    }
    Ok(())
}
