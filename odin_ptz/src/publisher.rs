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

use std::{sync::Arc, time::Duration};
use chrono::{DateTime,TimeDelta,Utc};
use tokio::{select, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug,info,warn};
use crate::{config::PtzTopics, errors::Result, pubsub::PubSub, tracker::Tracker};

/// payload published while no aircraft is tracked
pub const IDLE_PAYLOAD: &str = "{}";

pub const IDLE_DELAY: Duration = Duration::from_secs(1);

/// the pause between target publications, shorter for closer targets
pub fn publish_delay (tracked_distance: f64)->Duration {
    if tracked_distance < 3000.0 {
        Duration::from_millis(250)
    } else if tracked_distance < 6000.0 {
        Duration::from_millis(500)
    } else {
        Duration::from_secs(1)
    }
}

/// "<name>-<random id>", which identifies this tracker instance in registration and heartbeat messages
pub fn client_id (name: &str)->String {
    format!("{}-{}", name, rand::random_range( 0..10_000))
}

/// periodically publishes the tracked aircraft (or the idle payload) and heartbeats
pub struct Publisher {
    tracker: Tracker,
    pubsub: Arc<dyn PubSub>,
    topics: PtzTopics,
    client_id: String,
    heartbeat_interval: TimeDelta,
    last_heartbeat: Option<DateTime<Utc>>,
}

impl Publisher {
    pub fn new (tracker: Tracker, pubsub: Arc<dyn PubSub>, topics: PtzTopics, client_id: String, heartbeat_interval: Duration)->Self {
        let heartbeat_interval = TimeDelta::from_std( heartbeat_interval).unwrap_or( TimeDelta::seconds(10));
        Publisher { tracker, pubsub, topics, client_id, heartbeat_interval, last_heartbeat: None }
    }

    pub fn client_id (&self)->&str { self.client_id.as_str() }

    /// announce this tracker, done once at startup
    pub async fn register (&self)->Result<()> {
        info!("registering as {}", self.client_id);
        self.pubsub.publish( &self.topics.registration, format!("{} Registration", self.client_id)).await
    }

    /// publish a heartbeat if the last one is older than the heartbeat interval. Returns true if one was sent
    pub async fn heartbeat (&mut self, now: DateTime<Utc>)->Result<bool> {
        let is_due = self.last_heartbeat.map_or( true, |last| now - last >= self.heartbeat_interval);
        if is_due {
            self.last_heartbeat = Some(now);
            self.pubsub.publish( &self.topics.heartbeat, format!("{} Heartbeat", self.client_id)).await?;
        }
        Ok(is_due)
    }

    /// one publish cycle: heartbeat if due, sweep if due, then the target state or the idle payload.
    /// Returns how long to wait before the next cycle
    pub async fn publish_cycle (&mut self, now: DateTime<Utc>)->Result<Duration> {
        self.heartbeat( now).await?;
        self.tracker.cleanup( now);

        // the lock is released before we publish
        let (target, distance) = self.tracker.with_state( |state| (state.target_state( now), state.tracked_distance()));

        match target {
            Some(target) => {
                let payload = serde_json::to_string( &target)?;
                self.pubsub.publish( &self.topics.flight, payload).await?;
                Ok( publish_delay( distance))
            }
            None => {
                self.pubsub.publish( &self.topics.flight, IDLE_PAYLOAD.to_string()).await?;
                Ok( IDLE_DELAY)
            }
        }
    }

    pub async fn run (mut self, cancel: CancellationToken) {
        if let Err(e) = self.register().await {
            warn!("registration failed: {}", e);
        }

        loop {
            let delay = match self.publish_cycle( Utc::now()).await {
                Ok(delay) => delay,
                Err(e) => {
                    warn!("publish failed: {}", e);
                    IDLE_DELAY
                }
            };

            select! {
                _ = sleep( delay) => {}
                _ = cancel.cancelled() => break
            }
        }
        debug!("publisher terminated");
    }
}
