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

//! the publish/subscribe seam of the tracker.
//!
//! Outbound messages go through [`PubSub::publish`]. Inbound messages for subscribed topics are not
//! delivered through callbacks but as [`InboundMsg`] values on a tokio mpsc channel that is created
//! together with the transport, which lets the intake task own all processing of external updates.

use std::{collections::HashSet, sync::{Arc,Mutex}};
use async_trait::async_trait;
use tokio::sync::mpsc::{self, Receiver, Sender};
use crate::errors::{Result, op_failed};

/// a message received on a subscribed topic
#[derive(Debug,Clone,PartialEq)]
pub struct InboundMsg {
    pub topic: String,
    pub payload: String,
}

/// a message sent by the tracker
#[derive(Debug,Clone,PartialEq)]
pub struct OutboundMsg {
    pub topic: String,
    pub payload: String,
}

#[async_trait]
pub trait PubSub: Send + Sync {
    async fn publish (&self, topic: &str, payload: String)->Result<()>;

    /// start receiving messages for `topic` on the inbound channel of this transport
    async fn subscribe (&self, topic: &str)->Result<()>;
}

type Subscriptions = Arc<Mutex<HashSet<String>>>;

fn is_subscribed (subscriptions: &Subscriptions, topic: &str)->bool {
    subscriptions.lock().map( |subs| subs.contains( topic)).unwrap_or(false)
}

/// in-process transport. The [`ChannelEndpoint`] is the remote side that sees everything published
/// and can deliver messages to subscribed topics
pub struct ChannelPubSub {
    out_tx: Sender<OutboundMsg>,
    subscriptions: Subscriptions,
}

pub struct ChannelEndpoint {
    out_rx: Receiver<OutboundMsg>,
    in_tx: Sender<InboundMsg>,
    subscriptions: Subscriptions,
}

/// create a connected in-process transport, its remote endpoint and the inbound channel receiver
pub fn channel_pubsub (capacity: usize)->(ChannelPubSub, ChannelEndpoint, Receiver<InboundMsg>) {
    let (out_tx, out_rx) = mpsc::channel( capacity);
    let (in_tx, in_rx) = mpsc::channel( capacity);
    let subscriptions: Subscriptions = Arc::new( Mutex::new( HashSet::new()));

    let pubsub = ChannelPubSub { out_tx, subscriptions: subscriptions.clone() };
    let endpoint = ChannelEndpoint { out_rx, in_tx, subscriptions };
    (pubsub, endpoint, in_rx)
}

#[async_trait]
impl PubSub for ChannelPubSub {
    async fn publish (&self, topic: &str, payload: String)->Result<()> {
        let msg = OutboundMsg { topic: topic.to_string(), payload };
        self.out_tx.send( msg).await.map_err( |_| op_failed!("endpoint closed"))
    }

    async fn subscribe (&self, topic: &str)->Result<()> {
        let mut subs = self.subscriptions.lock().map_err( |_| op_failed!("subscriptions poisoned"))?;
        subs.insert( topic.to_string());
        Ok(())
    }
}

impl ChannelEndpoint {
    /// deliver a message to the tracker side. Returns false if nobody subscribed to `topic`
    pub async fn deliver (&self, topic: &str, payload: &str)->bool {
        if is_subscribed( &self.subscriptions, topic) {
            let msg = InboundMsg { topic: topic.to_string(), payload: payload.to_string() };
            self.in_tx.send( msg).await.is_ok()
        } else {
            false
        }
    }

    pub fn is_subscribed (&self, topic: &str)->bool { is_subscribed( &self.subscriptions, topic) }

    /// the next published message, `None` if the transport was dropped
    pub async fn recv (&mut self)->Option<OutboundMsg> { self.out_rx.recv().await }

    pub fn try_recv (&mut self)->Option<OutboundMsg> { self.out_rx.try_recv().ok() }
}
