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

use std::{sync::{Arc,Mutex}, time::Duration};
use async_trait::async_trait;
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::{Serialize,Deserialize};
use serde_json::Value;
use tokio::{select, net::TcpStream, sync::mpsc::{self,Receiver,Sender,error::TrySendError}, task::JoinHandle, time::sleep};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream, tungstenite::protocol::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug,info,warn,error};
use crate::{errors::{OdinPtzError, Result, op_failed}, pubsub::{InboundMsg, PubSub}};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// the JSON envelope for published and received messages
#[derive(Serialize,Deserialize,Debug)]
struct Envelope {
    topic: String,
    payload: Value,
}

#[derive(Serialize,Debug)]
struct SubscribeRequest<'a> {
    subscribe: &'a str
}

/// websocket pub/sub client. Messages are exchanged as `{"topic":..,"payload":..}` text frames, subscriptions
/// are requested with `{"subscribe":topic}` and re-sent after each reconnect.
///
/// Publishing does not wait for the connection: if the outbound queue is full (e.g. while reconnecting)
/// messages are dropped since a newer target state will follow
pub struct WsPubSub {
    out_tx: Sender<String>,
    subscriptions: Arc<Mutex<Vec<String>>>,
}

impl WsPubSub {
    /// create the client and spawn its connection task, which runs until `cancel` is triggered
    pub fn spawn (url: String, reconnect_delay: Duration, queue_len: usize, cancel: CancellationToken)->(WsPubSub, Receiver<InboundMsg>, JoinHandle<()>) {
        let (out_tx, out_rx) = mpsc::channel( queue_len);
        let (in_tx, in_rx) = mpsc::channel( queue_len);
        let subscriptions = Arc::new( Mutex::new( Vec::new()));

        let task = tokio::spawn( ws_loop( url, reconnect_delay, out_rx, in_tx, subscriptions.clone(), cancel));
        (WsPubSub { out_tx, subscriptions }, in_rx, task)
    }

    fn enqueue (&self, msg: String)->Result<()> {
        match self.out_tx.try_send( msg) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => { debug!("websocket queue full, message dropped"); Ok(()) }
            Err(TrySendError::Closed(_)) => Err( OdinPtzError::WsError( "websocket task terminated".to_string()))
        }
    }
}

#[async_trait]
impl PubSub for WsPubSub {
    async fn publish (&self, topic: &str, payload: String)->Result<()> {
        // payloads that are JSON are embedded as values, everything else as a string
        let payload = serde_json::from_str::<Value>( &payload).unwrap_or( Value::String( payload));
        let msg = serde_json::to_string( &Envelope { topic: topic.to_string(), payload })?;
        self.enqueue( msg)
    }

    async fn subscribe (&self, topic: &str)->Result<()> {
        {
            let mut subs = self.subscriptions.lock().map_err( |_| op_failed!("subscriptions poisoned"))?;
            if subs.iter().any( |t| t == topic) { return Ok(()) }
            subs.push( topic.to_string());
        }
        self.enqueue( serde_json::to_string( &SubscribeRequest { subscribe: topic })?)
    }
}

async fn ws_loop (url: String, reconnect_delay: Duration, mut out_rx: Receiver<String>, in_tx: Sender<InboundMsg>,
                  subscriptions: Arc<Mutex<Vec<String>>>, cancel: CancellationToken) {
    let mut has_nagged = false;

    loop {
        let res = select! {
            res = connect_async( url.as_str()) => res,
            _ = cancel.cancelled() => return
        };

        match res {
            Ok((mut ws, _)) => {
                info!("websocket connected to {}", url);
                has_nagged = false;

                if let Err(e) = send_subscriptions( &mut ws, &subscriptions).await {
                    warn!("failed to send subscriptions: {}", e);
                } else {
                    loop {
                        select! { // all awaited futures are cancellation safe
                            maybe_msg = ws.next() => {
                                match maybe_msg {
                                    Some(Ok(Message::Text(text))) => {
                                        if let Some(msg) = parse_envelope( text.as_str()) {
                                            if in_tx.send( msg).await.is_err() { return } // nobody listening anymore
                                        }
                                    }
                                    Some(Ok(Message::Close(_))) | None => {
                                        warn!("server closed websocket, trying to reconnect..");
                                        break
                                    }
                                    Some(Ok(_)) => {} // ping/pong and binary frames are ignored
                                    Some(Err(e)) => {
                                        warn!("reconnecting after failed websocket read: {}", e);
                                        break
                                    }
                                }
                            }
                            maybe_out = out_rx.recv() => {
                                match maybe_out {
                                    Some(text) => {
                                        if let Err(e) = ws.send( Message::text( text)).await {
                                            warn!("failed to write to websocket: {}", e);
                                            break
                                        }
                                    }
                                    None => return // all senders dropped, nominal termination
                                }
                            }
                            _ = cancel.cancelled() => {
                                let _ = ws.close( None).await;
                                return
                            }
                        }
                    }
                }
            }
            Err(e) => {
                if !has_nagged {
                    error!("websocket connect to {} failed, retrying: {}", url, e);
                    has_nagged = true;
                }
            }
        }

        select! {
            _ = sleep( reconnect_delay) => {}
            _ = cancel.cancelled() => return
        }
    }
}

async fn send_subscriptions (ws: &mut WsStream, subscriptions: &Arc<Mutex<Vec<String>>>)->Result<()> {
    let topics: Vec<String> = subscriptions.lock().map( |subs| subs.clone()).unwrap_or_default();
    for topic in &topics {
        let req = serde_json::to_string( &SubscribeRequest { subscribe: topic })?;
        ws.send( Message::text( req)).await.map_err( |e| OdinPtzError::WsError( e.to_string()))?;
    }
    Ok(())
}

/// turn a received text frame into an inbound message. String payloads are passed through as is,
/// structured payloads are re-serialized
pub fn parse_envelope (text: &str)->Option<InboundMsg> {
    match serde_json::from_str::<Envelope>( text) {
        Ok(env) => {
            let payload = match env.payload {
                Value::String(s) => s,
                other => other.to_string()
            };
            Some( InboundMsg { topic: env.topic, payload })
        }
        Err(e) => {
            warn!("ignoring malformed websocket message: {}", e);
            None
        }
    }
}
