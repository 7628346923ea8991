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

use std::{sync::Arc, time::Duration};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::oneshot, time::timeout};
use tokio_tungstenite::{accept_async, tungstenite::protocol::Message};
use tokio_util::sync::CancellationToken;
use odin_ptz::{
    config::{CameraPosition, PtzConfig},
    pubsub::PubSub,
    registry::NoRegistry,
    service::spawn_tracker,
    ws_pubsub::{parse_envelope, WsPubSub}
};

// run with "cargo test --test test_ws_pubsub -- --nocapture"

#[test]
fn test_envelope () {
    let msg = parse_envelope( r#"{"topic":"skyscan/config/json","payload":{"minElevation":5}}"#).unwrap();
    assert_eq!( msg.topic, "skyscan/config/json");
    let payload: Value = serde_json::from_str( &msg.payload).unwrap();
    assert_eq!( payload["minElevation"], 5);

    // string payloads are passed through
    let msg = parse_envelope( r#"{"topic":"t","payload":"{\"lat\":1}"}"#).unwrap();
    assert_eq!( msg.payload, r#"{"lat":1}"#);

    assert!( parse_envelope( "no json").is_none());
    assert!( parse_envelope( r#"{"payload":1}"#).is_none());
}

#[tokio::test]
async fn test_ws_roundtrip () {
    println!("\n--- test_ws_roundtrip");
    let listener = TcpListener::bind( "127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // minimal broker: wait for a subscription, push one message and echo the first published one
    let server = tokio::spawn( async move {
        let (sock, _) = listener.accept().await.unwrap();
        let mut ws = accept_async( sock).await.unwrap();
        let mut published = None;
        let mut pushed = false;

        while let Some(Ok(msg)) = ws.next().await {
            let Message::Text(text) = msg else { continue };
            let v: Value = serde_json::from_str( text.as_str()).unwrap();
            println!("server got: {v}");

            if v.get("subscribe").is_some() {
                if !pushed {
                    let env = json!({"topic": "skyscan/egi", "payload": {"lat": 37.0, "lon": -122.0, "alt": 10.0}});
                    ws.send( Message::text( env.to_string())).await.unwrap();
                    pushed = true;
                }
            } else {
                published = Some(v);
                break
            }
        }
        published
    });

    let cancel = CancellationToken::new();
    let (pubsub, mut inbound, task) = WsPubSub::spawn( format!("ws://{addr}"), Duration::from_millis(50), 16, cancel.clone());
    pubsub.subscribe( "skyscan/egi").await.unwrap();

    let msg = timeout( Duration::from_secs(5), inbound.recv()).await.unwrap().unwrap();
    println!("client got: {msg:?}");
    assert_eq!( msg.topic, "skyscan/egi");
    let camera: Value = serde_json::from_str( &msg.payload).unwrap();
    assert_eq!( camera["alt"], 10.0);

    pubsub.publish( "skyscan/flight/json", "{}".to_string()).await.unwrap();
    let published = timeout( Duration::from_secs(5), server).await.unwrap().unwrap().unwrap();
    assert_eq!( published["topic"], "skyscan/flight/json");
    assert_eq!( published["payload"], json!({}));

    cancel.cancel();
    timeout( Duration::from_secs(2), task).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_closes_websocket () {
    println!("\n--- test_shutdown_closes_websocket");
    let listener = TcpListener::bind( "127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (subscribed_tx, subscribed_rx) = oneshot::channel();

    // report if the client sent a close frame before the stream ended
    let server = tokio::spawn( async move {
        let (sock, _) = listener.accept().await.unwrap();
        let mut ws = accept_async( sock).await.unwrap();
        let mut subscribed_tx = Some(subscribed_tx);

        while let Some(Ok(msg)) = ws.next().await {
            match msg {
                Message::Close(_) => return true,
                Message::Text(text) if text.as_str().contains("subscribe") => {
                    if let Some(tx) = subscribed_tx.take() { let _ = tx.send(()); }
                }
                _ => {}
            }
        }
        false
    });

    let feed_port = { // nobody listens on this one
        let l = TcpListener::bind( "127.0.0.1:0").await.unwrap();
        l.local_addr().unwrap().port()
    };
    let mut config = PtzConfig::new( "127.0.0.1", Some( CameraPosition::new( 37.0, -122.0, 0.0)));
    config.feed_port = feed_port;

    let cancel = CancellationToken::new();
    let (pubsub, inbound, task) = WsPubSub::spawn( format!("ws://{addr}"), Duration::from_millis(50), 16, cancel.clone());
    let mut handle = spawn_tracker( &config, None, Arc::new(NoRegistry), Arc::new(pubsub), inbound, cancel).unwrap();
    handle.add_task( task);

    timeout( Duration::from_secs(5), subscribed_rx).await.unwrap().unwrap();
    timeout( Duration::from_secs(5), handle.shutdown()).await.unwrap();

    let got_close = timeout( Duration::from_secs(2), server).await.unwrap().unwrap();
    assert!( got_close);
}
