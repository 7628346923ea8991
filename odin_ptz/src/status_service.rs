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

use std::net::SocketAddr;
use axum::{Json, Router, extract::State, routing::get};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use crate::{errors::Result, tracker::{StatusSnapshot, Tracker}};

/// read-only HTTP view of the tracker: `GET /status` returns the [`StatusSnapshot`] as JSON
pub fn status_router (tracker: Tracker)->Router {
    Router::new()
        .route( "/status", get( get_status))
        .with_state( tracker)
}

async fn get_status (State(tracker): State<Tracker>)->Json<StatusSnapshot> {
    Json( tracker.snapshot())
}

pub async fn serve_status (addr: SocketAddr, tracker: Tracker, cancel: CancellationToken)->Result<()> {
    let listener = TcpListener::bind( addr).await?;
    info!("serving tracker status on http://{}/status", listener.local_addr()?);

    axum::serve( listener, status_router( tracker))
        .with_graceful_shutdown( async move { cancel.cancelled().await })
        .await?;
    Ok(())
}
