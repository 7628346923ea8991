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

use std::time::Duration;
use anyhow::Result;
use chrono_tz::Tz;
use clap::Parser;
use tokio;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use odin_ptz::{reader::SbsReader, sbs::parse_msg};

#[derive(Parser, Debug)]
#[command(version, about, long_about = "ADS-B SBS feed monitoring tool")]
pub struct Args {
    /// timezone of message source
    #[arg(long, default_value = "UTC")]
    pub tz: String,

    /// print lines that could not be parsed
    #[arg(short,long)]
    pub errors: bool,

    pub host: String,

    #[arg(default_value_t = 30003)]
    pub port: u16,
}

#[tokio::main]
async fn main()->Result<()> {
    tracing_subscriber::fmt().with_env_filter( EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let tz: Tz = args.tz.parse()?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn( async move {
            if tokio::signal::ctrl_c().await.is_ok() { cancel.cancel() }
        });
    }

    let mut reader = SbsReader::new( &args.host, args.port, Duration::from_secs(60), Duration::from_secs(5));

    while !cancel.is_cancelled() {
        if !reader.connect( &cancel).await { continue }

        let maybe_line = tokio::select! {
            line = reader.next_line() => line,
            _ = cancel.cancelled() => break
        };

        if let Some(line) = maybe_line {
            match parse_msg( &line, &tz) {
                Ok(Some(report)) => println!("{report}"),
                Ok(None) => {}
                Err(e) => if args.errors { println!("PARSE ERROR for {line}: {e}") }
            }
        }
    }
    reader.close();

    Ok(())
}
