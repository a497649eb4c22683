// Copyright 2025 The node-bootstrapper Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use clap::{Args, Parser, Subcommand};
use node_bootstrapper::context::Options;
use node_bootstrapper::hosted::KubeconfigConnector;
use node_bootstrapper::manifests::KUBECONFIG_KEY;
use node_bootstrapper::run;
use shadow_rs::shadow;
use std::time::Duration;

shadow!(build);

#[derive(Parser)]
#[command(name = "node-bootstrapper")]
#[command(about = "Provisions node bootstrap kubeconfigs for hosted control planes", long_about = None)]
#[command(version = build::PKG_VERSION, long_version = build::CLAP_LONG_VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the controller
    Server(ServerArgs),
}

#[derive(Args)]
struct ServerArgs {
    /// Data key of the bootstrap kubeconfig secret.
    #[arg(long, default_value = KUBECONFIG_KEY)]
    kubeconfig_key: String,

    #[arg(long, default_value_t = 300)]
    resync_seconds: u64,

    /// Requeue delay while the hosted cluster has not issued its token yet.
    #[arg(long, default_value_t = 10)]
    not_ready_requeue_seconds: u64,

    #[arg(long, default_value_t = 5)]
    error_requeue_seconds: u64,

    /// Hosted API server connect timeout.
    #[arg(long, default_value_t = 5)]
    connect_timeout_seconds: u64,

    #[arg(long, default_value_t = 30)]
    read_timeout_seconds: u64,
}

impl ServerArgs {
    fn options(&self) -> Options {
        Options {
            kubeconfig_key: self.kubeconfig_key.clone(),
            resync_interval: Duration::from_secs(self.resync_seconds),
            not_ready_requeue: Duration::from_secs(self.not_ready_requeue_seconds),
            error_requeue: Duration::from_secs(self.error_requeue_seconds),
        }
    }

    fn connector(&self) -> KubeconfigConnector {
        KubeconfigConnector {
            connect_timeout: Duration::from_secs(self.connect_timeout_seconds),
            read_timeout: Duration::from_secs(self.read_timeout_seconds),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => run(args.options(), args.connector()).await?,
    }

    Ok(())
}
