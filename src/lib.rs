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

use crate::context::{Context, Options};
use crate::hosted::KubeconfigConnector;
use crate::reconcile::{error_policy, reconcile_hcp};
use crate::types::v1alpha1::hosted_control_plane::HostedControlPlane;
use futures::StreamExt;
use kube::runtime::{Controller, watcher};
use kube::{Api, Client};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

pub mod context;
pub mod hosted;
pub mod kubeconfig;
pub mod manifests;
pub mod reconcile;
pub mod types;
pub mod upsert;

#[cfg(test)]
mod tests;

pub async fn run(
    options: Options,
    connector: KubeconfigConnector,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let client = Client::try_default().await?;
    let hcp_client = Api::<HostedControlPlane>::all(client.clone());

    info!(
        "starting node bootstrapper, kubeconfig key {:?}, resync every {:?}",
        options.kubeconfig_key, options.resync_interval
    );

    let context = Context::new(client, connector, options);
    Controller::new(hcp_client, watcher::Config::default())
        .run(reconcile_hcp, error_policy, Arc::new(context))
        .for_each(|res| async move {
            match res {
                Ok((hcp, _)) => debug!("reconciled successful, object {:?}", hcp.name),
                Err(e) => warn!("reconcile failed: {}", e),
            }
        })
        .await;

    Ok(())
}
