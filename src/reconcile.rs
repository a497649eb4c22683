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

use crate::context::Context;
use crate::hosted::Connector;
use crate::types::v1alpha1::hosted_control_plane::HostedControlPlane;
use crate::upsert::OperationResult;
use crate::{context, types};
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use snafu::Snafu;
use std::sync::Arc;
use tracing::{debug, error};

pub mod bootstrap_kubeconfig;
pub mod service_account;

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(transparent)]
    Context { source: context::Error },

    #[snafu(transparent)]
    Types { source: types::error::Error },

    #[snafu(transparent)]
    BootstrapKubeconfig { source: bootstrap_kubeconfig::Error },
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Context { source } if source.is_not_found())
    }

    pub fn is_not_ready(&self) -> bool {
        matches!(self, Error::BootstrapKubeconfig { source } if source.is_not_ready())
    }
}

pub async fn reconcile_hcp<C: Connector>(
    hcp: Arc<HostedControlPlane>,
    ctx: Arc<Context<C>>,
) -> Result<Action, Error> {
    let ns = hcp.namespace()?;
    let latest_hcp = ctx.get::<HostedControlPlane>(&hcp.name(), &ns).await?;

    if latest_hcp.metadata.deletion_timestamp.is_some() {
        debug!(
            "hosted control plane {} is deleted, deletion_timestamp is {:?}",
            hcp.name(),
            latest_hcp.metadata.deletion_timestamp
        );
        return Ok(Action::await_change());
    }

    let result = bootstrap_kubeconfig::reconcile_bootstrap_kubeconfig(
        &ctx.client,
        &ctx.connector,
        &latest_hcp,
        &ctx.options.kubeconfig_key,
    )
    .await?;

    let reason = match result {
        OperationResult::Created => Some("BootstrapKubeconfigCreated"),
        OperationResult::Updated => Some("BootstrapKubeconfigUpdated"),
        OperationResult::Unchanged => None,
    };
    if let Some(reason) = reason {
        ctx.record(
            &latest_hcp,
            EventType::Normal,
            reason,
            &format!("bootstrap kubeconfig {result}"),
        )
        .await?;
    }

    Ok(Action::requeue(ctx.options.resync_interval))
}

pub fn error_policy<C>(hcp: Arc<HostedControlPlane>, error: &Error, ctx: Arc<Context<C>>) -> Action {
    if error.is_not_found() {
        return Action::await_change();
    }

    if error.is_not_ready() {
        debug!("hosted control plane {} not ready: {}", hcp.name(), error);
        return Action::requeue(ctx.options.not_ready_requeue);
    }

    error!("error_policy: {:?}", error);
    Action::requeue(ctx.options.error_requeue)
}
