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

//! Maintains the `bootstrap-kubeconfig` secret that kubelets of a hosted
//! cluster use for their client certificate signing request.
//!
//! The admin kubeconfig of the hosted cluster is read from the management
//! cluster and used to create, on the hosted cluster, a `node-bootstrapper`
//! service account bound to `system:node-bootstrapper` together with a token
//! secret. Once the hosted cluster has issued the token, a kubeconfig carrying
//! it is written back to the management cluster.

use crate::hosted::{self, Connector};
use crate::kubeconfig;
use crate::manifests::{
    self, KUBECONFIG_KEY, KUBECONFIG_LABEL, KUBECONFIG_LABEL_BOOTSTRAP,
    MACHINE_CONFIG_OPERATOR_NAMESPACE, SERVICE_ACCOUNT_ROOT_CA_KEY, SERVICE_ACCOUNT_TOKEN_KEY,
};
use crate::reconcile::service_account::check_and_create_service_account;
use crate::types;
use crate::types::v1alpha1::hosted_control_plane::HostedControlPlane;
use crate::upsert::{self, OperationResult, create_or_update};
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1 as corev1;
use kube::{Api, Client, ResourceExt};
use snafu::futures::TryFutureExt;
use snafu::{OptionExt, ResultExt, Snafu};
use std::collections::BTreeMap;
use tracing::{debug, info};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(transparent)]
    Types { source: types::error::Error },

    #[snafu(display("hosted control plane kubeconfig secret is not generated"))]
    KubeconfigNotGenerated,

    #[snafu(display("failed to get hosted control plane kubeconfig secret {name:?}: {source}"))]
    GetAdminKubeconfig { name: String, source: kube::Error },

    #[snafu(display("hosted control plane kubeconfig secret {name:?} has no {key:?} key"))]
    MissingAdminKubeconfig { name: String, key: String },

    #[snafu(display(
        "failed to load hosted control plane kubeconfig from secret {name:?}: {source}"
    ))]
    LoadAdminKubeconfig {
        name: String,
        source: kubeconfig::Error,
    },

    #[snafu(display("failed to create hosted control plane client from secret {name:?}: {source}"))]
    HostedClient { name: String, source: hosted::Error },

    #[snafu(display("failed to reconcile {resource}: {source}"))]
    Reconcile {
        resource: &'static str,
        source: upsert::Error,
    },

    #[snafu(display("failed to get bootstrapper service account token secret {name:?}: {source}"))]
    GetTokenSecret { name: String, source: kube::Error },

    #[snafu(display("bootstrapper service account token secret {name:?} has not been issued yet"))]
    TokenNotIssued { name: String },

    #[snafu(display("hosted control plane has no api server endpoint host"))]
    MissingEndpoint,

    #[snafu(display("failed to generate kubeconfig from secret {name:?}: {source}"))]
    GenerateKubeconfig {
        name: String,
        source: kubeconfig::Error,
    },
}

impl Error {
    /// The hosted control plane or the hosted cluster has not caught up yet;
    /// retrying the whole pass later is expected to succeed.
    pub fn is_not_ready(&self) -> bool {
        matches!(
            self,
            Error::KubeconfigNotGenerated | Error::TokenNotIssued { .. } | Error::MissingEndpoint
        )
    }
}

/// Converges the bootstrap kubeconfig of `hcp` in one pass.
///
/// Every step is an idempotent upsert, so a pass that failed halfway is
/// completed by simply running it again. Returns what happened to the
/// bootstrap kubeconfig secret on the management cluster.
pub async fn reconcile_bootstrap_kubeconfig<C: Connector>(
    management: &Client,
    connector: &C,
    hcp: &HostedControlPlane,
    kubeconfig_key: &str,
) -> Result<OperationResult, Error> {
    if hcp.kubeconfig_ref().is_none() {
        return KubeconfigNotGeneratedSnafu.fail();
    }
    let namespace = hcp.namespace()?;
    let secrets: Api<corev1::Secret> = Api::namespaced(management.clone(), &namespace);

    let admin_name = manifests::admin_kubeconfig_secret(&namespace).name_any();
    let admin_secret = secrets
        .get(&admin_name)
        .context(GetAdminKubeconfigSnafu { name: &admin_name })
        .await?;
    let admin_kubeconfig = admin_secret
        .data
        .as_ref()
        .and_then(|data| data.get(KUBECONFIG_KEY))
        .context(MissingAdminKubeconfigSnafu {
            name: &admin_name,
            key: KUBECONFIG_KEY,
        })?;
    let admin_kubeconfig =
        kubeconfig::load(&admin_kubeconfig.0).context(LoadAdminKubeconfigSnafu { name: &admin_name })?;
    let hosted = connector
        .connect(admin_kubeconfig)
        .context(HostedClientSnafu { name: &admin_name })
        .await?;

    let token_secret =
        check_and_create_service_account(&hosted, MACHINE_CONFIG_OPERATOR_NAMESPACE).await?;

    // The secret data is filled in asynchronously by the hosted cluster, read
    // it back rather than trusting the write response.
    let token_name = token_secret.name_any();
    let hosted_secrets: Api<corev1::Secret> =
        Api::namespaced(hosted.clone(), MACHINE_CONFIG_OPERATOR_NAMESPACE);
    let token_secret = hosted_secrets
        .get(&token_name)
        .context(GetTokenSecretSnafu { name: &token_name })
        .await?;
    let data = token_secret.data.as_ref();
    let (Some(ca_data), Some(token)) = (
        data.and_then(|d| d.get(SERVICE_ACCOUNT_ROOT_CA_KEY)),
        data.and_then(|d| d.get(SERVICE_ACCOUNT_TOKEN_KEY)),
    ) else {
        return TokenNotIssuedSnafu { name: token_name }.fail();
    };

    let api_server_url = hcp.api_server_url().context(MissingEndpointSnafu)?;
    debug!("generating bootstrap kubeconfig for {api_server_url}");
    let (kubeconfig_data, _) = kubeconfig::assemble(&api_server_url, &ca_data.0, &token.0)
        .context(GenerateKubeconfigSnafu { name: &token_name })?;

    let (secret, result) = create_or_update(
        &secrets,
        manifests::bootstrap_kubeconfig_secret(&namespace),
        |secret| reconcile_bootstrap_kubeconfig_secret(secret, &kubeconfig_data, kubeconfig_key),
    )
    .context(ReconcileSnafu {
        resource: "bootstrapper kubeconfig",
    })
    .await?;

    if result.changed() {
        info!("bootstrap kubeconfig {}/{} {result}", namespace, secret.name_any());
    } else {
        debug!("bootstrap kubeconfig {}/{} up to date", namespace, secret.name_any());
    }

    Ok(result)
}

pub(crate) fn reconcile_bootstrap_kubeconfig_secret(
    secret: &mut corev1::Secret,
    kubeconfig_data: &[u8],
    key: &str,
) {
    let key = if key.is_empty() { KUBECONFIG_KEY } else { key };

    secret
        .metadata
        .labels
        .get_or_insert_with(BTreeMap::new)
        .insert(
            KUBECONFIG_LABEL.to_owned(),
            KUBECONFIG_LABEL_BOOTSTRAP.to_owned(),
        );
    secret
        .data
        .get_or_insert_with(BTreeMap::new)
        .insert(key.to_owned(), ByteString(kubeconfig_data.to_vec()));
}
