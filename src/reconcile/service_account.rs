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

use crate::manifests::{
    self, BOOTSTRAP_CLUSTER_ROLE_NAME, SERVICE_ACCOUNT_NAME_ANNOTATION,
    SERVICE_ACCOUNT_TOKEN_SECRET_TYPE,
};
use crate::reconcile::bootstrap_kubeconfig::{Error, ReconcileSnafu};
use crate::upsert::{create_or_patch, create_or_update};
use k8s_openapi::Resource as _;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::api::rbac::v1 as rbacv1;
use kube::{Api, Client, ResourceExt};
use snafu::futures::TryFutureExt;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Makes sure the node bootstrapper service account exists in `namespace` on
/// the hosted cluster, is bound to the node bootstrapper cluster role and owns
/// a token secret. Returns the token secret as written.
pub async fn check_and_create_service_account(
    hosted: &Client,
    namespace: &str,
) -> Result<corev1::Secret, Error> {
    let namespaces: Api<corev1::Namespace> = Api::all(hosted.clone());
    let (_, result) = create_or_update(
        &namespaces,
        manifests::bootstrap_machine_config_namespace(namespace),
        |_| {},
    )
    .context(ReconcileSnafu {
        resource: "machine-config-operator namespace",
    })
    .await?;
    debug!("namespace {namespace}: {result}");

    let service_accounts: Api<corev1::ServiceAccount> = Api::namespaced(hosted.clone(), namespace);
    let (sa, result) = create_or_update(
        &service_accounts,
        manifests::bootstrap_service_account(namespace),
        |_| {},
    )
    .context(ReconcileSnafu {
        resource: "node bootstrapper service account",
    })
    .await?;
    debug!("service account {}/{}: {result}", namespace, sa.name_any());

    let role = manifests::bootstrap_cluster_role();
    let bindings: Api<rbacv1::ClusterRoleBinding> = Api::all(hosted.clone());
    let (_, result) = create_or_update(
        &bindings,
        manifests::bootstrap_cluster_role_binding(),
        |binding| reconcile_bootstrap_cluster_role_binding(binding, &role, &sa),
    )
    .context(ReconcileSnafu {
        resource: "bootstrapper role binding",
    })
    .await?;
    if result.changed() {
        info!("cluster role binding {BOOTSTRAP_CLUSTER_ROLE_NAME} {result}");
    }

    // The token controller fills in the secret data after creation, so only
    // the fields owned here are patched.
    let secrets: Api<corev1::Secret> = Api::namespaced(hosted.clone(), namespace);
    let (token_secret, result) = create_or_patch(
        &secrets,
        manifests::bootstrap_service_account_token_secret(namespace),
        |secret| reconcile_bootstrap_token_secret(secret, &sa),
    )
    .context(ReconcileSnafu {
        resource: "bootstrapper service account token secret",
    })
    .await?;
    debug!("token secret {}/{}: {result}", namespace, token_secret.name_any());

    Ok(token_secret)
}

pub(crate) fn reconcile_bootstrap_cluster_role_binding(
    binding: &mut rbacv1::ClusterRoleBinding,
    role: &rbacv1::ClusterRole,
    sa: &corev1::ServiceAccount,
) {
    binding.role_ref = rbacv1::RoleRef {
        api_group: rbacv1::ClusterRole::GROUP.to_owned(),
        kind: rbacv1::ClusterRole::KIND.to_owned(),
        name: role.name_any(),
    };
    binding.subjects = Some(vec![rbacv1::Subject {
        kind: corev1::ServiceAccount::KIND.to_owned(),
        name: sa.name_any(),
        namespace: sa.namespace(),
        ..Default::default()
    }]);
}

pub(crate) fn reconcile_bootstrap_token_secret(
    secret: &mut corev1::Secret,
    sa: &corev1::ServiceAccount,
) {
    secret
        .metadata
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(SERVICE_ACCOUNT_NAME_ANNOTATION.to_owned(), sa.name_any());
    secret.type_ = Some(SERVICE_ACCOUNT_TOKEN_SECRET_TYPE.to_owned());
}
