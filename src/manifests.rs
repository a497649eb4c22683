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

//! Identity-only skeletons of the objects the node bootstrapper manages.
//!
//! Every name here is fixed, so each reconcile pass targets the same objects
//! on both clusters.

use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::api::rbac::v1 as rbacv1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;

/// Secret in the hosted control plane namespace holding the admin kubeconfig.
pub const ADMIN_KUBECONFIG_SECRET_NAME: &str = "service-network-admin-kubeconfig";

/// Data key of both the admin kubeconfig and, by default, the bootstrap kubeconfig.
pub const KUBECONFIG_KEY: &str = "kubeconfig";

pub const MACHINE_CONFIG_OPERATOR_NAMESPACE: &str = "openshift-machine-config-operator";

pub const BOOTSTRAP_SERVICE_ACCOUNT_NAME: &str = "node-bootstrapper";

pub const BOOTSTRAP_CLUSTER_ROLE_NAME: &str = "system:node-bootstrapper";

pub const BOOTSTRAP_TOKEN_SECRET_NAME: &str = "node-bootstrapper-token";

pub const BOOTSTRAP_KUBECONFIG_SECRET_NAME: &str = "bootstrap-kubeconfig";

pub const KUBECONFIG_LABEL: &str = "hypershift.openshift.io/kubeconfig";

pub const KUBECONFIG_LABEL_BOOTSTRAP: &str = "bootstrap";

pub const SERVICE_ACCOUNT_NAME_ANNOTATION: &str = "kubernetes.io/service-account.name";

pub const SERVICE_ACCOUNT_TOKEN_SECRET_TYPE: &str = "kubernetes.io/service-account-token";

pub const SERVICE_ACCOUNT_ROOT_CA_KEY: &str = "ca.crt";

pub const SERVICE_ACCOUNT_TOKEN_KEY: &str = "token";

fn object_meta(name: &str, namespace: Option<&str>) -> metav1::ObjectMeta {
    metav1::ObjectMeta {
        name: Some(name.to_owned()),
        namespace: namespace.map(str::to_owned),
        ..Default::default()
    }
}

pub fn admin_kubeconfig_secret(namespace: &str) -> corev1::Secret {
    corev1::Secret {
        metadata: object_meta(ADMIN_KUBECONFIG_SECRET_NAME, Some(namespace)),
        ..Default::default()
    }
}

pub fn bootstrap_machine_config_namespace(name: &str) -> corev1::Namespace {
    corev1::Namespace {
        metadata: object_meta(name, None),
        ..Default::default()
    }
}

pub fn bootstrap_service_account(namespace: &str) -> corev1::ServiceAccount {
    corev1::ServiceAccount {
        metadata: object_meta(BOOTSTRAP_SERVICE_ACCOUNT_NAME, Some(namespace)),
        ..Default::default()
    }
}

pub fn bootstrap_cluster_role() -> rbacv1::ClusterRole {
    rbacv1::ClusterRole {
        metadata: object_meta(BOOTSTRAP_CLUSTER_ROLE_NAME, None),
        ..Default::default()
    }
}

pub fn bootstrap_cluster_role_binding() -> rbacv1::ClusterRoleBinding {
    rbacv1::ClusterRoleBinding {
        metadata: object_meta(BOOTSTRAP_CLUSTER_ROLE_NAME, None),
        ..Default::default()
    }
}

pub fn bootstrap_service_account_token_secret(namespace: &str) -> corev1::Secret {
    corev1::Secret {
        metadata: object_meta(BOOTSTRAP_TOKEN_SECRET_NAME, Some(namespace)),
        ..Default::default()
    }
}

pub fn bootstrap_kubeconfig_secret(namespace: &str) -> corev1::Secret {
    corev1::Secret {
        metadata: object_meta(BOOTSTRAP_KUBECONFIG_SECRET_NAME, Some(namespace)),
        ..Default::default()
    }
}
