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

use crate::types;
use crate::types::error::NoNamespaceSnafu;
use kube::{CustomResource, KubeSchema, ResourceExt};
use serde::{Deserialize, Serialize};
use snafu::OptionExt;
use std::net::Ipv6Addr;

/// The hosted control plane as seen from the management cluster.
///
/// Only the status fields consumed by the node bootstrapper are modelled; unknown
/// fields written by the control plane controller are ignored on deserialization.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, KubeSchema, Default)]
#[kube(
    group = "hypershift.openshift.io",
    version = "v1alpha1",
    kind = "HostedControlPlane",
    namespaced,
    status = "HostedControlPlaneStatus",
    plural = "hostedcontrolplanes",
    singular = "hostedcontrolplane",
    crates(serde_json = "k8s_openapi::serde_json")
)]
#[serde(rename_all = "camelCase")]
pub struct HostedControlPlaneSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_image: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, KubeSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HostedControlPlaneStatus {
    /// Reference to the admin kubeconfig of the hosted cluster. Unset until the
    /// control plane controller has generated it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_config: Option<KubeconfigSecretRef>,

    #[serde(default)]
    pub control_plane_endpoint: ApiEndpoint,
}

#[derive(Deserialize, Serialize, Clone, Debug, KubeSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KubeconfigSecretRef {
    pub name: String,
    pub key: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, KubeSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiEndpoint {
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub port: i32,
}

impl HostedControlPlane {
    pub fn namespace(&self) -> Result<String, types::error::Error> {
        ResourceExt::namespace(self).context(NoNamespaceSnafu)
    }

    pub fn name(&self) -> String {
        ResourceExt::name_any(self)
    }

    pub fn kubeconfig_ref(&self) -> Option<&KubeconfigSecretRef> {
        self.status.as_ref().and_then(|s| s.kube_config.as_ref())
    }

    pub fn control_plane_endpoint(&self) -> Option<&ApiEndpoint> {
        self.status.as_ref().map(|s| &s.control_plane_endpoint)
    }

    /// The kube-apiserver URL advertised to nodes, or `None` while the endpoint
    /// host has not been published.
    pub fn api_server_url(&self) -> Option<String> {
        self.control_plane_endpoint()
            .filter(|endpoint| !endpoint.host.is_empty())
            .map(|endpoint| api_server_url(&endpoint.host, endpoint.port))
    }
}

pub fn api_server_url(host: &str, port: i32) -> String {
    if host.parse::<Ipv6Addr>().is_ok() {
        format!("https://[{host}]:{port}")
    } else {
        format!("https://{host}:{port}")
    }
}
