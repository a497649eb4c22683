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

//! Kubeconfig handling: loading the hosted cluster's admin kubeconfig and
//! assembling the token based bootstrap kubeconfig handed to kubelets.

use base64::{Engine, engine::general_purpose::STANDARD};
use kube::config::{Kubeconfig, KubeconfigError};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use std::collections::BTreeMap;

pub const CLUSTER_NAME: &str = "local";
pub const USER_NAME: &str = "kubelet";
pub const CONTEXT_NAME: &str = "kubelet";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("kubeconfig is not valid UTF-8: {}", source))]
    KubeconfigEncoding { source: std::str::Utf8Error },

    #[snafu(display("failed to parse kubeconfig: {}", source))]
    Parse { source: KubeconfigError },

    #[snafu(display("bootstrap token is not valid UTF-8: {}", source))]
    TokenEncoding { source: std::str::Utf8Error },

    #[snafu(display("failed to serialize kubeconfig: {}", source))]
    Serialize { source: serde_yaml_ng::Error },
}

/// A kubeconfig with exactly one cluster, one user and one context linking
/// them, the context selected as current.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapKubeconfig {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub clusters: Vec<NamedCluster>,
    pub users: Vec<NamedAuthInfo>,
    pub contexts: Vec<NamedContext>,
    #[serde(rename = "current-context")]
    pub current_context: String,
    #[serde(default)]
    pub preferences: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: Cluster,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Cluster {
    pub server: String,
    /// Base64 encoded PEM bundle
    pub certificate_authority_data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedAuthInfo {
    pub name: String,
    pub user: AuthInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthInfo {
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedContext {
    pub name: String,
    pub context: ContextRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRef {
    pub cluster: String,
    pub user: String,
}

impl BootstrapKubeconfig {
    pub fn new(server: &str, ca_data: &[u8], token: &str) -> Self {
        Self {
            api_version: "v1".to_owned(),
            kind: "Config".to_owned(),
            clusters: vec![NamedCluster {
                name: CLUSTER_NAME.to_owned(),
                cluster: Cluster {
                    server: server.to_owned(),
                    certificate_authority_data: STANDARD.encode(ca_data),
                },
            }],
            users: vec![NamedAuthInfo {
                name: USER_NAME.to_owned(),
                user: AuthInfo {
                    token: token.to_owned(),
                },
            }],
            contexts: vec![NamedContext {
                name: CONTEXT_NAME.to_owned(),
                context: ContextRef {
                    cluster: CLUSTER_NAME.to_owned(),
                    user: USER_NAME.to_owned(),
                },
            }],
            current_context: CONTEXT_NAME.to_owned(),
            preferences: BTreeMap::new(),
        }
    }

    pub fn to_yaml(&self) -> Result<String, Error> {
        serde_yaml_ng::to_string(self).context(SerializeSnafu)
    }
}

/// Builds the serialized bootstrap kubeconfig for `server`, returning the
/// document together with the CA bundle it embeds.
///
/// The output only depends on the arguments, so unchanged inputs always yield
/// byte-identical documents.
pub fn assemble(server: &str, ca_data: &[u8], token: &[u8]) -> Result<(Vec<u8>, Vec<u8>), Error> {
    let token = std::str::from_utf8(token).context(TokenEncodingSnafu)?;
    let document = BootstrapKubeconfig::new(server, ca_data, token).to_yaml()?;
    Ok((document.into_bytes(), ca_data.to_vec()))
}

/// Parses a serialized kubeconfig as stored in a secret.
pub fn load(data: &[u8]) -> Result<Kubeconfig, Error> {
    let text = std::str::from_utf8(data).context(KubeconfigEncodingSnafu)?;
    Kubeconfig::from_yaml(text).context(ParseSnafu)
}
