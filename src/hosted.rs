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

//! Construction of clients for the hosted cluster.

use kube::config::{KubeConfigOptions, Kubeconfig, KubeconfigError};
use kube::{Client, Config};
use snafu::futures::TryFutureExt;
use snafu::{ResultExt, Snafu};
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to load client config: {}", source))]
    LoadConfig { source: KubeconfigError },

    #[snafu(display("failed to create client: {}", source))]
    CreateClient { source: kube::Error },
}

/// Turns an admin kubeconfig into a client for the cluster it points at.
pub trait Connector: Send + Sync {
    fn connect(&self, kubeconfig: Kubeconfig) -> impl Future<Output = Result<Client, Error>> + Send;
}

/// Connects using the current context of the kubeconfig.
#[derive(Clone, Debug)]
pub struct KubeconfigConnector {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for KubeconfigConnector {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl Connector for KubeconfigConnector {
    async fn connect(&self, kubeconfig: Kubeconfig) -> Result<Client, Error> {
        let mut config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .context(LoadConfigSnafu)
            .await?;
        config.connect_timeout = Some(self.connect_timeout);
        config.read_timeout = Some(self.read_timeout);

        Client::try_from(config).context(CreateClientSnafu)
    }
}
