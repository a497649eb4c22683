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

use crate::hosted::KubeconfigConnector;
use crate::manifests::KUBECONFIG_KEY;
use crate::types::v1alpha1::hosted_control_plane::HostedControlPlane;
use k8s_openapi::NamespaceResourceScope;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Resource, api::Api};
use serde::de::DeserializeOwned;
use snafu::Snafu;
use snafu::futures::TryFutureExt;
use std::fmt::Debug;
use std::time::Duration;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Kubernetes API error: {}", source))]
    Kube { source: kube::Error },

    #[snafu(display("record event error: {}", source))]
    Record { source: kube::Error },
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Kube { source: kube::Error::Api(status) } if status.code == 404)
    }
}

#[derive(Clone, Debug)]
pub struct Options {
    /// Data key the bootstrap kubeconfig is stored under.
    pub kubeconfig_key: String,

    pub resync_interval: Duration,

    /// Requeue delay while the hosted control plane is still coming up.
    pub not_ready_requeue: Duration,

    pub error_requeue: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            kubeconfig_key: KUBECONFIG_KEY.to_owned(),
            resync_interval: Duration::from_secs(300),
            not_ready_requeue: Duration::from_secs(10),
            error_requeue: Duration::from_secs(5),
        }
    }
}

pub struct Context<C = KubeconfigConnector> {
    pub(crate) client: kube::Client,
    pub(crate) recorder: Recorder,
    pub(crate) connector: C,
    pub(crate) options: Options,
}

impl<C> Context<C> {
    pub fn new(client: kube::Client, connector: C, options: Options) -> Self {
        let reporter = Reporter {
            controller: "node-bootstrapper".into(),
            instance: std::env::var("HOSTNAME").ok(),
        };

        let recorder = Recorder::new(client.clone(), reporter);
        Self {
            client,
            recorder,
            connector,
            options,
        }
    }

    /// send event
    #[inline]
    pub async fn record(
        &self,
        resource: &HostedControlPlane,
        event_type: EventType,
        reason: &str,
        message: &str,
    ) -> Result<(), Error> {
        self.recorder
            .publish(
                &Event {
                    type_: event_type,
                    reason: reason.to_owned(),
                    note: Some(message.into()),
                    action: "Reconcile".into(),
                    secondary: None,
                },
                &resource.object_ref(&()),
            )
            .context(RecordSnafu)
            .await
    }

    pub async fn get<T>(&self, name: &str, namespace: &str) -> Result<T, Error>
    where
        T: Clone + DeserializeOwned + Debug + Resource<Scope = NamespaceResourceScope>,
        <T as kube::Resource>::DynamicType: Default,
    {
        let api: Api<T> = Api::namespaced(self.client.clone(), namespace);
        api.get(name).context(KubeSnafu).await
    }
}
