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

#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Fixtures shared by the unit tests: typed test objects and an in-memory API
//! server that backs a real `kube::Client`.

use crate::hosted::{self, Connector};
use crate::manifests;
use crate::types::v1alpha1::hosted_control_plane::{
    ApiEndpoint, HostedControlPlane, HostedControlPlaneSpec, HostedControlPlaneStatus,
    KubeconfigSecretRef,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use http::{Method, Request, Response, StatusCode};
use http_body_util::BodyExt;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use kube::Client;
use kube::client::Body;
use kube::config::Kubeconfig;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

pub const HCP_NAMESPACE: &str = "clusters-demo";

pub const ADMIN_KUBECONFIG_PATH: &str =
    "/api/v1/namespaces/clusters-demo/secrets/service-network-admin-kubeconfig";
pub const BOOTSTRAP_KUBECONFIG_PATH: &str =
    "/api/v1/namespaces/clusters-demo/secrets/bootstrap-kubeconfig";
pub const HCP_PATH: &str =
    "/apis/hypershift.openshift.io/v1alpha1/namespaces/clusters-demo/hostedcontrolplanes/demo";

pub const NAMESPACE_PATH: &str = "/api/v1/namespaces/openshift-machine-config-operator";
pub const SERVICE_ACCOUNT_PATH: &str =
    "/api/v1/namespaces/openshift-machine-config-operator/serviceaccounts/node-bootstrapper";
pub const CLUSTER_ROLE_BINDING_PATH: &str =
    "/apis/rbac.authorization.k8s.io/v1/clusterrolebindings/system:node-bootstrapper";
pub const TOKEN_SECRET_PATH: &str =
    "/api/v1/namespaces/openshift-machine-config-operator/secrets/node-bootstrapper-token";

pub const ADMIN_KUBECONFIG: &str = r#"apiVersion: v1
kind: Config
clusters:
- name: hosted
  cluster:
    server: https://kube-apiserver.clusters-demo.svc:6443
    certificate-authority-data: Q0FGRQ==
users:
- name: admin
  user:
    token: admin-token
contexts:
- name: admin
  context:
    cluster: hosted
    user: admin
current-context: admin
"#;

pub fn create_test_hcp(host: &str, port: i32) -> HostedControlPlane {
    HostedControlPlane {
        metadata: metav1::ObjectMeta {
            name: Some("demo".to_string()),
            namespace: Some(HCP_NAMESPACE.to_string()),
            uid: Some("test-uid-123".to_string()),
            ..Default::default()
        },
        spec: HostedControlPlaneSpec::default(),
        status: Some(HostedControlPlaneStatus {
            kube_config: Some(KubeconfigSecretRef {
                name: "admin-kubeconfig".to_string(),
                key: manifests::KUBECONFIG_KEY.to_string(),
            }),
            control_plane_endpoint: ApiEndpoint {
                host: host.to_string(),
                port,
            },
        }),
    }
}

pub fn admin_kubeconfig_secret(kubeconfig: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Secret",
        "metadata": {
            "name": manifests::ADMIN_KUBECONFIG_SECRET_NAME,
            "namespace": HCP_NAMESPACE,
        },
        "data": {
            manifests::KUBECONFIG_KEY: STANDARD.encode(kubeconfig),
        }
    })
}

/// Hands out a fixed client and remembers the kubeconfigs it was asked to
/// connect with.
pub struct StaticConnector {
    client: Client,
    seen: Mutex<Vec<Kubeconfig>>,
}

impl StaticConnector {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn connections(&self) -> Vec<Kubeconfig> {
        self.seen.lock().unwrap().clone()
    }
}

impl Connector for StaticConnector {
    async fn connect(&self, kubeconfig: Kubeconfig) -> Result<Client, hosted::Error> {
        self.seen.lock().unwrap().push(kubeconfig);
        Ok(self.client.clone())
    }
}

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<String, Value>,
    requests: Vec<RecordedRequest>,
    resource_version: u64,
    generated_names: u64,
    failing: Vec<String>,
    conflicts: BTreeMap<String, usize>,
    token_issuer: Option<(Vec<u8>, Vec<u8>)>,
}

impl State {
    fn take_conflict(&mut self, path: &str) -> bool {
        match self.conflicts.get_mut(path) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn store(&mut self, path: String, mut object: Value) -> Value {
        self.resource_version += 1;
        object["metadata"]["resourceVersion"] = json!(self.resource_version.to_string());

        if let Some((ca, token)) = &self.token_issuer
            && object["type"] == json!(manifests::SERVICE_ACCOUNT_TOKEN_SECRET_TYPE)
        {
            if !object["data"].is_object() {
                object["data"] = json!({});
            }
            object["data"][manifests::SERVICE_ACCOUNT_ROOT_CA_KEY] = json!(STANDARD.encode(ca));
            object["data"][manifests::SERVICE_ACCOUNT_TOKEN_KEY] = json!(STANDARD.encode(token));
        }

        self.objects.insert(path, object.clone());
        object
    }
}

/// In-memory Kubernetes API server keyed by object URL path.
///
/// Supports GET, POST, PUT (with resourceVersion conflicts) and merge PATCH,
/// and can inject failures and conflicts or play the part of the service
/// account token controller.
#[derive(Clone, Default)]
pub struct FakeApiServer {
    state: Arc<Mutex<State>>,
}

impl FakeApiServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(&self) -> Client {
        let server = self.clone();
        let service = tower::service_fn(move |request: Request<Body>| {
            let server = server.clone();
            async move { Ok::<_, Infallible>(server.handle(request).await) }
        });
        Client::new(service, "default")
    }

    pub fn seed(&self, path: &str, object: Value) {
        self.state.lock().unwrap().store(path.to_string(), object);
    }

    pub fn object<K: DeserializeOwned>(&self, path: &str) -> Option<K> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .get(path)
            .map(|o| serde_json::from_value(o.clone()).expect("stored object should deserialize"))
    }

    pub fn issue_tokens(&self, ca: &[u8], token: &[u8]) {
        self.state.lock().unwrap().token_issuer = Some((ca.to_vec(), token.to_vec()));
    }

    pub fn fail_requests_to(&self, path_prefix: &str) {
        self.state
            .lock()
            .unwrap()
            .failing
            .push(path_prefix.to_string());
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failing.clear();
    }

    pub fn conflict_next_writes(&self, path: &str, count: usize) {
        self.state
            .lock()
            .unwrap()
            .conflicts
            .insert(path.to_string(), count);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn reset_requests(&self) {
        self.state.lock().unwrap().requests.clear();
    }

    pub fn write_count(&self) -> usize {
        self.requests().iter().filter(|r| r.method != "GET").count()
    }

    pub fn last_body(&self, method: &str, path: &str) -> Option<Value> {
        self.requests()
            .into_iter()
            .rev()
            .find(|r| r.method == method && r.path == path)
            .and_then(|r| r.body)
    }

    async fn handle(&self, request: Request<Body>) -> Response<Body> {
        let (parts, body) = request.into_parts();
        let bytes = body.collect().await.expect("request body").to_bytes();
        let body: Option<Value> = if bytes.is_empty() {
            None
        } else {
            Some(serde_json::from_slice(&bytes).expect("request body should be JSON"))
        };
        let path = parts.uri.path().to_string();

        let mut state = self.state.lock().unwrap();
        state.requests.push(RecordedRequest {
            method: parts.method.to_string(),
            path: path.clone(),
            body: body.clone(),
        });

        if state.failing.iter().any(|prefix| path.starts_with(prefix)) {
            return status(StatusCode::INTERNAL_SERVER_ERROR, "InternalError", "injected failure");
        }

        match parts.method {
            Method::GET => match state.objects.get(&path) {
                Some(object) => respond(StatusCode::OK, object),
                None => not_found(&path),
            },
            Method::POST => {
                let mut object = body.expect("POST without body");
                let name = match object["metadata"]["name"].as_str() {
                    Some(name) => name.to_string(),
                    None => {
                        state.generated_names += 1;
                        let prefix = object["metadata"]["generateName"]
                            .as_str()
                            .unwrap_or("generated-")
                            .to_string();
                        let name = format!("{prefix}{}", state.generated_names);
                        object["metadata"]["name"] = json!(name);
                        name
                    }
                };
                let item = format!("{path}/{name}");
                if state.take_conflict(&item) || state.objects.contains_key(&item) {
                    return status(StatusCode::CONFLICT, "AlreadyExists", "already exists");
                }
                let stored = state.store(item, object);
                respond(StatusCode::CREATED, &stored)
            }
            Method::PUT => {
                let object = body.expect("PUT without body");
                let Some(current) = state.objects.get(&path) else {
                    return not_found(&path);
                };
                let stale =
                    object["metadata"]["resourceVersion"] != current["metadata"]["resourceVersion"];
                if state.take_conflict(&path) || stale {
                    return status(StatusCode::CONFLICT, "Conflict", "object has been modified");
                }
                let stored = state.store(path, object);
                respond(StatusCode::OK, &stored)
            }
            Method::PATCH => {
                let Some(mut current) = state.objects.get(&path).cloned() else {
                    return not_found(&path);
                };
                if state.take_conflict(&path) {
                    return status(StatusCode::CONFLICT, "Conflict", "object has been modified");
                }
                apply_merge_patch(&mut current, &body.expect("PATCH without body"));
                let stored = state.store(path, current);
                respond(StatusCode::OK, &stored)
            }
            _ => status(StatusCode::METHOD_NOT_ALLOWED, "MethodNotAllowed", "unsupported"),
        }
    }
}

fn apply_merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Value::Object(target) = target else {
        return;
    };
    for (key, value) in patch {
        if value.is_null() {
            target.remove(key);
        } else {
            apply_merge_patch(target.entry(key.clone()).or_insert(Value::Null), value);
        }
    }
}

fn respond(code: StatusCode, body: &Value) -> Response<Body> {
    Response::builder()
        .status(code)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn status(code: StatusCode, reason: &str, message: &str) -> Response<Body> {
    respond(
        code,
        &json!({
            "apiVersion": "v1",
            "kind": "Status",
            "metadata": {},
            "status": "Failure",
            "message": message,
            "reason": reason,
            "code": code.as_u16(),
        }),
    )
}

fn not_found(path: &str) -> Response<Body> {
    status(StatusCode::NOT_FOUND, "NotFound", &format!("{path} not found"))
}
