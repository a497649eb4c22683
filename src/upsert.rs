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

//! Idempotent create-or-update primitives.
//!
//! Each primitive fetches the object by name, applies a mutation to the fetched
//! object (or to the given skeleton when it does not exist yet) and writes the
//! result back only when the mutation changed something.

use kube::Resource;
use kube::api::{Api, Patch, PatchParams, PostParams};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use snafu::futures::TryFutureExt;
use snafu::{OptionExt, ResultExt, Snafu};
use std::fmt::Debug;
use strum::Display;
use tracing::debug;

pub const FIELD_MANAGER: &str = "node-bootstrapper";

/// Upper bound on fetch-mutate-write rounds lost to concurrent writers.
pub const MAX_ATTEMPTS: usize = 5;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("{kind} has no name"))]
    NoName { kind: String },

    #[snafu(display("failed to get {kind} {name:?}: {source}"))]
    Get {
        kind: String,
        name: String,
        source: kube::Error,
    },

    #[snafu(display("failed to create {kind} {name:?}: {source}"))]
    Create {
        kind: String,
        name: String,
        source: kube::Error,
    },

    #[snafu(display("failed to update {kind} {name:?}: {source}"))]
    Update {
        kind: String,
        name: String,
        source: kube::Error,
    },

    #[snafu(display("failed to patch {kind} {name:?}: {source}"))]
    Patch {
        kind: String,
        name: String,
        source: kube::Error,
    },

    #[snafu(display("failed to compute patch for {kind} {name:?}: {source}"))]
    Diff {
        kind: String,
        name: String,
        source: serde_json::Error,
    },

    #[snafu(display("{kind} {name:?} still conflicting after {attempts} attempts"))]
    Conflict {
        kind: String,
        name: String,
        attempts: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum OperationResult {
    #[strum(serialize = "unchanged")]
    Unchanged,

    #[strum(serialize = "created")]
    Created,

    #[strum(serialize = "updated")]
    Updated,
}

impl OperationResult {
    pub fn changed(self) -> bool {
        self != OperationResult::Unchanged
    }
}

fn is_conflict(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(status) if status.code == 409)
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(FIELD_MANAGER.to_owned()),
        ..Default::default()
    }
}

fn patch_params() -> PatchParams {
    PatchParams {
        field_manager: Some(FIELD_MANAGER.to_owned()),
        ..Default::default()
    }
}

fn identity<K>(skeleton: &K) -> Result<(String, String), Error>
where
    K: Resource<DynamicType = ()>,
{
    let kind = K::kind(&()).to_string();
    let name = skeleton
        .meta()
        .name
        .clone()
        .context(NoNameSnafu { kind: &kind })?;
    Ok((kind, name))
}

/// Creates the object or replaces it with its mutated form.
///
/// Replacement carries the fetched `resourceVersion`, so a concurrent writer
/// makes the server reject the write with a conflict; the whole round is then
/// repeated against the newer object.
pub async fn create_or_update<K, F>(
    api: &Api<K>,
    skeleton: K,
    mut mutate: F,
) -> Result<(K, OperationResult), Error>
where
    K: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned + Debug + PartialEq,
    F: FnMut(&mut K),
{
    let (kind, name) = identity(&skeleton)?;

    for attempt in 1..=MAX_ATTEMPTS {
        let current = api
            .get_opt(&name)
            .context(GetSnafu {
                kind: &kind,
                name: &name,
            })
            .await?;

        match current {
            None => {
                let mut object = skeleton.clone();
                mutate(&mut object);

                match api.create(&post_params(), &object).await {
                    Ok(created) => return Ok((created, OperationResult::Created)),
                    Err(e) if is_conflict(&e) => {
                        debug!("{kind} {name} was created concurrently, retrying (attempt {attempt})");
                    }
                    Err(e) => {
                        return Err(e).context(CreateSnafu {
                            kind: &kind,
                            name: &name,
                        });
                    }
                }
            }
            Some(current) => {
                let mut object = current.clone();
                mutate(&mut object);
                if object == current {
                    return Ok((current, OperationResult::Unchanged));
                }

                match api.replace(&name, &post_params(), &object).await {
                    Ok(updated) => return Ok((updated, OperationResult::Updated)),
                    Err(e) if is_conflict(&e) => {
                        debug!("{kind} {name} was modified concurrently, retrying (attempt {attempt})");
                    }
                    Err(e) => {
                        return Err(e).context(UpdateSnafu {
                            kind: &kind,
                            name: &name,
                        });
                    }
                }
            }
        }
    }

    ConflictSnafu {
        kind,
        name,
        attempts: MAX_ATTEMPTS,
    }
    .fail()
}

/// Creates the object or merge-patches the fields the mutation changed.
///
/// The patch holds only the difference between the fetched and the mutated
/// object and no `resourceVersion`, so fields maintained by other writers are
/// left untouched.
pub async fn create_or_patch<K, F>(
    api: &Api<K>,
    skeleton: K,
    mut mutate: F,
) -> Result<(K, OperationResult), Error>
where
    K: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned + Debug + PartialEq,
    F: FnMut(&mut K),
{
    let (kind, name) = identity(&skeleton)?;

    for attempt in 1..=MAX_ATTEMPTS {
        let current = api
            .get_opt(&name)
            .context(GetSnafu {
                kind: &kind,
                name: &name,
            })
            .await?;

        let Some(current) = current else {
            let mut object = skeleton.clone();
            mutate(&mut object);

            match api.create(&post_params(), &object).await {
                Ok(created) => return Ok((created, OperationResult::Created)),
                Err(e) if is_conflict(&e) => {
                    debug!("{kind} {name} was created concurrently, retrying (attempt {attempt})");
                    continue;
                }
                Err(e) => {
                    return Err(e).context(CreateSnafu {
                        kind: &kind,
                        name: &name,
                    });
                }
            }
        };

        let mut object = current.clone();
        mutate(&mut object);
        if object == current {
            return Ok((current, OperationResult::Unchanged));
        }

        let before = serde_json::to_value(&current).context(DiffSnafu {
            kind: &kind,
            name: &name,
        })?;
        let after = serde_json::to_value(&object).context(DiffSnafu {
            kind: &kind,
            name: &name,
        })?;
        let Some(patch) = merge_patch(&before, &after) else {
            return Ok((current, OperationResult::Unchanged));
        };

        let patched = api
            .patch(&name, &patch_params(), &Patch::Merge(&patch))
            .context(PatchSnafu {
                kind: &kind,
                name: &name,
            })
            .await?;
        return Ok((patched, OperationResult::Updated));
    }

    ConflictSnafu {
        kind,
        name,
        attempts: MAX_ATTEMPTS,
    }
    .fail()
}

/// JSON merge patch (RFC 7386) turning `before` into `after`, or `None` if
/// they are equal.
pub(crate) fn merge_patch(before: &Value, after: &Value) -> Option<Value> {
    match (before, after) {
        (Value::Object(before), Value::Object(after)) => {
            let mut patch = Map::new();
            for (key, value) in after {
                match before.get(key) {
                    Some(old) => {
                        if let Some(diff) = merge_patch(old, value) {
                            patch.insert(key.clone(), diff);
                        }
                    }
                    None => {
                        patch.insert(key.clone(), value.clone());
                    }
                }
            }
            for key in before.keys() {
                if !after.contains_key(key) {
                    patch.insert(key.clone(), Value::Null);
                }
            }

            (!patch.is_empty()).then_some(Value::Object(patch))
        }
        _ if before == after => None,
        _ => Some(after.clone()),
    }
}
