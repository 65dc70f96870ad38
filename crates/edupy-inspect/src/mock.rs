use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{FrameInfo, Identity, RemoteValue, ThreadInfo, ThreadState};
use crate::provider::{ProviderError, Result, ValueProvider};

/// A frozen Python heap: threads with frames, and the objects their bindings point at.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scene {
    #[serde(default)]
    pub threads: Vec<SceneThread>,
    #[serde(default)]
    pub objects: IndexMap<Identity, SceneObject>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneThread {
    pub name: String,
    pub state: ThreadState,
    #[serde(default)]
    pub frames: Vec<SceneFrame>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneFrame {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub locals: IndexMap<String, SceneValue>,
    #[serde(default)]
    pub globals: IndexMap<String, SceneValue>,
    /// The frame rebinds the `id` builtin to something that is not callable.
    #[serde(default)]
    pub shadows_id: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SceneValue {
    Ref {
        #[serde(rename = "ref")]
        target: Identity,
    },
    Primitive {
        #[serde(rename = "type")]
        type_name: String,
        value: String,
        /// Defaults to `<type>:<value>`, which mirrors interning of small literals.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        identity: Option<Identity>,
    },
}

impl SceneValue {
    pub fn reference(target: impl Into<String>) -> Self {
        SceneValue::Ref {
            target: Identity::new(target),
        }
    }

    pub fn primitive(type_name: impl Into<String>, value: impl Into<String>) -> Self {
        SceneValue::Primitive {
            type_name: type_name.into(),
            value: value.into(),
            identity: None,
        }
    }

    pub fn none() -> Self {
        Self::primitive("NoneType", "None")
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneObject {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub attributes: IndexMap<String, SceneValue>,
    #[serde(default)]
    pub class_attributes: IndexMap<String, SceneValue>,
    #[serde(default)]
    pub methods: Vec<String>,
}

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("failed to read scene file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid scene: {0}")]
    Json(#[from] serde_json::Error),
}

enum Resolved<'a> {
    Object(&'a Identity, &'a SceneObject),
    Primitive {
        type_name: &'a str,
        value: &'a str,
        identity: Identity,
    },
    Method {
        owner: &'a Identity,
        owner_type: &'a str,
        name: &'a str,
    },
}

/// Deterministic, in-memory value provider.
///
/// Answers the expressions in [`crate::expr`] against a [`Scene`]. Used by the
/// replay binary and by tests, which can also make individual expressions fail
/// or never complete.
#[derive(Default)]
pub struct MockValueProvider {
    scene: Scene,
    failures: HashMap<String, ProviderError>,
    hangs: HashSet<String>,
    slow_frames: HashSet<String>,
    dir_calls: Mutex<HashMap<Identity, usize>>,
    evaluations: Mutex<Vec<String>>,
}

impl MockValueProvider {
    pub fn new(scene: Scene) -> Self {
        Self {
            scene,
            ..Self::default()
        }
    }

    pub fn from_json_str(text: &str) -> std::result::Result<Self, SceneError> {
        Ok(Self::new(serde_json::from_str(text)?))
    }

    pub fn from_path(path: impl AsRef<Path>) -> std::result::Result<Self, SceneError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SceneError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Every evaluation of `expression` fails with `error`.
    pub fn fail_expression(&mut self, expression: impl Into<String>, error: ProviderError) {
        self.failures.insert(expression.into(), error);
    }

    /// Every evaluation of `expression` never completes.
    pub fn hang_expression(&mut self, expression: impl Into<String>) {
        self.hangs.insert(expression.into());
    }

    /// Value enumeration of `frame_id` never completes.
    pub fn hang_frame(&mut self, frame_id: impl Into<String>) {
        self.slow_frames.insert(frame_id.into());
    }

    /// Number of `dir()` evaluations issued for `identity`, i.e. how often it was expanded.
    pub fn dir_calls(&self, identity: &Identity) -> usize {
        self.dir_calls.lock().get(identity).copied().unwrap_or(0)
    }

    pub fn evaluations(&self) -> Vec<String> {
        self.evaluations.lock().clone()
    }

    fn frame(&self, frame_id: &str) -> Result<&SceneFrame> {
        self.scene
            .threads
            .iter()
            .flat_map(|thread| thread.frames.iter())
            .find(|frame| frame.id == frame_id)
            .ok_or_else(|| ProviderError::UnknownFrame(frame_id.to_owned()))
    }

    fn resolve_value<'a>(&'a self, value: &'a SceneValue) -> Option<Resolved<'a>> {
        match value {
            SceneValue::Ref { target } => self
                .scene
                .objects
                .get_key_value(target)
                .map(|(id, object)| Resolved::Object(id, object)),
            SceneValue::Primitive {
                type_name,
                value,
                identity,
            } => Some(Resolved::Primitive {
                type_name,
                value,
                identity: identity
                    .clone()
                    .unwrap_or_else(|| Identity::new(format!("{type_name}:{value}"))),
            }),
        }
    }

    fn resolve<'a>(&'a self, frame: &'a SceneFrame, path: &str) -> Option<Resolved<'a>> {
        let mut segments = path.split('.');
        let root = segments.next()?.trim();
        let binding = frame.locals.get(root).or_else(|| frame.globals.get(root))?;
        let mut current = self.resolve_value(binding)?;

        for segment in segments {
            let segment = segment.trim();
            let (owner, object) = match current {
                Resolved::Object(id, object) => (id, object),
                _ => return None,
            };
            current = if let Some(value) = object
                .attributes
                .get(segment)
                .or_else(|| object.class_attributes.get(segment))
            {
                self.resolve_value(value)?
            } else {
                let name = object
                    .methods
                    .iter()
                    .map(String::as_str)
                    .find(|m| *m == segment)?;
                Resolved::Method {
                    owner,
                    owner_type: &object.type_name,
                    name,
                }
            };
        }
        Some(current)
    }

    fn render(resolved: &Resolved<'_>, name: &str) -> RemoteValue {
        match resolved {
            Resolved::Object(id, object) => RemoteValue::new(
                name,
                object.type_name.as_str(),
                format!("<__main__.{} object at 0x{}>", object.type_name, id),
            ),
            Resolved::Primitive {
                type_name, value, ..
            } => RemoteValue::new(name, *type_name, *value),
            Resolved::Method {
                owner,
                owner_type,
                name: method,
            } => RemoteValue::new(
                name,
                "method",
                format!("<bound method {owner_type}.{method} of <__main__.{owner_type} object at 0x{owner}>>"),
            ),
        }
    }

    fn identity_of(resolved: &Resolved<'_>) -> String {
        match resolved {
            Resolved::Object(id, _) => id.to_string(),
            Resolved::Primitive { identity, .. } => identity.to_string(),
            Resolved::Method { owner, name, .. } => format!("{owner}.{name}"),
        }
    }

    fn name_error(expression: &str, name: &str) -> ProviderError {
        ProviderError::Evaluation {
            expression: expression.to_owned(),
            message: format!("NameError: name '{name}' is not defined"),
        }
    }

    fn bool_value(expression: &str, value: bool) -> RemoteValue {
        RemoteValue::new(expression, "bool", if value { "True" } else { "False" })
    }

    fn answer(&self, frame: &SceneFrame, expression: &str) -> Result<RemoteValue> {
        let lookup = |path: &str| {
            self.resolve(frame, path)
                .ok_or_else(|| Self::name_error(expression, path))
        };

        if let Some(rest) = expression.strip_prefix("isinstance(") {
            let target = rest.split(", object)").next().unwrap_or_default();
            let resolved = lookup(target)?;
            return Ok(Self::bool_value(
                expression,
                matches!(resolved, Resolved::Object(..)),
            ));
        }

        if let Some(name) = quoted_lookup(expression, "locals().get('") {
            return Ok(Self::bool_value(expression, frame.locals.contains_key(name)));
        }
        if let Some(name) = quoted_lookup(expression, "globals().get('") {
            return Ok(Self::bool_value(expression, frame.globals.contains_key(name)));
        }

        if let Some((target, rest)) = expression.split_once(".__class__.__dict__.get('") {
            let name = rest.split('\'').next().unwrap_or_default();
            return match lookup(target)? {
                Resolved::Object(_, object) => Ok(Self::bool_value(
                    expression,
                    object.class_attributes.contains_key(name)
                        || object.methods.iter().any(|m| m == name),
                )),
                _ => Ok(Self::bool_value(expression, false)),
            };
        }

        if let Some(target) = call_argument(expression, "__builtins__.id(") {
            let resolved = lookup(target)?;
            return Ok(RemoteValue::new(expression, "int", Self::identity_of(&resolved)));
        }

        if let Some(target) = call_argument(expression, "id(") {
            if frame.shadows_id {
                return Ok(RemoteValue::new(
                    expression,
                    "str",
                    "TypeError: 'int' object is not callable",
                ));
            }
            let resolved = lookup(target)?;
            return Ok(RemoteValue::new(expression, "int", Self::identity_of(&resolved)));
        }

        if let Some(target) = call_argument(expression, "dir(") {
            let listing = match lookup(target)? {
                Resolved::Object(id, object) => {
                    *self.dir_calls.lock().entry(id.clone()).or_default() += 1;
                    let names: BTreeSet<&str> = object
                        .attributes
                        .keys()
                        .chain(object.class_attributes.keys())
                        .chain(object.methods.iter())
                        .map(String::as_str)
                        .chain(["__class__", "__dict__", "__init__", "__module__"])
                        .collect();
                    names
                        .into_iter()
                        .map(|name| format!("'{name}'"))
                        .collect::<Vec<_>>()
                        .join(", ")
                }
                _ => String::new(),
            };
            return Ok(RemoteValue::new(expression, "list", format!("[{listing}]")));
        }

        let resolved = lookup(expression)?;
        let name = expression.rsplit('.').next().unwrap_or(expression);
        Ok(Self::render(&resolved, name))
    }
}

fn quoted_lookup<'a>(expression: &'a str, prefix: &str) -> Option<&'a str> {
    expression
        .strip_prefix(prefix)?
        .strip_suffix("', None) is not None")
}

fn call_argument<'a>(expression: &'a str, prefix: &str) -> Option<&'a str> {
    expression.strip_prefix(prefix)?.strip_suffix(')')
}

#[async_trait]
impl ValueProvider for MockValueProvider {
    async fn threads(&self) -> Result<Vec<ThreadInfo>> {
        Ok(self
            .scene
            .threads
            .iter()
            .map(|thread| ThreadInfo {
                name: thread.name.clone(),
                state: thread.state,
            })
            .collect())
    }

    async fn frames(&self, thread: &str) -> Result<Vec<FrameInfo>> {
        let scene_thread = self
            .scene
            .threads
            .iter()
            .find(|t| t.name == thread)
            .ok_or_else(|| ProviderError::UnknownThread(thread.to_owned()))?;
        Ok(scene_thread
            .frames
            .iter()
            .map(|frame| FrameInfo {
                id: frame.id.clone(),
                name: frame.name.clone(),
                thread: thread.to_owned(),
            })
            .collect())
    }

    async fn frame_values(&self, frame: &FrameInfo) -> Result<Vec<RemoteValue>> {
        if self.slow_frames.contains(&frame.id) {
            std::future::pending::<()>().await;
        }
        let scene_frame = self.frame(&frame.id)?;
        let locals = scene_frame.locals.keys();
        let globals = scene_frame
            .globals
            .keys()
            .filter(|name| !scene_frame.locals.contains_key(*name));

        Ok(locals
            .chain(globals)
            .filter_map(|name| {
                self.resolve(scene_frame, name)
                    .map(|resolved| Self::render(&resolved, name))
            })
            .collect())
    }

    async fn evaluate(&self, frame: &FrameInfo, expression: &str) -> Result<RemoteValue> {
        self.evaluations.lock().push(expression.to_owned());
        if self.hangs.contains(expression) {
            std::future::pending::<()>().await;
        }
        if let Some(error) = self.failures.get(expression) {
            return Err(error.clone());
        }
        let scene_frame = self.frame(&frame.id)?;
        self.answer(scene_frame, expression)
    }
}
