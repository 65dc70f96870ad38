use crate::expr;
use crate::model::{FrameInfo, Identity, Scope, VariableRecord, VariableValue};
use crate::pass::PassContext;

impl PassContext {
    pub(crate) async fn collect_frame(&self, frame: &FrameInfo) {
        let values = match self.provider.frame_values(frame).await {
            Ok(values) => values,
            Err(err) => {
                tracing::warn!(
                    target: "edupy.inspect",
                    frame = %frame.id,
                    error = %err,
                    "failed to enumerate frame values"
                );
                return;
            }
        };
        tracing::debug!(target: "edupy.inspect", frame = %frame.id, values = values.len(), "collecting frame");

        for value in values {
            let scope = self.classify_scope(frame, &value.name).await;
            let identity = match self.resolve_identity(frame, &value.name).await {
                Some(identity) => identity,
                None => {
                    // Still listed, but never expanded or merged with another binding.
                    let placeholder = Identity::new(format!("unresolved:{}:{}", frame.id, value.name));
                    self.variables.lock().merge(VariableRecord {
                        identity: placeholder,
                        names: vec![value.name],
                        type_name: value.type_name,
                        scope,
                        value: VariableValue::Literal(value.value),
                    });
                    continue;
                }
            };

            let rendered = if !expr::is_primitive_type(&value.type_name)
                && self
                    .predicate(frame, &expr::is_user_instance(&value.name))
                    .await
            {
                let label = format!("{}:{}", value.name, value.type_name);
                let expanded = self
                    .expand(
                        frame,
                        value.name.clone(),
                        identity.clone(),
                        value.type_name.clone(),
                        label,
                    )
                    .await;
                if expanded {
                    VariableValue::Object(identity.clone())
                } else {
                    VariableValue::Literal(value.value)
                }
            } else {
                VariableValue::Literal(value.value)
            };

            self.variables.lock().merge(VariableRecord {
                identity,
                names: vec![value.name],
                type_name: value.type_name,
                scope,
                value: rendered,
            });
        }
    }

    /// `id(target)`, retried through `__builtins__` when the frame shadows `id`.
    pub(crate) async fn resolve_identity(&self, frame: &FrameInfo, target: &str) -> Option<Identity> {
        let first = self.evaluate_or_warn(frame, &expr::identity(target)).await?;
        let raw = if expr::identity_shadowed(&first.value) {
            tracing::debug!(target: "edupy.inspect", frame = %frame.id, target, "id() is shadowed; using builtins");
            self.evaluate_or_warn(frame, &expr::identity_fallback(target))
                .await?
                .value
        } else {
            first.value
        };

        let raw = raw.trim();
        if raw.is_empty() {
            None
        } else {
            Some(Identity::new(raw))
        }
    }

    /// Local binding wins over global; neither means unknown.
    pub(crate) async fn classify_scope(&self, frame: &FrameInfo, name: &str) -> Scope {
        if self.predicate(frame, &expr::is_local(name)).await {
            Scope::Local
        } else if self.predicate(frame, &expr::is_global(name)).await {
            Scope::Global
        } else {
            Scope::Unknown
        }
    }
}
