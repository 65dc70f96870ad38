use futures::future::BoxFuture;

use crate::classify::{truncate_preview, unmangle, visibility_from_name};
use crate::expr;
use crate::model::{AttributeRecord, AttributeValue, FrameInfo, Identity, ObjectNode, RemoteValue, Visibility};
use crate::pass::PassContext;

/// Rendering used when a remote value could not be fetched.
pub const UNKNOWN_VALUE: &str = "unknown";

impl PassContext {
    /// Expands the object `target` evaluates to into a graph node.
    ///
    /// The node is reserved under the lock before any member is fetched, so an
    /// identity reached again (through a cycle, another binding or another
    /// frame task) only gains a label. Returns `false` when the node cap
    /// stopped the expansion and the caller must fall back to a literal.
    pub(crate) fn expand<'a>(
        &'a self,
        frame: &'a FrameInfo,
        target: String,
        identity: Identity,
        owner_type: String,
        label: String,
    ) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            {
                let mut nodes = self.nodes.lock();
                if let Some(node) = nodes.get_mut(&identity) {
                    node.add_label(label);
                    return true;
                }
                if let Some(max) = self.settings.max_nodes {
                    if nodes.len() >= max {
                        tracing::debug!(target: "edupy.inspect", identity = %identity, max, "node cap reached; not expanding");
                        return false;
                    }
                }
                nodes.insert(identity.clone(), ObjectNode::new(identity.clone(), label));
            }

            let attributes = self.expand_members(frame, &target, &owner_type).await;
            if let Some(node) = self.nodes.lock().get_mut(&identity) {
                node.attributes = attributes;
            }
            true
        })
    }

    async fn expand_members(
        &self,
        frame: &FrameInfo,
        target: &str,
        owner_type: &str,
    ) -> Vec<AttributeRecord> {
        let Some(listing) = self.evaluate_or_warn(frame, &expr::members(target)).await else {
            return Vec::new();
        };

        let mut attributes = Vec::new();
        for member in expr::parse_member_listing(&listing.value) {
            if expr::is_hidden_member(&member) {
                continue;
            }
            let name = unmangle(&member, owner_type).to_owned();
            let member_expr = expr::member(target, &member);

            let Some(value) = self.evaluate_or_warn(frame, &member_expr).await else {
                attributes.push(AttributeRecord {
                    visibility: visibility_from_name(&name).unwrap_or(Visibility::Public),
                    name,
                    type_name: UNKNOWN_VALUE.to_owned(),
                    value: AttributeValue::Literal(UNKNOWN_VALUE.to_owned()),
                });
                continue;
            };
            if expr::is_callable_type(&value.type_name) {
                continue;
            }

            let visibility = match visibility_from_name(&name) {
                Some(visibility) => visibility,
                None => {
                    if self
                        .predicate(frame, &expr::is_class_attribute(target, &member))
                        .await
                    {
                        Visibility::Static
                    } else {
                        Visibility::Public
                    }
                }
            };
            let attribute_value = self.attribute_value(frame, &name, member_expr, &value).await;

            attributes.push(AttributeRecord {
                name,
                type_name: value.type_name,
                value: attribute_value,
                visibility,
            });
        }
        attributes
    }

    async fn attribute_value(
        &self,
        frame: &FrameInfo,
        name: &str,
        member_expr: String,
        value: &RemoteValue,
    ) -> AttributeValue {
        if expr::renders_as_object(&value.type_name, &value.value)
            && !expr::is_abc_bookkeeping(&value.type_name)
        {
            let Some(child) = self.resolve_identity(frame, &member_expr).await else {
                return AttributeValue::Literal(UNKNOWN_VALUE.to_owned());
            };
            let label = format!("{name}:{}", value.type_name);
            if self
                .expand(frame, member_expr, child.clone(), value.type_name.clone(), label)
                .await
            {
                return AttributeValue::Reference(child);
            }
        }

        AttributeValue::Literal(truncate_preview(
            &value.value,
            self.settings.preview_len,
            &self.settings.ellipsis,
        ))
    }
}
