// Mutation hooks - middleware intercepting builder mutations before and
// after execution. Before-hooks may rewrite the field map (timestamps,
// derived fields); after-hooks observe the committed mutation (audit,
// cache invalidation).

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::{EntError, EntResult};
use crate::id::current_time_millis;
use crate::schema::registry::EntityLayout;
use crate::value::Value;

/// Operation kinds that trigger hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOp {
    Create,
    UpdateOne,
    Delete,
}

/// Hook execution timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookTiming {
    Before,
    After,
}

/// Context handed to hooks: the resolved layout, the operation, the node id
/// (known for updates/deletes, and for creates once the id is allocated)
/// and the pending field values.
pub struct MutationCtx {
    pub layout: Arc<EntityLayout>,
    pub op: MutationOp,
    pub node_id: Option<i64>,
    pub fields: BTreeMap<String, Value>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Trait for mutation hooks.
#[async_trait]
pub trait EntHook: Send + Sync {
    async fn execute(&self, ctx: &mut MutationCtx) -> EntResult<()>;

    /// Hook name for diagnostics.
    fn name(&self) -> &str;

    fn operations(&self) -> Vec<MutationOp>;

    fn timing(&self) -> HookTiming;
}

/// Registry of hooks, keyed by entity name. Hooks registered under "*"
/// apply to every entity.
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<String, Vec<Box<dyn EntHook>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entity: &str, hook: Box<dyn EntHook>) {
        self.hooks.entry(entity.to_string()).or_default().push(hook);
    }

    pub fn register_global(&mut self, hook: Box<dyn EntHook>) {
        self.register("*", hook);
    }

    /// Run all applicable hooks, global first, in registration order.
    pub async fn run(
        &self,
        entity: &str,
        op: MutationOp,
        timing: HookTiming,
        ctx: &mut MutationCtx,
    ) -> EntResult<()> {
        for key in ["*", entity] {
            if let Some(hooks) = self.hooks.get(key) {
                for hook in hooks {
                    if hook.operations().contains(&op) && hook.timing() == timing {
                        hook.execute(ctx).await.map_err(|e| {
                            EntError::Hook(format!("hook \"{}\" failed: {}", hook.name(), e))
                        })?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Sets created_at/updated_at when the entity declares those fields and the
/// caller did not provide them.
pub struct TimestampHook;

#[async_trait]
impl EntHook for TimestampHook {
    async fn execute(&self, ctx: &mut MutationCtx) -> EntResult<()> {
        let now = chrono::TimeZone::timestamp_millis_opt(&chrono::Utc, current_time_millis())
            .single()
            .map(Value::Time)
            .unwrap_or(Value::Null);

        match ctx.op {
            MutationOp::Create => {
                for field in ["created_at", "updated_at"] {
                    if ctx.layout.field(field).is_some() && !ctx.fields.contains_key(field) {
                        ctx.fields.insert(field.to_string(), now.clone());
                    }
                }
            }
            MutationOp::UpdateOne => {
                if ctx.layout.field("updated_at").is_some() {
                    ctx.fields.insert("updated_at".to_string(), now);
                }
            }
            MutationOp::Delete => {}
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "timestamp_hook"
    }

    fn operations(&self) -> Vec<MutationOp> {
        vec![MutationOp::Create, MutationOp::UpdateOne]
    }

    fn timing(&self) -> HookTiming {
        HookTiming::Before
    }
}

/// Logs committed mutations through tracing.
pub struct AuditHook;

#[async_trait]
impl EntHook for AuditHook {
    async fn execute(&self, ctx: &mut MutationCtx) -> EntResult<()> {
        tracing::info!(
            entity = %ctx.layout.entity,
            op = ?ctx.op,
            node_id = ?ctx.node_id,
            fields = ctx.fields.len(),
            "mutation committed"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "audit_hook"
    }

    fn operations(&self) -> Vec<MutationOp> {
        vec![MutationOp::Create, MutationOp::UpdateOne, MutationOp::Delete]
    }

    fn timing(&self) -> HookTiming {
        HookTiming::After
    }
}

/// Registry preloaded with the common hooks.
pub fn default_hook_registry() -> HookRegistry {
    let mut registry = HookRegistry::new();
    registry.register_global(Box::new(TimestampHook));
    registry.register_global(Box::new(AuditHook));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EntitySchema, FieldDefinition, FieldType, SchemaRegistry};

    fn layout_with_timestamps() -> Arc<EntityLayout> {
        let mut reg = SchemaRegistry::new();
        reg.register_schema(
            EntitySchema::new("user")
                .field(FieldDefinition::new("username", FieldType::String))
                .field(FieldDefinition::new("created_at", FieldType::Time).optional())
                .field(FieldDefinition::new("updated_at", FieldType::Time).optional()),
        );
        reg.resolve().unwrap().entity("user").unwrap()
    }

    #[tokio::test]
    async fn test_timestamp_hook_injects_on_create() {
        let mut ctx = MutationCtx {
            layout: layout_with_timestamps(),
            op: MutationOp::Create,
            node_id: None,
            fields: BTreeMap::new(),
            metadata: HashMap::new(),
        };
        TimestampHook.execute(&mut ctx).await.unwrap();
        assert!(matches!(ctx.fields.get("created_at"), Some(Value::Time(_))));
        assert!(matches!(ctx.fields.get("updated_at"), Some(Value::Time(_))));
    }

    #[tokio::test]
    async fn test_timestamp_hook_respects_explicit_value() {
        let explicit = chrono::TimeZone::timestamp_millis_opt(&chrono::Utc, 1_000).single().unwrap();
        let mut fields = BTreeMap::new();
        fields.insert("created_at".to_string(), Value::Time(explicit));
        let mut ctx = MutationCtx {
            layout: layout_with_timestamps(),
            op: MutationOp::Create,
            node_id: None,
            fields,
            metadata: HashMap::new(),
        };
        TimestampHook.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.fields.get("created_at"), Some(&Value::Time(explicit)));
    }

    #[tokio::test]
    async fn test_registry_runs_global_hooks() {
        struct Failing;
        #[async_trait]
        impl EntHook for Failing {
            async fn execute(&self, _ctx: &mut MutationCtx) -> EntResult<()> {
                Err(EntError::Validation("nope".to_string()))
            }
            fn name(&self) -> &str {
                "failing"
            }
            fn operations(&self) -> Vec<MutationOp> {
                vec![MutationOp::Create]
            }
            fn timing(&self) -> HookTiming {
                HookTiming::Before
            }
        }

        let mut registry = HookRegistry::new();
        registry.register_global(Box::new(Failing));
        let mut ctx = MutationCtx {
            layout: layout_with_timestamps(),
            op: MutationOp::Create,
            node_id: None,
            fields: BTreeMap::new(),
            metadata: HashMap::new(),
        };
        let err = registry
            .run("user", MutationOp::Create, HookTiming::Before, &mut ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failing"));
    }
}
