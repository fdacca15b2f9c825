// Schema registry - collects entity schemas, validates cross-entity
// consistency and resolves the declarative definitions into a concrete
// relational layout (which table holds which FK column, which junction
// table backs which M2M edge).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::error::{EntError, EntResult};
use crate::schema::edge::{Cardinality, EdgeDefinition};
use crate::schema::field::FieldDefinition;
use crate::schema::{EntSchema, EntitySchema, IndexDefinition};

/// Registry of all declared schemas.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, EntitySchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema declared as a type.
    pub fn register<S: EntSchema>(&mut self) {
        let schema = S::schema();
        self.schemas.insert(schema.name.clone(), schema);
    }

    /// Register a schema value directly (used by tests and the CLI).
    pub fn register_schema(&mut self, schema: EntitySchema) {
        self.schemas.insert(schema.name.clone(), schema);
    }

    pub fn get(&self, entity: &str) -> Option<&EntitySchema> {
        self.schemas.get(entity)
    }

    pub fn entity_names(&self) -> Vec<String> {
        self.schemas.keys().cloned().collect()
    }

    /// Validate schema consistency, collecting every error rather than
    /// stopping at the first one.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for (name, schema) in &self.schemas {
            let mut seen_fields = HashSet::new();
            for field in &schema.fields {
                if field.name == "id" {
                    errors.push(format!("entity \"{}\": field name \"id\" is reserved", name));
                }
                if !seen_fields.insert(field.column()) {
                    errors.push(format!(
                        "entity \"{}\": duplicate column \"{}\"",
                        name,
                        field.column()
                    ));
                }
            }

            let mut seen_edges = HashSet::new();
            for edge in &schema.edges {
                if !seen_edges.insert(edge.name.clone()) {
                    errors.push(format!(
                        "entity \"{}\": duplicate edge \"{}\"",
                        name, edge.name
                    ));
                }

                let target = match self.schemas.get(&edge.target) {
                    Some(t) => t,
                    None => {
                        errors.push(format!(
                            "entity \"{}\": edge \"{}\" points to undefined entity \"{}\"",
                            name, edge.name, edge.target
                        ));
                        continue;
                    }
                };

                // Back-references must name an existing owning edge that
                // points back at us.
                if edge.inverse {
                    let inverse_name = match &edge.inverse_name {
                        Some(n) => n,
                        None => {
                            errors.push(format!(
                                "entity \"{}\": inverse edge \"{}\" has no owning edge name",
                                name, edge.name
                            ));
                            continue;
                        }
                    };
                    match target.edges.iter().find(|e| &e.name == inverse_name) {
                        Some(owning) if owning.inverse => errors.push(format!(
                            "entity \"{}\": edge \"{}\" references \"{}\" on \"{}\", which is itself an inverse edge",
                            name, edge.name, inverse_name, edge.target
                        )),
                        Some(owning) if owning.target != *name => errors.push(format!(
                            "entity \"{}\": edge \"{}\" references \"{}\" on \"{}\", which targets \"{}\"",
                            name, edge.name, inverse_name, edge.target, owning.target
                        )),
                        Some(owning)
                            if edge.cardinality == Cardinality::ManyToMany
                                && owning.cardinality != Cardinality::ManyToMany =>
                        {
                            errors.push(format!(
                                "entity \"{}\": M2M edge \"{}\" references non-M2M edge \"{}\"",
                                name, edge.name, inverse_name
                            ))
                        }
                        Some(_) => {}
                        None => {
                            // Symmetric self-edges reference themselves.
                            let symmetric =
                                edge.target == *name && inverse_name == &edge.name;
                            if !symmetric {
                                errors.push(format!(
                                    "entity \"{}\": edge \"{}\" has no owning edge \"{}\" on \"{}\"",
                                    name, edge.name, inverse_name, edge.target
                                ));
                            }
                        }
                    }
                }

                // Required is only enforceable where this side controls the
                // rows being written.
                if edge.required && edge.cardinality == Cardinality::OneToMany && edge.inverse {
                    errors.push(format!(
                        "entity \"{}\": inverse O2M edge \"{}\" cannot be required",
                        name, edge.name
                    ));
                }
            }

            for index in &schema.indexes {
                for field in &index.fields {
                    if !schema.fields.iter().any(|f| &f.name == field) {
                        errors.push(format!(
                            "entity \"{}\": index \"{}\" references unknown field \"{}\"",
                            name, index.name, field
                        ));
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Resolve all schemas into storage layouts. Fails on the first
    /// validation error.
    pub fn resolve(&self) -> EntResult<GraphLayout> {
        self.validate()
            .map_err(|errors| EntError::Schema(errors.join("; ")))?;

        let mut entities = HashMap::new();
        for (name, schema) in &self.schemas {
            let mut fields = Vec::new();
            for field in &schema.fields {
                fields.push(FieldColumn {
                    column: field.column(),
                    def: field.clone(),
                });
            }

            let mut edges = Vec::new();
            for edge in &schema.edges {
                edges.push(self.resolve_edge(name, schema, edge)?);
            }

            let layout = EntityLayout {
                entity: name.clone(),
                table: schema.table.clone(),
                id_column: "id".to_string(),
                fields,
                edges,
                indexes: schema.indexes.clone(),
            };
            entities.insert(name.clone(), Arc::new(layout));
        }

        Ok(GraphLayout { entities })
    }

    fn resolve_edge(
        &self,
        owner: &str,
        owner_schema: &EntitySchema,
        edge: &EdgeDefinition,
    ) -> EntResult<EdgeLayout> {
        let target_schema = self
            .schemas
            .get(&edge.target)
            .ok_or_else(|| EntError::Schema(format!("unknown entity \"{}\"", edge.target)))?;

        let symmetric = edge.target == owner
            && edge.inverse_name.as_deref() == Some(edge.name.as_str());

        let storage = match (edge.cardinality, edge.inverse) {
            // FK on this entity's row.
            (Cardinality::ManyToOne, _) | (Cardinality::OneToOne, true) => EdgeStorage::FkOnSelf {
                column: edge
                    .storage_key
                    .clone()
                    .unwrap_or_else(|| format!("{}_id", edge.name)),
            },
            // FK on the target's row; column named after the back-reference
            // when one was declared.
            (Cardinality::OneToMany, false) | (Cardinality::OneToOne, false) => {
                let column = edge.storage_key.clone().unwrap_or_else(|| {
                    match &edge.inverse_name {
                        Some(inv) => format!("{}_id", inv),
                        None => format!("{}_id", owner),
                    }
                });
                EdgeStorage::FkOnTarget {
                    table: target_schema.table.clone(),
                    column,
                }
            }
            (Cardinality::OneToMany, true) => {
                return Err(EntError::Schema(format!(
                    "entity \"{}\": edge \"{}\": inverse O2M is declared with from()",
                    owner, edge.name
                )))
            }
            // Owning M2M: junction table named after this side.
            (Cardinality::ManyToMany, false) => {
                let table = edge
                    .storage_key
                    .clone()
                    .unwrap_or_else(|| format!("{}_{}", owner_schema.table, edge.name));
                let self_column = format!("{}_id", owner);
                let target_column = if edge.target == owner {
                    format!("other_{}_id", edge.target)
                } else {
                    format!("{}_id", edge.target)
                };
                EdgeStorage::Junction {
                    table,
                    self_column,
                    target_column,
                }
            }
            // Inverse M2M: reuse the owning side's junction with flipped
            // columns.
            (Cardinality::ManyToMany, true) => {
                let inverse_name = edge.inverse_name.as_ref().ok_or_else(|| {
                    EntError::Schema(format!(
                        "entity \"{}\": inverse M2M edge \"{}\" missing owning edge name",
                        owner, edge.name
                    ))
                })?;
                let owning = target_schema
                    .edges
                    .iter()
                    .find(|e| &e.name == inverse_name)
                    .ok_or_else(|| {
                        EntError::Schema(format!(
                            "entity \"{}\": edge \"{}\" has no owning edge \"{}\" on \"{}\"",
                            owner, edge.name, inverse_name, edge.target
                        ))
                    })?;
                let table = owning
                    .storage_key
                    .clone()
                    .unwrap_or_else(|| format!("{}_{}", target_schema.table, owning.name));
                EdgeStorage::Junction {
                    table,
                    // Our ids sit in the owning side's target column.
                    self_column: if owning.target == edge.target {
                        format!("other_{}_id", owner)
                    } else {
                        format!("{}_id", owner)
                    },
                    target_column: format!("{}_id", edge.target),
                }
            }
        };

        Ok(EdgeLayout {
            name: edge.name.clone(),
            target: edge.target.clone(),
            target_table: target_schema.table.clone(),
            cardinality: edge.cardinality,
            inverse: edge.inverse,
            required: edge.required,
            immutable: edge.immutable,
            symmetric,
            storage,
        })
    }
}

/// Where an edge's rows live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EdgeStorage {
    /// FK column on this entity's own table (M2O, inverse O2O).
    FkOnSelf { column: String },
    /// FK column on the target entity's table (O2M, owning O2O).
    FkOnTarget { table: String, column: String },
    /// Junction table row per attachment (M2M), columns oriented from this
    /// entity's perspective.
    Junction {
        table: String,
        self_column: String,
        target_column: String,
    },
}

/// A resolved edge: declarative options plus concrete storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeLayout {
    pub name: String,
    pub target: String,
    pub target_table: String,
    pub cardinality: Cardinality,
    pub inverse: bool,
    pub required: bool,
    pub immutable: bool,
    /// Self-referential edge that is its own inverse (friend-of).
    pub symmetric: bool,
    pub storage: EdgeStorage,
}

impl EdgeLayout {
    /// Unique edges accept at most one target per node.
    pub fn is_unique(&self) -> bool {
        self.cardinality.is_unique()
    }
}

/// A resolved field: definition plus storage column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldColumn {
    pub column: String,
    pub def: FieldDefinition,
}

/// A fully resolved entity layout consumed by specs, the executor, the
/// migrator and codegen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityLayout {
    pub entity: String,
    pub table: String,
    pub id_column: String,
    pub fields: Vec<FieldColumn>,
    pub edges: Vec<EdgeLayout>,
    pub indexes: Vec<IndexDefinition>,
}

impl EntityLayout {
    pub fn field(&self, name: &str) -> Option<&FieldColumn> {
        self.fields.iter().find(|f| f.def.name == name)
    }

    pub fn edge(&self, name: &str) -> Option<&EdgeLayout> {
        self.edges.iter().find(|e| e.name == name)
    }
}

/// All resolved entity layouts, shared across builders and the executor.
#[derive(Debug, Clone)]
pub struct GraphLayout {
    entities: HashMap<String, Arc<EntityLayout>>,
}

impl GraphLayout {
    pub fn entity(&self, name: &str) -> EntResult<Arc<EntityLayout>> {
        self.entities
            .get(name)
            .cloned()
            .ok_or_else(|| EntError::Schema(format!("unknown entity \"{}\"", name)))
    }

    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntityLayout>> {
        self.entities.values()
    }

    pub fn entity_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.entities.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field::FieldType;

    fn registry() -> SchemaRegistry {
        let mut reg = SchemaRegistry::new();
        reg.register_schema(
            EntitySchema::new("user")
                .field(FieldDefinition::new("username", FieldType::String).unique())
                .edge(EdgeDefinition::to("posts", "post").inverse("author"))
                .edge(EdgeDefinition::many("groups", "group").inverse("members"))
                .edge(EdgeDefinition::many("friends", "user").inverse("friends")),
        );
        reg.register_schema(
            EntitySchema::new("post")
                .field(FieldDefinition::new("content", FieldType::String))
                .edge(EdgeDefinition::from("author", "user", "posts").required()),
        );
        reg.register_schema(
            EntitySchema::new("group")
                .field(FieldDefinition::new("name", FieldType::String))
                .edge(EdgeDefinition::many_from("members", "user", "groups")),
        );
        reg
    }

    #[test]
    fn test_resolve_fk_edges() {
        let layout = registry().resolve().unwrap();

        let post = layout.entity("post").unwrap();
        let author = post.edge("author").unwrap();
        assert_eq!(
            author.storage,
            EdgeStorage::FkOnSelf {
                column: "author_id".to_string()
            }
        );
        assert!(author.is_unique());

        let user = layout.entity("user").unwrap();
        let posts = user.edge("posts").unwrap();
        assert_eq!(
            posts.storage,
            EdgeStorage::FkOnTarget {
                table: "posts".to_string(),
                column: "author_id".to_string()
            }
        );
        assert!(!posts.is_unique());
    }

    #[test]
    fn test_resolve_junction_edges() {
        let layout = registry().resolve().unwrap();

        let user = layout.entity("user").unwrap();
        let groups = user.edge("groups").unwrap();
        assert_eq!(
            groups.storage,
            EdgeStorage::Junction {
                table: "users_groups".to_string(),
                self_column: "user_id".to_string(),
                target_column: "group_id".to_string(),
            }
        );

        // The inverse side reuses the owning junction with flipped columns.
        let group = layout.entity("group").unwrap();
        let members = group.edge("members").unwrap();
        assert_eq!(
            members.storage,
            EdgeStorage::Junction {
                table: "users_groups".to_string(),
                self_column: "group_id".to_string(),
                target_column: "user_id".to_string(),
            }
        );
    }

    #[test]
    fn test_symmetric_self_edge() {
        let layout = registry().resolve().unwrap();
        let user = layout.entity("user").unwrap();
        let friends = user.edge("friends").unwrap();
        assert!(friends.symmetric);
        assert_eq!(
            friends.storage,
            EdgeStorage::Junction {
                table: "users_friends".to_string(),
                self_column: "user_id".to_string(),
                target_column: "other_user_id".to_string(),
            }
        );
    }

    #[test]
    fn test_validate_unknown_target() {
        let mut reg = SchemaRegistry::new();
        reg.register_schema(
            EntitySchema::new("orphan").edge(EdgeDefinition::to("ghosts", "ghost")),
        );
        let errors = reg.validate().unwrap_err();
        assert!(errors[0].contains("undefined entity \"ghost\""));
    }

    #[test]
    fn test_validate_missing_inverse() {
        let mut reg = SchemaRegistry::new();
        reg.register_schema(EntitySchema::new("user"));
        reg.register_schema(
            EntitySchema::new("post").edge(EdgeDefinition::from("author", "user", "posts")),
        );
        let errors = reg.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("no owning edge \"posts\"")));
    }

    #[test]
    fn test_reserved_id_field() {
        let mut reg = SchemaRegistry::new();
        reg.register_schema(
            EntitySchema::new("thing").field(FieldDefinition::new("id", FieldType::Int64)),
        );
        let errors = reg.validate().unwrap_err();
        assert!(errors[0].contains("reserved"));
    }
}
