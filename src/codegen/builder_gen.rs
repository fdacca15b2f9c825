// Builder generator: typed Create/UpdateOne/Update/Delete wrappers per
// entity, delegating to the runtime node builders. The generated save()
// returns the typed model, re-read after the mutation commits.

use super::utils;
use crate::schema::registry::{EdgeLayout, EntityLayout};

pub struct BuilderGenerator;

impl BuilderGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Full source of the generated builder file.
    pub fn generate(&self, entity: &EntityLayout) -> String {
        let struct_name = utils::pascal_case(&entity.entity);
        let mut out = utils::file_header("builders", &entity.entity);
        out.push_str(&self.imports(entity, &struct_name));
        out.push_str(&self.create_builder(entity, &struct_name));
        out.push_str(&self.update_one_builder(entity, &struct_name));
        out.push_str(&self.update_builder(entity, &struct_name));
        out.push_str(&self.delete_builder(entity, &struct_name));
        out
    }

    fn imports(&self, entity: &EntityLayout, struct_name: &str) -> String {
        let mut imports = String::new();
        if entity
            .fields
            .iter()
            .any(|f| utils::needs_chrono(&f.def.field_type))
        {
            imports.push_str("use chrono::{DateTime, Utc};\n");
        }
        if entity
            .fields
            .iter()
            .any(|f| utils::needs_uuid(&f.def.field_type))
        {
            imports.push_str("use uuid::Uuid;\n");
        }
        imports.push_str(
            "use entgraph::builder::{NodeCreate, NodeDelete, NodeUpdate, NodeUpdateOne};\n",
        );
        imports.push_str("use entgraph::error::EntResult;\n");
        imports.push_str("use entgraph::executor::GraphExecutor;\n");
        imports.push_str("use entgraph::schema::registry::GraphLayout;\n\n");
        imports.push_str(&format!("use super::model::{};\n\n", struct_name));
        imports
    }

    fn field_setter(&self, inner: &str, name: &str, ty: &crate::schema::FieldType) -> String {
        let (param, expr) = utils::setter_signature(ty);
        format!(
            "    pub fn {}(mut self, value: {}) -> Self {{\n        self.{} = self.{}.set(\"{}\", {});\n        self\n    }}\n\n",
            name, param, inner, inner, name, expr
        )
    }

    fn edge_setters(&self, edge: &EdgeLayout, removals: bool) -> String {
        let mut methods = String::new();
        if edge.is_unique() {
            methods.push_str(&format!(
                "    pub fn set_{}(mut self, id: i64) -> Self {{\n        self.inner = self.inner.add_edge(\"{}\", &[id]);\n        self\n    }}\n\n",
                edge.name, edge.name
            ));
        } else {
            methods.push_str(&format!(
                "    pub fn add_{}(mut self, ids: &[i64]) -> Self {{\n        self.inner = self.inner.add_edge(\"{}\", ids);\n        self\n    }}\n\n",
                edge.name, edge.name
            ));
        }
        if removals {
            if !edge.is_unique() {
                methods.push_str(&format!(
                    "    pub fn remove_{}(mut self, ids: &[i64]) -> Self {{\n        self.inner = self.inner.remove_edge(\"{}\", ids);\n        self\n    }}\n\n",
                    edge.name, edge.name
                ));
            }
            methods.push_str(&format!(
                "    pub fn clear_{}(mut self) -> Self {{\n        self.inner = self.inner.clear_edge(\"{}\");\n        self\n    }}\n\n",
                edge.name, edge.name
            ));
        }
        methods
    }

    fn create_builder(&self, entity: &EntityLayout, struct_name: &str) -> String {
        let builder = format!("{}Create", struct_name);
        let mut out = format!("pub struct {} {{\n    inner: NodeCreate,\n}}\n\n", builder);
        out.push_str(&format!("impl {} {{\n", builder));
        out.push_str(&format!(
            "    pub fn new(graph: &GraphLayout) -> EntResult<Self> {{\n        Ok(Self {{\n            inner: NodeCreate::new(graph.entity(\"{}\")?),\n        }})\n    }}\n\n",
            entity.entity
        ));
        for field in &entity.fields {
            out.push_str(&self.field_setter("inner", &field.def.name, &field.def.field_type));
        }
        for edge in &entity.edges {
            out.push_str(&self.edge_setters(edge, false));
        }
        out.push_str(&format!(
            "    pub async fn save(self, exec: &GraphExecutor) -> EntResult<{}> {{\n        let node = self.inner.save(exec).await?;\n        {}::from_node(&node)\n    }}\n",
            struct_name, struct_name
        ));
        out.push_str("}\n\n");
        out
    }

    fn update_one_builder(&self, entity: &EntityLayout, struct_name: &str) -> String {
        let builder = format!("{}UpdateOne", struct_name);
        let mut out = format!(
            "pub struct {} {{\n    inner: NodeUpdateOne,\n}}\n\n",
            builder
        );
        out.push_str(&format!("impl {} {{\n", builder));
        out.push_str(&format!(
            "    pub fn new(graph: &GraphLayout, id: i64) -> EntResult<Self> {{\n        Ok(Self {{\n            inner: NodeUpdateOne::new(graph.entity(\"{}\")?, id),\n        }})\n    }}\n\n",
            entity.entity
        ));
        for field in &entity.fields {
            if field.def.immutable {
                continue;
            }
            out.push_str(&self.field_setter("inner", &field.def.name, &field.def.field_type));
            if field.def.optional {
                out.push_str(&format!(
                    "    pub fn clear_{}(mut self) -> Self {{\n        self.inner = self.inner.clear(\"{}\");\n        self\n    }}\n\n",
                    field.def.name, field.def.name
                ));
            }
        }
        for edge in &entity.edges {
            if edge.immutable {
                continue;
            }
            out.push_str(&self.edge_setters(edge, true));
        }
        out.push_str(&format!(
            "    pub async fn save(self, exec: &GraphExecutor) -> EntResult<{}> {{\n        let node = self.inner.save(exec).await?;\n        {}::from_node(&node)\n    }}\n",
            struct_name, struct_name
        ));
        out.push_str("}\n\n");
        out
    }

    fn update_builder(&self, entity: &EntityLayout, struct_name: &str) -> String {
        let builder = format!("{}Update", struct_name);
        let mut out = format!("pub struct {} {{\n    inner: NodeUpdate,\n}}\n\n", builder);
        out.push_str(&format!("impl {} {{\n", builder));
        out.push_str(&format!(
            "    pub fn new(graph: &GraphLayout) -> EntResult<Self> {{\n        Ok(Self {{\n            inner: NodeUpdate::new(graph.entity(\"{}\")?),\n        }})\n    }}\n\n",
            entity.entity
        ));
        out.push_str("    pub fn filter_ids(mut self, ids: &[i64]) -> Self {\n        self.inner = self.inner.filter_ids(ids);\n        self\n    }\n\n");
        for field in &entity.fields {
            let (param, expr) = utils::setter_signature(&field.def.field_type);
            out.push_str(&format!(
                "    pub fn filter_{}_eq(mut self, value: {}) -> Self {{\n        self.inner = self.inner.filter_eq(\"{}\", {});\n        self\n    }}\n\n",
                field.def.name, param, field.def.name, expr
            ));
            if field.def.immutable {
                continue;
            }
            out.push_str(&self.field_setter("inner", &field.def.name, &field.def.field_type));
            if field.def.optional {
                out.push_str(&format!(
                    "    pub fn clear_{}(mut self) -> Self {{\n        self.inner = self.inner.clear(\"{}\");\n        self\n    }}\n\n",
                    field.def.name, field.def.name
                ));
            }
        }
        out.push_str("    /// Returns the number of updated rows.\n");
        out.push_str("    pub async fn save(self, exec: &GraphExecutor) -> EntResult<u64> {\n        self.inner.save(exec).await\n    }\n");
        out.push_str("}\n\n");
        out
    }

    fn delete_builder(&self, entity: &EntityLayout, struct_name: &str) -> String {
        let builder = format!("{}Delete", struct_name);
        let mut out = format!("pub struct {} {{\n    inner: NodeDelete,\n}}\n\n", builder);
        out.push_str(&format!("impl {} {{\n", builder));
        out.push_str(&format!(
            "    pub fn new(graph: &GraphLayout, id: i64) -> EntResult<Self> {{\n        Ok(Self {{\n            inner: NodeDelete::new(graph.entity(\"{}\")?, id),\n        }})\n    }}\n\n",
            entity.entity
        ));
        out.push_str("    pub async fn exec(self, exec: &GraphExecutor) -> EntResult<()> {\n        self.inner.exec(exec).await\n    }\n");
        out.push_str("}\n");
        out
    }
}

impl Default for BuilderGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        EdgeDefinition, EntitySchema, FieldDefinition, FieldType, SchemaRegistry,
    };

    fn layout() -> crate::schema::registry::GraphLayout {
        let mut reg = SchemaRegistry::new();
        reg.register_schema(
            EntitySchema::new("user")
                .field(FieldDefinition::new("username", FieldType::String).immutable())
                .field(FieldDefinition::new("bio", FieldType::String).optional())
                .edge(EdgeDefinition::to("posts", "post").inverse("author")),
        );
        reg.register_schema(
            EntitySchema::new("post")
                .edge(EdgeDefinition::from("author", "user", "posts")),
        );
        reg.resolve().unwrap()
    }

    #[test]
    fn test_create_builder_setters() {
        let layout = layout();
        let source = BuilderGenerator::new().generate(&layout.entity("user").unwrap());
        assert!(source.contains("pub struct UserCreate {"));
        assert!(source.contains("pub fn username(mut self, value: impl Into<String>)"));
        assert!(source.contains("pub fn add_posts(mut self, ids: &[i64])"));
    }

    #[test]
    fn test_immutable_field_has_no_update_setter() {
        let layout = layout();
        let source = BuilderGenerator::new().generate(&layout.entity("user").unwrap());
        let update_one = source.split("pub struct UserUpdateOne").nth(1).unwrap();
        let update_one = update_one.split("pub struct UserUpdate").next().unwrap();
        assert!(!update_one.contains("pub fn username("));
        assert!(update_one.contains("pub fn clear_bio("));
    }

    #[test]
    fn test_unique_edge_uses_set_method() {
        let layout = layout();
        let source = BuilderGenerator::new().generate(&layout.entity("post").unwrap());
        assert!(source.contains("pub fn set_author(mut self, id: i64)"));
    }
}
