// Model struct generator: one typed struct per entity with a `from_node`
// scanner and edge traversal methods.

use super::utils;
use crate::schema::registry::EntityLayout;

pub struct ModelGenerator;

impl ModelGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Full source of the generated model file.
    pub fn generate(&self, entity: &EntityLayout) -> String {
        let struct_name = utils::pascal_case(&entity.entity);
        let mut out = utils::file_header("model", &entity.entity);

        out.push_str(&self.imports(entity));
        out.push_str(&self.struct_def(entity, &struct_name));
        out.push_str(&format!("impl {} {{\n", struct_name));
        out.push_str(&format!(
            "    pub const ENTITY: &'static str = \"{}\";\n\n",
            entity.entity
        ));
        out.push_str(&self.from_node(entity));
        out.push_str(&self.edge_methods(entity));
        out.push_str("}\n");
        out
    }

    fn imports(&self, entity: &EntityLayout) -> String {
        let mut imports = String::from("use serde::{Deserialize, Serialize};\n");
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
        imports.push('\n');
        imports.push_str("use entgraph::error::{EntError, EntResult};\n");
        imports.push_str("use entgraph::executor::{GraphExecutor, Node};\n");
        if !entity.edges.is_empty() {
            imports.push_str("use entgraph::schema::registry::GraphLayout;\n");
        }
        imports.push('\n');
        imports
    }

    fn struct_def(&self, entity: &EntityLayout, struct_name: &str) -> String {
        let mut def = String::from("#[derive(Debug, Clone, Serialize, Deserialize)]\n");
        def.push_str(&format!("pub struct {} {{\n", struct_name));
        def.push_str("    pub id: i64,\n");
        for field in &entity.fields {
            let base = utils::rust_type(&field.def.field_type);
            if field.def.optional {
                def.push_str(&format!("    pub {}: Option<{}>,\n", field.def.name, base));
            } else {
                def.push_str(&format!("    pub {}: {},\n", field.def.name, base));
            }
        }
        def.push_str("}\n\n");
        def
    }

    fn from_node(&self, entity: &EntityLayout) -> String {
        let mut method = String::from("    /// Hydrate from a fetched node.\n");
        method.push_str("    pub fn from_node(node: &Node) -> EntResult<Self> {\n");
        method.push_str("        Ok(Self {\n");
        method.push_str("            id: node.id,\n");
        for field in &entity.fields {
            let accessor = utils::node_accessor(&field.def.field_type);
            if field.def.optional {
                method.push_str(&format!(
                    "            {}: node.{}(\"{}\"),\n",
                    field.def.name, accessor, field.def.name
                ));
            } else {
                method.push_str(&format!(
                    "            {}: node\n                .{}(\"{}\")\n                .ok_or_else(|| EntError::MissingRequired(\"{}\".to_string()))?,\n",
                    field.def.name, accessor, field.def.name, field.def.name
                ));
            }
        }
        method.push_str("        })\n");
        method.push_str("    }\n");
        method
    }

    fn edge_methods(&self, entity: &EntityLayout) -> String {
        let mut methods = String::new();
        for edge in &entity.edges {
            methods.push('\n');
            methods.push_str(&format!(
                "    /// Ids reachable over the \"{}\" edge.\n",
                edge.name
            ));
            if edge.is_unique() {
                methods.push_str(&format!(
                    "    pub async fn {}(&self, exec: &GraphExecutor, graph: &GraphLayout) -> EntResult<Option<i64>> {{\n",
                    edge.name
                ));
                methods.push_str("        let layout = graph.entity(Self::ENTITY)?;\n");
                methods.push_str(&format!(
                    "        Ok(exec\n            .neighbor_ids(&layout, \"{}\", self.id)\n            .await?\n            .into_iter()\n            .next())\n",
                    edge.name
                ));
            } else {
                methods.push_str(&format!(
                    "    pub async fn {}(&self, exec: &GraphExecutor, graph: &GraphLayout) -> EntResult<Vec<i64>> {{\n",
                    edge.name
                ));
                methods.push_str("        let layout = graph.entity(Self::ENTITY)?;\n");
                methods.push_str(&format!(
                    "        exec.neighbor_ids(&layout, \"{}\", self.id).await\n",
                    edge.name
                ));
            }
            methods.push_str("    }\n");
        }
        methods
    }
}

impl Default for ModelGenerator {
    fn default() -> Self {
        Self::new()
    }
}
