// Code generation pipeline: resolve the registry, then emit one module per
// entity (typed model + builders) plus an index module, into a target
// directory.

pub mod builder_gen;
pub mod model_gen;
pub mod utils;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{EntError, EntResult};
use crate::schema::registry::SchemaRegistry;

fn io_err(context: &str, err: std::io::Error) -> EntError {
    EntError::Codegen(format!("{}: {}", context, err))
}

/// Orchestrates the generators over a schema registry.
pub struct CodeGenerator {
    registry: SchemaRegistry,
    out_dir: PathBuf,
}

impl CodeGenerator {
    pub fn new(registry: SchemaRegistry, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            out_dir: out_dir.into(),
        }
    }

    /// Run the full pipeline. Returns the paths of every written file.
    pub fn generate_all(&self) -> EntResult<Vec<PathBuf>> {
        tracing::info!(out_dir = %self.out_dir.display(), "starting codegen pipeline");

        self.registry
            .validate()
            .map_err(|errors| EntError::Codegen(format!(
                "schema validation failed:\n{}",
                errors.join("\n")
            )))?;
        let layout = self.registry.resolve()?;
        tracing::info!(entities = layout.entity_names().len(), "schemas resolved");

        self.cleanup_previous()?;

        let model_gen = model_gen::ModelGenerator::new();
        let builder_gen = builder_gen::BuilderGenerator::new();
        let mut written = Vec::new();

        for name in layout.entity_names() {
            let entity = layout.entity(&name)?;
            let entity_dir = self.out_dir.join(&name);
            fs::create_dir_all(&entity_dir)
                .map_err(|e| io_err("failed to create entity directory", e))?;

            let model_path = entity_dir.join("model.rs");
            fs::write(&model_path, model_gen.generate(&entity))
                .map_err(|e| io_err("failed to write model", e))?;
            written.push(model_path);

            let builder_path = entity_dir.join("builder.rs");
            fs::write(&builder_path, builder_gen.generate(&entity))
                .map_err(|e| io_err("failed to write builder", e))?;
            written.push(builder_path);

            let mod_path = entity_dir.join("mod.rs");
            fs::write(&mod_path, self.entity_mod(&name))
                .map_err(|e| io_err("failed to write entity mod", e))?;
            written.push(mod_path);

            tracing::info!(entity = %name, "generated entity module");
        }

        let index_path = self.out_dir.join("mod.rs");
        fs::write(&index_path, self.index_mod(&layout.entity_names()))
            .map_err(|e| io_err("failed to write index mod", e))?;
        written.push(index_path);

        tracing::info!(files = written.len(), "codegen pipeline complete");
        Ok(written)
    }

    /// Remove previously generated files so deleted entities do not leave
    /// stale modules behind. Only files this generator writes are touched.
    fn cleanup_previous(&self) -> EntResult<()> {
        if !self.out_dir.exists() {
            fs::create_dir_all(&self.out_dir)
                .map_err(|e| io_err("failed to create output directory", e))?;
            return Ok(());
        }

        let entries = fs::read_dir(&self.out_dir)
            .map_err(|e| io_err("failed to read output directory", e))?;
        for entry in entries {
            let entry = entry.map_err(|e| io_err("failed to read output entry", e))?;
            let path = entry.path();
            if path.is_dir() {
                for file in ["model.rs", "builder.rs", "mod.rs"] {
                    let file_path = path.join(file);
                    if file_path.exists() {
                        fs::remove_file(&file_path)
                            .map_err(|e| io_err("failed to remove generated file", e))?;
                    }
                }
                // Drop the directory if nothing else lives in it.
                let _ = fs::remove_dir(&path);
            }
        }
        let index = self.out_dir.join("mod.rs");
        if index.exists() {
            fs::remove_file(&index).map_err(|e| io_err("failed to remove index mod", e))?;
        }
        Ok(())
    }

    fn entity_mod(&self, entity: &str) -> String {
        let mut content = utils::file_header("module", entity);
        content.push_str("pub mod builder;\npub mod model;\n\npub use builder::*;\npub use model::*;\n");
        content
    }

    fn index_mod(&self, entities: &[String]) -> String {
        let mut content = String::from(
            "// @generated entity modules.\n// DO NOT EDIT - regenerate with `entc generate`.\n\n",
        );
        for entity in entities {
            content.push_str(&format!("pub mod {};\n", entity));
        }
        content
    }
}

/// Convenience wrapper used by the CLI.
pub fn generate(registry: SchemaRegistry, out_dir: &Path) -> EntResult<Vec<PathBuf>> {
    CodeGenerator::new(registry, out_dir).generate_all()
}
