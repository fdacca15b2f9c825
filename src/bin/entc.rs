// entc - code generator CLI: validate schemas, print resolved storage
// layouts, or generate typed entity code.

use std::env;
use std::path::Path;

use entgraph::codegen::CodeGenerator;
use entgraph::executor::statement::Dialect;
use entgraph::migrate::SchemaMigrator;
use entgraph::sample::sample_registry;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: entc <command>");
        eprintln!("Commands:");
        eprintln!("  validate            - Validate schema definitions");
        eprintln!("  generate [out_dir]  - Generate entity code (default: src/generated)");
        eprintln!("  ddl [sqlite|postgres] - Print migration DDL");
        return Ok(());
    }

    match args[1].as_str() {
        "validate" => validate()?,
        "generate" => generate(args.get(2).map(String::as_str).unwrap_or("src/generated"))?,
        "ddl" => ddl(args.get(2).map(String::as_str).unwrap_or("sqlite"))?,
        other => {
            eprintln!("Unknown command: {}", other);
            eprintln!("Use 'validate', 'generate' or 'ddl'");
        }
    }

    Ok(())
}

fn validate() -> Result<(), Box<dyn std::error::Error>> {
    match sample_registry().validate() {
        Ok(()) => {
            println!("All schemas are valid");
            Ok(())
        }
        Err(errors) => {
            eprintln!("Schema validation failed:");
            for error in errors {
                eprintln!("  - {}", error);
            }
            Err("schema validation failed".into())
        }
    }
}

fn generate(out_dir: &str) -> Result<(), Box<dyn std::error::Error>> {
    let generator = CodeGenerator::new(sample_registry(), Path::new(out_dir));
    let written = generator.generate_all()?;
    println!("Generated {} files in {}", written.len(), out_dir);
    Ok(())
}

fn ddl(dialect: &str) -> Result<(), Box<dyn std::error::Error>> {
    let dialect = match dialect {
        "sqlite" => Dialect::Sqlite,
        "postgres" => Dialect::Postgres,
        other => {
            return Err(format!("unknown dialect: {}", other).into());
        }
    };
    let layout = sample_registry().resolve()?;
    for stmt in SchemaMigrator::new(layout).statements(dialect) {
        println!("{};", stmt.sql);
    }
    Ok(())
}
