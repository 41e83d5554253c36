//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `modelstore_core` linkage.
//! - Print the SQL type table of a dialect for quick local checks.

use modelstore_core::{AttributeDescriptor, Dialect, RuntimeType, TypeMapper};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => {
            println!("modelstore_core version={}", modelstore_core::core_version());
            ExitCode::SUCCESS
        }
        [command, dialect] if command == "sql-types" => match dialect.parse::<Dialect>() {
            Ok(dialect) => {
                print_sql_types(dialect);
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("{err}");
                ExitCode::from(2)
            }
        },
        _ => {
            eprintln!("usage: modelstore_cli [sql-types <postgres|h2|sqlite|mysql>]");
            ExitCode::from(2)
        }
    }
}

fn print_sql_types(dialect: Dialect) {
    let mapper = TypeMapper::for_dialect(dialect);
    println!("dialect={dialect}");
    for runtime_type in RuntimeType::ALL {
        let attribute = AttributeDescriptor::new("value", runtime_type);
        println!("{:<10} {}", runtime_type.as_str(), mapper.sql_type_for(&attribute));
    }
}
