//! Migration stub generation for `make-revision`.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

const TEMPLATE: &str = r#"//! __MESSAGE__
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
        Ok(())
    }

    async fn down(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
        Ok(())
    }
}
"#;

/// Lowercase, ASCII alphanumerics joined by single underscores.
pub fn slugify(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    for ch in message.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
        }
    }
    out.trim_end_matches('_').to_string()
}

/// Message as a single doc line: whitespace runs (newlines included) collapse to one space.
pub fn doc_line(message: &str) -> String {
    message.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn revision_name(message: &str, now: DateTime<Utc>) -> Result<String> {
    let slug = slugify(message);
    if slug.is_empty() {
        return Err(anyhow!("revision message must contain at least one alphanumeric character"));
    }
    Ok(format!("m{}_{}", now.format("%Y%m%d_%H%M%S"), slug))
}

/// Write `src_dir/<name>.rs` and register it in `src_dir/lib.rs`. Returns the new file path.
pub fn generate_revision(src_dir: &Path, message: &str, now: DateTime<Utc>) -> Result<PathBuf> {
    let name = revision_name(message, now)?;
    let file = src_dir.join(format!("{name}.rs"));
    if file.exists() {
        return Err(anyhow!("migration {} already exists", file.display()));
    }
    let lib_path = src_dir.join("lib.rs");
    let lib = fs::read_to_string(&lib_path).with_context(|| format!("reading {}", lib_path.display()))?;
    let updated = register_in_lib(&lib, &name)?;

    fs::write(&file, TEMPLATE.replace("__MESSAGE__", &doc_line(message)))
        .with_context(|| format!("writing {}", file.display()))?;
    fs::write(&lib_path, updated).with_context(|| format!("writing {}", lib_path.display()))?;
    Ok(file)
}

/// Insert `mod <name>;` and `Box::new(<name>::Migration),` after the last existing entries.
pub fn register_in_lib(lib: &str, name: &str) -> Result<String> {
    let mut lines: Vec<String> = lib.lines().map(String::from).collect();

    let last_mod = lines
        .iter()
        .rposition(|l| l.trim_start().starts_with("mod m"))
        .ok_or_else(|| anyhow!("no `mod m...` declaration found in lib.rs"))?;
    lines.insert(last_mod + 1, format!("mod {name};"));

    let last_box = lines
        .iter()
        .rposition(|l| l.trim_start().starts_with("Box::new(m"))
        .ok_or_else(|| anyhow!("no `Box::new(m...)` entry found in lib.rs"))?;
    let indent: String = lines[last_box].chars().take_while(|c| c.is_whitespace()).collect();
    lines.insert(last_box + 1, format!("{indent}Box::new({name}::Migration),"));

    let mut out = lines.join("\n");
    if lib.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const LIB: &str = "pub use sea_orm_migration::prelude::*;\n\nmod m20240101_000001_create_users;\n\npub struct Migrator;\n\nimpl MigratorTrait for Migrator {\n    fn migrations() -> Vec<Box<dyn MigrationTrait>> {\n        vec![\n            Box::new(m20240101_000001_create_users::Migration),\n        ]\n    }\n}\n";

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap()
    }

    #[test]
    fn slug_collapses_separators() {
        assert_eq!(slugify("  Add  user-Avatar!! "), "add_user_avatar");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn name_uses_timestamp_prefix() {
        assert_eq!(revision_name("add avatar", at()).unwrap(), "m20240506_070809_add_avatar");
        assert!(revision_name("!!", at()).is_err());
    }

    #[test]
    fn multiline_message_stays_in_the_doc_comment() {
        assert_eq!(doc_line(" add\navatar\r\n\tcolumn "), "add avatar column");

        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("lib.rs"), LIB).unwrap();
        let path = generate_revision(dir.path(), "add avatar\nfn broken() {}", at()).unwrap();
        let stub = fs::read_to_string(&path).unwrap();
        assert!(stub.starts_with("//! add avatar fn broken() {}\nuse sea_orm_migration::prelude::*;"));
        assert!(!stub.lines().any(|l| l.starts_with("fn broken")));
    }

    #[test]
    fn registers_module_and_box_entry() {
        let out = register_in_lib(LIB, "m20240506_070809_add_avatar").unwrap();
        let mod_pos = out.find("mod m20240506_070809_add_avatar;").unwrap();
        assert!(mod_pos > out.find("mod m20240101_000001_create_users;").unwrap());
        assert!(out.contains("            Box::new(m20240506_070809_add_avatar::Migration),\n        ]"));
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn rejects_lib_without_entries() {
        assert!(register_in_lib("pub struct Migrator;\n", "m1_x").is_err());
    }

    #[test]
    fn writes_stub_file_and_updates_lib() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("lib.rs"), LIB).unwrap();

        let path = generate_revision(dir.path(), "add avatar", at()).unwrap();
        assert_eq!(path.file_name().unwrap(), "m20240506_070809_add_avatar.rs");
        let stub = fs::read_to_string(&path).unwrap();
        assert!(stub.starts_with("//! add avatar"));
        assert!(stub.contains("impl MigrationTrait for Migration"));

        let lib = fs::read_to_string(dir.path().join("lib.rs")).unwrap();
        assert!(lib.contains("mod m20240506_070809_add_avatar;"));

        // same second, same message
        assert!(generate_revision(dir.path(), "add avatar", at()).is_err());
    }
}
