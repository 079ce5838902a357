//! Resolves a relation name to its ordered attribute list (§6, §10). A
//! thin read/write layer over one `<name>.schema` sidecar file per table
//! plus a saved-state file listing every table that has been created, so
//! the registry can be reconstituted at startup — mirrors the teacher's
//! `get_creation_sql_and_root_pagenum` catalog lookup, adapted from a
//! schema-table row to a flat sidecar file.

use crate::schema::{Attribute, Schema};
use crate::types::Type;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const SAVED_STATE_FILE: &str = "catalog.saved";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("reading catalog state at {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("writing catalog state at {0}: {1}")]
    Write(PathBuf, #[source] std::io::Error),
    #[error("malformed schema file {0}: {1}")]
    Malformed(PathBuf, String),
    #[error("table {0} already exists")]
    AlreadyExists(String),
    #[error("table {0} does not exist")]
    NotFound(String),
}

/// The in-memory relation registry, backed by `data_dir`.
pub struct Catalog {
    data_dir: PathBuf,
    tables: BTreeMap<String, Schema>,
}

impl Catalog {
    /// Reconstitutes the registry from the saved-state file and each
    /// table's `.schema` sidecar. A missing saved-state file means no
    /// tables have been created yet — not an error.
    pub fn load(data_dir: impl Into<PathBuf>) -> Result<Catalog, Error> {
        let data_dir = data_dir.into();
        let saved_state_path = data_dir.join(SAVED_STATE_FILE);
        let mut tables = BTreeMap::new();
        if saved_state_path.exists() {
            let text = fs::read_to_string(&saved_state_path).map_err(|e| Error::Read(saved_state_path.clone(), e))?;
            for name in text.lines().filter(|l| !l.trim().is_empty()) {
                let schema = Self::read_schema_file(&data_dir, name)?;
                tables.insert(name.to_string(), schema);
            }
        }
        Ok(Catalog { data_dir, tables })
    }

    fn schema_path(data_dir: &Path, name: &str) -> PathBuf {
        data_dir.join(format!("{name}.schema"))
    }

    fn read_schema_file(data_dir: &Path, name: &str) -> Result<Schema, Error> {
        let path = Self::schema_path(data_dir, name);
        let text = fs::read_to_string(&path).map_err(|e| Error::Read(path.clone(), e))?;
        let mut attributes = vec![];
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let (attr_name, type_str) = line
                .split_once(' ')
                .ok_or_else(|| Error::Malformed(path.clone(), format!("expected '<attr> <type>', got {line:?}")))?;
            let r#type = Type::from_str(type_str).map_err(|_| Error::Malformed(path.clone(), format!("unknown type {type_str:?}")))?;
            attributes.push(Attribute::new(attr_name, r#type));
        }
        Ok(Schema::new(name, attributes))
    }

    fn write_schema_file(&self, name: &str, schema: &Schema) -> Result<(), Error> {
        let path = Self::schema_path(&self.data_dir, name);
        let mut text = String::new();
        for attr in &schema.attributes {
            text.push_str(&format!("{} {}\n", attr.name, attr.r#type));
        }
        fs::write(&path, text).map_err(|e| Error::Write(path, e))
    }

    fn append_saved_state(&self, name: &str) -> Result<(), Error> {
        let path = self.data_dir.join(SAVED_STATE_FILE);
        let mut text = if path.exists() { fs::read_to_string(&path).map_err(|e| Error::Read(path.clone(), e))? } else { String::new() };
        text.push_str(name);
        text.push('\n');
        fs::write(&path, text).map_err(|e| Error::Write(path, e))
    }

    fn rewrite_saved_state(&self) -> Result<(), Error> {
        let path = self.data_dir.join(SAVED_STATE_FILE);
        let text: String = self.tables.keys().map(|n| format!("{n}\n")).collect();
        fs::write(&path, text).map_err(|e| Error::Write(path, e))
    }

    /// Registers `name` with the given attribute list, persisting its
    /// `.schema` sidecar and appending it to the saved-state file.
    pub fn create_table(&mut self, name: &str, attributes: Vec<Attribute>) -> Result<Schema, Error> {
        if self.tables.contains_key(name) {
            return Err(Error::AlreadyExists(name.to_string()));
        }
        let schema = Schema::new(name, attributes);
        self.write_schema_file(name, &schema)?;
        self.append_saved_state(name)?;
        self.tables.insert(name.to_string(), schema.clone());
        Ok(schema)
    }

    /// Removes `name` from the registry and deletes its `.schema`
    /// sidecar; the caller is responsible for the `.bin`/`.bin.meta` pair.
    pub fn drop_table(&mut self, name: &str) -> Result<(), Error> {
        if self.tables.remove(name).is_none() {
            return Err(Error::NotFound(name.to_string()));
        }
        let schema_path = Self::schema_path(&self.data_dir, name);
        fs::remove_file(&schema_path).map_err(|e| Error::Write(schema_path, e))?;
        self.rewrite_saved_state()
    }

    pub fn schema(&self, name: &str) -> Result<&Schema, Error> {
        self.tables.get(name).ok_or_else(|| Error::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type::{Int, String as Str};

    #[test]
    fn create_then_reload_roundtrips_schema() {
        let dir = std::env::temp_dir().join(format!("microql-catalog-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let mut catalog = Catalog::load(&dir).unwrap();
        catalog.create_table("r", vec![Attribute::new("a", Int), Attribute::new("b", Str)]).unwrap();

        let reloaded = Catalog::load(&dir).unwrap();
        let schema = reloaded.schema("r").unwrap();
        assert_eq!(schema.attributes, vec![Attribute::new("a", Int), Attribute::new("b", Str)]);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn create_existing_table_errors() {
        let dir = std::env::temp_dir().join(format!("microql-catalog-test2-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let mut catalog = Catalog::load(&dir).unwrap();
        catalog.create_table("r", vec![Attribute::new("a", Int)]).unwrap();
        assert!(matches!(catalog.create_table("r", vec![]), Err(Error::AlreadyExists(_))));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn drop_removes_schema_file_and_registry_entry() {
        let dir = std::env::temp_dir().join(format!("microql-catalog-test3-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let mut catalog = Catalog::load(&dir).unwrap();
        catalog.create_table("r", vec![Attribute::new("a", Int)]).unwrap();
        catalog.drop_table("r").unwrap();
        assert!(!catalog.contains("r"));
        assert!(!Catalog::schema_path(&dir, "r").exists());
        assert!(matches!(catalog.drop_table("r"), Err(Error::NotFound(_))));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_saved_state_is_empty_catalog() {
        let dir = std::env::temp_dir().join(format!("microql-catalog-test4-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let catalog = Catalog::load(&dir).unwrap();
        assert_eq!(catalog.table_names().count(), 0);
        fs::remove_dir_all(&dir).ok();
    }
}
