//! `Attribute` and `Schema`, per §3. A schema is the ordered attribute
//! list the rest of the system resolves names and types against.

use crate::types::Type;

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub r#type: Type,
}

impl Attribute {
    pub fn new(name: impl Into<String>, r#type: Type) -> Self {
        Attribute { name: name.into(), r#type }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    pub name: String,
    pub attributes: Vec<Attribute>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("attribute {0} not found in schema {1}")]
    AttributeNotFound(String, String),
}

impl Schema {
    pub fn new(name: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        Schema { name: name.into(), attributes }
    }

    /// Finds an attribute by unqualified name, returning its index.
    /// Resolution also accepts `relation.attr`, stripping the qualifier
    /// if it matches this schema's name (join predicates resolve against
    /// a single schema at a time; the planner is responsible for picking
    /// the correct side).
    pub fn index_of(&self, name: &str) -> Result<usize, Error> {
        let unqualified = match name.split_once('.') {
            Some((rel, attr)) if rel == self.name => attr,
            _ => name,
        };
        self.attributes
            .iter()
            .position(|a| a.name == unqualified)
            .ok_or_else(|| Error::AttributeNotFound(name.to_string(), self.name.clone()))
    }

    pub fn type_of(&self, name: &str) -> Result<Type, Error> {
        Ok(self.attributes[self.index_of(name)?].r#type)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Concatenates two schemas, used when building the output schema of
    /// a join. The merged schema has no single relation name; callers
    /// that need one (the planner, for partition bookkeeping) supply
    /// their own key separately.
    pub fn merge(&self, other: &Schema) -> Schema {
        let mut attributes = self.attributes.clone();
        attributes.extend(other.attributes.iter().cloned());
        Schema::new(format!("{}_{}", self.name, other.name), attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new(
            "r",
            vec![Attribute::new("a", Type::Int), Attribute::new("b", Type::Double)],
        )
    }

    #[test]
    fn index_of_unqualified_and_qualified() {
        let s = schema();
        assert_eq!(s.index_of("a").unwrap(), 0);
        assert_eq!(s.index_of("r.b").unwrap(), 1);
        assert!(s.index_of("c").is_err());
    }

    #[test]
    fn merge_concatenates() {
        let l = schema();
        let r = Schema::new("s", vec![Attribute::new("c", Type::String)]);
        let m = l.merge(&r);
        assert_eq!(m.len(), 3);
        assert_eq!(m.attributes[2].name, "c");
    }
}
