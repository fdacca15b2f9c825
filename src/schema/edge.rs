// Edge definitions - relationships between entities in the schema DSL.
// The four relational cardinalities map onto two storage shapes: a foreign
// key column (O2O, O2M, M2O) or a junction table (M2M). Which table carries
// the FK follows ent semantics: the `from` side's table holds the column.

use serde::{Deserialize, Serialize};

/// Relationship multiplicity, seen from the declaring entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Cardinality {
    /// Unique edges accept at most one target id per node.
    pub fn is_unique(&self) -> bool {
        matches!(self, Cardinality::OneToOne | Cardinality::ManyToOne)
    }
}

/// A single edge declaration inside an entity schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDefinition {
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,
    /// True for back-references declared with `from`/`many_from`.
    pub inverse: bool,
    /// Name of the edge on the other side, when declared.
    pub inverse_name: Option<String>,
    pub required: bool,
    pub immutable: bool,
    pub storage_key: Option<String>,
}

impl EdgeDefinition {
    /// Owning has-many edge (O2M): the foreign key lives on the target's
    /// table. `.unique()` collapses it to an owning O2O.
    pub fn to(name: &str, target: &str) -> Self {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            cardinality: Cardinality::OneToMany,
            inverse: false,
            inverse_name: None,
            required: false,
            immutable: false,
            storage_key: None,
        }
    }

    /// Back-reference of a `to` edge (M2O): the foreign key lives on this
    /// entity's table, in column `<name>_id` unless overridden.
    pub fn from(name: &str, target: &str, inverse_of: &str) -> Self {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            cardinality: Cardinality::ManyToOne,
            inverse: true,
            inverse_name: Some(inverse_of.to_string()),
            required: false,
            immutable: false,
            storage_key: None,
        }
    }

    /// Owning many-to-many edge: stored in junction table
    /// `<owner_table>_<name>` unless overridden.
    pub fn many(name: &str, target: &str) -> Self {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            cardinality: Cardinality::ManyToMany,
            inverse: false,
            inverse_name: None,
            required: false,
            immutable: false,
            storage_key: None,
        }
    }

    /// Back-reference of a `many` edge: reuses the owning side's junction
    /// table with flipped columns.
    pub fn many_from(name: &str, target: &str, inverse_of: &str) -> Self {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            cardinality: Cardinality::ManyToMany,
            inverse: true,
            inverse_name: Some(inverse_of.to_string()),
            required: false,
            immutable: false,
            storage_key: None,
        }
    }

    /// Collapse to a one-to-one relationship. On a `to` edge the unique
    /// constraint lands on the target's FK column; on a `from` edge the
    /// local FK column becomes unique.
    pub fn unique(mut self) -> Self {
        match self.cardinality {
            Cardinality::OneToMany | Cardinality::ManyToOne => {
                self.cardinality = Cardinality::OneToOne;
            }
            Cardinality::OneToOne => {}
            Cardinality::ManyToMany => {
                // A unique M2M is a contradiction; callers should use to/from.
                self.cardinality = Cardinality::OneToOne;
            }
        }
        self
    }

    /// Name the edge on the other side; for owning edges this determines the
    /// FK column (`<inverse>_id`) on the target table.
    pub fn inverse(mut self, name: &str) -> Self {
        self.inverse_name = Some(name.to_string());
        self
    }

    /// Required edges must be attached at create time. For M2O this makes
    /// the FK column NOT NULL.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Immutable edges are rejected by update builders.
    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    /// Override the FK column (FK-backed edges) or junction table name (M2M).
    pub fn storage_key(mut self, key: &str) -> Self {
        self.storage_key = Some(key.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_unique_collapses_to_o2o() {
        let edge = EdgeDefinition::to("profile", "profile").unique();
        assert_eq!(edge.cardinality, Cardinality::OneToOne);
        assert!(!edge.inverse);
    }

    #[test]
    fn test_from_is_many_to_one() {
        let edge = EdgeDefinition::from("author", "user", "posts");
        assert_eq!(edge.cardinality, Cardinality::ManyToOne);
        assert!(edge.inverse);
        assert!(edge.cardinality.is_unique());
    }
}
