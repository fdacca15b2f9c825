// Sample social graph schemas. The entc binary generates code for these and
// the integration tests run mutations against them; they exercise every
// edge shape the resolver supports.

use crate::schema::{
    EdgeDefinition, EntSchema, EntitySchema, FieldDefault, FieldDefinition, FieldType,
    FieldValidator, IndexDefinition, SchemaRegistry,
};

pub struct User;

impl EntSchema for User {
    fn schema() -> EntitySchema {
        EntitySchema::new("user")
            .field(
                FieldDefinition::new("username", FieldType::String)
                    .unique()
                    .validate(FieldValidator::MinLength(3))
                    .validate(FieldValidator::MaxLength(32)),
            )
            .field(
                FieldDefinition::new("email", FieldType::String)
                    .validate(FieldValidator::Pattern(r"^[^@\s]+@[^@\s]+$".to_string())),
            )
            .field(FieldDefinition::new("bio", FieldType::String).optional())
            .field(
                FieldDefinition::new("is_active", FieldType::Bool)
                    .default_value(FieldDefault::Bool(true)),
            )
            .field(FieldDefinition::new("created_at", FieldType::Time).optional())
            .field(FieldDefinition::new("updated_at", FieldType::Time).optional())
            .edge(EdgeDefinition::to("posts", "post").inverse("author"))
            .edge(EdgeDefinition::to("profile", "profile").unique().inverse("owner"))
            .edge(EdgeDefinition::many("groups", "group").inverse("members"))
            // Self-referential and its own inverse: stored once per pair.
            .edge(EdgeDefinition::many("friends", "user").inverse("friends"))
            .index(IndexDefinition::new("idx_users_email", vec!["email"]))
    }
}

pub struct Post;

impl EntSchema for Post {
    fn schema() -> EntitySchema {
        EntitySchema::new("post")
            .field(
                FieldDefinition::new("content", FieldType::String)
                    .validate(FieldValidator::NonEmpty),
            )
            .field(
                FieldDefinition::new("likes", FieldType::Int64)
                    .default_value(FieldDefault::Int(0)),
            )
            .field(FieldDefinition::new("created_at", FieldType::Time).optional())
            .field(FieldDefinition::new("updated_at", FieldType::Time).optional())
            .edge(
                EdgeDefinition::from("author", "user", "posts")
                    .required()
                    .immutable(),
            )
    }
}

pub struct Group;

impl EntSchema for Group {
    fn schema() -> EntitySchema {
        EntitySchema::new("group")
            .field(FieldDefinition::new("name", FieldType::String).unique())
            .field(FieldDefinition::new("description", FieldType::String).optional())
            .edge(EdgeDefinition::many_from("members", "user", "groups"))
    }
}

pub struct Profile;

impl EntSchema for Profile {
    fn schema() -> EntitySchema {
        EntitySchema::new("profile")
            .field(FieldDefinition::new("avatar_url", FieldType::String).optional())
            .field(FieldDefinition::new("settings", FieldType::Json).optional())
            .edge(EdgeDefinition::from("owner", "user", "profile").unique())
    }
}

/// Registry with every sample schema registered.
pub fn sample_registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry.register::<User>();
    registry.register::<Post>();
    registry.register::<Group>();
    registry.register::<Profile>();
    registry
}
