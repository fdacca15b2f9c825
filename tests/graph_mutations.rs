// End-to-end mutation tests: the sample social graph running against an
// in-memory SQLite database through the full pipeline - builders, hooks,
// specs, executor, migrator.

use std::sync::Arc;

use entgraph::builder::{NodeCreate, NodeDelete, NodeUpdate, NodeUpdateOne};
use entgraph::error::EntError;
use entgraph::executor::{GraphDriver, GraphExecutor, Node, SqliteDriver};
use entgraph::hooks::default_hook_registry;
use entgraph::migrate::SchemaMigrator;
use entgraph::sample::sample_registry;
use entgraph::schema::registry::GraphLayout;
use entgraph::schema::{
    EdgeDefinition, EntitySchema, FieldDefinition, FieldType, SchemaRegistry,
};

async fn setup() -> (GraphExecutor, GraphLayout) {
    let layout = sample_registry().resolve().unwrap();
    let driver: Arc<dyn GraphDriver> = Arc::new(SqliteDriver::in_memory().await.unwrap());
    SchemaMigrator::new(layout.clone())
        .apply(&driver)
        .await
        .unwrap();
    let exec = GraphExecutor::with_hooks(driver, default_hook_registry());
    (exec, layout)
}

async fn create_user(exec: &GraphExecutor, layout: &GraphLayout, username: &str) -> Node {
    NodeCreate::new(layout.entity("user").unwrap())
        .set("username", username)
        .set("email", format!("{}@example.com", username))
        .save(exec)
        .await
        .unwrap()
}

async fn create_post(exec: &GraphExecutor, layout: &GraphLayout, author: i64, content: &str) -> Node {
    NodeCreate::new(layout.entity("post").unwrap())
        .set("content", content)
        .add_edge("author", &[author])
        .save(exec)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_create_applies_defaults_and_hooks() {
    let (exec, layout) = setup().await;
    let user = create_user(&exec, &layout, "alice").await;

    assert_eq!(user.str("username").as_deref(), Some("alice"));
    assert_eq!(user.bool("is_active"), Some(true));
    assert!(user.time("created_at").is_some());
    assert!(user.time("updated_at").is_some());
    assert!(user.id > 0);
}

#[tokio::test]
async fn test_missing_required_field() {
    let (exec, layout) = setup().await;
    let err = NodeCreate::new(layout.entity("user").unwrap())
        .set("username", "bob")
        .save(&exec)
        .await
        .unwrap_err();
    match err {
        EntError::MissingRequired(field) => assert_eq!(field, "email"),
        other => panic!("expected MissingRequired, got {:?}", other),
    }
}

#[tokio::test]
async fn test_validator_rejects_bad_values() {
    let (exec, layout) = setup().await;

    let err = NodeCreate::new(layout.entity("user").unwrap())
        .set("username", "ab")
        .set("email", "ab@example.com")
        .save(&exec)
        .await
        .unwrap_err();
    assert!(matches!(err, EntError::Validation(_)));

    let err = NodeCreate::new(layout.entity("user").unwrap())
        .set("username", "carol")
        .set("email", "not-an-email")
        .save(&exec)
        .await
        .unwrap_err();
    assert!(matches!(err, EntError::Validation(_)));
}

#[tokio::test]
async fn test_unique_field_violation() {
    let (exec, layout) = setup().await;
    create_user(&exec, &layout, "dave").await;

    let err = NodeCreate::new(layout.entity("user").unwrap())
        .set("username", "dave")
        .set("email", "other@example.com")
        .save(&exec)
        .await
        .unwrap_err();
    assert!(matches!(err, EntError::ConstraintViolation(_)));
}

#[tokio::test]
async fn test_required_edge_missing() {
    let (exec, layout) = setup().await;
    let err = NodeCreate::new(layout.entity("post").unwrap())
        .set("content", "hello")
        .save(&exec)
        .await
        .unwrap_err();
    match err {
        EntError::MissingRequired(what) => assert!(what.contains("author")),
        other => panic!("expected MissingRequired, got {:?}", other),
    }
}

#[tokio::test]
async fn test_m2o_edge_readable_from_both_sides() {
    let (exec, layout) = setup().await;
    let alice = create_user(&exec, &layout, "alice").await;
    let post = create_post(&exec, &layout, alice.id, "first!").await;

    let post_layout = layout.entity("post").unwrap();
    let user_layout = layout.entity("user").unwrap();

    let authors = exec.neighbor_ids(&post_layout, "author", post.id).await.unwrap();
    assert_eq!(authors, vec![alice.id]);

    let posts = exec.neighbor_ids(&user_layout, "posts", alice.id).await.unwrap();
    assert_eq!(posts, vec![post.id]);
}

#[tokio::test]
async fn test_attach_missing_target_is_not_found() {
    let (exec, layout) = setup().await;
    let alice = create_user(&exec, &layout, "alice").await;

    let err = NodeUpdateOne::new(layout.entity("user").unwrap(), alice.id)
        .add_edge("posts", &[999_999])
        .save(&exec)
        .await
        .unwrap_err();
    assert!(matches!(err, EntError::NotFound { .. }));
}

#[tokio::test]
async fn test_create_with_missing_fk_target_is_not_found() {
    let (exec, layout) = setup().await;

    // FK folds into the profile INSERT; the missing owner must still abort.
    let err = NodeCreate::new(layout.entity("profile").unwrap())
        .add_edge("owner", &[999_999])
        .save(&exec)
        .await
        .unwrap_err();
    match err {
        EntError::NotFound { entity, id } => {
            assert_eq!(entity, "user");
            assert_eq!(id, 999_999);
        }
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_reattach_fk_edge_to_missing_target_is_not_found() {
    let (exec, layout) = setup().await;
    let alice = create_user(&exec, &layout, "alice").await;
    let profile_layout = layout.entity("profile").unwrap();
    let profile = NodeCreate::new(profile_layout.clone())
        .add_edge("owner", &[alice.id])
        .save(&exec)
        .await
        .unwrap();

    let err = NodeUpdateOne::new(profile_layout.clone(), profile.id)
        .add_edge("owner", &[888_888])
        .save(&exec)
        .await
        .unwrap_err();
    assert!(matches!(err, EntError::NotFound { .. }));

    // The aborted plan must not have touched the existing attachment.
    let owners = exec.neighbor_ids(&profile_layout, "owner", profile.id).await.unwrap();
    assert_eq!(owners, vec![alice.id]);
}

#[tokio::test]
async fn test_remove_fk_edge_matches_any_given_id() {
    let (exec, layout) = setup().await;
    let alice = create_user(&exec, &layout, "alice").await;
    let bob = create_user(&exec, &layout, "bob").await;
    let profile_layout = layout.entity("profile").unwrap();
    let profile = NodeCreate::new(profile_layout.clone())
        .add_edge("owner", &[alice.id])
        .save(&exec)
        .await
        .unwrap();

    // An id that is not the current owner leaves the edge attached.
    NodeUpdateOne::new(profile_layout.clone(), profile.id)
        .remove_edge("owner", &[bob.id])
        .save(&exec)
        .await
        .unwrap();
    let owners = exec.neighbor_ids(&profile_layout, "owner", profile.id).await.unwrap();
    assert_eq!(owners, vec![alice.id]);

    // The owner detaches even when listed after a non-matching id.
    NodeUpdateOne::new(profile_layout.clone(), profile.id)
        .remove_edge("owner", &[bob.id, alice.id])
        .save(&exec)
        .await
        .unwrap();
    let owners = exec.neighbor_ids(&profile_layout, "owner", profile.id).await.unwrap();
    assert!(owners.is_empty());
}

#[tokio::test]
async fn test_update_one_sets_and_clears() {
    let (exec, layout) = setup().await;
    let alice = create_user(&exec, &layout, "alice").await;
    let user_layout = layout.entity("user").unwrap();

    let updated = NodeUpdateOne::new(user_layout.clone(), alice.id)
        .set("bio", "hello")
        .save(&exec)
        .await
        .unwrap();
    assert_eq!(updated.str("bio").as_deref(), Some("hello"));

    let cleared = NodeUpdateOne::new(user_layout, alice.id)
        .clear("bio")
        .save(&exec)
        .await
        .unwrap();
    assert_eq!(cleared.str("bio"), None);
}

#[tokio::test]
async fn test_update_missing_node_is_not_found() {
    let (exec, layout) = setup().await;
    let err = NodeUpdateOne::new(layout.entity("user").unwrap(), 424_242)
        .set("bio", "ghost")
        .save(&exec)
        .await
        .unwrap_err();
    match err {
        EntError::NotFound { entity, id } => {
            assert_eq!(entity, "user");
            assert_eq!(id, 424_242);
        }
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_required_field_cannot_be_cleared() {
    let (exec, layout) = setup().await;
    let alice = create_user(&exec, &layout, "alice").await;

    let err = NodeUpdateOne::new(layout.entity("user").unwrap(), alice.id)
        .clear("email")
        .save(&exec)
        .await
        .unwrap_err();
    assert!(matches!(err, EntError::Validation(_)));
}

#[tokio::test]
async fn test_required_edge_cannot_be_cleared() {
    // The sample graph only has a required edge that is also immutable, so
    // build a small schema where the required edge is otherwise mutable.
    let mut registry = SchemaRegistry::new();
    registry.register_schema(
        EntitySchema::new("user")
            .field(FieldDefinition::new("name", FieldType::String))
            .edge(EdgeDefinition::to("tasks", "task").inverse("owner")),
    );
    registry.register_schema(
        EntitySchema::new("task")
            .field(FieldDefinition::new("title", FieldType::String))
            .edge(EdgeDefinition::from("owner", "user", "tasks").required()),
    );
    let layout = registry.resolve().unwrap();
    let driver: Arc<dyn GraphDriver> = Arc::new(SqliteDriver::in_memory().await.unwrap());
    SchemaMigrator::new(layout.clone())
        .apply(&driver)
        .await
        .unwrap();
    let exec = GraphExecutor::with_hooks(driver, default_hook_registry());

    let owner = NodeCreate::new(layout.entity("user").unwrap())
        .set("name", "alice")
        .save(&exec)
        .await
        .unwrap();
    let task = NodeCreate::new(layout.entity("task").unwrap())
        .set("title", "write docs")
        .add_edge("owner", &[owner.id])
        .save(&exec)
        .await
        .unwrap();

    let err = NodeUpdateOne::new(layout.entity("task").unwrap(), task.id)
        .clear_edge("owner")
        .save(&exec)
        .await
        .unwrap_err();
    assert!(matches!(err, EntError::Validation(_)));
}

#[tokio::test]
async fn test_immutable_edge_rejected_on_update() {
    let (exec, layout) = setup().await;
    let alice = create_user(&exec, &layout, "alice").await;
    let bob = create_user(&exec, &layout, "bob").await;
    let post = create_post(&exec, &layout, alice.id, "mine").await;

    let err = NodeUpdateOne::new(layout.entity("post").unwrap(), post.id)
        .add_edge("author", &[bob.id])
        .save(&exec)
        .await
        .unwrap_err();
    assert!(matches!(err, EntError::Validation(_)));
}

#[tokio::test]
async fn test_m2m_membership_add_and_remove() {
    let (exec, layout) = setup().await;
    let alice = create_user(&exec, &layout, "alice").await;
    let group = NodeCreate::new(layout.entity("group").unwrap())
        .set("name", "rustaceans")
        .save(&exec)
        .await
        .unwrap();

    let user_layout = layout.entity("user").unwrap();
    let group_layout = layout.entity("group").unwrap();

    NodeUpdateOne::new(user_layout.clone(), alice.id)
        .add_edge("groups", &[group.id])
        .save(&exec)
        .await
        .unwrap();

    let groups = exec.neighbor_ids(&user_layout, "groups", alice.id).await.unwrap();
    assert_eq!(groups, vec![group.id]);
    let members = exec.neighbor_ids(&group_layout, "members", group.id).await.unwrap();
    assert_eq!(members, vec![alice.id]);

    NodeUpdateOne::new(user_layout.clone(), alice.id)
        .remove_edge("groups", &[group.id])
        .save(&exec)
        .await
        .unwrap();
    let groups = exec.neighbor_ids(&user_layout, "groups", alice.id).await.unwrap();
    assert!(groups.is_empty());
}

#[tokio::test]
async fn test_symmetric_friends_edge() {
    let (exec, layout) = setup().await;
    let alice = create_user(&exec, &layout, "alice").await;
    let bob = create_user(&exec, &layout, "bob").await;
    let user_layout = layout.entity("user").unwrap();

    NodeUpdateOne::new(user_layout.clone(), alice.id)
        .add_edge("friends", &[bob.id])
        .save(&exec)
        .await
        .unwrap();

    // Visible from both endpoints despite a single stored row.
    let of_alice = exec.neighbor_ids(&user_layout, "friends", alice.id).await.unwrap();
    assert_eq!(of_alice, vec![bob.id]);
    let of_bob = exec.neighbor_ids(&user_layout, "friends", bob.id).await.unwrap();
    assert_eq!(of_bob, vec![alice.id]);

    // Clearing from the non-declaring side removes the pair.
    NodeUpdateOne::new(user_layout.clone(), bob.id)
        .clear_edge("friends")
        .save(&exec)
        .await
        .unwrap();
    let of_alice = exec.neighbor_ids(&user_layout, "friends", alice.id).await.unwrap();
    assert!(of_alice.is_empty());
}

#[tokio::test]
async fn test_o2o_profile_is_exclusive() {
    let (exec, layout) = setup().await;
    let alice = create_user(&exec, &layout, "alice").await;
    let profile_layout = layout.entity("profile").unwrap();

    let profile = NodeCreate::new(profile_layout.clone())
        .set("avatar_url", "https://example.com/a.png")
        .add_edge("owner", &[alice.id])
        .save(&exec)
        .await
        .unwrap();

    let user_layout = layout.entity("user").unwrap();
    let profiles = exec.neighbor_ids(&user_layout, "profile", alice.id).await.unwrap();
    assert_eq!(profiles, vec![profile.id]);

    let err = NodeCreate::new(profile_layout)
        .add_edge("owner", &[alice.id])
        .save(&exec)
        .await
        .unwrap_err();
    assert!(matches!(err, EntError::ConstraintViolation(_)));
}

#[tokio::test]
async fn test_bulk_update_by_predicate() {
    let (exec, layout) = setup().await;
    let alice = create_user(&exec, &layout, "alice").await;
    create_post(&exec, &layout, alice.id, "one").await;
    create_post(&exec, &layout, alice.id, "two").await;

    let updated = NodeUpdate::new(layout.entity("post").unwrap())
        .filter_eq("likes", 0)
        .set("likes", 5)
        .save(&exec)
        .await
        .unwrap();
    assert_eq!(updated, 2);

    let updated = NodeUpdate::new(layout.entity("post").unwrap())
        .filter_eq("likes", 0)
        .set("likes", 9)
        .save(&exec)
        .await
        .unwrap();
    assert_eq!(updated, 0);
}

#[tokio::test]
async fn test_bulk_update_unknown_filter_field_is_schema_error() {
    let (exec, layout) = setup().await;

    let err = NodeUpdate::new(layout.entity("post").unwrap())
        .filter_eq("upvotes", 0)
        .set("likes", 1)
        .save(&exec)
        .await
        .unwrap_err();
    match err {
        EntError::Schema(msg) => assert!(msg.contains("upvotes")),
        other => panic!("expected Schema, got {:?}", other),
    }

    let err = NodeUpdate::new(layout.entity("post").unwrap())
        .filter_null("upvotes")
        .set("likes", 1)
        .save(&exec)
        .await
        .unwrap_err();
    assert!(matches!(err, EntError::Schema(_)));
}

#[tokio::test]
async fn test_delete_cleans_junction_rows() {
    let (exec, layout) = setup().await;
    let alice = create_user(&exec, &layout, "alice").await;
    let group = NodeCreate::new(layout.entity("group").unwrap())
        .set("name", "ephemeral")
        .save(&exec)
        .await
        .unwrap();
    let user_layout = layout.entity("user").unwrap();
    let group_layout = layout.entity("group").unwrap();

    NodeUpdateOne::new(user_layout.clone(), alice.id)
        .add_edge("groups", &[group.id])
        .save(&exec)
        .await
        .unwrap();

    NodeDelete::new(group_layout.clone(), group.id)
        .exec(&exec)
        .await
        .unwrap();

    assert!(exec.node(&group_layout, group.id).await.unwrap().is_none());
    let groups = exec.neighbor_ids(&user_layout, "groups", alice.id).await.unwrap();
    assert!(groups.is_empty());
}

#[tokio::test]
async fn test_delete_missing_node_is_not_found() {
    let (exec, layout) = setup().await;
    let err = NodeDelete::new(layout.entity("group").unwrap(), 777)
        .exec(&exec)
        .await
        .unwrap_err();
    assert!(matches!(err, EntError::NotFound { .. }));
}

#[tokio::test]
async fn test_time_fields_survive_round_trip() {
    let (exec, layout) = setup().await;
    let alice = create_user(&exec, &layout, "alice").await;
    let user_layout = layout.entity("user").unwrap();

    let read_back = exec.node_strict(&user_layout, alice.id).await.unwrap();
    assert_eq!(read_back.time("created_at"), alice.time("created_at"));
}
