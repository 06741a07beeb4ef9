mod common;

use common::{FEATURED_COLLECTION, FEATURED_VIDEO, HOMEPAGE};
use contentgraph_core::{EntityKind, Include, ObjectError, Relationship};

#[tokio::test]
async fn singular_relation_exposes_one_resolvable_target() {
    let (_transport, store) = common::ready_store().await;
    let home = store
        .objects_of_type(EntityKind::View, &[HOMEPAGE], None)
        .await
        .expect("fetch")
        .objects
        .remove(0);

    let promotion = home
        .relationship_node_with_name("promotion")
        .expect("promotion relation");
    assert!(!promotion.is_multiple());
    assert_eq!(promotion.number_of_relationships(), 1);
    assert!(matches!(promotion.relationship(&*store), Relationship::One(None)));

    let resolution = promotion.get_all_objects(&*store).await;
    assert_eq!(resolution.ids(), ["spring-promo"]);
    assert!(resolution.errors.is_empty());

    let Relationship::One(Some(resolved)) = promotion.relationship(&*store) else {
        panic!("promotion should resolve from cache after get_all_objects");
    };
    assert_eq!(resolved.kind(), EntityKind::Promotion);
    assert_eq!(resolved.title(), Some("Spring Sale"));
}

#[tokio::test]
async fn multi_relation_resolves_all_targets_in_order() {
    let (transport, store) = common::ready_store().await;
    let collection = store
        .objects_of_type(EntityKind::MediaObjectCollection, &[FEATURED_COLLECTION], None)
        .await
        .expect("fetch")
        .objects
        .remove(0);

    let entities = collection
        .relationship_node_with_name("entities")
        .expect("entities relation");
    assert!(entities.is_multiple());
    assert_eq!(entities.number_of_relationships(), 6);
    assert_eq!(entities.all_ids().len(), 6);
    assert!(entities.relationship(&*store).is_empty());

    let fetches_before = transport.fetch_count();
    let resolution = entities.get_all_objects(&*store).await;
    assert_eq!(resolution.objects.len(), 6);
    assert!(resolution.errors.is_empty());
    assert_eq!(transport.fetch_count(), fetches_before + 1);

    let Relationship::Many(resolved) = entities.relationship(&*store) else {
        panic!("entities is a multi relation");
    };
    let resolved_ids: Vec<&str> = resolved.iter().map(|entity| entity.id()).collect();
    assert_eq!(resolved_ids, entities.all_ids());
    assert_eq!(entities.number_of_relationships(), 6);
}

#[tokio::test]
async fn included_targets_resolve_without_network() {
    let (transport, store) = common::ready_store().await;
    let include: Include = "featuredMedia,featuredCollections".parse().unwrap();
    let home = store
        .objects_of_type(EntityKind::View, &[HOMEPAGE], Some(&include))
        .await
        .expect("fetch")
        .objects
        .remove(0);

    let media = home
        .relationship_node_with_name("featuredMedia")
        .expect("featuredMedia");
    assert_eq!(media.relationship(&*store).into_vec()[0].id(), FEATURED_VIDEO);

    let collections = store
        .related(&home, "featuredCollections")
        .await
        .expect("featuredCollections");
    assert_eq!(collections.ids(), [FEATURED_COLLECTION]);
    assert_eq!(transport.fetch_count(), 1);

    assert!(store.related(&home, "noSuchRelation").await.is_none());
}

#[tokio::test]
async fn ids_of_type_narrows_heterogeneous_menu() {
    let (_transport, store) = common::ready_store().await;
    let browse = store
        .objects_of_type(EntityKind::View, &["browse"], None)
        .await
        .expect("fetch")
        .objects
        .remove(0);

    let items = browse.relationship_node_with_name("items").expect("items");
    assert_eq!(items.number_of_relationships(), 5);

    let videos = items.ids_of_type(EntityKind::Video);
    assert_eq!(videos, ["v-rivers", "v-deserts", "earthrise"]);
    assert_eq!(
        items.ids_of_type(EntityKind::MediaObjectCollection),
        [FEATURED_COLLECTION]
    );

    let typed = store
        .objects_of_type(EntityKind::Video, videos.as_slice(), None)
        .await
        .expect("typed follow-up fetch");
    assert_eq!(typed.ids(), videos);
}

#[tokio::test]
async fn heterogeneous_relation_resolves_each_kind() {
    let (transport, store) = common::ready_store().await;
    let browse = store
        .objects_of_type(EntityKind::View, &["browse"], None)
        .await
        .expect("fetch")
        .objects
        .remove(0);
    let items = browse.relationship_node_with_name("items").expect("items");

    let resolution = items.get_all_objects(&*store).await;
    assert!(resolution.errors.is_empty());
    assert_eq!(resolution.ids(), items.all_ids());
    // one fetch for browse, then one per recorded kind (Video, Collection, Promotion)
    assert_eq!(transport.fetch_count(), 4);
}

#[tokio::test]
async fn unresolvable_targets_are_reported_alongside_successes() {
    let (transport, store) = common::ready_store().await;
    let collection = store
        .objects_of_type(EntityKind::MediaObjectCollection, &[FEATURED_COLLECTION], None)
        .await
        .expect("fetch")
        .objects
        .remove(0);
    let entities = collection
        .relationship_node_with_name("entities")
        .expect("entities");

    store
        .objects_of_type(EntityKind::Video, &["v-rivers", "v-deserts"], None)
        .await
        .expect("warm two targets");
    transport.set_offline(true);

    let resolution = entities.get_all_objects(&*store).await;
    assert_eq!(resolution.ids(), ["v-rivers", "v-deserts"]);
    assert_eq!(resolution.errors.len(), 4);
    assert!(resolution
        .errors
        .iter()
        .all(|err| matches!(err, ObjectError::FetchFailed { .. })));
}

#[tokio::test]
async fn resolved_targets_are_not_owned_by_the_relation() {
    let (_transport, store) = common::ready_store().await;
    let include: Include = "collection".parse().unwrap();
    let video = store
        .objects_of_type(EntityKind::Video, &[FEATURED_VIDEO], Some(&include))
        .await
        .expect("fetch")
        .objects
        .remove(0);

    let collection = store
        .related(&video, "collection")
        .await
        .expect("collection relation")
        .objects
        .remove(0);
    assert_eq!(collection.id(), FEATURED_COLLECTION);

    let weak = std::sync::Arc::downgrade(&collection);
    drop(collection);
    store.reset_store();
    assert!(weak.upgrade().is_none());
    assert!(video
        .relationship_node_with_name("collection")
        .expect("collection")
        .relationship(&*store)
        .is_empty());
}
