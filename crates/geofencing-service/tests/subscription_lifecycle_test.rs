//! Subscription lifecycle pipeline tests.

mod support;

use geofencing_core::{topic_name, HorizontalProjection};
use geofencing_service::ServiceError;
use std::sync::atomic::Ordering;
use support::*;

#[tokio::test]
async fn test_create_subscription_provisions_everything() {
    let sm = FakeSubscriptionManager::new();
    let broker = RecordingBroker::new();
    let service = service_with(sm.clone(), broker.clone()).await;

    let f = filter(overlapping_ring());
    let subscription = service.create_subscription(f.clone(), OWNER).await.unwrap();

    let expected_topic = topic_name(&f).unwrap();
    assert_eq!(subscription.sm_subscription.topic_name, expected_topic);
    assert!(subscription.sm_subscription.active);
    assert_eq!(subscription.owner, OWNER);
    assert_eq!(subscription.id.len(), 32);
    assert!(broker.has_topic(&expected_topic));

    let topics = sm.topics();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].name, expected_topic);

    let remote = sm.subscription(subscription.sm_subscription.id).unwrap();
    assert!(remote.active);
    assert_eq!(remote.topic_id, topics[0].id.unwrap());
    assert_eq!(subscription.sm_subscription.queue, remote.queue);

    let stored = service.get_subscription(&subscription.id, Some(OWNER)).await.unwrap();
    assert_eq!(stored, subscription);
}

#[tokio::test]
async fn test_same_filter_reuses_remote_topic() {
    let sm = FakeSubscriptionManager::new();
    let service = service_with(sm.clone(), RecordingBroker::new()).await;

    let first = service
        .create_subscription(filter(overlapping_ring()), OWNER)
        .await
        .unwrap();
    let second = service
        .create_subscription(filter(overlapping_ring()), "another-operator")
        .await
        .unwrap();

    assert_eq!(sm.topics().len(), 1);
    assert_eq!(
        first.sm_subscription.topic_name,
        second.sm_subscription.topic_name
    );
    assert_ne!(first.id, second.id);
    assert_ne!(first.sm_subscription.id, second.sm_subscription.id);
    assert_eq!(sm.subscription_count(), 2);
    let topic_posts = sm
        .calls()
        .iter()
        .filter(|call| call.starts_with("post_topic"))
        .count();
    assert_eq!(topic_posts, 1);
}

#[tokio::test]
async fn test_existing_remote_topic_is_reused() {
    let sm = FakeSubscriptionManager::new();
    let f = filter(overlapping_ring());
    let seeded = sm.seed_topic(&topic_name(&f).unwrap());
    let service = service_with(sm.clone(), RecordingBroker::new()).await;

    let subscription = service.create_subscription(f, OWNER).await.unwrap();

    assert_eq!(sm.topics().len(), 1);
    let remote = sm.subscription(subscription.sm_subscription.id).unwrap();
    assert_eq!(remote.topic_id, seeded);
    assert!(!sm.calls().iter().any(|call| call.starts_with("post_topic")));
}

#[tokio::test]
async fn test_lost_topic_race_falls_back_to_lookup() {
    let sm = FakeSubscriptionManager::new();
    sm.lose_topic_race.store(true, Ordering::SeqCst);
    let service = service_with(sm.clone(), RecordingBroker::new()).await;

    let subscription = service
        .create_subscription(filter(overlapping_ring()), OWNER)
        .await
        .unwrap();

    let topics = sm.topics();
    assert_eq!(topics.len(), 1);
    let remote = sm.subscription(subscription.sm_subscription.id).unwrap();
    assert_eq!(Some(remote.topic_id), topics[0].id);

    let calls = sm.calls();
    assert_eq!(calls[0], "get_topics");
    assert!(calls[1].starts_with("post_topic:"));
    assert_eq!(calls[2], "get_topics");
}

#[tokio::test]
async fn test_failed_save_removes_remote_subscription() {
    let sm = FakeSubscriptionManager::new();
    let service = service_with(sm.clone(), RecordingBroker::new()).await;
    sqlx::query("DROP TABLE subscriptions")
        .execute(service.pool())
        .await
        .unwrap();

    let result = service
        .create_subscription(filter(overlapping_ring()), OWNER)
        .await;

    assert!(matches!(result, Err(ServiceError::Storage(_))));
    assert_eq!(sm.subscription_count(), 0);
    let calls = sm.calls();
    assert!(calls.last().unwrap().starts_with("delete_subscription:"));
}

#[tokio::test]
async fn test_invalid_filter_has_no_side_effects() {
    let sm = FakeSubscriptionManager::new();
    let broker = RecordingBroker::new();
    let service = service_with(sm.clone(), broker.clone()).await;

    let mut f = filter(overlapping_ring());
    f.airspace_volume.horizontal_projection = HorizontalProjection::Polygon {
        coordinates: vec![vec![[0.0, 0.0], [1.0, 1.0], [0.0, 0.0]]],
    };
    let result = service.create_subscription(f, OWNER).await;

    assert!(matches!(result, Err(ServiceError::Validation(_))));
    assert!(sm.calls().is_empty());
    assert!(service.list_subscriptions(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_goes_remote_first() {
    let sm = FakeSubscriptionManager::new();
    let service = service_with(sm.clone(), RecordingBroker::new()).await;
    let subscription = service
        .create_subscription(filter(overlapping_ring()), OWNER)
        .await
        .unwrap();
    let remote_id = subscription.sm_subscription.id;

    sm.fail_put.store(true, Ordering::SeqCst);
    let failed = service
        .update_subscription(&subscription.id, Some(OWNER), false)
        .await;
    assert!(matches!(failed, Err(ServiceError::Remote(_))));
    let unchanged = service.get_subscription(&subscription.id, None).await.unwrap();
    assert!(unchanged.sm_subscription.active);

    sm.fail_put.store(false, Ordering::SeqCst);
    let updated = service
        .update_subscription(&subscription.id, Some(OWNER), false)
        .await
        .unwrap();
    assert!(!updated.sm_subscription.active);
    assert!(!sm.subscription(remote_id).unwrap().active);
    let stored = service.get_subscription(&subscription.id, None).await.unwrap();
    assert!(!stored.sm_subscription.active);

    assert!(sm
        .calls()
        .contains(&format!("put_subscription:{}:false", remote_id)));
}

#[tokio::test]
async fn test_delete_goes_remote_first() {
    let sm = FakeSubscriptionManager::new();
    let service = service_with(sm.clone(), RecordingBroker::new()).await;
    let subscription = service
        .create_subscription(filter(overlapping_ring()), OWNER)
        .await
        .unwrap();

    sm.fail_delete.store(true, Ordering::SeqCst);
    let failed = service.delete_subscription(&subscription.id, Some(OWNER)).await;
    assert!(matches!(failed, Err(ServiceError::Remote(_))));
    assert!(service.get_subscription(&subscription.id, None).await.is_ok());

    sm.fail_delete.store(false, Ordering::SeqCst);
    service
        .delete_subscription(&subscription.id, Some(OWNER))
        .await
        .unwrap();
    assert_eq!(sm.subscription_count(), 0);
    assert!(matches!(
        service.get_subscription(&subscription.id, None).await,
        Err(ServiceError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_delete_tolerates_missing_remote_subscription() {
    let sm = FakeSubscriptionManager::new();
    let service = service_with(sm.clone(), RecordingBroker::new()).await;
    let subscription = service
        .create_subscription(filter(overlapping_ring()), OWNER)
        .await
        .unwrap();

    sm.forget_subscription(subscription.sm_subscription.id);
    service
        .delete_subscription(&subscription.id, None)
        .await
        .unwrap();
    assert!(service.list_subscriptions(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_last_subscription_on_a_topic_removes_it() {
    let broker = RecordingBroker::new();
    let service = service_with(FakeSubscriptionManager::new(), broker.clone()).await;
    let first = service
        .create_subscription(filter(overlapping_ring()), OWNER)
        .await
        .unwrap();
    let second = service
        .create_subscription(filter(overlapping_ring()), "another-operator")
        .await
        .unwrap();
    let topic = first.sm_subscription.topic_name.clone();

    service.delete_subscription(&first.id, None).await.unwrap();
    assert!(broker.has_topic(&topic));

    service
        .update_subscription(&second.id, None, false)
        .await
        .unwrap();
    service.delete_subscription(&second.id, None).await.unwrap();
    assert!(!broker.has_topic(&topic));

    let report = service
        .create_zone(zone("BAS0001", basilique_ring()), OWNER)
        .await
        .unwrap();
    assert!(report.published_topics.is_empty());
    assert!(report.failed_topics.is_empty());
}

#[tokio::test]
async fn test_unknown_or_foreign_subscription_is_not_found() {
    let sm = FakeSubscriptionManager::new();
    let service = service_with(sm.clone(), RecordingBroker::new()).await;
    let subscription = service
        .create_subscription(filter(overlapping_ring()), OWNER)
        .await
        .unwrap();

    assert!(matches!(
        service.get_subscription("missing", None).await,
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        service
            .update_subscription(&subscription.id, Some("intruder"), false)
            .await,
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        service.delete_subscription(&subscription.id, Some("intruder")).await,
        Err(ServiceError::NotFound(_))
    ));

    let mine = service.list_subscriptions(Some(OWNER)).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert!(service
        .list_subscriptions(Some("intruder"))
        .await
        .unwrap()
        .is_empty());
}
