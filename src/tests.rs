//! Cross-entity flows exercised against the in-memory store.

use uuid::Uuid;

use crate::comments::{self, CreateComment};
use crate::follows::{self, FollowStatus};
use crate::likes::{self, TargetKind};
use crate::notifications::{self, Notification, NotificationKind};
use crate::posts::{self, CreatePost, PostType};
use crate::profiles;
use crate::store::memory::MemoryStore;
use crate::store::{DocumentStore, Filter, Page};

async fn make_post(store: &MemoryStore, author: Uuid) -> posts::Post {
    profiles::ensure(store, author).await.unwrap();
    posts::create(
        store,
        author,
        &CreatePost {
            kind: PostType::Workout,
            content: "leg day done".to_string(),
            image_url: None,
            payload: None,
            visibility: None,
        },
    )
    .await
    .unwrap()
}

async fn inbox(store: &MemoryStore, user: Uuid) -> Vec<Notification> {
    store
        .query(
            notifications::COLLECTION,
            &[Filter::eq("user_id", user)],
            None,
            Page::all(),
        )
        .await
        .unwrap()
        .iter()
        .map(|doc| doc.decode().unwrap())
        .collect()
}

async fn count(store: &MemoryStore, collection: &str, filters: &[Filter]) -> usize {
    store
        .query(collection, filters, None, Page::all())
        .await
        .unwrap()
        .len()
}

#[tokio::test]
async fn post_lifecycle_scenario() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let user_a = Uuid::new_v4();
    let user_b = Uuid::new_v4();
    for user in [owner, user_a, user_b] {
        profiles::ensure(&store, user).await.unwrap();
    }

    let post = make_post(&store, owner).await;
    assert_eq!(post.stats.likes, 0);
    assert_eq!(post.stats.comments, 0);
    assert_eq!(post.stats.shares, 0);

    // A comments: counter goes to one, the owner is notified.
    comments::create(
        &store,
        user_a,
        post.id,
        &CreateComment {
            content: "nice work".to_string(),
            reply_to: None,
        },
    )
    .await
    .unwrap();

    let fetched = posts::fetch(&store, post.id).await.unwrap();
    assert_eq!(fetched.stats.comments, 1);
    let owner_inbox = inbox(&store, owner).await;
    assert_eq!(owner_inbox.len(), 1);
    assert!(matches!(
        owner_inbox[0].kind,
        NotificationKind::PostCommented
    ));

    // B likes: counter to one, second notification.
    let liked = likes::toggle(&store, user_b, TargetKind::Post, post.id)
        .await
        .unwrap();
    assert!(liked.liked);
    assert_eq!(posts::fetch(&store, post.id).await.unwrap().stats.likes, 1);
    assert_eq!(inbox(&store, owner).await.len(), 2);

    // B unlikes: counter back to zero, no new notification.
    let unliked = likes::toggle(&store, user_b, TargetKind::Post, post.id)
        .await
        .unwrap();
    assert!(!unliked.liked);
    assert_eq!(posts::fetch(&store, post.id).await.unwrap().stats.likes, 0);
    assert_eq!(inbox(&store, owner).await.len(), 2);

    // Deleting the post removes the comment and the (now empty) like set.
    posts::delete(&store, owner, post.id).await.unwrap();
    assert!(posts::fetch(&store, post.id).await.is_err());
    assert_eq!(
        count(
            &store,
            comments::COLLECTION,
            &[Filter::eq("post_id", post.id)]
        )
        .await,
        0
    );
    assert_eq!(
        count(&store, likes::COLLECTION, &[Filter::eq("target_id", post.id)]).await,
        0
    );
}

#[tokio::test]
async fn deleting_a_comment_cascades_its_likes() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let author = Uuid::new_v4();
    let fans = [Uuid::new_v4(), Uuid::new_v4()];
    profiles::ensure(&store, author).await.unwrap();

    let post = make_post(&store, owner).await;
    let comment = comments::create(
        &store,
        author,
        post.id,
        &CreateComment {
            content: "first".to_string(),
            reply_to: None,
        },
    )
    .await
    .unwrap();

    for fan in fans {
        likes::toggle(&store, fan, TargetKind::Comment, comment.id)
            .await
            .unwrap();
    }
    let stored = comments::fetch(&store, comment.id).await.unwrap();
    assert_eq!(stored.stats.likes, 2);
    assert_eq!(posts::fetch(&store, post.id).await.unwrap().stats.comments, 1);

    comments::delete(&store, author, comment.id).await.unwrap();

    // Exactly the two like records referencing the comment are gone and the
    // post counter dropped by one.
    assert_eq!(
        count(
            &store,
            likes::COLLECTION,
            &[Filter::eq("target_id", comment.id)]
        )
        .await,
        0
    );
    assert_eq!(posts::fetch(&store, post.id).await.unwrap().stats.comments, 0);
}

#[tokio::test]
async fn replies_nest_one_level_only() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let post = make_post(&store, owner).await;

    let top = comments::create(
        &store,
        owner,
        post.id,
        &CreateComment {
            content: "top".to_string(),
            reply_to: None,
        },
    )
    .await
    .unwrap();

    let reply = comments::create(
        &store,
        owner,
        post.id,
        &CreateComment {
            content: "reply".to_string(),
            reply_to: Some(top.id),
        },
    )
    .await
    .unwrap();

    // Both levels count against the post; the parent tracks its reply.
    assert_eq!(posts::fetch(&store, post.id).await.unwrap().stats.comments, 2);
    assert_eq!(comments::fetch(&store, top.id).await.unwrap().stats.replies, 1);

    let err = comments::create(
        &store,
        owner,
        post.id,
        &CreateComment {
            content: "too deep".to_string(),
            reply_to: Some(reply.id),
        },
    )
    .await;
    assert!(err.is_err());
}

#[tokio::test]
async fn follow_lifecycle_adjusts_both_counters() {
    let store = MemoryStore::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    profiles::ensure(&store, alice).await.unwrap();
    profiles::ensure(&store, bob).await.unwrap();

    let edge = follows::request(&store, alice, bob).await.unwrap();
    assert_eq!(edge.status, FollowStatus::Pending);
    assert!(!follows::is_accepted(&store, alice, bob).await.unwrap());

    // Pending edges do not count yet.
    let bob_profile = profiles::ensure(&store, bob).await.unwrap();
    assert_eq!(bob_profile.stats.followers, 0);
    assert_eq!(inbox(&store, bob).await.len(), 1);

    follows::accept(&store, bob, edge.id).await.unwrap();
    assert!(follows::is_accepted(&store, alice, bob).await.unwrap());
    assert_eq!(profiles::ensure(&store, bob).await.unwrap().stats.followers, 1);
    assert_eq!(profiles::ensure(&store, alice).await.unwrap().stats.following, 1);
    assert_eq!(inbox(&store, alice).await.len(), 1);

    // Accepting again is a no-op on the counters.
    follows::accept(&store, bob, edge.id).await.unwrap();
    assert_eq!(profiles::ensure(&store, bob).await.unwrap().stats.followers, 1);

    follows::unfollow(&store, alice, bob).await.unwrap();
    assert_eq!(profiles::ensure(&store, bob).await.unwrap().stats.followers, 0);
    assert_eq!(profiles::ensure(&store, alice).await.unwrap().stats.following, 0);
}

#[tokio::test]
async fn withdrawing_a_pending_request_leaves_counters_alone() {
    let store = MemoryStore::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    profiles::ensure(&store, alice).await.unwrap();
    profiles::ensure(&store, bob).await.unwrap();

    follows::request(&store, alice, bob).await.unwrap();
    follows::unfollow(&store, alice, bob).await.unwrap();

    assert_eq!(profiles::ensure(&store, bob).await.unwrap().stats.followers, 0);
    assert_eq!(profiles::ensure(&store, alice).await.unwrap().stats.following, 0);
    assert!(follows::find_edge(&store, alice, bob).await.unwrap().is_none());
}

#[tokio::test]
async fn sharing_bumps_the_counter_and_notifies_the_author() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let sharer = Uuid::new_v4();
    profiles::ensure(&store, sharer).await.unwrap();

    let post = make_post(&store, owner).await;
    posts::share(&store, sharer, post.id, Some("look at this".to_string()))
        .await
        .unwrap();

    assert_eq!(posts::fetch(&store, post.id).await.unwrap().stats.shares, 1);
    let owner_inbox = inbox(&store, owner).await;
    assert_eq!(owner_inbox.len(), 1);
    assert!(matches!(owner_inbox[0].kind, NotificationKind::PostShared));

    // The cascade picks shares up too.
    posts::delete(&store, owner, post.id).await.unwrap();
    assert_eq!(
        count(&store, posts::SHARES, &[Filter::eq("post_id", post.id)]).await,
        0
    );
}

#[tokio::test]
async fn notifications_mark_read_flows() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let fan = Uuid::new_v4();
    profiles::ensure(&store, fan).await.unwrap();

    let post = make_post(&store, owner).await;
    likes::toggle(&store, fan, TargetKind::Post, post.id)
        .await
        .unwrap();
    posts::share(&store, fan, post.id, None).await.unwrap();

    assert_eq!(notifications::unread_count(&store, owner).await.unwrap(), 2);

    let first = inbox(&store, owner).await.remove(0);
    notifications::mark_read(&store, owner, first.id).await.unwrap();
    assert_eq!(notifications::unread_count(&store, owner).await.unwrap(), 1);

    // Someone else cannot touch the owner's inbox.
    assert!(notifications::mark_read(&store, fan, first.id).await.is_err());

    let marked = notifications::mark_all_read(&store, owner).await.unwrap();
    assert_eq!(marked, 1);
    assert_eq!(notifications::unread_count(&store, owner).await.unwrap(), 0);
}
