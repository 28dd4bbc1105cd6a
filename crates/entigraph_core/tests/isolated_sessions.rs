//! Integration tests for working copies, reconciliation and staleness.

use entigraph_core::{CoreError, DataContext, IsolatedSession, UnitOfWorkSession};
use entigraph_testkit::prelude::*;
use std::sync::Arc;

fn titles(blog: &Tracked<Blog>) -> Vec<String> {
    blog.read()
        .posts
        .iter()
        .map(|p| p.read().title.clone())
        .collect()
}

#[test]
fn stale_commit_succeeds_after_requery() {
    init_tracing();
    let store = fresh_store();
    let mut alice = IsolatedSession::new(Arc::clone(&store));
    let mut bob = IsolatedSession::new(Arc::clone(&store));

    alice.add(Blog::named("alice")).unwrap();
    bob.add(Blog::named("bob")).unwrap();

    alice.commit().unwrap();
    let err = bob.commit().unwrap_err();
    assert!(matches!(err, CoreError::StaleSession { .. }));
    assert!(err.is_recoverable());
    assert_eq!(store.query::<Blog>().len(), 1);

    let seen = bob.query::<Blog>();
    assert_eq!(seen.len(), 1);
    bob.commit().unwrap();

    let mut names: Vec<String> = store
        .query::<Blog>()
        .iter()
        .map(|b| b.read().name.clone())
        .collect();
    names.sort();
    assert_eq!(names, vec!["alice", "bob"]);
    assert_eq!(store.stats().stale_rejections(), 1);
}

#[test]
fn collection_delta_reaches_shadow_and_later_queries() {
    init_tracing();
    let store = fresh_store();
    let mut session = IsolatedSession::new(Arc::clone(&store));
    let blog = session.add(Blog::with_posts("news", &["one", "two", "three"])).unwrap();
    session.commit().unwrap();

    {
        let mut working = blog.write();
        working.posts.remove(1);
        working.posts.push(Post::titled("four"));
    }
    session.commit().unwrap();

    let shadow = session.shadow_of(&blog).unwrap();
    assert_eq!(titles(&shadow), vec!["one", "three", "four"]);
    assert_eq!(store.query::<Post>().len(), 3);

    let again = session.query::<Blog>();
    assert_eq!(again.len(), 1);
    assert!(again[0].ptr_eq(&blog));
    assert_eq!(titles(&again[0]), vec!["one", "three", "four"]);

    let mut fresh = IsolatedSession::new(Arc::clone(&store));
    let copies = fresh.query::<Blog>();
    assert_eq!(titles(&copies[0]), vec!["one", "three", "four"]);
    assert!(!copies[0].ptr_eq(&blog));
}

#[test]
fn singular_changes_are_reconciled() {
    let store = fresh_store();
    let mut session = IsolatedSession::new(Arc::clone(&store));
    let blog = session.add(Blog::named("news")).unwrap();
    session.commit().unwrap();

    blog.write().featured = Some(Post::titled("headline"));
    session.commit().unwrap();
    let shadow = session.shadow_of(&blog).unwrap();
    assert_eq!(
        shadow.read().featured.as_ref().unwrap().read().title,
        "headline"
    );

    blog.write().featured = None;
    session.commit().unwrap();
    assert!(shadow.read().featured.is_none());
    assert!(store.query::<Post>().is_empty());
}

#[test]
fn working_edits_are_invisible_to_other_sessions() {
    let store = fresh_store();
    let mut writer = IsolatedSession::new(Arc::clone(&store));
    let blog = writer.add(Blog::named("draft")).unwrap();
    writer.commit().unwrap();

    blog.write().name = "published".into();
    let mut reader = UnitOfWorkSession::new(Arc::clone(&store));
    assert_eq!(reader.query::<Blog>()[0].read().name, "draft");

    writer.commit().unwrap();
    assert_eq!(reader.query::<Blog>()[0].read().name, "published");
}

#[test]
fn identities_are_copied_back_to_working_graph() {
    let mut session = IsolatedSession::new(fresh_store());
    let blog = session.add(Blog::with_posts("news", &["a", "b"])).unwrap();
    session.commit().unwrap();

    assert_eq!(blog.read().id, 1);
    let ids: Vec<i32> = blog.read().posts.iter().map(|p| p.read().id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn removing_through_a_queried_copy() {
    let store = fresh_store();
    let mut writer = IsolatedSession::new(Arc::clone(&store));
    writer.add(Blog::with_posts("news", &["a"])).unwrap();
    writer.commit().unwrap();

    let mut remover = IsolatedSession::new(Arc::clone(&store));
    let blog = remover.query::<Blog>().remove(0);
    remover.remove(&blog).unwrap();
    remover.commit().unwrap();

    assert!(store.is_empty());
    assert!(writer.is_stale());
}

#[test]
fn reload_and_update_fail_fast() {
    let mut session = IsolatedSession::new(fresh_store());
    let blog = session.add(Blog::named("x")).unwrap();
    assert!(matches!(
        session.reload(blog.clone()),
        Err(CoreError::Unsupported { .. })
    ));
    assert!(matches!(
        session.update(blog),
        Err(CoreError::Unsupported { .. })
    ));
}

#[test]
fn contending_sessions_commit_everything() {
    init_tracing();
    let store = fresh_store();
    let config = ContentionConfig {
        sessions: 4,
        commits_per_session: 10,
        ..ContentionConfig::default()
    };

    let report = run_contending_sessions(&store, &config);

    assert_eq!(report.gave_up, 0);
    assert_eq!(report.committed, 40);
    assert_eq!(store.query::<Account>().len(), 40);
    assert!(store.query::<Account>().iter().all(|a| !a.read().id.is_nil()));
}

#[tokio::test]
async fn commit_async_completes_immediately() {
    let store = fresh_store();
    let mut session = IsolatedSession::new(Arc::clone(&store));
    let account = session.add(Account::owned_by("ada")).unwrap();

    assert_eq!(session.commit_async().await.unwrap(), 0);
    assert!(!account.read().id.is_nil());
    assert_eq!(store.query::<Account>().len(), 1);
}
