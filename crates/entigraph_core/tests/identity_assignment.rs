//! Integration tests for surrogate identity assignment.

use entigraph_core::{
    DataContext, IdentityStrategy, NumericIdentity, SessionConfig, TokenIdentity,
    UnitOfWorkSession,
};
use entigraph_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::HashSet;
use uuid::Uuid;

#[test]
fn numeric_identities_increase_in_tracking_order() {
    init_tracing();
    let mut session = UnitOfWorkSession::new(fresh_store());
    let blog = Blog::with_posts("news", &["a", "b", "c"]);
    session.add(blog.clone()).unwrap();
    session.commit().unwrap();

    let ids: Vec<i32> = blog.read().posts.iter().map(|p| p.read().id).collect();
    assert_eq!(ids, vec![1, 2, 3]);

    blog.write().posts.push(Post::titled("d"));
    session.commit().unwrap();
    assert_eq!(blog.read().posts[3].read().id, 4);
}

#[test]
fn preset_identities_are_untouched() {
    let mut session = UnitOfWorkSession::new(fresh_store());
    let blog = Blog::with_posts("news", &["a", "b"]);
    blog.read().posts[0].write().id = 40;
    session.add(blog.clone()).unwrap();
    session.commit().unwrap();

    let ids: Vec<i32> = blog.read().posts.iter().map(|p| p.read().id).collect();
    assert_eq!(ids, vec![40, 1]);
}

#[test]
fn committing_again_never_reassigns() {
    let mut session = UnitOfWorkSession::new(fresh_store());
    let blog = session.add(Blog::named("news")).unwrap();
    session.commit().unwrap();
    session.commit().unwrap();

    assert_eq!(blog.read().id, 1);
    assert_eq!(session.store().stats().identities_assigned(), 1);
}

#[test]
fn token_identities_are_minted_for_accounts() {
    let mut session = UnitOfWorkSession::new(fresh_store());
    let accounts: Vec<_> = ["ada", "bob", "cy"]
        .iter()
        .map(|owner| session.add(Account::owned_by(owner)).unwrap())
        .collect();
    session.commit().unwrap();

    let ids: HashSet<Uuid> = accounts.iter().map(|a| a.read().id).collect();
    assert_eq!(ids.len(), 3);
    assert!(!ids.contains(&Uuid::nil()));
}

#[test]
fn concrete_strategy_overrides_marker() {
    let mut session = UnitOfWorkSession::new(fresh_store());
    session.register_identity_strategy::<Comment, _>(IdentityStrategy::new(
        NumericIdentity::<i32>::starting_after(1000),
        |c: &mut Comment| &mut c.id,
    ));
    let post = Post::titled("a");
    post.write().comments = vec![Comment::saying("x"), Comment::saying("y")];
    session.add(post.clone()).unwrap();
    session.commit().unwrap();

    assert_eq!(post.read().id, 1);
    let ids: Vec<i32> = post.read().comments.iter().map(|c| c.read().id).collect();
    assert_eq!(ids, vec![1001, 1002]);
}

#[test]
fn generators_are_per_session() {
    let store = fresh_store();
    let mut first = UnitOfWorkSession::new(std::sync::Arc::clone(&store));
    let mut second = UnitOfWorkSession::new(std::sync::Arc::clone(&store));

    let a = first.add(Blog::named("a")).unwrap();
    first.commit().unwrap();
    let b = second.add(Blog::named("b")).unwrap();
    second.commit().unwrap();

    assert_eq!(a.read().id, 1);
    assert_eq!(b.read().id, 1);
}

#[test]
fn no_defaults_means_no_identities() {
    let mut session = UnitOfWorkSession::with_config(
        fresh_store(),
        SessionConfig::new().register_default_identities(false),
    );
    let account = session.add(Account::owned_by("ada")).unwrap();
    session.commit().unwrap();
    assert!(account.read().id.is_nil());

    session.register_identity_generator(TokenIdentity::<Uuid>::new());
    session.commit().unwrap();
    assert!(!account.read().id.is_nil());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn assigned_numeric_ids_are_distinct(blog in blog_strategy(6)) {
        let mut session = UnitOfWorkSession::new(fresh_store());
        session.add(blog.clone()).unwrap();
        session.commit().unwrap();

        // Posts and comments draw from the session's one i32 generator.
        let mut ids: Vec<i32> = session.query::<Post>().iter().map(|p| p.read().id).collect();
        ids.extend(session.query::<Comment>().iter().map(|c| c.read().id));
        prop_assert!(ids.iter().all(|id| *id > 0));
        let distinct: HashSet<i32> = ids.iter().copied().collect();
        prop_assert_eq!(distinct.len(), ids.len());
        prop_assert_eq!(blog.read().id, 1);
    }

    #[test]
    fn preset_tokens_survive_commit(accounts in prop::collection::vec(account_strategy(), 1..8)) {
        let presets: Vec<Uuid> = accounts.iter().map(|a| a.read().id).collect();
        let mut session = UnitOfWorkSession::new(fresh_store());
        for account in &accounts {
            session.add(account.clone()).unwrap();
        }
        session.commit().unwrap();

        for (account, preset) in accounts.iter().zip(presets) {
            let id = account.read().id;
            prop_assert!(!id.is_nil());
            if !preset.is_nil() {
                prop_assert_eq!(id, preset);
            }
        }
    }
}
