//! Integration tests for `SqliteStore` against an in-memory database.

use cascade_core::{
  engagement::{EngagementKind, EngagementSignal, NewComment, QuizAnswer, VoteDelta},
  item::{ItemPayload, NewItem, VoteDirection},
  learner::{Difficulty, EnrolledSubject},
  store::{FeedStore, PoolQuery},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn post(topic: &str) -> NewItem {
  NewItem::new(topic, ItemPayload::Post {
    hook:    format!("Ever wondered about {topic}?"),
    content: format!("Here is {topic} in one paragraph."),
  })
}

fn quiz(topic: &str) -> NewItem {
  NewItem::new(topic, ItemPayload::Quiz {
    question:      format!("What is {topic}?"),
    options:       vec!["A".into(), "B".into(), "C".into()],
    correct_index: 2,
    explanation:   "C is right.".into(),
  })
}

fn answer(item_id: Uuid, topic: &str, is_correct: bool) -> QuizAnswer {
  QuizAnswer { user_id: "u1".into(), item_id, topic: topic.into(), is_correct }
}

// ─── Items ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_get_item_round_trips_payload() {
  let s = store().await;
  let stored = s
    .insert_items(vec![quiz("photosynthesis")], "biology".into(), Some("u1".into()))
    .await
    .unwrap();
  assert_eq!(stored.len(), 1);
  assert_eq!(stored[0].subject.as_deref(), Some("biology"));

  let fetched = s.get_item(stored[0].id).await.unwrap().unwrap();
  assert_eq!(fetched.payload, stored[0].payload);
  assert_eq!(fetched.generated_by.as_deref(), Some("u1"));
  assert!(fetched.is_quiz());
}

#[tokio::test]
async fn get_item_missing_returns_none() {
  let s = store().await;
  assert!(s.get_item(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn explicit_subject_is_kept() {
  let s = store().await;
  let stored = s
    .insert_items(vec![post("rome").with_subject("history")], "general".into(), None)
    .await
    .unwrap();
  assert_eq!(stored[0].subject.as_deref(), Some("history"));
}

#[tokio::test]
async fn list_items_is_newest_first_and_filters_by_subject() {
  let s = store().await;
  s.insert_items(vec![post("cells")], "biology".into(), None)
    .await
    .unwrap();
  s.insert_items(vec![post("atoms")], "chemistry".into(), None)
    .await
    .unwrap();
  s.insert_items(vec![post("genes")], "biology".into(), None)
    .await
    .unwrap();

  let all = s.list_items(&PoolQuery::default()).await.unwrap();
  let topics: Vec<_> = all.iter().map(|i| i.topic.as_str()).collect();
  assert_eq!(topics, ["genes", "atoms", "cells"]);

  let bio = s.list_items(&PoolQuery::subject("biology")).await.unwrap();
  assert_eq!(bio.len(), 2);
  assert!(bio.iter().all(|i| i.subject.as_deref() == Some("biology")));

  let limited = s
    .list_items(&PoolQuery { subject: None, limit: Some(1) })
    .await
    .unwrap();
  assert_eq!(limited[0].topic, "genes");
  assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn recent_topics_respects_subject_and_limit() {
  let s = store().await;
  s.insert_items(vec![post("a"), post("b"), post("c")], "maths".into(), None)
    .await
    .unwrap();
  s.insert_items(vec![post("x")], "art".into(), None)
    .await
    .unwrap();

  let topics = s.recent_topics(Some("maths".into()), 2).await.unwrap();
  assert_eq!(topics.len(), 2);
  assert!(topics.iter().all(|t| t != "x"));
  assert_eq!(s.recent_topics(None, 20).await.unwrap().len(), 4);
}

// ─── Learners ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_learner_has_an_empty_profile() {
  let s = store().await;
  let p = s.get_learner("nobody".into()).await.unwrap();
  assert_eq!(p.user_id, "nobody");
  assert!(p.subjects.is_empty());
  assert_eq!(p.xp, 0);
}

#[tokio::test]
async fn put_subjects_replaces_in_order() {
  let s = store().await;
  s.put_subjects("u1".into(), vec![EnrolledSubject::new("art", Difficulty::Beginner)])
    .await
    .unwrap();
  let p = s
    .put_subjects("u1".into(), vec![
      EnrolledSubject::new("physics", Difficulty::Advanced),
      EnrolledSubject::new("history", Difficulty::Intermediate),
    ])
    .await
    .unwrap();
  let names: Vec<_> = p.subjects.iter().map(|s| s.name.as_str()).collect();
  assert_eq!(names, ["physics", "history"]);
  assert_eq!(p.subject("physics").unwrap().difficulty, Difficulty::Advanced);
}

#[tokio::test]
async fn mark_viewed_is_a_set_union() {
  let s = store().await;
  let id = Uuid::new_v4();
  s.mark_viewed("u1".into(), id).await.unwrap();
  s.mark_viewed("u1".into(), id).await.unwrap();
  let state = s.exclusion_state("u1".into()).await.unwrap();
  assert_eq!(state.viewed_ids.len(), 1);
  assert!(state.excludes(&id));
}

#[tokio::test]
async fn wrong_answer_flags_for_retry_and_unviews() {
  let s = store().await;
  let id = Uuid::new_v4();
  s.mark_viewed("u1".into(), id).await.unwrap();

  let outcome = s.record_quiz_answer(answer(id, "enzymes", false)).await.unwrap();
  assert_eq!(outcome.xp_awarded, 0);
  assert_eq!(outcome.expertise, Difficulty::Beginner);

  let state = s.exclusion_state("u1".into()).await.unwrap();
  assert!(state.is_retry(&id));
  assert!(!state.viewed_ids.contains(&id));
}

#[tokio::test]
async fn correct_answers_promote_clear_retry_and_award_xp() {
  let s = store().await;
  let id = Uuid::new_v4();
  s.record_quiz_answer(answer(id, "enzymes", false)).await.unwrap();

  let first = s.record_quiz_answer(answer(id, "enzymes", true)).await.unwrap();
  assert_eq!(first.expertise, Difficulty::Intermediate);
  let second = s.record_quiz_answer(answer(id, "enzymes", true)).await.unwrap();
  assert_eq!(second.expertise, Difficulty::Advanced);
  let third = s.record_quiz_answer(answer(id, "enzymes", true)).await.unwrap();
  assert_eq!(third.expertise, Difficulty::Advanced);

  let p = s.get_learner("u1".into()).await.unwrap();
  assert_eq!(p.xp, 30);
  assert_eq!(p.expertise_for("enzymes"), Difficulty::Advanced);
  assert!(s.exclusion_state("u1".into()).await.unwrap().retry_ids.is_empty());
}

// ─── Votes ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn votes_update_counters_and_voter_map() {
  let s = store().await;
  let item = s
    .insert_items(vec![post("votes")], "x".into(), None)
    .await
    .unwrap()
    .remove(0);

  let up = VoteDelta::between(None, VoteDirection::Up);
  let after = s.apply_vote(item.id, "u1".into(), up).await.unwrap();
  assert_eq!((after.upvotes, after.downvotes), (1, 0));
  assert_eq!(after.vote_of("u1"), Some(VoteDirection::Up));

  let flip = VoteDelta::between(Some(VoteDirection::Up), VoteDirection::Down);
  let after = s.apply_vote(item.id, "u1".into(), flip).await.unwrap();
  assert_eq!((after.upvotes, after.downvotes), (0, 1));
  assert_eq!(after.score(), -1);

  let clear = VoteDelta::between(Some(VoteDirection::Down), VoteDirection::Down);
  let after = s.apply_vote(item.id, "u1".into(), clear).await.unwrap();
  assert_eq!((after.upvotes, after.downvotes), (0, 0));
  assert!(after.voted_by.is_empty());
}

#[tokio::test]
async fn concurrent_voters_commute() {
  let s = store().await;
  let item = s
    .insert_items(vec![post("popular")], "x".into(), None)
    .await
    .unwrap()
    .remove(0);

  let id = item.id;
  let mut handles = Vec::new();
  for n in 0..10 {
    let s = s.clone();
    handles.push(tokio::spawn(async move {
      s.apply_vote(id, format!("u{n}"), VoteDelta::between(None, VoteDirection::Up))
        .await
    }));
  }
  for h in handles {
    h.await.unwrap().unwrap();
  }

  let item = s.get_item(id).await.unwrap().unwrap();
  assert_eq!(item.upvotes, 10);
  assert_eq!(item.voted_by.len(), 10);
}

#[tokio::test]
async fn vote_on_missing_item_is_an_error() {
  let s = store().await;
  let err = s
    .apply_vote(Uuid::new_v4(), "u1".into(), VoteDelta::between(None, VoteDirection::Up))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ItemNotFound(_)));
}

// ─── Engagement & comments ───────────────────────────────────────────────────

#[tokio::test]
async fn avoided_signals_are_logged() {
  let s = store().await;
  let id = Uuid::new_v4();
  s.record_avoided(EngagementSignal {
    user_id:     "u1".into(),
    item_id:     id,
    topic:       "tax law".into(),
    kind:        EngagementKind::Avoided,
    duration_ms: Some(800),
  })
  .await
  .unwrap();

  let log = s.avoided_topics("u1").await.unwrap();
  assert_eq!(log.len(), 1);
  assert_eq!(log[0].item_id, id);
  assert_eq!(log[0].duration_ms, 800);
  assert!(s.avoided_topics("u2").await.unwrap().is_empty());
}

#[tokio::test]
async fn comments_bump_the_counter() {
  let s = store().await;
  let item = s
    .insert_items(vec![post("talk")], "x".into(), None)
    .await
    .unwrap()
    .remove(0);

  s.add_comment(item.id, NewComment {
    user_id:   "u1".into(),
    user_name: None,
    text:      "first".into(),
  })
  .await
  .unwrap();
  s.add_comment(item.id, NewComment {
    user_id:   "u2".into(),
    user_name: Some("Ada".into()),
    text:      "second".into(),
  })
  .await
  .unwrap();

  let comments = s.list_comments(item.id).await.unwrap();
  assert_eq!(comments.len(), 2);
  assert_eq!(comments[0].text, "second");
  assert_eq!(comments[1].user_name, "Anonymous");
  assert_eq!(s.get_item(item.id).await.unwrap().unwrap().comment_count, 2);

  let missing = s
    .add_comment(Uuid::new_v4(), NewComment {
      user_id:   "u1".into(),
      user_name: None,
      text:      "lost".into(),
    })
    .await;
  assert!(matches!(missing, Err(Error::ItemNotFound(_))));
}
