use sqlx::PgPool;
use time::macros::datetime;
use tweetreach::application::repos::EngagementStore;
use tweetreach::domain::entities::{PostId, ShareInfo};
use tweetreach::infra::db::PostgresEngagementStore;

fn share(id: &str, author: &str, author_followers: u64) -> ShareInfo {
    ShareInfo {
        id: id.to_string(),
        author: author.to_string(),
        author_followers,
        shared_at: datetime!(2024-05-01 12:00 UTC),
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn write_then_read_round_trips_share_details(pool: PgPool) {
    let store = PostgresEngagementStore::new(pool);
    let id = PostId::new("12345");
    let shares = vec![share("e1", "alice", 30), share("e2", "bob", 10)];

    let written = store
        .write(&id, 42, shares.clone())
        .await
        .expect("write engagement");
    let read = store
        .read(&id)
        .await
        .expect("read engagement")
        .expect("record present");

    assert_eq!(read, written);
    assert_eq!(read.total_reach, 42);
    assert_eq!(read.share_details, shares);
}

#[sqlx::test(migrations = "./migrations")]
async fn second_write_replaces_the_record(pool: PgPool) {
    let store = PostgresEngagementStore::new(pool.clone());
    let id = PostId::new("12345");

    store
        .write(&id, 22, vec![share("e1", "alice", 10), share("e2", "bob", 10)])
        .await
        .expect("first write");
    let second = store
        .write(&id, 6, vec![share("e3", "carol", 5)])
        .await
        .expect("second write");

    let read = store
        .read(&id)
        .await
        .expect("read engagement")
        .expect("record present");
    assert_eq!(read, second);
    assert_eq!(read.share_details, vec![share("e3", "carol", 5)]);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM engagements WHERE id = $1")
        .bind(id.as_str())
        .fetch_one(&pool)
        .await
        .expect("count rows");
    assert_eq!(rows, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn unknown_id_reads_as_none(pool: PgPool) {
    let store = PostgresEngagementStore::new(pool);

    let record = store
        .read(&PostId::new("missing"))
        .await
        .expect("read engagement");

    assert!(record.is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn health_check_succeeds_against_a_live_pool(pool: PgPool) {
    let store = PostgresEngagementStore::new(pool);

    store.health_check().await.expect("health check");
}
