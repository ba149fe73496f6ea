//! Live tests: set commands. Skipped without `REDIS_URL`.

mod common;

use common::*;
use redline::commands::set;
use redline::commands::ScanOptions;
use redline::Value;

fn members(value: &Value) -> Vec<String> {
    let mut out: Vec<String> = value
        .as_list()
        .unwrap_or_default()
        .iter()
        .filter_map(|v| v.as_str().map(str::to_owned))
        .collect();
    out.sort();
    out
}

#[tokio::test]
async fn sadd_smembers_scard() {
    let Some(client) = live_client().await else { return };
    let s = format!("{}_s", test_prefix());

    assert_eq!(client.execute_command(set::sadd(&s, ["a", "b", "a"])).await.unwrap(), Value::Int(2));
    assert_eq!(client.execute_command(set::scard(&s)).await.unwrap(), Value::Int(2));
    let all = client.execute_command(set::smembers(&s)).await.unwrap();
    assert!(matches!(all, Value::Set(_)));
    assert_eq!(members(&all), ["a", "b"]);
    assert_eq!(client.execute_command(set::sismember(&s, "a")).await.unwrap(), Value::Bool(true));
    assert_eq!(client.execute_command(set::sismember(&s, "z")).await.unwrap(), Value::Bool(false));
}

#[tokio::test]
async fn set_algebra() {
    let Some(client) = live_client().await else { return };
    let p = test_prefix();
    let (x, y, dest) = (format!("{p}_x"), format!("{p}_y"), format!("{p}_dest"));
    client.execute_command(set::sadd(&x, ["1", "2", "3"])).await.unwrap();
    client.execute_command(set::sadd(&y, ["2", "3", "4"])).await.unwrap();

    let inter = client.execute_command(set::sinter([&x, &y])).await.unwrap();
    assert_eq!(members(&inter), ["2", "3"]);
    let diff = client.execute_command(set::sdiff([&x, &y])).await.unwrap();
    assert_eq!(members(&diff), ["1"]);
    let union = client.execute_command(set::sunion([&x, &y])).await.unwrap();
    assert_eq!(members(&union), ["1", "2", "3", "4"]);

    assert_eq!(
        client.execute_command(set::sunionstore(&dest, [&x, &y])).await.unwrap(),
        Value::Int(4)
    );
}

#[tokio::test]
async fn smove_srem_spop() {
    let Some(client) = live_client().await else { return };
    let p = test_prefix();
    let (from, to) = (format!("{p}_from"), format!("{p}_to"));
    client.execute_command(set::sadd(&from, ["a", "b"])).await.unwrap();

    assert_eq!(client.execute_command(set::smove(&from, &to, "a")).await.unwrap(), Value::Bool(true));
    assert_eq!(client.execute_command(set::smove(&from, &to, "a")).await.unwrap(), Value::Bool(false));
    assert_eq!(client.execute_command(set::srem(&to, ["a", "q"])).await.unwrap(), Value::Int(1));
    assert_eq!(client.execute_command(set::spop(&from)).await.unwrap(), bytes("b"));
    assert_eq!(client.execute_command(set::spop(&from)).await.unwrap(), Value::Nil);
}

#[tokio::test]
async fn srandmember_with_count() {
    let Some(client) = live_client().await else { return };
    let s = format!("{}_rand", test_prefix());
    client.execute_command(set::sadd(&s, ["a", "b", "c"])).await.unwrap();

    let one = client.execute_command(set::srandmember(&s, None)).await.unwrap();
    assert!(one.as_str().is_some());
    let two = client.execute_command(set::srandmember(&s, Some(2))).await.unwrap();
    assert_eq!(two.as_list().map(|v| v.len()), Some(2));
}

#[tokio::test]
async fn sscan_all_collects_every_member() {
    let Some(client) = live_client().await else { return };
    let s = format!("{}_scan", test_prefix());
    let values: Vec<String> = (0..50).map(|i| format!("m{i}")).collect();
    client.execute_command(set::sadd(&s, &values)).await.unwrap();

    // SSCAN may repeat members, never skip them
    let seen = client.sscan_all(&s, &ScanOptions::default().count(7)).await.unwrap();
    assert!(seen.len() >= 50);
    let only_m1 = client
        .sscan_all(&s, &ScanOptions::matching("m1?"))
        .await
        .unwrap();
    assert!(only_m1.iter().all(|v| v.as_str().is_some_and(|m| m.starts_with("m1"))));
}
