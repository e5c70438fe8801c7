use anyhow::{Result as AnyResult, bail};
use mq_core::{EventBroker, HandlerOptions, MqRuntime};
use serde_json::json;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct Inbox {
    inner: Arc<Mutex<Vec<String>>>,
}
impl Inbox {
    fn push(&self, s: String) {
        self.inner.lock().unwrap().push(s);
    }
    fn items(&self) -> Vec<String> {
        self.inner.lock().unwrap().clone()
    }
}

// orders：两个订阅者都收到同一事件，出队计数为 1
#[test]
fn orders_scenario() -> AnyResult<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("mq_core=debug")
        .with_test_writer()
        .try_init();

    let rt = MqRuntime::new();
    let broker = EventBroker::new(&rt);
    let received = Arc::new(Mutex::new(Vec::new()));

    for name in ["audit", "ship"] {
        let r = received.clone();
        broker.subscribe_to_event_handler(
            "topic",
            "orders",
            HandlerOptions::default(),
            name,
            move |e| {
                r.lock().unwrap().push((name, e.payload().data().clone()));
                Ok(())
            },
        )?;
    }

    let orders = broker.require_event_handler("orders")?;
    orders.emit("created", "order", json!({"id": 1}))?;
    assert_eq!(orders.dequeued_count(), 0);

    rt.run_until_idle();
    assert_eq!(
        *received.lock().unwrap(),
        vec![("audit", json!({"id": 1})), ("ship", json!({"id": 1}))]
    );
    assert_eq!(orders.dequeued_count(), 1);
    assert_eq!(orders.enqueued_count(), 1);
    Ok(())
}

// 无失败时每个订阅者按发布顺序恰好收到每个事件一次
#[test]
fn every_subscriber_sees_every_event_in_order() -> AnyResult<()> {
    let rt = MqRuntime::new();
    let broker = EventBroker::new(&rt);
    let topic = broker.create_topic("ticks", HandlerOptions::default())?;

    let inboxes: Vec<Inbox> = (0..3).map(|_| Inbox::default()).collect();
    for (i, inbox) in inboxes.iter().enumerate() {
        let inbox = inbox.clone();
        topic.subscribe(&format!("s{i}"), move |e| {
            inbox.push(e.name().to_string());
            Ok(())
        })?;
    }

    let names: Vec<String> = (0..20).map(|i| format!("t{i}")).collect();
    for name in &names {
        topic.emit(name, "tick", json!(name))?;
    }
    rt.run_until_idle();

    for inbox in &inboxes {
        assert_eq!(inbox.items(), names);
    }
    assert_eq!(topic.dequeued_count(), 20);
    assert_eq!(topic.delivery_failed_count(), 0);
    assert_eq!(topic.queue_len(), 0);
    Ok(())
}

// 失败计数每次失败加一，成功出队计数每次成功加一
#[test]
fn counters_track_attempts() -> AnyResult<()> {
    let rt = MqRuntime::new();
    let broker = EventBroker::new(&rt);
    let topic = broker.create_topic("flaky", HandlerOptions::default())?;
    let remaining_failures = Arc::new(Mutex::new(3u32));

    let f = remaining_failures.clone();
    topic.subscribe("flaky", move |_| {
        let mut left = f.lock().unwrap();
        if *left > 0 {
            *left -= 1;
            bail!("not yet");
        }
        Ok(())
    })?;

    // 每次发布只触发一次分发；失败的事件留在队首
    for i in 0..5 {
        topic.emit("e", "n", json!(i))?;
        rt.run_until_idle();
    }

    let counters = topic.counters();
    assert_eq!(counters.enqueued, 5);
    assert_eq!(counters.delivery_failed, 3);
    assert_eq!(counters.dequeued, 2);
    assert_eq!(topic.queue_len(), 3);
    assert_eq!(topic.peek_front().unwrap().payload().data(), &json!(2));
    Ok(())
}

// 订阅在发布之后、分发之前发生时，新订阅者也会收到
#[test]
fn subscriber_set_is_read_at_dispatch_time() -> AnyResult<()> {
    let rt = MqRuntime::new();
    let broker = EventBroker::new(&rt);
    let topic = broker.create_topic("late", HandlerOptions::default())?;
    let inbox = Inbox::default();

    topic.emit("early", "n", json!(1))?;
    let i = inbox.clone();
    topic.subscribe("late", move |e| {
        i.push(e.name().to_string());
        Ok(())
    })?;
    rt.run_until_idle();

    assert_eq!(inbox.items(), vec!["early"]);
    Ok(())
}
