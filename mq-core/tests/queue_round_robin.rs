use anyhow::{Result as AnyResult, bail};
use mq_core::{Event, EventBroker, HandlerOptions, HandlerRef, MqRuntime};
use serde_json::json;
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<(String, String)>>>;

fn recorder(log: &Log, who: &'static str) -> impl Fn(&Event) -> AnyResult<()> + Send + Sync + 'static {
    let log = log.clone();
    move |e| {
        log.lock().unwrap().push((who.to_string(), e.name().to_string()));
        Ok(())
    }
}

fn entries(log: &Log) -> Vec<(String, String)> {
    log.lock().unwrap().clone()
}

fn pair(who: &str, what: &str) -> (String, String) {
    (who.to_string(), what.to_string())
}

fn queue(broker: &EventBroker, name: &str) -> AnyResult<HandlerRef> {
    Ok(broker.create_queue(name, HandlerOptions::default())?)
}

// jobs：单一订阅者按 FIFO 收到全部事件
#[test]
fn jobs_single_consumer_fifo() -> AnyResult<()> {
    let rt = MqRuntime::new();
    let broker = EventBroker::new(&rt);
    let log = Log::default();
    let jobs = queue(&broker, "jobs")?;
    jobs.subscribe("w1", recorder(&log, "w1"))?;

    for name in ["A", "B", "C"] {
        jobs.emit(name, "job", json!(name))?;
    }
    rt.run_until_idle();

    assert_eq!(
        entries(&log),
        vec![pair("w1", "A"), pair("w1", "B"), pair("w1", "C")]
    );
    assert_eq!(jobs.dequeued_count(), 3);
    Ok(())
}

// jobs2：无订阅者时积压，首个订阅者加入后自动排空
#[test]
fn jobs2_backlog_drained_on_first_subscribe() -> AnyResult<()> {
    let rt = MqRuntime::new();
    let broker = EventBroker::new(&rt);
    let log = Log::default();
    let jobs = queue(&broker, "jobs2")?;

    jobs.emit("A", "job", json!(1))?;
    jobs.emit("B", "job", json!(2))?;
    rt.run_until_idle();
    assert_eq!(jobs.queue_len(), 2);
    assert!(entries(&log).is_empty());

    jobs.subscribe("w1", recorder(&log, "w1"))?;
    rt.run_until_idle();

    assert_eq!(entries(&log), vec![pair("w1", "A"), pair("w1", "B")]);
    assert_eq!(jobs.queue_len(), 0);
    Ok(())
}

// 排空期间的一次失败不会让积压滞留
#[test]
fn backlog_drain_survives_transient_failure() -> AnyResult<()> {
    let rt = MqRuntime::new();
    let broker = EventBroker::new(&rt);
    let log = Log::default();
    let jobs = queue(&broker, "flaky")?;
    for name in ["A", "B", "C"] {
        jobs.emit(name, "job", json!(name))?;
    }

    let fail_next = Arc::new(Mutex::new(true));
    let (l, f) = (log.clone(), fail_next.clone());
    jobs.subscribe("w1", move |e| {
        if std::mem::replace(&mut *f.lock().unwrap(), false) {
            bail!("cold start");
        }
        l.lock().unwrap().push(("w1".to_string(), e.name().to_string()));
        Ok(())
    })?;
    rt.run_until_idle();

    assert_eq!(
        entries(&log),
        vec![pair("w1", "A"), pair("w1", "B"), pair("w1", "C")]
    );
    assert_eq!(jobs.queue_len(), 0);
    assert_eq!(jobs.delivery_failed_count(), 1);
    assert_eq!(jobs.dequeued_count(), 3);
    Ok(())
}

// jobs3：w1 总是失败，A 只在 w1 上重试，B 被阻塞在 A 之后
#[test]
fn jobs3_head_of_line_blocking() -> AnyResult<()> {
    let rt = MqRuntime::new();
    let broker = EventBroker::new(&rt);
    let log = Log::default();
    let jobs = queue(&broker, "jobs3")?;

    let attempts = Arc::new(Mutex::new(Vec::new()));
    let a = attempts.clone();
    jobs.subscribe("w1", move |e| {
        a.lock().unwrap().push(e.name().to_string());
        bail!("w1 is down")
    })?;
    jobs.subscribe("w2", recorder(&log, "w2"))?;
    rt.run_until_idle();

    jobs.emit("A", "job", json!(1))?;
    jobs.emit("B", "job", json!(2))?;
    rt.run_until_idle();

    assert_eq!(*attempts.lock().unwrap(), vec!["A", "A"]);
    assert!(entries(&log).is_empty());
    assert_eq!(jobs.delivery_failed_count(), 2);
    assert_eq!(jobs.queue_len(), 2);
    assert_eq!(jobs.peek_front().unwrap().name(), "A");

    // 移除 w1 后立即排空积压，A、B 依次交给 w2
    assert_eq!(jobs.unsubscribe("w1")?, 1);
    rt.run_until_idle();
    assert_eq!(entries(&log), vec![pair("w2", "A"), pair("w2", "B")]);
    assert_eq!(jobs.queue_len(), 0);

    jobs.emit("C", "job", json!(3))?;
    rt.run_until_idle();
    assert_eq!(
        entries(&log),
        vec![pair("w2", "A"), pair("w2", "B"), pair("w2", "C")]
    );
    assert_eq!(*attempts.lock().unwrap(), vec!["A", "A"]);
    Ok(())
}

// 多订阅者按登记顺序从下标 0 开始轮转
#[test]
fn round_robin_wraps() -> AnyResult<()> {
    let rt = MqRuntime::new();
    let broker = EventBroker::new(&rt);
    let log = Log::default();
    let jobs = queue(&broker, "rr")?;
    jobs.subscribe("w1", recorder(&log, "w1"))?;
    jobs.subscribe("w2", recorder(&log, "w2"))?;
    jobs.subscribe("w3", recorder(&log, "w3"))?;
    rt.run_until_idle();

    for i in 0..7 {
        jobs.emit(&format!("e{i}"), "job", json!(i))?;
    }
    rt.run_until_idle();

    let who: Vec<String> = entries(&log).into_iter().map(|(w, _)| w).collect();
    assert_eq!(who, vec!["w1", "w2", "w3", "w1", "w2", "w3", "w1"]);
    Ok(())
}

// 同名订阅者可多次登记，各自占据一个轮转位置
#[test]
fn duplicate_names_share_the_rotation() -> AnyResult<()> {
    let rt = MqRuntime::new();
    let broker = EventBroker::new(&rt);
    let log = Log::default();
    let jobs = queue(&broker, "dup")?;
    jobs.subscribe("w", recorder(&log, "w-a"))?;
    jobs.subscribe("w", recorder(&log, "w-b"))?;
    assert_eq!(jobs.subscriber_count(), 2);
    rt.run_until_idle();

    for i in 0..4 {
        jobs.emit("e", "job", json!(i))?;
    }
    rt.run_until_idle();
    let who: Vec<String> = entries(&log).into_iter().map(|(w, _)| w).collect();
    assert_eq!(who, vec!["w-a", "w-b", "w-a", "w-b"]);

    // 按名称取消订阅会移除全部同名登记
    assert_eq!(jobs.unsubscribe("w")?, 2);
    assert!(!jobs.has_subscribers());
    Ok(())
}

// 全部取消订阅后重新订阅，轮转从下标 0 重新开始
#[test]
fn resubscribe_restarts_rotation() -> AnyResult<()> {
    let rt = MqRuntime::new();
    let broker = EventBroker::new(&rt);
    let log = Log::default();
    let jobs = queue(&broker, "reset")?;
    jobs.subscribe("w1", recorder(&log, "w1"))?;
    jobs.subscribe("w2", recorder(&log, "w2"))?;
    rt.run_until_idle();

    jobs.emit("e0", "job", json!(0))?;
    rt.run_until_idle();
    assert_eq!(entries(&log), vec![pair("w1", "e0")]);

    jobs.unsubscribe("w1")?;
    jobs.unsubscribe("w2")?;
    jobs.subscribe("w1", recorder(&log, "w1"))?;
    jobs.subscribe("w2", recorder(&log, "w2"))?;
    rt.run_until_idle();

    jobs.emit("e1", "job", json!(1))?;
    rt.run_until_idle();
    assert_eq!(entries(&log), vec![pair("w1", "e0"), pair("w1", "e1")]);
    Ok(())
}

// 经由代理取消订阅：处理器不存在时为空操作
#[test]
fn broker_unsubscribe_routes_by_name() -> AnyResult<()> {
    let rt = MqRuntime::new();
    let broker = EventBroker::new(&rt);
    let log = Log::default();
    broker.subscribe_to_event_handler(
        "queue",
        "routed",
        HandlerOptions::default(),
        "w1",
        recorder(&log, "w1"),
    )?;

    assert_eq!(broker.unsubscribe_from_event_handler("routed", "w1")?, 1);
    assert_eq!(broker.unsubscribe_from_event_handler("routed", "w1")?, 0);
    assert_eq!(broker.unsubscribe_from_event_handler("missing", "w1")?, 0);
    assert_eq!(broker.require_event_handler("routed")?.subscriber_count(), 0);
    Ok(())
}
