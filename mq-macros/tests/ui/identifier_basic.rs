use mq_macros::identifier;

#[identifier(prefix = "evt")]
pub struct EventId(u64);

#[identifier]
#[derive(Debug)]
struct Plain(u32);

fn main() {
    let id = EventId::new(7);
    assert_eq!(id.value(), 7);
    assert_eq!(id.to_string(), "evt-7");
    assert!(EventId::from(8) > id);

    let raw: u64 = id.into();
    assert_eq!(raw, 7);

    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "7");

    let p = Plain::default();
    assert_eq!(format!("{p} {p:?}"), "0 Plain(0)");
}
