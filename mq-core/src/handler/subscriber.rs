use crate::event::Event;
use std::fmt;
use std::sync::Arc;

/// 订阅者回调：返回 `Err` 即视为本次投递失败，事件将回到队首等待重试
pub type Callback = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

/// 订阅登记：`(名称, 回调)`
///
/// 名称是否唯一由具体投递策略决定（Topic 唯一，Queue 可重复）。
#[derive(Clone)]
pub struct Subscriber {
    name: String,
    callback: Callback,
}

impl Subscriber {
    pub(crate) fn new(name: String, callback: Callback) -> Self {
        Self { name, callback }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn callback(&self) -> &Callback {
        &self.callback
    }

    /// 同步调用回调
    pub fn deliver(&self, event: &Event) -> anyhow::Result<()> {
        (self.callback)(event)
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
