//! Mock 消息源
//!
//! 用于无 Kafka 环境的测试与演示。

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use contracts::{ContractError, Message, MessageSource, RecordOrigin};
use tracing::trace;

/// 脚本事件
#[derive(Debug, Clone)]
pub enum MockEvent {
    /// 产生一条消息
    Message(Message),
    /// 可恢复的 poll 错误
    PollError(String),
    /// 致命连接错误
    Fatal(String),
    /// 等待一段时间
    Delay(Duration),
}

impl MockEvent {
    /// 构造一条以偏移量为 key 的文本消息
    pub fn message(topic: &str, offset: i64, payload: &str) -> Self {
        Self::Message(Message::new(
            Some(Bytes::from(offset.to_string())),
            Some(Bytes::copy_from_slice(payload.as_bytes())),
            RecordOrigin::new(topic, 0, offset),
        ))
    }
}

/// 已提交的偏移量记录 (topic, partition, next_offset)
pub type CommitLog = Arc<Mutex<Vec<(String, i32, i64)>>>;

/// 每次 `flush_commits` 时已记录的提交数
pub type FlushLog = Arc<Mutex<Vec<usize>>>;

/// 按需生成的 JSON 负载
struct Generator {
    topic: String,
    count: usize,
    interval: Duration,
    next: usize,
}

impl Generator {
    fn emit(&mut self) -> Message {
        let seq = self.next;
        self.next += 1;
        let payload = format!(r#"{{"seq":{seq},"topic":"{}"}}"#, self.topic);
        Message::new(
            Some(Bytes::from(seq.to_string())),
            Some(Bytes::from(payload)),
            RecordOrigin::new(self.topic.as_str(), 0, seq as i64),
        )
    }
}

/// Mock 消息源
///
/// 按顺序回放脚本事件（以及生成的负载），耗尽后结束消息流（或保持打开）。
pub struct MockSource {
    name: String,
    events: VecDeque<MockEvent>,
    generator: Option<Generator>,
    hold_open: bool,
    commits: CommitLog,
    flushes: FlushLog,
}

impl MockSource {
    /// 创建新的 Mock 消息源
    pub fn new(name: impl Into<String>, events: Vec<MockEvent>) -> Self {
        Self {
            name: name.into(),
            events: events.into(),
            generator: None,
            hold_open: false,
            commits: Arc::new(Mutex::new(Vec::new())),
            flushes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// 依次产生给定文本负载，偏移量从 0 开始
    pub fn from_payloads(topic: &str, payloads: &[&str]) -> Self {
        let events = payloads
            .iter()
            .enumerate()
            .map(|(i, p)| MockEvent::message(topic, i as i64, p))
            .collect();
        Self::new(format!("mock:{topic}"), events)
    }

    /// 生成 `count` 条 JSON 负载，按 `interval` 间隔发送
    ///
    /// 负载在 `poll` 时逐条生成。
    pub fn generate(topic: &str, count: usize, interval: Duration) -> Self {
        let mut source = Self::new(format!("mock:{topic}"), Vec::new());
        source.generator = Some(Generator {
            topic: topic.to_string(),
            count,
            interval,
            next: 0,
        });
        source
    }

    /// 脚本耗尽后保持打开，直到收到停止请求
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// 已提交偏移量的共享记录
    pub fn commits(&self) -> CommitLog {
        Arc::clone(&self.commits)
    }

    /// `flush_commits` 调用记录
    pub fn flushes(&self) -> FlushLog {
        Arc::clone(&self.flushes)
    }
}

impl MessageSource for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn poll(&mut self) -> Option<Result<Message, ContractError>> {
        loop {
            match self.events.pop_front() {
                Some(MockEvent::Delay(d)) => tokio::time::sleep(d).await,
                Some(MockEvent::Message(msg)) => {
                    trace!(source = %self.name, offset = msg.origin.offset, "mock message");
                    return Some(Ok(msg));
                }
                Some(MockEvent::PollError(e)) => return Some(Err(ContractError::source_poll(e))),
                Some(MockEvent::Fatal(e)) => {
                    return Some(Err(ContractError::source_connection(e)));
                }
                None => {
                    if let Some(generator) = self.generator.as_mut() {
                        if generator.next < generator.count {
                            if !generator.interval.is_zero() {
                                tokio::time::sleep(generator.interval).await;
                            }
                            return Some(Ok(generator.emit()));
                        }
                    }
                    if self.hold_open {
                        std::future::pending::<()>().await;
                    }
                    return None;
                }
            }
        }
    }

    fn commit(&mut self, topic: &str, partition: i32, next_offset: i64) -> Result<(), ContractError> {
        self.commits
            .lock()
            .map_err(|_| ContractError::Other("commit log poisoned".into()))?
            .push((topic.to_string(), partition, next_offset));
        Ok(())
    }

    fn flush_commits(&mut self) -> Result<(), ContractError> {
        let committed = self
            .commits
            .lock()
            .map_err(|_| ContractError::Other("commit log poisoned".into()))?
            .len();
        self.flushes
            .lock()
            .map_err(|_| ContractError::Other("flush log poisoned".into()))?
            .push(committed);
        Ok(())
    }
}
