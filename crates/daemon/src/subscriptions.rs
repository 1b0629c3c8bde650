// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Live subscription fan-out: a session that called `subscribe.create` gets
//! a bounded outbox; `State`'s write hook pushes matching events into every
//! outbox whose filter matches. A slow reader never blocks a writer —
//! outboxes drop the oldest entry and report the gap instead (§4.6).

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use thrum_core::{Filter, FilterType, Message, Scope, SubscriptionId};
use thrum_wire::method::NOTIFICATION_GAP;

struct Outbox {
    agent_name: String,
    filter: Filter,
    queue: Mutex<VecDeque<Value>>,
    buffer_limit: usize,
    waker: tokio::sync::Notify,
}

impl Outbox {
    fn push(&self, notification: Value) {
        let mut queue = self.queue.lock();
        if queue.len() >= self.buffer_limit {
            queue.pop_front();
            queue.push_back(gap_notification());
        }
        queue.push_back(notification);
        drop(queue);
        self.waker.notify_one();
    }

    /// Drains everything currently buffered, for a writer task to flush.
    fn drain(&self) -> Vec<Value> {
        let mut queue = self.queue.lock();
        queue.drain(..).collect()
    }
}

fn gap_notification() -> Value {
    serde_json::json!({"jsonrpc": "2.0", "method": NOTIFICATION_GAP, "params": {}})
}

/// Registry of live subscriptions, keyed by subscription id.
#[derive(Default, Clone)]
pub struct SubscriptionRegistry {
    outboxes: Arc<Mutex<HashMap<SubscriptionId, Arc<Outbox>>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, subscription_id: SubscriptionId, agent_name: String, filter: Filter, buffer_limit: usize) {
        let outbox = Arc::new(Outbox {
            agent_name,
            filter,
            queue: Mutex::new(VecDeque::new()),
            buffer_limit,
            waker: tokio::sync::Notify::new(),
        });
        self.outboxes.lock().insert(subscription_id, outbox);
    }

    pub fn unregister(&self, subscription_id: &SubscriptionId) {
        self.outboxes.lock().remove(subscription_id);
    }

    /// Pushes `message` to every subscription whose filter matches,
    /// addressed to the recipient agent names `fanout` already resolved.
    pub fn notify_message(&self, message: &Message, fanout: &[String]) {
        let outboxes = self.outboxes.lock();
        for outbox in outboxes.values() {
            if matches(&outbox.filter, message, fanout, &outbox.agent_name) {
                let notification = serde_json::json!({
                    "jsonrpc": "2.0",
                    "method": thrum_wire::method::NOTIFICATION_MESSAGE,
                    "params": message,
                });
                outbox.push(notification);
            }
        }
    }

    pub async fn wait_for(&self, subscription_id: &SubscriptionId) {
        let outbox = self.outboxes.lock().get(subscription_id).cloned();
        if let Some(outbox) = outbox {
            outbox.waker.notified().await;
        }
    }

    pub fn drain(&self, subscription_id: &SubscriptionId) -> Vec<Value> {
        self.outboxes.lock().get(subscription_id).map(|o| o.drain()).unwrap_or_default()
    }
}

fn matches(filter: &Filter, message: &Message, fanout: &[String], agent_name: &str) -> bool {
    match filter.filter_type {
        FilterType::All => true,
        FilterType::Scope => {
            let Some(want) = &filter.value else { return false };
            message.scopes.iter().any(|scope| scope_matches(scope, want))
        }
        FilterType::Mention => fanout.iter().any(|name| name == agent_name),
    }
}

fn scope_matches(scope: &Scope, want: &str) -> bool {
    match scope {
        Scope::Everyone => want == "@everyone",
        Scope::Agent(name) => want == format!("@{name}"),
        Scope::Role(role) => want == format!("@role:{role}"),
        Scope::Group(group) => want == format!("@group:{group}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use thrum_core::{AgentId, Body, MessageId, SessionId};

    fn sample_message(scopes: Vec<Scope>) -> Message {
        Message {
            message_id: MessageId::new(),
            thread_id: None,
            agent_id: AgentId::new(),
            authored_by: None,
            disclosed: None,
            session_id: SessionId::new(),
            created_at: Utc::now(),
            body: Body { format: "text".into(), content: "hi".into() },
            scopes,
            refs: vec![],
            reply_to: None,
        }
    }

    #[test]
    fn all_filter_matches_everything() {
        let registry = SubscriptionRegistry::new();
        let sub_id = SubscriptionId::new();
        registry.register(sub_id.clone(), "impl1".into(), Filter::all(), 10);
        registry.notify_message(&sample_message(vec![Scope::Everyone]), &[]);
        assert_eq!(registry.drain(&sub_id).len(), 1);
    }

    #[test]
    fn mention_filter_only_matches_named_recipient() {
        let registry = SubscriptionRegistry::new();
        let sub_id = SubscriptionId::new();
        let filter = Filter { filter_type: FilterType::Mention, value: None };
        registry.register(sub_id.clone(), "impl1".into(), filter, 10);

        registry.notify_message(&sample_message(vec![Scope::Agent("impl2".into())]), &["impl2".into()]);
        assert!(registry.drain(&sub_id).is_empty());

        registry.notify_message(&sample_message(vec![Scope::Agent("impl1".into())]), &["impl1".into()]);
        assert_eq!(registry.drain(&sub_id).len(), 1);
    }

    #[test]
    fn outbox_drops_oldest_and_records_gap() {
        let registry = SubscriptionRegistry::new();
        let sub_id = SubscriptionId::new();
        registry.register(sub_id.clone(), "impl1".into(), Filter::all(), 2);
        for _ in 0..3 {
            registry.notify_message(&sample_message(vec![Scope::Everyone]), &[]);
        }
        let drained = registry.drain(&sub_id);
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[1]["method"], thrum_wire::method::NOTIFICATION_GAP);
    }
}
