// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Live subscription handlers (§4.6).

use crate::handlers::require_params;
use crate::rpc::ConnectionContext;
use thrum_core::{EventPayload, SubscriptionId, ThrumError, DEFAULT_BUFFER_LIMIT};
use thrum_wire::method::{SubscribeCreateParams, UnsubscribeParams};

pub fn create(ctx: &ConnectionContext, params: Option<serde_json::Value>) -> Result<serde_json::Value, ThrumError> {
    let params: SubscribeCreateParams = require_params(params)?;
    let binding = ctx.current_session()?;
    let buffer_limit = params.buffer_limit.unwrap_or(DEFAULT_BUFFER_LIMIT);

    let subscription_id = SubscriptionId::new();
    ctx.state.write_event(
        EventPayload::Subscribe {
            subscription_id,
            session_id: binding.session_id,
            filter: params.filter.clone(),
            buffer_limit,
        },
        Some(&binding.agent_name),
    )?;

    ctx.subscriptions.register(subscription_id, binding.agent_name, params.filter, buffer_limit);
    ctx.track_subscription(subscription_id);
    Ok(serde_json::json!({ "subscription_id": subscription_id }))
}

pub fn unsubscribe(ctx: &ConnectionContext, params: Option<serde_json::Value>) -> Result<serde_json::Value, ThrumError> {
    let params: UnsubscribeParams = require_params(params)?;
    ctx.current_session()?;

    ctx.state.write_event(EventPayload::Unsubscribe { subscription_id: params.subscription_id }, None)?;
    ctx.subscriptions.unregister(&params.subscription_id);
    ctx.untrack_subscription(&params.subscription_id);
    Ok(serde_json::json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::SessionBinding;
    use crate::test_support::test_ctx;
    use thrum_core::{AgentId, Filter, SessionId};

    fn with_session(ctx: &ConnectionContext) {
        ctx.bind_session(SessionBinding { session_id: SessionId::new(), agent_id: AgentId::new(), agent_name: "alice".into() });
    }

    #[test]
    fn create_requires_a_bound_session() {
        let (ctx, _dir) = test_ctx();
        let params = SubscribeCreateParams { filter: Filter::all(), buffer_limit: None };
        let err = create(&ctx, Some(serde_json::to_value(params).unwrap())).unwrap_err();
        assert!(matches!(err, ThrumError::InvalidArgument(_)));
    }

    #[test]
    fn create_tracks_the_subscription_on_the_connection_and_unsubscribe_untracks_it() {
        let (ctx, _dir) = test_ctx();
        with_session(&ctx);
        let params = SubscribeCreateParams { filter: Filter::all(), buffer_limit: None };
        let result = create(&ctx, Some(serde_json::to_value(params).unwrap())).unwrap();
        let subscription_id = SubscriptionId::from_string(result["subscription_id"].as_str().unwrap());
        assert_eq!(ctx.owned_subscriptions(), vec![subscription_id]);

        unsubscribe(&ctx, Some(serde_json::json!({ "subscription_id": subscription_id }))).unwrap();
        assert!(ctx.owned_subscriptions().is_empty());
    }

    #[test]
    fn unsubscribe_requires_a_bound_session_too() {
        let (ctx, _dir) = test_ctx();
        let err = unsubscribe(&ctx, Some(serde_json::json!({ "subscription_id": SubscriptionId::new() }))).unwrap_err();
        assert!(matches!(err, ThrumError::InvalidArgument(_)));
    }
}
