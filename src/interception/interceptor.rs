// src/interception/interceptor.rs
//! Per-message traffic interceptor
//!
//! The pipeline hands every request and every response to the registered
//! interceptors. A [`TrafficInterceptor`] compares each request's target with
//! the session's original endpoint and, on an exact match, points the request
//! at the replacement endpoint. Responses are only audited.
//!
//! The interceptor never locks: it reads the session through an atomically
//! swapped snapshot, so a request evaluated while the session toggles sees
//! either the old `(state, rule)` pair or the new one, never a mix.

use crate::interception::audit::AuditSink;
use crate::redirect::endpoint::{HttpService, RedirectionRule};
use crate::redirect::session::SessionSnapshot;
use arc_swap::ArcSwap;
use std::sync::Arc;
use ulid::Ulid;

/// A message observed by the host pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpMessage {
    /// Where the message is (or was) addressed
    pub service: HttpService,
}

impl HttpMessage {
    pub fn new(service: HttpService) -> Self {
        Self { service }
    }
}

/// Hook invoked once per request and once per response
pub trait Interceptor: Send + Sync {
    /// Identifier used in logs
    fn name(&self) -> String;

    fn process_message(&self, is_request: bool, message: &mut HttpMessage);
}

/// Outcome of matching one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Request now targets the replacement endpoint
    Rewritten(HttpService),
    /// Request continues to its original destination
    Unchanged,
}

/// Rewrites requests matching the active rule
pub struct TrafficInterceptor {
    session_id: Ulid,
    snapshot: Arc<ArcSwap<SessionSnapshot>>,
    audit: Arc<dyn AuditSink>,
}

impl TrafficInterceptor {
    pub fn new(
        session_id: Ulid,
        snapshot: Arc<ArcSwap<SessionSnapshot>>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            session_id,
            snapshot,
            audit,
        }
    }

    /// Classify a request target against the current snapshot
    pub fn process(&self, service: &HttpService) -> Decision {
        let snapshot = self.snapshot.load();
        match snapshot.active_rule() {
            Some(rule) => self.decide(rule, service),
            None => Decision::Unchanged,
        }
    }

    fn decide(&self, rule: &RedirectionRule, service: &HttpService) -> Decision {
        self.audit
            .record(&format!("> Matching against URL: {}", rule.original));

        if rule.matches(service) {
            self.audit.record(&format!(
                "> Target changed from {} to {}",
                rule.original, rule.replacement
            ));
            metrics::counter!("redirector_requests_total", "outcome" => "rewritten").increment(1);
            Decision::Rewritten(HttpService::from(&rule.replacement))
        } else {
            self.audit
                .record(&format!("> Target not changed to {}", rule.replacement));
            metrics::counter!("redirector_requests_total", "outcome" => "passed").increment(1);
            Decision::Unchanged
        }
    }
}

impl Interceptor for TrafficInterceptor {
    fn name(&self) -> String {
        format!("redirect-{}", self.session_id)
    }

    fn process_message(&self, is_request: bool, message: &mut HttpMessage) {
        let snapshot = self.snapshot.load();
        let Some(rule) = snapshot.active_rule() else {
            return;
        };

        let current_url = message.service.url();
        if is_request {
            self.audit.record("----->");
            self.audit
                .record(&format!("> Incoming request to: {}", current_url));
            if let Decision::Rewritten(target) = self.decide(rule, &message.service) {
                message.service = target;
            }
        } else {
            self.audit.record("<-----");
            self.audit
                .record(&format!("< Incoming response from: {}", current_url));
            metrics::counter!("redirector_responses_total").increment(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interception::audit::MemoryAudit;
    use crate::redirect::endpoint::{Endpoint, Scheme};
    use proptest::prelude::*;

    fn rule() -> Arc<RedirectionRule> {
        Arc::new(RedirectionRule::new(
            Endpoint::new("original", Scheme::Http, "a.example", 80).unwrap(),
            Endpoint::new("replacement", Scheme::Https, "b.example", 443).unwrap(),
        ))
    }

    fn interceptor(snapshot: SessionSnapshot) -> (TrafficInterceptor, Arc<MemoryAudit>) {
        let audit = Arc::new(MemoryAudit::new());
        let interceptor = TrafficInterceptor::new(
            Ulid::new(),
            Arc::new(ArcSwap::from_pointee(snapshot)),
            audit.clone(),
        );
        (interceptor, audit)
    }

    #[test]
    fn test_matching_request_is_rewritten() {
        let (interceptor, audit) = interceptor(SessionSnapshot::active(rule()));

        let decision = interceptor.process(&HttpService::new(Scheme::Http, "a.example", 80));

        assert_eq!(
            decision,
            Decision::Rewritten(HttpService::new(Scheme::Https, "b.example", 443))
        );
        assert_eq!(
            audit.lines(),
            vec![
                "> Matching against URL: http://a.example:80",
                "> Target changed from http://a.example:80 to https://b.example:443",
            ]
        );
    }

    #[test]
    fn test_port_mismatch_passes_through() {
        let (interceptor, audit) = interceptor(SessionSnapshot::active(rule()));

        let decision = interceptor.process(&HttpService::new(Scheme::Http, "a.example", 8080));

        assert_eq!(decision, Decision::Unchanged);
        assert_eq!(
            audit.lines().last().map(String::as_str),
            Some("> Target not changed to https://b.example:443")
        );
    }

    #[test]
    fn test_scheme_mismatch_passes_through() {
        let (interceptor, _audit) = interceptor(SessionSnapshot::active(rule()));
        let decision = interceptor.process(&HttpService::new(Scheme::Https, "a.example", 80));
        assert_eq!(decision, Decision::Unchanged);
    }

    #[test]
    fn test_request_message_rewritten_after_audit() {
        let (interceptor, audit) = interceptor(SessionSnapshot::active(rule()));
        let mut message = HttpMessage::new(HttpService::new(Scheme::Http, "a.example", 80));

        interceptor.process_message(true, &mut message);

        assert_eq!(message.service, HttpService::new(Scheme::Https, "b.example", 443));
        assert_eq!(
            audit.lines(),
            vec![
                "----->",
                "> Incoming request to: http://a.example:80",
                "> Matching against URL: http://a.example:80",
                "> Target changed from http://a.example:80 to https://b.example:443",
            ]
        );
    }

    #[test]
    fn test_response_is_never_rewritten() {
        let (interceptor, audit) = interceptor(SessionSnapshot::active(rule()));
        let mut message = HttpMessage::new(HttpService::new(Scheme::Http, "a.example", 80));

        interceptor.process_message(false, &mut message);

        assert_eq!(message.service, HttpService::new(Scheme::Http, "a.example", 80));
        assert_eq!(
            audit.lines(),
            vec!["<-----", "< Incoming response from: http://a.example:80"]
        );
    }

    #[test]
    fn test_inactive_snapshot_is_silent() {
        let (interceptor, audit) = interceptor(SessionSnapshot::inactive());
        let mut message = HttpMessage::new(HttpService::new(Scheme::Http, "a.example", 80));

        interceptor.process_message(true, &mut message);

        assert_eq!(message.service, HttpService::new(Scheme::Http, "a.example", 80));
        assert!(audit.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_processing() {
        let (interceptor, _audit) = interceptor(SessionSnapshot::active(rule()));
        let interceptor = Arc::new(interceptor);

        let handles: Vec<_> = (0..1000u16)
            .map(|i| {
                let interceptor = Arc::clone(&interceptor);
                tokio::spawn(async move {
                    let port = if i % 2 == 0 { 80 } else { 8000 + i };
                    let decision =
                        interceptor.process(&HttpService::new(Scheme::Http, "a.example", port));
                    (port, decision)
                })
            })
            .collect();

        for handle in handles {
            let (port, decision) = handle.await.unwrap();
            if port == 80 {
                assert_eq!(
                    decision,
                    Decision::Rewritten(HttpService::new(Scheme::Https, "b.example", 443))
                );
            } else {
                assert_eq!(decision, Decision::Unchanged);
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_processing_while_snapshot_swaps() {
        let rule_a = rule();
        let rule_b = Arc::new(RedirectionRule::new(
            Endpoint::new("original", Scheme::Http, "a.example", 80).unwrap(),
            Endpoint::new("replacement", Scheme::Http, "c.example", 8443).unwrap(),
        ));
        let snapshot = Arc::new(ArcSwap::from_pointee(SessionSnapshot::inactive()));
        let interceptor = Arc::new(TrafficInterceptor::new(
            Ulid::new(),
            Arc::clone(&snapshot),
            Arc::new(MemoryAudit::new()),
        ));

        let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let toggler = {
            let snapshot = Arc::clone(&snapshot);
            let stop = Arc::clone(&stop);
            let (rule_a, rule_b) = (Arc::clone(&rule_a), Arc::clone(&rule_b));
            tokio::spawn(async move {
                let mut swaps = 0usize;
                loop {
                    let next = match swaps % 3 {
                        0 => SessionSnapshot::active(Arc::clone(&rule_a)),
                        1 => SessionSnapshot::active(Arc::clone(&rule_b)),
                        _ => SessionSnapshot::inactive(),
                    };
                    snapshot.store(Arc::new(next));
                    swaps += 1;
                    if stop.load(std::sync::atomic::Ordering::Relaxed) {
                        break swaps;
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        let a = HttpService::from(&rule_a.replacement);
        let b = HttpService::from(&rule_b.replacement);
        let handles: Vec<_> = (0..1000)
            .map(|_| {
                let interceptor = Arc::clone(&interceptor);
                tokio::spawn(async move {
                    tokio::task::yield_now().await;
                    interceptor.process(&HttpService::new(Scheme::Http, "a.example", 80))
                })
            })
            .collect();

        for handle in handles {
            match handle.await.unwrap() {
                Decision::Rewritten(target) => assert!(target == a || target == b, "{:?}", target),
                Decision::Unchanged => {}
            }
        }

        stop.store(true, std::sync::atomic::Ordering::Relaxed);
        assert!(toggler.await.unwrap() > 0);
    }

    proptest! {
        #[test]
        fn prop_only_exact_matches_rewrite(
            host in "[a-c]\\.example",
            port in prop_oneof![Just(80u16), 1u16..=65535],
            https in any::<bool>(),
        ) {
            let (interceptor, _audit) = interceptor(SessionSnapshot::active(rule()));
            let service = HttpService::new(Scheme::from_https(https), host.clone(), port);
            let expected = host == "a.example" && port == 80 && !https;

            let rewritten = matches!(interceptor.process(&service), Decision::Rewritten(_));
            prop_assert_eq!(rewritten, expected);
        }
    }
}
