//! Per-channel invocation loop.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, BoxFuture};
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use serde_json::Value;
use tracing::{debug, warn};

use tether_config::Config;
use tether_protocol::{Message, Serial};

use super::{CallError, DISPATCH_TARGET};
use crate::port::{PortReceiver, PortSender};
use crate::registry::{Method, ServiceRegistry};

/// Tunables applied to every call on a channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Deadline for a single call; unlimited when `None`.
    pub invoke_timeout: Option<Duration>,
}

impl DispatchOptions {
    /// Derives options from the resolved configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            invoke_timeout: config.invoke_timeout(),
        }
    }
}

/// Counters reported when a dispatcher stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// `Invoke` messages accepted; each received exactly one response.
    pub handled: u64,
    /// Payloads that failed message validation.
    pub dropped: u64,
    /// Valid messages that are not invocations.
    pub ignored: u64,
    /// Responses sent as `InvokeResult`.
    pub succeeded: u64,
    /// Responses sent as `InvokeError`.
    pub failed: u64,
}

/// An accepted invocation whose response has not been produced yet.
pub struct PendingCall {
    serial: Serial,
    call: BoxFuture<'static, Result<Value, CallError>>,
}

impl PendingCall {
    /// Serial the response will carry.
    #[must_use]
    pub fn serial(&self) -> Serial {
        self.serial
    }

    /// Drives the call to completion.
    pub async fn complete(self) -> (Serial, Result<Value, CallError>) {
        (self.serial, self.call.await)
    }
}

/// Answers invocations arriving on one channel from one registry.
pub struct Dispatcher {
    registry: ServiceRegistry,
    port: PortSender,
    options: DispatchOptions,
    summary: DispatchSummary,
}

impl Dispatcher {
    /// Binds `registry` to the outbound half of a channel.
    #[must_use]
    pub fn new(registry: ServiceRegistry, port: PortSender) -> Self {
        Self {
            registry,
            port,
            options: DispatchOptions::default(),
            summary: DispatchSummary::default(),
        }
    }

    /// Replaces the call options.
    #[must_use]
    pub fn with_options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn summary(&self) -> DispatchSummary {
        self.summary
    }

    /// Validates one inbound payload and resolves its target.
    ///
    /// Returns `None` for payloads that need no response: malformed input
    /// (logged as a warning) and messages other than `Invoke`. An unknown
    /// target still yields a call, one that fails immediately, so every
    /// accepted serial is answered through [`Dispatcher::respond`].
    pub fn handle(&mut self, raw: Value) -> Option<PendingCall> {
        let invoke = match Message::from_value(raw) {
            Ok(Message::Invoke(invoke)) => invoke,
            Ok(other) => {
                self.summary.ignored += 1;
                debug!(
                    target: DISPATCH_TARGET,
                    kind = other.kind(),
                    "ignoring non-invocation message"
                );
                return None;
            }
            Err(error) => {
                self.summary.dropped += 1;
                warn!(
                    target: DISPATCH_TARGET,
                    error = %error,
                    "dropping malformed channel message"
                );
                return None;
            }
        };

        self.summary.handled += 1;
        debug!(
            target: DISPATCH_TARGET,
            serial = invoke.serial,
            function = %invoke.function,
            args = invoke.args.len(),
            "invocation received"
        );
        let call = match self.registry.resolve(&invoke.function) {
            Ok(method) => self.invoke(method, invoke.args),
            Err(error) => future::ready(Err(CallError::from(error))).boxed(),
        };
        Some(PendingCall {
            serial: invoke.serial,
            call,
        })
    }

    fn invoke(
        &self,
        method: Arc<dyn Method>,
        args: Vec<Value>,
    ) -> BoxFuture<'static, Result<Value, CallError>> {
        let started = match panic::catch_unwind(AssertUnwindSafe(|| method.call(args))) {
            Ok(started) => started,
            Err(_) => return future::ready(Err(CallError::Panicked)).boxed(),
        };
        let guarded = async move {
            match AssertUnwindSafe(started).catch_unwind().await {
                Ok(outcome) => outcome.map_err(CallError::from),
                Err(_) => Err(CallError::Panicked),
            }
        };
        match self.options.invoke_timeout {
            Some(limit) => async move {
                tokio::time::timeout(limit, guarded)
                    .await
                    .unwrap_or_else(|_| {
                        Err(CallError::TimedOut {
                            millis: limit.as_millis(),
                        })
                    })
            }
            .boxed(),
            None => guarded.boxed(),
        }
    }

    /// Posts the single response for `serial`.
    pub fn respond(&mut self, serial: Serial, outcome: Result<Value, CallError>) {
        let message = match outcome {
            Ok(result) => {
                self.summary.succeeded += 1;
                Message::invoke_result(serial, result)
            }
            Err(error) => {
                self.summary.failed += 1;
                debug!(
                    target: DISPATCH_TARGET,
                    serial,
                    error = %error,
                    "invocation failed"
                );
                Message::invoke_error(serial, error.to_string())
            }
        };
        if let Err(error) = self.port.post(&message) {
            debug!(
                target: DISPATCH_TARGET,
                serial,
                error = %error,
                "response not delivered"
            );
        }
    }

    /// Serves the channel until its inbound side closes.
    ///
    /// Calls run concurrently and are answered in completion order. Calls
    /// still running when the peer hangs up are drained and answered before
    /// this returns.
    pub async fn run(mut self, mut inbound: PortReceiver) -> DispatchSummary {
        let mut in_flight = FuturesUnordered::new();
        let mut open = true;
        loop {
            tokio::select! {
                raw = inbound.recv(), if open => match raw {
                    Some(raw) => {
                        if let Some(call) = self.handle(raw) {
                            in_flight.push(call.complete());
                        }
                    }
                    None => open = false,
                },
                Some((serial, outcome)) = in_flight.next(), if !in_flight.is_empty() => {
                    self.respond(serial, outcome);
                }
                else => break,
            }
        }
        debug!(
            target: DISPATCH_TARGET,
            handled = self.summary.handled,
            "channel closed"
        );
        self.summary
    }
}
