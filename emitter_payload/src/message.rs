//! Individual log messages.
//!
//! A message carries a severity, the application/service/instance/host it
//! claims to come from, a human readable line and a metadata map. The metadata
//! always holds four correlation keys. On top of those at most one group of
//! extra keys is present, chosen by [`Detail`]:
//!
//! * services whose name contains `auth` carry identity and network keys,
//! * else services whose name contains `payment` or `billing` carry a
//!   monetary transaction,
//! * else `ERROR` and `FATAL` messages carry an error code and stack trace,
//! * else nothing more.

use std::fmt;

use rand::{Rng, distr::Distribution};
use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::{Error, Weighted, catalog::ApplicationContext, ident};

/// The agent string reported by authenticated sessions.
const USER_AGENT: &str = concat!("log-emitter/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
/// Message severity.
pub enum Level {
    /// Diagnostic chatter
    Debug,
    /// Normal operation
    Info,
    /// Something looks off
    Warn,
    /// An operation failed
    Error,
    /// The service is going down
    Fatal,
}

impl Level {
    /// Every level, least to most severe.
    pub const ALL: [Level; 5] = [
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Fatal,
    ];

    /// The share of traffic produced at each level. Sums to one.
    pub const WEIGHTS: [(Level, f64); 5] = [
        (Level::Debug, 0.40),
        (Level::Info, 0.35),
        (Level::Warn, 0.15),
        (Level::Error, 0.08),
        (Level::Fatal, 0.02),
    ];

    /// Whether messages of this level report a failure.
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(self, Level::Error | Level::Fatal)
    }

    /// The wire name of this level.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Where a message claims to come from.
pub struct Source {
    /// The application, see [`ApplicationContext`]
    pub application: String,
    /// One service of `application`
    pub service: String,
    /// The replica of `service`, `<service>-<1..=3>`
    pub instance: String,
    /// The machine, `prod-server-<01..=10>`
    pub host: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
/// Currency of a simulated payment.
pub enum Currency {
    /// US dollar
    #[serde(rename = "USD")]
    Usd,
    /// Euro
    #[serde(rename = "EUR")]
    Eur,
    /// Pound sterling
    #[serde(rename = "GBP")]
    Gbp,
}

impl Currency {
    const ALL: [Currency; 3] = [Currency::Usd, Currency::Eur, Currency::Gbp];
}

#[derive(Debug, Clone, PartialEq)]
/// The service or level specific part of [`Metadata`].
pub enum Detail {
    /// The message concerns an authenticated session.
    Auth {
        /// `user-<1000..=9999>`
        user_id: String,
        /// An address in 192.168.0.0/16
        client_ip: String,
        /// The client's agent string
        user_agent: &'static str,
    },
    /// The message concerns a payment.
    Payment {
        /// Between 10 and 1000, rounded to cents
        amount: f64,
        /// The currency of `amount`
        currency: Currency,
        /// `txn-<12 hex>`
        transaction_id: String,
    },
    /// The message reports a failure.
    Failure {
        /// `<SERVICE>_<001..=999>`
        error_code: String,
        /// A single synthetic frame
        stack_trace: String,
    },
    /// Nothing beyond the base keys.
    None,
}

impl Detail {
    /// The metadata keys this detail contributes, in serialization order.
    #[must_use]
    pub fn keys(&self) -> &'static [&'static str] {
        match self {
            Detail::Auth { .. } => &["userId", "clientIp", "userAgent"],
            Detail::Payment { .. } => &["amount", "currency", "transactionId"],
            Detail::Failure { .. } => &["errorCode", "stackTrace"],
            Detail::None => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Correlation identifiers and [`Detail`] for one message.
///
/// Serializes as one flat JSON object.
pub struct Metadata {
    /// `corr-<12 hex>`
    pub correlation_id: String,
    /// `req-<8 hex>`
    pub request_id: String,
    /// `sess-<10 hex>`
    pub session_id: String,
    /// The agent that emitted the message
    pub emitter_agent: String,
    /// Extra keys, if any
    pub detail: Detail,
}

impl Metadata {
    /// The keys present on every message.
    pub const BASE_KEYS: [&'static str; 4] =
        ["correlationId", "requestId", "sessionId", "emitterAgent"];
}

impl Serialize for Metadata {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(4 + self.detail.keys().len()))?;
        map.serialize_entry("correlationId", &self.correlation_id)?;
        map.serialize_entry("requestId", &self.request_id)?;
        map.serialize_entry("sessionId", &self.session_id)?;
        map.serialize_entry("emitterAgent", &self.emitter_agent)?;
        match &self.detail {
            Detail::Auth {
                user_id,
                client_ip,
                user_agent,
            } => {
                map.serialize_entry("userId", user_id)?;
                map.serialize_entry("clientIp", client_ip)?;
                map.serialize_entry("userAgent", user_agent)?;
            }
            Detail::Payment {
                amount,
                currency,
                transaction_id,
            } => {
                map.serialize_entry("amount", amount)?;
                map.serialize_entry("currency", currency)?;
                map.serialize_entry("transactionId", transaction_id)?;
            }
            Detail::Failure {
                error_code,
                stack_trace,
            } => {
                map.serialize_entry("errorCode", error_code)?;
                map.serialize_entry("stackTrace", stack_trace)?;
            }
            Detail::None => {}
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
/// One log line as the distributor receives it.
pub struct LogMessage {
    /// Severity
    pub level: Level,
    /// Claimed origin
    pub source: Source,
    /// Human readable text
    pub message: String,
    /// Correlation keys and extras
    pub metadata: Metadata,
}

#[derive(Debug, Clone)]
/// Builds [`LogMessage`] values on behalf of one emitter agent.
pub struct MessageSynthesizer {
    agent_id: String,
    levels: Weighted<Level>,
}

impl MessageSynthesizer {
    /// Create a new [`MessageSynthesizer`] stamping `agent_id` on every
    /// message, with levels drawn per [`Level::WEIGHTS`].
    ///
    /// # Errors
    ///
    /// Only fails if the level weights are invalid.
    pub fn new<S>(agent_id: S) -> Result<Self, Error>
    where
        S: Into<String>,
    {
        Ok(Self {
            agent_id: agent_id.into(),
            levels: Weighted::new(Level::WEIGHTS)?,
        })
    }

    /// The agent stamped on messages.
    #[must_use]
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Build one message from `context` with a weighted random level.
    pub fn synthesize<R>(&self, context: &ApplicationContext, rng: &mut R) -> LogMessage
    where
        R: Rng + ?Sized,
    {
        let level = self.levels.sample(rng);
        self.synthesize_at(context, level, rng)
    }

    /// Build one message from `context` at a fixed `level`.
    pub fn synthesize_at<R>(
        &self,
        context: &ApplicationContext,
        level: Level,
        rng: &mut R,
    ) -> LogMessage
    where
        R: Rng + ?Sized,
    {
        let service = context.choose_service(rng);
        let source = Source {
            application: context.application().to_string(),
            service: service.to_string(),
            instance: format!("{service}-{}", rng.random_range(1..=3)),
            host: format!("prod-server-{:02}", rng.random_range(1..=10)),
        };
        let message = text(level, service, rng);
        let metadata = Metadata {
            correlation_id: format!("corr-{}", ident::hex(rng, 12)),
            request_id: format!("req-{}", ident::hex(rng, 8)),
            session_id: format!("sess-{}", ident::hex(rng, 10)),
            emitter_agent: self.agent_id.clone(),
            detail: detail(context, service, level, rng),
        };

        LogMessage {
            level,
            source,
            message,
            metadata,
        }
    }
}

fn detail<R>(context: &ApplicationContext, service: &str, level: Level, rng: &mut R) -> Detail
where
    R: Rng + ?Sized,
{
    if service.contains("auth") {
        Detail::Auth {
            user_id: format!("user-{}", rng.random_range(1000..=9999)),
            client_ip: format!(
                "192.168.{}.{}",
                rng.random_range(1..=255),
                rng.random_range(1..=255)
            ),
            user_agent: USER_AGENT,
        }
    } else if service.contains("payment") || service.contains("billing") {
        let cents: f64 = (rng.random_range(10.0..=1000.0) * 100.0_f64).round();
        Detail::Payment {
            amount: cents / 100.0,
            currency: Currency::ALL[rng.random_range(0..Currency::ALL.len())],
            transaction_id: format!("txn-{}", ident::hex(rng, 12)),
        }
    } else if level.is_failure() {
        Detail::Failure {
            error_code: format!(
                "{}_{:03}",
                service.to_uppercase().replace('-', "_"),
                rng.random_range(1..=999)
            ),
            stack_trace: format!(
                "at {}.{}.Handler.process(Handler.java:{})",
                context.application().replace('-', "_"),
                service.replace('-', "_"),
                rng.random_range(50..=200)
            ),
        }
    } else {
        Detail::None
    }
}

/// One of four templates for `level`, filled with random parameters.
fn text<R>(level: Level, service: &str, rng: &mut R) -> String
where
    R: Rng + ?Sized,
{
    let template = rng.random_range(0..4u8);
    match (level, template) {
        (Level::Debug, 0) => format!("Entering {service} handler for incoming request"),
        (Level::Debug, 1) => format!("Query returned in {}ms", rng.random_range(1..=50)),
        (Level::Debug, 2) => format!(
            "Cache hit on key {service}:{}",
            rng.random_range(1000..=9999)
        ),
        (Level::Debug, _) => format!("Tracing request {}", ident::hex(rng, 12)),
        (Level::Info, 0) => format!("Session established through {service}"),
        (Level::Info, 1) => "Request completed successfully".to_string(),
        (Level::Info, 2) => format!(
            "{} listening on port {}",
            title(service),
            8080 + rng.random_range(1..=20)
        ),
        (Level::Info, _) => format!("Batch of {} records processed", rng.random_range(1..=100)),
        (Level::Warn, 0) => format!(
            "Slow response from {service}: {}ms",
            rng.random_range(1000..=3000)
        ),
        (Level::Warn, 1) => format!(
            "Retrying operation, attempt {} of 3",
            rng.random_range(1..=3)
        ),
        (Level::Warn, 2) => format!("{service} is nearing its rate limit"),
        (Level::Warn, _) => format!("Client called deprecated endpoint /{service}/v1"),
        (Level::Error, 0) => format!("Lost connection to the {service} datastore"),
        (Level::Error, 1) => "Login rejected: credentials did not match".to_string(),
        (Level::Error, 2) => format!(
            "{service} did not answer within {} seconds",
            rng.random_range(5..=30)
        ),
        (Level::Error, _) => format!("Rejected malformed {service} payload"),
        (Level::Fatal, 0) => format!("{service} terminated: out of memory"),
        (Level::Fatal, 1) => "Connection pool exhausted, no connections available".to_string(),
        (Level::Fatal, 2) => format!("{service} stopped responding, paging on-call"),
        (Level::Fatal, _) => format!("Intrusion detected in the {service} module"),
    }
}

/// Upper-case the first character of `s`.
fn title(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use proptest::prelude::*;
    use rand::{SeedableRng, rngs::SmallRng};
    use serde_json::Value;

    use super::{Detail, Level, LogMessage, MessageSynthesizer, Metadata, title};
    use crate::catalog::{APPLICATIONS, ApplicationContext};

    fn synthesizer() -> MessageSynthesizer {
        MessageSynthesizer::new("emitter-test").expect("valid weights")
    }

    fn expected_detail_keys(message: &LogMessage) -> &'static [&'static str] {
        let service = message.source.service.as_str();
        if service.contains("auth") {
            &["userId", "clientIp", "userAgent"]
        } else if service.contains("payment") || service.contains("billing") {
            &["amount", "currency", "transactionId"]
        } else if message.level.is_failure() {
            &["errorCode", "stackTrace"]
        } else {
            &[]
        }
    }

    #[test]
    fn level_weights_sum_to_one() {
        let total: f64 = Level::WEIGHTS.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn levels_converge_to_weights() {
        let synthesizer = synthesizer();
        let mut rng = SmallRng::seed_from_u64(42);
        let draws = 20_000;
        let mut counts: HashMap<Level, u32> = HashMap::new();
        for _ in 0..draws {
            let message = synthesizer.synthesize(&APPLICATIONS[3], &mut rng);
            *counts.entry(message.level).or_default() += 1;
        }
        for (level, weight) in Level::WEIGHTS {
            let observed = f64::from(counts.get(&level).copied().unwrap_or(0)) / f64::from(draws);
            assert!(
                (observed - weight).abs() < 0.015,
                "{level}: observed {observed}, expected {weight}"
            );
        }
    }

    // Every message carries the base keys plus exactly the keys dictated by
    // its service name and level.
    proptest! {
        #[test]
        fn metadata_keys_follow_branch_rules(seed in any::<u64>(), app in 0usize..5) {
            let synthesizer = synthesizer();
            let mut rng = SmallRng::seed_from_u64(seed);
            let message = synthesizer.synthesize(&APPLICATIONS[app], &mut rng);

            let json = serde_json::to_value(&message).expect("serializable");
            let metadata = json["metadata"].as_object().expect("metadata is an object");
            let expected = expected_detail_keys(&message);

            prop_assert_eq!(metadata.len(), Metadata::BASE_KEYS.len() + expected.len());
            for key in Metadata::BASE_KEYS.iter().chain(expected) {
                prop_assert!(metadata.contains_key(*key), "missing {}", key);
            }
            prop_assert_eq!(message.metadata.detail.keys(), expected);
        }
    }

    proptest! {
        #[test]
        fn source_fields_well_formed(seed in any::<u64>(), app in 0usize..5) {
            let synthesizer = synthesizer();
            let mut rng = SmallRng::seed_from_u64(seed);
            let context = &APPLICATIONS[app];
            let message = synthesizer.synthesize(context, &mut rng);
            let source = &message.source;

            prop_assert_eq!(source.application.as_str(), context.application());
            prop_assert!(context.services().contains(&source.service.as_str()));

            let replica: u8 = source.instance
                .strip_prefix(&format!("{}-", source.service))
                .and_then(|n| n.parse().ok())
                .expect("instance is <service>-<n>");
            prop_assert!((1..=3).contains(&replica));

            let host = source.host.strip_prefix("prod-server-").expect("host prefix");
            prop_assert_eq!(host.len(), 2);
            let host: u8 = host.parse().expect("numeric host");
            prop_assert!((1..=10).contains(&host));
            prop_assert!(!message.message.is_empty());
        }
    }

    #[test]
    fn payment_amounts_in_range_with_cents() {
        let synthesizer = synthesizer();
        let billing = ApplicationContext::new("payment-service", &["billing"]);
        let mut rng = SmallRng::seed_from_u64(8);
        for _ in 0..1_000 {
            let message = synthesizer.synthesize(&billing, &mut rng);
            let Detail::Payment { amount, transaction_id, .. } = message.metadata.detail else {
                panic!("billing must carry a payment");
            };
            assert!((10.0..=1000.0).contains(&amount), "{amount}");
            assert!(((amount * 100.0).round() - amount * 100.0).abs() < 1e-6);
            assert!(transaction_id.starts_with("txn-"));
        }
    }

    #[test]
    fn auth_wins_over_failure() {
        let synthesizer = synthesizer();
        let auth = ApplicationContext::new("user-service", &["authentication"]);
        let mut rng = SmallRng::seed_from_u64(13);
        let message = synthesizer.synthesize_at(&auth, Level::Fatal, &mut rng);
        assert!(matches!(message.metadata.detail, Detail::Auth { .. }));
    }

    #[test]
    fn failure_detail_only_for_failures() {
        let synthesizer = synthesizer();
        let email = ApplicationContext::new("notification-service", &["email"]);
        let mut rng = SmallRng::seed_from_u64(21);
        for level in Level::ALL {
            let message = synthesizer.synthesize_at(&email, level, &mut rng);
            match message.metadata.detail {
                Detail::Failure { ref error_code, ref stack_trace } => {
                    assert!(level.is_failure());
                    assert!(error_code.starts_with("EMAIL_"));
                    assert!(stack_trace.contains("email"));
                }
                Detail::None => assert!(!level.is_failure()),
                ref other => panic!("unexpected detail {other:?}"),
            }
        }
    }

    #[test]
    fn wire_shape() {
        let synthesizer = synthesizer();
        let mut rng = SmallRng::seed_from_u64(3);
        let message = synthesizer.synthesize_at(&APPLICATIONS[2], Level::Warn, &mut rng);
        let json = serde_json::to_value(&message).expect("serializable");

        assert_eq!(json["level"], "WARN");
        for key in ["application", "service", "instance", "host"] {
            assert!(json["source"][key].is_string(), "{key}");
        }
        assert!(json["message"].is_string());
        assert_eq!(json["metadata"]["emitterAgent"], "emitter-test");
        let correlation = json["metadata"]["correlationId"].as_str().expect("string");
        assert_eq!(correlation.len(), "corr-".len() + 12);
        assert!(matches!(json["metadata"]["requestId"], Value::String(_)));
    }

    #[test]
    fn title_case() {
        assert_eq!(title("email"), "Email");
        assert_eq!(title("fraud-detection"), "Fraud-detection");
        assert_eq!(title(""), "");
    }
}
