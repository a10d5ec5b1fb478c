//! Log packets, the unit of transmission to the distributor.

use rand::{Rng, distr::Distribution};
use serde::Serialize;

use crate::{Error, LogMessage, MessageSynthesizer, Weighted, catalog, ident};

/// The number of messages in a packet and how often that size occurs. Sums
/// to one.
pub const SIZE_WEIGHTS: [(usize, f64); 8] = [
    (1, 0.30),
    (2, 0.25),
    (3, 0.20),
    (4, 0.10),
    (5, 0.08),
    (8, 0.04),
    (12, 0.02),
    (20, 0.01),
];

/// The probability that a message shares the packet's primary application.
/// The remainder come from an application drawn afresh per message.
pub const PRIMARY_CONTEXT_PROBABILITY: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
/// A batch of messages from one agent.
///
/// `total_messages` always equals the number of messages; the fields are
/// private so that no caller can break this.
pub struct LogPacket {
    packet_id: String,
    agent_id: String,
    total_messages: usize,
    messages: Vec<LogMessage>,
    checksum: String,
}

impl LogPacket {
    /// Wrap `messages` in a new packet with a fresh identifier and checksum.
    pub fn new<R>(agent_id: &str, messages: Vec<LogMessage>, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        Self {
            packet_id: format!("pkt-{}", ident::uuid(rng).hyphenated()),
            agent_id: agent_id.to_string(),
            total_messages: messages.len(),
            messages,
            // A placeholder in the shape of a digest. Nothing verifies it.
            checksum: format!("sha256:{}", ident::hex(rng, 32)),
        }
    }

    /// The packet's unique identifier, `pkt-<uuid>`.
    #[must_use]
    pub fn packet_id(&self) -> &str {
        &self.packet_id
    }

    /// A shortened identifier for diagnostics.
    #[must_use]
    pub fn short_id(&self) -> &str {
        self.packet_id.get(..12).unwrap_or(&self.packet_id)
    }

    /// The agent that built the packet.
    #[must_use]
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// The number of messages in the packet.
    #[must_use]
    pub fn total_messages(&self) -> usize {
        self.total_messages
    }

    /// The messages, in order.
    #[must_use]
    pub fn messages(&self) -> &[LogMessage] {
        &self.messages
    }

    /// The simulated checksum, `sha256:<32 hex>`.
    #[must_use]
    pub fn checksum(&self) -> &str {
        &self.checksum
    }
}

#[derive(Debug, Clone)]
/// Builds [`LogPacket`] values on behalf of one emitter agent.
pub struct PacketSynthesizer {
    messages: MessageSynthesizer,
    sizes: Weighted<usize>,
}

impl PacketSynthesizer {
    /// Create a new [`PacketSynthesizer`] for `agent_id`.
    ///
    /// # Errors
    ///
    /// Only fails if the built-in weights are invalid.
    pub fn new<S>(agent_id: S) -> Result<Self, Error>
    where
        S: Into<String>,
    {
        Ok(Self {
            messages: MessageSynthesizer::new(agent_id)?,
            sizes: Weighted::new(SIZE_WEIGHTS)?,
        })
    }

    /// The agent stamped on every packet.
    #[must_use]
    pub fn agent_id(&self) -> &str {
        self.messages.agent_id()
    }

    /// The synthesizer used for individual messages.
    #[must_use]
    pub fn messages(&self) -> &MessageSynthesizer {
        &self.messages
    }

    /// Draw a packet size from [`SIZE_WEIGHTS`].
    pub fn message_count<R>(&self, rng: &mut R) -> usize
    where
        R: Rng + ?Sized,
    {
        self.sizes.sample(rng)
    }

    /// Build one packet. With `message_count` unset the size is drawn from
    /// [`SIZE_WEIGHTS`].
    pub fn synthesize<R>(&self, rng: &mut R, message_count: Option<usize>) -> LogPacket
    where
        R: Rng + ?Sized,
    {
        let count = message_count.unwrap_or_else(|| self.message_count(rng));
        let primary = catalog::choose(rng);
        let messages = (0..count)
            .map(|_| {
                let context = if rng.random_bool(PRIMARY_CONTEXT_PROBABILITY) {
                    primary
                } else {
                    catalog::choose(rng)
                };
                self.messages.synthesize(context, rng)
            })
            .collect();

        LogPacket::new(self.agent_id(), messages, rng)
    }
}

#[cfg(test)]
mod test {
    use std::collections::{HashMap, HashSet};

    use proptest::prelude::*;
    use rand::{SeedableRng, rngs::SmallRng};

    use super::{PRIMARY_CONTEXT_PROBABILITY, PacketSynthesizer, SIZE_WEIGHTS};

    fn synthesizer() -> PacketSynthesizer {
        PacketSynthesizer::new("emitter-test").expect("valid weights")
    }

    #[test]
    fn size_weights_sum_to_one() {
        let total: f64 = SIZE_WEIGHTS.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn total_matches_message_count(seed in any::<u64>(), count in proptest::option::of(0usize..32)) {
            let synthesizer = synthesizer();
            let mut rng = SmallRng::seed_from_u64(seed);
            let packet = synthesizer.synthesize(&mut rng, count);

            prop_assert_eq!(packet.total_messages(), packet.messages().len());
            if let Some(count) = count {
                prop_assert_eq!(packet.total_messages(), count);
            } else {
                prop_assert!(SIZE_WEIGHTS.iter().any(|(size, _)| *size == packet.total_messages()));
            }
            prop_assert_eq!(packet.agent_id(), "emitter-test");
            for message in packet.messages() {
                prop_assert_eq!(message.metadata.emitter_agent.as_str(), "emitter-test");
            }
        }
    }

    #[test]
    fn packet_ids_unique() {
        let synthesizer = synthesizer();
        let mut rng = SmallRng::seed_from_u64(99);
        let mut ids = HashSet::new();
        let mut checksums = HashSet::new();
        for _ in 0..10_000 {
            let packet = synthesizer.synthesize(&mut rng, Some(1));
            assert!(ids.insert(packet.packet_id().to_string()));
            assert!(checksums.insert(packet.checksum().to_string()));
        }
    }

    #[test]
    fn sizes_converge_to_weights() {
        let synthesizer = synthesizer();
        let mut rng = SmallRng::seed_from_u64(17);
        let draws = 50_000;
        let mut counts: HashMap<usize, u32> = HashMap::new();
        for _ in 0..draws {
            *counts.entry(synthesizer.message_count(&mut rng)).or_default() += 1;
        }
        for (size, weight) in SIZE_WEIGHTS {
            let observed = f64::from(counts.get(&size).copied().unwrap_or(0)) / f64::from(draws);
            assert!(
                (observed - weight).abs() < 0.01,
                "size {size}: observed {observed}, expected {weight}"
            );
        }
    }

    #[test]
    fn most_messages_share_primary_application() {
        let synthesizer = synthesizer();
        let mut rng = SmallRng::seed_from_u64(23);
        let mut same = 0u32;
        let mut total = 0u32;
        for _ in 0..500 {
            let packet = synthesizer.synthesize(&mut rng, Some(20));
            // The most common application in a packet stands in for the
            // primary one.
            let mut per_app: HashMap<&str, u32> = HashMap::new();
            for message in packet.messages() {
                *per_app.entry(message.source.application.as_str()).or_default() += 1;
            }
            same += per_app.values().max().copied().unwrap_or(0);
            total += 20;
        }
        // Primary share is 0.8 plus 0.2 * 1/5 for fresh draws that land on
        // the primary again.
        let expected = PRIMARY_CONTEXT_PROBABILITY + (1.0 - PRIMARY_CONTEXT_PROBABILITY) / 5.0;
        let observed = f64::from(same) / f64::from(total);
        assert!((observed - expected).abs() < 0.03, "observed {observed}");
    }

    #[test]
    fn wire_shape() {
        let synthesizer = synthesizer();
        let mut rng = SmallRng::seed_from_u64(4);
        let packet = synthesizer.synthesize(&mut rng, Some(3));
        let json = serde_json::to_value(&packet).expect("serializable");

        let id = json["packetId"].as_str().expect("packetId");
        assert!(id.starts_with("pkt-"));
        assert_eq!(id.len(), "pkt-".len() + 36);
        assert_eq!(packet.short_id(), &id[..12]);
        assert_eq!(json["agentId"], "emitter-test");
        assert_eq!(json["totalMessages"], 3);
        assert_eq!(json["messages"].as_array().map(Vec::len), Some(3));
        let checksum = json["checksum"].as_str().expect("checksum");
        assert!(checksum.starts_with("sha256:"));
        assert_eq!(checksum.len(), "sha256:".len() + 32);
    }

    #[test]
    fn empty_packet_is_consistent() {
        let synthesizer = synthesizer();
        let mut rng = SmallRng::seed_from_u64(6);
        let packet = synthesizer.synthesize(&mut rng, Some(0));
        assert_eq!(packet.total_messages(), 0);
        assert!(packet.messages().is_empty());
    }
}
