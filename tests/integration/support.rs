// Deterministic test doubles.

use trustmem::{Embedder, Engine, EngineConfig, EngineResult, Generator, SessionId, TurnReply};

const DIMS: usize = 512;

/// Bag-of-words embedder: each lowercase token adds 1.0 at its FNV-1a bucket.
pub struct BagOfWords;

fn fnv1a(s: &str) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for b in s.bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    h
}

impl Embedder for BagOfWords {
    fn embed(&self, text: &str) -> EngineResult<Vec<f32>> {
        let mut v = vec![0.0f32; DIMS];
        let lower = text.to_lowercase();
        for tok in lower.split(|c: char| !(c.is_alphanumeric() || c == '\'')).filter(|t| !t.is_empty()) {
            v[(fnv1a(tok) % DIMS as u64) as usize] += 1.0;
        }
        Ok(v)
    }
}

/// Echoes the best-ranked memory, or the query when nothing was retrieved.
pub struct Parrot;

impl Generator for Parrot {
    fn generate(&self, query: &str, memories: &[String]) -> Option<String> {
        Some(memories.first().cloned().unwrap_or_else(|| query.to_string()))
    }
}

/// Echoes the best-ranked memory; silent without one.
pub struct EchoTop;

impl Generator for EchoTop {
    fn generate(&self, _query: &str, memories: &[String]) -> Option<String> {
        memories.first().cloned()
    }
}

/// Always says the same thing.
pub struct Fixed(pub &'static str);

impl Generator for Fixed {
    fn generate(&self, _query: &str, _memories: &[String]) -> Option<String> {
        Some(self.0.to_string())
    }
}

pub fn engine() -> Engine {
    Engine::in_memory(EngineConfig::default()).unwrap()
}

pub fn session(id: &str) -> SessionId {
    SessionId::new(id)
}

/// Run a turn with the bag-of-words embedder.
pub fn say(engine: &Engine, s: &SessionId, text: &str, generator: &dyn Generator) -> TurnReply {
    engine.handle_turn(s, text, &BagOfWords, generator).unwrap()
}
