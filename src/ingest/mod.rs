pub mod ring;

pub use ring::{ByteRing, RingConsumer, RingProducer};
