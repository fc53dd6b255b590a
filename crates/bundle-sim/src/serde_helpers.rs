/// Serializes a `U256` as a base-10 string, the format used for every
/// wei amount in simulation results.
pub mod decimal {
    use std::str::FromStr;

    use alloy::primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let text = String::deserialize(deserializer)?;
        U256::from_str(&text).map_err(serde::de::Error::custom)
    }
}
